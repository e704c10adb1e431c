//! Command dispatch (§10.4). Each subcommand is a thin function composing
//! the library crates; `run()` is the only thing `main.rs` calls.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use mcptrust_canon::{hash_value, normalize_text, prompt_arguments_hash, template_hash, CanonVersion, PromptArgumentRef};
use mcptrust_model::{
    ArtifactPin, DriftReport, Lockfile, LockfileMeta, PolicyConfig, PromptDefinition, Prompts,
    ResourceTemplate, Resources, ScanReport, ServerInfo, Severity, ToolEntry, LOCK_FILE_VERSION,
};
use mcptrust_network::{NetworkConfig, SecurityConfig};
use mcptrust_policy::{build_input, from_yaml_str, CompiledPolicy, PolicyResult};
use mcptrust_proxy::{run_proxy, EnforceMode, PreflightConfig, ProxyOptions};
use mcptrust_runner::{NpmRunnerOptions, OciRunnerOptions, RunOptions};
use mcptrust_scanner::Scanner;

use crate::logging::{self, LogFormat};
use crate::pin::resolve_pin;

#[derive(Parser)]
#[command(name = "mcptrust")]
#[command(about = "Supply-chain trust and runtime enforcement for stdio MCP servers")]
#[command(version)]
pub struct Cli {
    /// Log output format. The proxy subcommand always logs to stderr
    /// regardless of this setting, so stdout stays pure NDJSON.
    #[arg(long, global = true, value_enum, default_value = "human")]
    log_format: CliLogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliLogFormat {
    Human,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliSeverity {
    Info,
    Moderate,
    Critical,
}

impl From<CliSeverity> for Severity {
    fn from(value: CliSeverity) -> Self {
        match value {
            CliSeverity::Info => Severity::Info,
            CliSeverity::Moderate => Severity::Moderate,
            CliSeverity::Critical => Severity::Critical,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a server and write (or refresh) its lockfile.
    Lock {
        #[arg(long)]
        command: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        #[arg(long, default_value = "mcp-lock.json")]
        out: PathBuf,
        /// Re-scan and overwrite only the capabilities whose hash drifted,
        /// preserving `meta.generator`/`updatedAt` when nothing changed.
        #[arg(long)]
        update: bool,
        #[arg(long)]
        allow_private_hosts: bool,
    },
    /// Scan a server and compare it against a lockfile.
    Verify {
        #[arg(long, default_value = "mcp-lock.json")]
        lockfile: PathBuf,
        #[arg(long)]
        command: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        #[arg(long)]
        policy: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "critical")]
        fail_on: CliSeverity,
    },
    /// Fetch, verify, and execute the lockfile's pinned artifact.
    Run {
        #[arg(long, default_value = "mcp-lock.json")]
        lockfile: PathBuf,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        #[arg(long)]
        bin: Option<String>,
        #[arg(long)]
        allow_missing_installed_integrity: bool,
        #[arg(long)]
        require_provenance: bool,
        /// Emit the run receipt as JSON instead of the human form.
        #[arg(long)]
        json: bool,
    },
    /// Bridge a host's stdio to a child MCP server, enforcing the lockfile.
    Proxy {
        #[arg(long, default_value = "mcp-lock.json")]
        lockfile: PathBuf,
        #[arg(long)]
        command: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        #[arg(long, conflicts_with = "filter_only")]
        audit_only: bool,
        #[arg(long, conflicts_with = "audit_only")]
        filter_only: bool,
        #[arg(long)]
        allow_static_resources: bool,
        #[arg(long)]
        policy: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "critical")]
        fail_on: CliSeverity,
    },
    /// Verify plus mandatory policy evaluation in one step.
    Check {
        #[arg(long, default_value = "mcp-lock.json")]
        lockfile: PathBuf,
        #[arg(long)]
        command: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        #[arg(long)]
        policy: PathBuf,
    },
}

/// Parses argv, initializes logging, and dispatches to the chosen
/// subcommand. Returns the process exit code (§6: `0` pass, `1` fail).
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init(match cli.log_format {
        CliLogFormat::Human => LogFormat::Human,
        CliLogFormat::Json => LogFormat::Json,
    });

    let runtime = tokio::runtime::Runtime::new().context("building the async runtime")?;
    runtime.block_on(dispatch(cli.command))
}

async fn dispatch(command: Commands) -> Result<i32> {
    match command {
        Commands::Lock {
            command,
            args,
            out,
            update,
            allow_private_hosts,
        } => cmd_lock(command, args, out, update, allow_private_hosts).await,
        Commands::Verify {
            lockfile,
            command,
            args,
            policy,
            fail_on,
        } => cmd_verify(lockfile, command, args, policy, fail_on.into()).await,
        Commands::Run {
            lockfile,
            args,
            bin,
            allow_missing_installed_integrity,
            require_provenance,
            json,
        } => cmd_run(lockfile, args, bin, allow_missing_installed_integrity, require_provenance, json).await,
        Commands::Proxy {
            lockfile,
            command,
            args,
            audit_only,
            filter_only,
            allow_static_resources,
            policy,
            fail_on,
        } => cmd_proxy(lockfile, command, args, audit_only, filter_only, allow_static_resources, policy, fail_on.into()).await,
        Commands::Check {
            lockfile,
            command,
            args,
            policy,
        } => cmd_check(lockfile, command, args, policy).await,
    }
}

async fn cmd_lock(command: String, args: Vec<String>, out: PathBuf, update: bool, allow_private_hosts: bool) -> Result<i32> {
    let scanner = Scanner::default();
    let report = scanner.scan(&command, &args).await.context("scanning server")?;
    if let Some(err) = &report.error {
        bail!("scan reported an error: {err}");
    }

    let network = NetworkConfig {
        security: SecurityConfig { allow_private_hosts },
        ..NetworkConfig::default()
    };
    let command_line = join_command(&command, &args);
    let artifact = match resolve_pin(&command_line, &network).await {
        Ok(artifact) => artifact,
        Err(error) => {
            tracing::warn!(%error, "artifact pin resolution failed, locking without a pin");
            None
        }
    };

    let lockfile = if update && out.exists() {
        let existing = read_lockfile(&out)?;
        let fallback_artifact = existing.server.artifact.clone();
        let fresh = build_lockfile(
            existing.meta.generator.clone(),
            &command_line,
            &report,
            artifact.or(fallback_artifact),
        )?;
        apply_update(existing, fresh)
    } else {
        build_lockfile("mcptrust".to_string(), &command_line, &report, artifact)?
    };

    write_lockfile(&out, &lockfile)?;
    tracing::info!(path = %out.display(), tools = lockfile.tools.len(), "wrote lockfile");
    Ok(0)
}

async fn cmd_verify(lockfile_path: PathBuf, command: String, args: Vec<String>, policy_path: Option<PathBuf>, fail_on: Severity) -> Result<i32> {
    let lockfile = read_lockfile(&lockfile_path)?;
    let scanner = Scanner::default();
    let report = scanner.scan(&command, &args).await.context("scanning server")?;
    let drift = mcptrust_differ::diff(&lockfile, &report)?;
    print_drift(&drift);

    let drift_passed = !drift.max_severity().map(|observed| observed >= fail_on).unwrap_or(false);

    let policy_passed = match policy_path {
        Some(path) => {
            let compiled = CompiledPolicy::compile(&load_policy(&path)?)?;
            let result = compiled.evaluate(&build_input(&lockfile, &drift));
            print_policy_result(&result);
            result.passed
        }
        None => true,
    };

    Ok(if drift_passed && policy_passed { 0 } else { 1 })
}

async fn cmd_run(
    lockfile_path: PathBuf,
    args: Vec<String>,
    bin: Option<String>,
    allow_missing_installed_integrity: bool,
    require_provenance: bool,
    json: bool,
) -> Result<i32> {
    let lockfile = read_lockfile(&lockfile_path)?;
    let pin: &ArtifactPin = lockfile
        .server
        .artifact
        .as_ref()
        .context("lockfile has no artifact pin; `mcptrust lock` could not resolve one for this command")?;

    let options = RunOptions {
        npm: NpmRunnerOptions {
            bin,
            allow_missing_installed_integrity,
            require_provenance,
            network: NetworkConfig::default(),
        },
        oci: OciRunnerOptions { require_provenance },
    };

    match mcptrust_runner::run(pin, &lockfile.server.name, &args, &options).await {
        Ok(receipt) => {
            if json {
                eprintln!("{}", serde_json::to_string_pretty(&receipt)?);
            } else {
                eprint!("{receipt}");
            }
            Ok(0)
        }
        Err(error) => {
            eprintln!("run failed: {error}");
            Ok(1)
        }
    }
}

async fn cmd_proxy(
    lockfile_path: PathBuf,
    command: String,
    args: Vec<String>,
    audit_only: bool,
    filter_only: bool,
    allow_static_resources: bool,
    policy_path: Option<PathBuf>,
    fail_on: Severity,
) -> Result<i32> {
    let mode = if audit_only {
        EnforceMode::AuditOnly
    } else if filter_only {
        EnforceMode::FilterOnly
    } else {
        EnforceMode::Enforce
    };

    let lockfile = read_lockfile(&lockfile_path)?;
    let policy = match policy_path {
        Some(path) => Some(CompiledPolicy::compile(&load_policy(&path)?)?),
        None => None,
    };

    let options = ProxyOptions {
        program: command,
        args,
        mode,
        preflight: PreflightConfig {
            policy,
            fail_on,
            allow_static_resources,
        },
    };

    Ok(run_proxy(&lockfile, options).await?)
}

async fn cmd_check(lockfile_path: PathBuf, command: String, args: Vec<String>, policy_path: PathBuf) -> Result<i32> {
    let lockfile = read_lockfile(&lockfile_path)?;
    let scanner = Scanner::default();
    let report = scanner.scan(&command, &args).await.context("scanning server")?;
    let drift = mcptrust_differ::diff(&lockfile, &report)?;
    print_drift(&drift);

    let compiled = CompiledPolicy::compile(&load_policy(&policy_path)?)?;
    let result = compiled.evaluate(&build_input(&lockfile, &drift));
    print_policy_result(&result);

    Ok(if result.passed { 0 } else { 1 })
}

fn join_command(command: &str, args: &[String]) -> String {
    std::iter::once(command.to_string()).chain(args.iter().cloned()).collect::<Vec<_>>().join(" ")
}

fn normalized_description_hash(description: Option<&str>) -> Result<String> {
    let value = match description {
        Some(text) => serde_json::Value::String(normalize_text(text)),
        None => serde_json::Value::Null,
    };
    Ok(hash_value(&value, CanonVersion::V2)?)
}

fn build_lockfile(generator: String, command_line: &str, report: &ScanReport, artifact: Option<ArtifactPin>) -> Result<Lockfile> {
    let mut tools = BTreeMap::new();
    for tool in &report.tools {
        tools.insert(
            tool.name.clone(),
            ToolEntry {
                description_hash: normalized_description_hash(tool.description.as_deref())?,
                input_schema_hash: hash_value(&tool.input_schema, CanonVersion::V2)?,
                risk_level: "unknown".to_string(),
            },
        );
    }

    let mut definitions = BTreeMap::new();
    for prompt in &report.prompts {
        let arg_refs: Vec<PromptArgumentRef<'_>> = prompt
            .arguments
            .iter()
            .map(|a| PromptArgumentRef {
                name: &a.name,
                description: a.description.as_deref(),
                required: a.required,
            })
            .collect();
        definitions.insert(
            prompt.name.clone(),
            PromptDefinition {
                arguments_hash: prompt_arguments_hash(&arg_refs)?,
                title_hash: None,
                description_hash: prompt.description.as_deref().map(|d| normalized_description_hash(Some(d))).transpose()?,
            },
        );
    }

    let mut templates = Vec::new();
    for template in &report.resource_templates {
        templates.push(ResourceTemplate {
            uri_template: template.uri_template.clone(),
            template_hash: template_hash(&template.uri_template, template.mime_type.as_deref())?,
            name_hash: None,
            description_hash: template.description.as_deref().map(|d| normalized_description_hash(Some(d))).transpose()?,
            mime_type: template.mime_type.clone(),
        });
    }
    templates.sort_by(|a, b| a.uri_template.cmp(&b.uri_template));

    Ok(Lockfile {
        lock_file_version: LOCK_FILE_VERSION.to_string(),
        meta: LockfileMeta {
            generator,
            updated_at: Utc::now(),
        },
        server: ServerInfo {
            name: command_line.to_string(),
            artifact,
        },
        prompts: Prompts { definitions },
        resources: Resources { templates },
        tools,
        extra: serde_json::Map::new(),
    })
}

/// Keeps `existing` verbatim (including `meta`) when nothing drifted;
/// otherwise adopts `fresh`'s capability surface with a bumped `updatedAt`
/// but the original `meta.generator`.
fn apply_update(existing: Lockfile, fresh: Lockfile) -> Lockfile {
    let changed = fresh.tools != existing.tools
        || fresh.prompts.definitions != existing.prompts.definitions
        || fresh.resources.templates != existing.resources.templates
        || fresh.server.name != existing.server.name;
    if !changed {
        return existing;
    }
    Lockfile {
        lock_file_version: LOCK_FILE_VERSION.to_string(),
        meta: LockfileMeta {
            generator: existing.meta.generator,
            updated_at: Utc::now(),
        },
        server: fresh.server,
        prompts: fresh.prompts,
        resources: fresh.resources,
        tools: fresh.tools,
        extra: existing.extra,
    }
}

fn read_lockfile(path: &Path) -> Result<Lockfile> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading lockfile {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text).with_context(|| format!("parsing lockfile {}", path.display()))?;
    Ok(Lockfile::from_json(&value)?)
}

fn write_lockfile(path: &Path, lockfile: &Lockfile) -> Result<()> {
    let mut text = serde_json::to_string_pretty(lockfile)?;
    text.push('\n');
    std::fs::write(path, text).with_context(|| format!("writing lockfile {}", path.display()))
}

fn load_policy(path: &Path) -> Result<PolicyConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading policy {}", path.display()))?;
    Ok(from_yaml_str(&text)?)
}

fn print_drift(drift: &DriftReport) {
    if !drift.has_drift {
        eprintln!("no drift detected");
        return;
    }
    eprintln!("drift detected ({} item(s)):", drift.items.len());
    for item in &drift.items {
        eprintln!("  [{:?}] {:?} {} - {}", item.severity, item.kind, item.identifier, item.message);
    }
}

fn print_policy_result(result: &PolicyResult) {
    for outcome in &result.outcomes {
        let status = if outcome.passed { "pass" } else { "fail" };
        eprintln!("  policy rule {} [{status}] severity={:?}", outcome.rule, outcome.severity);
        if let Some(message) = &outcome.failure_msg {
            eprintln!("    {message}");
        }
    }
    eprintln!("policy: {}", if result.passed { "pass" } else { "fail" });
}
