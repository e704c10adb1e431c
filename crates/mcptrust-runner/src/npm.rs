use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::Engine;
use mcptrust_model::{NpmPin, Provenance};
use mcptrust_network::NetworkConfig;
use serde::Deserialize;
use sha2::{Digest, Sha256, Sha512};

use crate::command::CommandSpec;
use crate::error::RunnerError;
use crate::receipt::{ProvenanceSummary, Receipt};

const REGISTRY_BASE: &str = "https://registry.npmjs.org";

#[derive(Debug, Clone)]
pub struct NpmRunnerOptions {
    /// `--bin` override when the package exposes more than one binary.
    pub bin: Option<String>,
    pub allow_missing_installed_integrity: bool,
    pub require_provenance: bool,
    pub network: NetworkConfig,
}

impl Default for NpmRunnerOptions {
    fn default() -> Self {
        Self {
            bin: None,
            allow_missing_installed_integrity: false,
            require_provenance: false,
            network: NetworkConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistryVersionMetadata {
    dist: RegistryDist,
}

#[derive(Debug, Deserialize)]
struct RegistryDist {
    tarball: String,
}

async fn resolve_tarball_url(pin: &NpmPin, options: &NpmRunnerOptions) -> Result<String, RunnerError> {
    if let Some(url) = &pin.tarball_url {
        return Ok(url.clone());
    }
    let metadata_url = format!("{REGISTRY_BASE}/{}/{}", pin.name, pin.version);
    let fetched = mcptrust_network::fetch(&metadata_url, &options.network).await?;
    let metadata: RegistryVersionMetadata =
        serde_json::from_slice(&fetched.bytes).map_err(|e| RunnerError::MalformedRegistryMetadata {
            name: pin.name.clone(),
            version: pin.version.clone(),
            reason: e.to_string(),
        })?;
    Ok(metadata.dist.tarball)
}

fn hash_tarball(bytes: &[u8]) -> (String, String) {
    let sha512 = Sha512::digest(bytes);
    let sri = format!("sha512-{}", base64::engine::general_purpose::STANDARD.encode(sha512));
    let sha256 = format!("sha256:{:x}", Sha256::digest(bytes));
    (sri, sha256)
}

#[derive(Debug, Deserialize)]
struct PackageLock {
    #[serde(default)]
    packages: HashMap<String, LockedPackage>,
}

#[derive(Debug, Deserialize, Default)]
struct LockedPackage {
    version: Option<String>,
    resolved: Option<String>,
    integrity: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BinField {
    Single(String),
    Multiple(HashMap<String, String>),
}

#[derive(Debug, Deserialize)]
struct InstalledPackageJson {
    bin: Option<BinField>,
}

fn resolve_binary(package_dir: &Path, bin: Option<BinField>, requested: &Option<String>) -> Result<PathBuf, RunnerError> {
    match bin {
        None => Err(RunnerError::NoBinaryResolved),
        Some(BinField::Single(path)) => Ok(package_dir.join(path)),
        Some(BinField::Multiple(entries)) => match requested {
            Some(name) => entries
                .get(name)
                .map(|path| package_dir.join(path))
                .ok_or_else(|| RunnerError::UnknownBinary {
                    requested: name.clone(),
                    available: entries.keys().cloned().collect(),
                }),
            None if entries.len() == 1 => {
                let (_, path) = entries.into_iter().next().expect("len checked above");
                Ok(package_dir.join(path))
            }
            None => Err(RunnerError::NoBinaryResolved),
        },
    }
}

/// Fetches, verifies, installs, and executes an npm-pinned MCP server
/// (§4.7's npm runner, steps 1-10).
pub async fn run(
    pin: &NpmPin,
    provenance: Option<&Provenance>,
    trailing_args: &[String],
    options: &NpmRunnerOptions,
) -> Result<Receipt, RunnerError> {
    if options.require_provenance {
        let satisfied = provenance.map(Provenance::satisfies_require_provenance).unwrap_or(false);
        if !satisfied {
            return Err(RunnerError::ProvenanceRequired {
                actual: provenance
                    .map(|p| format!("{:?}", p.method))
                    .unwrap_or_else(|| "unverified".to_string()),
            });
        }
    }

    let work_dir = tempfile::Builder::new().prefix("mcptrust-npm-").tempdir()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(work_dir.path(), std::fs::Permissions::from_mode(0o700))?;
    }

    let placeholder_package_json = serde_json::json!({
        "name": "mcptrust-run-workspace",
        "version": "0.0.0",
        "private": true,
    });
    std::fs::write(
        work_dir.path().join("package.json"),
        serde_json::to_vec_pretty(&placeholder_package_json)?,
    )?;

    let tarball_url = resolve_tarball_url(pin, options).await?;
    let fetched = mcptrust_network::fetch(&tarball_url, &options.network).await?;
    let (computed_sri, computed_sha256) = hash_tarball(&fetched.bytes);

    let expected = mcptrust_integrity::parse_npm_integrity(&pin.integrity)?;
    let expected_sri = format!("{}-{}", expected.algorithm, expected.base64_hash);
    if computed_sri != expected_sri {
        return Err(RunnerError::IntegrityMismatch {
            expected: expected_sri,
            actual: computed_sri,
        });
    }
    if let Some(expected_sha256) = &pin.tarball_sha256 {
        let expected_full = format!("sha256:{expected_sha256}");
        if computed_sha256 != expected_full {
            return Err(RunnerError::IntegrityMismatch {
                expected: expected_full,
                actual: computed_sha256,
            });
        }
    }

    let tarball_path = work_dir.path().join("artifact.tgz");
    std::fs::write(&tarball_path, &fetched.bytes)?;

    let install = CommandSpec::new("npm")
        .arg("install")
        .arg(tarball_path.display().to_string())
        .args(["--ignore-scripts", "--no-audit", "--no-fund"])
        .cwd(work_dir.path());
    let output = install.run_captured().await?;
    if !output.status.success() {
        return Err(RunnerError::ChildFailed {
            program: "npm install".to_string(),
            status: output.status.to_string(),
        });
    }

    let lockfile_path = work_dir.path().join("package-lock.json");
    let lockfile_bytes = std::fs::read(&lockfile_path)?;
    let lockfile: PackageLock = serde_json::from_slice(&lockfile_bytes)?;
    let lock_key = format!("node_modules/{}", pin.name);
    let locked = lockfile.packages.get(&lock_key);

    let locked_version = locked.and_then(|entry| entry.version.as_deref());
    if locked_version != Some(pin.version.as_str()) {
        return Err(RunnerError::InstalledPackageMismatch {
            expected_name: pin.name.clone(),
            expected_version: pin.version.clone(),
            actual_name: pin.name.clone(),
            actual_version: locked_version.unwrap_or("<missing>").to_string(),
        });
    }

    let resolved = locked.and_then(|entry| entry.resolved.as_deref()).unwrap_or("");
    let is_local_reference = resolved.starts_with("file:") || Path::new(resolved).is_absolute();
    if !is_local_reference {
        return Err(RunnerError::NonLocalResolution {
            resolved: resolved.to_string(),
        });
    }

    let installed_integrity = locked.and_then(|entry| entry.integrity.clone());
    if installed_integrity.is_none() && !options.allow_missing_installed_integrity {
        return Err(RunnerError::MissingInstalledIntegrity {
            package: pin.name.clone(),
        });
    }
    if installed_integrity.is_none() {
        tracing::warn!(package = %pin.name, "installed tree has no integrity record; continuing due to --allow-missing-installed-integrity");
    }

    let package_dir = work_dir.path().join("node_modules").join(&pin.name);
    let package_json_bytes = std::fs::read(package_dir.join("package.json"))?;
    let installed_package: InstalledPackageJson = serde_json::from_slice(&package_json_bytes)?;
    let binary_path = resolve_binary(&package_dir, installed_package.bin, &options.bin)?;

    let exec = CommandSpec::new(binary_path).args(trailing_args.iter().cloned()).cwd(work_dir.path());
    let status = exec.run_inherited().await?;
    if !status.success() {
        return Err(RunnerError::ChildFailed {
            program: pin.name.clone(),
            status: status.to_string(),
        });
    }

    Ok(Receipt {
        emitted_at: chrono::Utc::now(),
        artifact_kind: "npm".to_string(),
        resolved_source: tarball_url,
        pinned_integrity: Some(pin.integrity.clone()),
        computed_sri: Some(computed_sri),
        computed_sha256: Some(computed_sha256),
        installed_integrity,
        provenance: provenance.map(|p| ProvenanceSummary {
            method: format!("{:?}", p.method),
            verified: p.verified,
            source_repo: p.source_repo.clone(),
        }),
    })
}
