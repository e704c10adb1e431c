use mcptrust_differ::diff;
use mcptrust_enforcer::Enforcer;
use mcptrust_model::{DriftReport, Lockfile, Severity};
use mcptrust_policy::{build_input, CompiledPolicy};
use mcptrust_scanner::Scanner;

use crate::error::ProxyError;
use crate::mode::EnforceMode;

/// Preflight configuration (§4.9): run a scan + differ + optional policy
/// preset against the child command before bridging begins.
pub struct PreflightConfig {
    pub policy: Option<CompiledPolicy>,
    /// Abort unless in audit-only/filter-only mode when the highest
    /// observed drift severity meets or exceeds this threshold. Default
    /// `critical` (§4.9).
    pub fail_on: Severity,
    pub allow_static_resources: bool,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            policy: None,
            fail_on: Severity::Critical,
            allow_static_resources: false,
        }
    }
}

pub struct PreflightOutcome {
    pub drift: DriftReport,
}

/// Runs scan + differ + policy against `program args...`, deciding whether
/// bridging may proceed. `enforcer` receives the literal resource URIs
/// observed during the scan when `allow_static_resources` is set (the
/// enforcer's one-shot post-preflight transition, §3/§9).
pub async fn run_preflight(
    lockfile: &Lockfile,
    enforcer: &Enforcer,
    program: &str,
    args: &[String],
    config: &PreflightConfig,
    mode: EnforceMode,
) -> Result<PreflightOutcome, ProxyError> {
    let scanner = Scanner::default();
    let report = scanner.scan(program, args).await?;

    if config.allow_static_resources {
        enforcer.set_static_resources(report.resources.iter().map(|r| r.uri.clone()));
    }

    let drift = diff(lockfile, &report)?;

    if let Some(policy) = &config.policy {
        let input = build_input(lockfile, &drift);
        let result = policy.evaluate(&input);
        if !result.passed {
            let reasons: Vec<String> = result
                .outcomes
                .iter()
                .filter(|o| !o.passed)
                .map(|o| o.failure_msg.clone().unwrap_or_else(|| o.rule.clone()))
                .collect();
            return Err(ProxyError::PolicyViolation(reasons.join("; ")));
        }
    }

    let observed = drift.max_severity();
    let should_abort = observed.map(|s| s >= config.fail_on).unwrap_or(false);
    if should_abort && mode.aborts_on_drift() {
        return Err(ProxyError::DriftThreshold {
            observed: format!("{:?}", observed.expect("checked above")),
            threshold: format!("{:?}", config.fail_on),
        });
    }

    Ok(PreflightOutcome { drift })
}
