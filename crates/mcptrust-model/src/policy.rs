use serde::{Deserialize, Serialize};

/// `warn` permits rule failures to pass through as logged warnings; `strict`
/// turns any `error`-severity rule failure into an overall failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    Warn,
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    Warn,
    Error,
}

/// One named rule. `controlRefs`/`evidence`/`evidenceCommands` are
/// informational only and must not alter pass/fail (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub name: String,
    pub expr: String,
    #[serde(rename = "failureMsg")]
    pub failure_msg: String,
    pub severity: RuleSeverity,
    #[serde(rename = "controlRefs", default)]
    pub control_refs: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(rename = "evidenceCommands", default)]
    pub evidence_commands: Vec<String>,
}

/// The typed policy document consumed by the policy evaluator (C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub name: String,
    pub mode: PolicyMode,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}
