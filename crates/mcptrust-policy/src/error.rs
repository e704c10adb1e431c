use thiserror::Error;

/// Failures from compiling or evaluating a [`crate::PolicyConfig`].
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to parse policy YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// A rule's `expr` failed to compile. Carries the rule name for
    /// diagnostics; per spec §4.5 a compile error is a hard failure, not a
    /// runtime fallback.
    #[error("rule \"{rule}\" failed to compile: {reason}")]
    Compile { rule: String, reason: String },
}
