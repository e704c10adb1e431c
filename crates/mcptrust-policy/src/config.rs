use mcptrust_model::PolicyConfig;

use crate::error::PolicyError;

/// Parses a policy document already read into memory. Locating the file is
/// the CLI's job (§10.3); this crate only ever sees a string.
pub fn from_yaml_str(source: &str) -> Result<PolicyConfig, PolicyError> {
    Ok(serde_yaml_ng::from_str(source)?)
}
