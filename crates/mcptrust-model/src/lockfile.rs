use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifact::ArtifactPin;
use crate::error::ModelError;

pub const LOCK_FILE_VERSION: &str = "3.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockfileMeta {
    pub generator: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactPin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDefinition {
    #[serde(rename = "argumentsHash")]
    pub arguments_hash: String,
    #[serde(rename = "titleHash", default, skip_serializing_if = "Option::is_none")]
    pub title_hash: Option<String>,
    #[serde(rename = "descriptionHash", default, skip_serializing_if = "Option::is_none")]
    pub description_hash: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Prompts {
    #[serde(default)]
    pub definitions: BTreeMap<String, PromptDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceTemplate {
    #[serde(rename = "uriTemplate")]
    pub uri_template: String,
    #[serde(rename = "templateHash")]
    pub template_hash: String,
    #[serde(rename = "nameHash", default, skip_serializing_if = "Option::is_none")]
    pub name_hash: Option<String>,
    #[serde(rename = "descriptionHash", default, skip_serializing_if = "Option::is_none")]
    pub description_hash: Option<String>,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resources {
    /// Ordered sequence sorted by `uriTemplate` — contractual, downstream
    /// hashing depends on this order (§3).
    #[serde(default)]
    pub templates: Vec<ResourceTemplate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEntry {
    #[serde(rename = "descriptionHash")]
    pub description_hash: String,
    #[serde(rename = "inputSchemaHash")]
    pub input_schema_hash: String,
    /// Scan-time risk-keyword heuristics are out of scope for the core
    /// (§1); this field is preserved verbatim, not computed here.
    #[serde(rename = "riskLevel")]
    pub risk_level: String,
}

/// The persisted unit of trust (§3). `lockFileVersion` is always written as
/// `"3.0"`; older on-disk shapes are upgraded on load (see
/// [`Lockfile::from_json`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(rename = "lockFileVersion")]
    pub lock_file_version: String,
    pub meta: LockfileMeta,
    pub server: ServerInfo,
    #[serde(default)]
    pub prompts: Prompts,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default)]
    pub tools: BTreeMap<String, ToolEntry>,
    /// Fields the core doesn't model yet, preserved verbatim (§4.2).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// The flat shape shared by the legacy v1 (no `version` field, no artifact)
/// and v2 (`version: "2.0"`, flat `server_command`/`tools`) lockfiles. Both
/// predate the prompts/resources/artifact-pin model and upgrade the same way.
#[derive(Debug, Clone, Deserialize)]
struct LegacyLockfile {
    #[serde(default)]
    server_command: Vec<String>,
    #[serde(default)]
    tools: BTreeMap<String, LegacyToolEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct LegacyToolEntry {
    #[serde(rename = "descriptionHash")]
    description_hash: String,
    #[serde(rename = "inputSchemaHash")]
    input_schema_hash: String,
    #[serde(rename = "riskLevel", default)]
    risk_level: Option<String>,
}

enum DetectedVersion {
    V3,
    Legacy,
}

fn detect_version(value: &Value) -> DetectedVersion {
    if value.get("lockFileVersion").is_some() {
        DetectedVersion::V3
    } else {
        DetectedVersion::Legacy
    }
}

fn upgrade_legacy(legacy: LegacyLockfile) -> Lockfile {
    let tools = legacy
        .tools
        .into_iter()
        .map(|(name, entry)| {
            (
                name,
                ToolEntry {
                    description_hash: entry.description_hash,
                    input_schema_hash: entry.input_schema_hash,
                    risk_level: entry.risk_level.unwrap_or_else(|| "unknown".to_string()),
                },
            )
        })
        .collect();

    Lockfile {
        lock_file_version: LOCK_FILE_VERSION.to_string(),
        meta: LockfileMeta {
            generator: "mcptrust-legacy-upgrade".to_string(),
            updated_at: Utc::now(),
        },
        server: ServerInfo {
            name: legacy.server_command.join(" "),
            artifact: None,
        },
        prompts: Prompts::default(),
        resources: Resources::default(),
        tools,
        extra: serde_json::Map::new(),
    }
}

impl Lockfile {
    /// Parses a lockfile document of any readable version (v1/v2/v3),
    /// upgrading legacy shapes to v3 in memory. Version is detected by the
    /// presence of `lockFileVersion` vs the legacy `version` field (§3).
    pub fn from_json(value: &Value) -> Result<Self, ModelError> {
        match detect_version(value) {
            DetectedVersion::V3 => {
                serde_json::from_value(value.clone()).map_err(|e| ModelError::Parse(e.to_string()))
            }
            DetectedVersion::Legacy => {
                let legacy: LegacyLockfile =
                    serde_json::from_value(value.clone()).map_err(|e| ModelError::Parse(e.to_string()))?;
                Ok(upgrade_legacy(legacy))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_v3_lockfile_directly() {
        let value = json!({
            "lockFileVersion": "3.0",
            "meta": {"generator": "mcptrust", "updatedAt": "2024-01-01T00:00:00Z"},
            "server": {"name": "example-server"},
            "prompts": {"definitions": {}},
            "resources": {"templates": []},
            "tools": {}
        });
        let lockfile = Lockfile::from_json(&value).unwrap();
        assert_eq!(lockfile.lock_file_version, "3.0");
        assert_eq!(lockfile.server.name, "example-server");
    }

    #[test]
    fn upgrades_legacy_v2_shape() {
        let value = json!({
            "version": "2.0",
            "server_command": ["npx", "-y", "example-server"],
            "tools": {
                "read_file": {
                    "descriptionHash": "sha256:aa",
                    "inputSchemaHash": "sha256:bb",
                    "riskLevel": "low"
                }
            }
        });
        let lockfile = Lockfile::from_json(&value).unwrap();
        assert_eq!(lockfile.lock_file_version, LOCK_FILE_VERSION);
        assert_eq!(lockfile.server.name, "npx -y example-server");
        assert!(lockfile.server.artifact.is_none());
        assert_eq!(lockfile.tools["read_file"].risk_level, "low");
    }

    #[test]
    fn upgrades_legacy_v1_shape_with_missing_risk_level() {
        let value = json!({
            "server_command": ["node", "server.js"],
            "tools": {
                "ping": {
                    "descriptionHash": "sha256:cc",
                    "inputSchemaHash": "sha256:dd"
                }
            }
        });
        let lockfile = Lockfile::from_json(&value).unwrap();
        assert_eq!(lockfile.tools["ping"].risk_level, "unknown");
    }

    #[test]
    fn unknown_top_level_fields_round_trip() {
        let value = json!({
            "lockFileVersion": "3.0",
            "meta": {"generator": "mcptrust", "updatedAt": "2024-01-01T00:00:00Z"},
            "server": {"name": "example-server"},
            "futureField": {"nested": true}
        });
        let lockfile = Lockfile::from_json(&value).unwrap();
        assert_eq!(lockfile.extra["futureField"]["nested"], true);
        let round_tripped = serde_json::to_value(&lockfile).unwrap();
        assert_eq!(round_tripped["futureField"]["nested"], true);
    }
}
