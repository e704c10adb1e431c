use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool as freshly observed by the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannedTool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// A single prompt argument as freshly observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannedPromptArgument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// A prompt as freshly observed; `arguments` is sorted by name before the
/// report is returned (the scanner's determinism contract, §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannedPrompt {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<ScannedPromptArgument>,
}

/// A generic resource entry (non-templated), used only when
/// `allowStaticResources` preflight capture is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannedResource {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// A resource template as freshly observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannedTemplate {
    #[serde(rename = "uriTemplate")]
    pub uri_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// The `initialize` response's `serverInfo`, passed through with any unknown
/// fields preserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannedServerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// The ephemeral result of one scan invocation (§3). Never persisted; it is
/// the input side of the differ and of the policy input document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub timestamp: DateTime<Utc>,
    pub command: String,
    #[serde(rename = "serverInfo", default, skip_serializing_if = "Option::is_none")]
    pub server_info: Option<ScannedServerInfo>,
    #[serde(default)]
    pub tools: Vec<ScannedTool>,
    #[serde(default)]
    pub resources: Vec<ScannedResource>,
    #[serde(default)]
    pub prompts: Vec<ScannedPrompt>,
    #[serde(rename = "resourceTemplates", default)]
    pub resource_templates: Vec<ScannedTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanReport {
    /// Applies the scanner's determinism contract in place: prompts sorted by
    /// name, each prompt's arguments sorted by name, templates sorted by
    /// `uriTemplate`. Downstream hashing depends on this order (§4.3).
    pub fn sort_deterministically(&mut self) {
        self.prompts.sort_by(|a, b| a.name.cmp(&b.name));
        for prompt in &mut self.prompts {
            prompt.arguments.sort_by(|a, b| a.name.cmp(&b.name));
        }
        self.resource_templates
            .sort_by(|a, b| a.uri_template.cmp(&b.uri_template));
    }
}
