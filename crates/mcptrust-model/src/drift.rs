use serde::{Deserialize, Serialize};

/// The kind of capability-surface change the differ observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftType {
    PromptAdded,
    PromptRemoved,
    PromptArgsChanged,
    PromptDescChanged,
    TemplateAdded,
    TemplateRemoved,
    TemplateChanged,
    ToolAdded,
    ToolRemoved,
    ToolChanged,
}

/// Drift severity. Declaration order is the comparison order
/// (`Info < Moderate < Critical`) so `max_severity() >= failOn` thresholds
/// compare directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Moderate,
    Critical,
}

/// One observed difference between a locked capability surface and a fresh
/// scan (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftItem {
    #[serde(rename = "type")]
    pub kind: DriftType,
    pub severity: Severity,
    pub identifier: String,
    #[serde(rename = "oldHash", default, skip_serializing_if = "Option::is_none")]
    pub old_hash: Option<String>,
    #[serde(rename = "newHash", default, skip_serializing_if = "Option::is_none")]
    pub new_hash: Option<String>,
    pub message: String,
}

/// The differ's output: a stable-sorted list of drift items plus the
/// derived `hasDrift` flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriftReport {
    #[serde(rename = "hasDrift")]
    pub has_drift: bool,
    pub items: Vec<DriftItem>,
}

impl DriftReport {
    /// Builds a report from an unsorted item list, applying the `(type,
    /// identifier)` sort order and deriving `hasDrift` (§4.4).
    pub fn from_items(mut items: Vec<DriftItem>) -> Self {
        items.sort_by(|a, b| (a.kind, &a.identifier).cmp(&(b.kind, &b.identifier)));
        Self {
            has_drift: !items.is_empty(),
            items,
        }
    }

    /// The highest severity across all items, or `None` if there is no
    /// drift at all. Used to compare against a policy's `failOn` threshold.
    pub fn max_severity(&self) -> Option<Severity> {
        self.items.iter().map(|item| item.severity).max()
    }
}
