//! Typed lockfile, artifact pin, scan report, drift, and policy document
//! model (component C2).
//!
//! Pure data: loaders preserve unknown fields as-is for forward
//! compatibility, except for the one normalization §3 requires (a missing
//! `provenance.method` becomes `unverified`).

mod artifact;
mod drift;
mod error;
mod lockfile;
mod policy;
mod report;

pub use artifact::{ArtifactKind, ArtifactPin, NpmPin, OciPin, Provenance, ProvenanceMethod};
pub use drift::{DriftItem, DriftReport, DriftType, Severity};
pub use error::ModelError;
pub use lockfile::{
    Lockfile, LockfileMeta, PromptDefinition, Prompts, ResourceTemplate, Resources, ServerInfo,
    ToolEntry, LOCK_FILE_VERSION,
};
pub use policy::{PolicyConfig, PolicyMode, PolicyRule, RuleSeverity};
pub use report::{
    ScanReport, ScannedPrompt, ScannedPromptArgument, ScannedResource, ScannedServerInfo,
    ScannedTemplate, ScannedTool,
};
