use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an artifact's provenance was (or wasn't) established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceMethod {
    CosignSlsa,
    NpmAuditSignatures,
    Unverified,
}

impl Default for ProvenanceMethod {
    fn default() -> Self {
        Self::Unverified
    }
}

/// Signed attestation about how an artifact was built.
///
/// A `method` missing from the source document normalizes to `Unverified` on
/// load (§3's invariant) — that is handled for free by `#[serde(default)]`
/// since `ProvenanceMethod::default()` is `Unverified`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(default)]
    pub method: ProvenanceMethod,
    #[serde(rename = "predicateType", default, skip_serializing_if = "Option::is_none")]
    pub predicate_type: Option<String>,
    #[serde(rename = "builderID", default, skip_serializing_if = "Option::is_none")]
    pub builder_id: Option<String>,
    #[serde(rename = "sourceRepo", default, skip_serializing_if = "Option::is_none")]
    pub source_repo: Option<String>,
    #[serde(rename = "sourceRef", default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    #[serde(rename = "workflowURI", default, skip_serializing_if = "Option::is_none")]
    pub workflow_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(rename = "verifiedAt", default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    /// Fields the core doesn't model yet, preserved verbatim on round-trip.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Provenance {
    /// `require-provenance` passes only for `cosign_slsa` — a verified
    /// `npm_audit_signatures` result is explicitly insufficient (§3, §4.7).
    pub fn satisfies_require_provenance(&self) -> bool {
        self.method == ProvenanceMethod::CosignSlsa
    }
}

/// An npm tarball pin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpmPin {
    pub name: String,
    pub version: String,
    pub registry: String,
    /// Subresource-integrity string, `alg-<base64>`.
    pub integrity: String,
    #[serde(rename = "tarballURL", default, skip_serializing_if = "Option::is_none")]
    pub tarball_url: Option<String>,
    #[serde(rename = "tarballSHA256", default, skip_serializing_if = "Option::is_none")]
    pub tarball_sha256: Option<String>,
    #[serde(rename = "tarballSize", default, skip_serializing_if = "Option::is_none")]
    pub tarball_size: Option<u64>,
}

/// A container image pin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OciPin {
    pub image: String,
    /// `"sha256:" + 64 lowercase hex`.
    pub digest: String,
}

/// The artifact-identifying half of an `ArtifactPin`, tagged on `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ArtifactKind {
    Npm(NpmPin),
    Oci(OciPin),
    /// No pin is possible for a locally-running server; this is a sentinel.
    Local,
}

/// Tagged union over `{npm, oci, local}`, with an optional shared provenance
/// block (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactPin {
    #[serde(flatten)]
    pub kind: ArtifactKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}
