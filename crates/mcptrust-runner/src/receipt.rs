use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Summarizes provenance for the receipt's diagnostic output.
#[derive(Debug, Clone, Serialize)]
pub struct ProvenanceSummary {
    pub method: String,
    pub verified: bool,
    pub source_repo: Option<String>,
}

/// Printed to the diagnostic channel on every run (dry-run or real) so an
/// operator can audit exactly what was fetched, hashed, and executed without
/// re-deriving it from logs (§4.7).
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub emitted_at: DateTime<Utc>,
    pub artifact_kind: String,
    pub resolved_source: String,
    pub pinned_integrity: Option<String>,
    pub computed_sri: Option<String>,
    pub computed_sha256: Option<String>,
    pub installed_integrity: Option<String>,
    pub provenance: Option<ProvenanceSummary>,
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "mcptrust run receipt ({})", self.emitted_at.to_rfc3339())?;
        writeln!(f, "  artifact:            {}", self.artifact_kind)?;
        writeln!(f, "  resolved source:     {}", self.resolved_source)?;
        if let Some(pinned) = &self.pinned_integrity {
            writeln!(f, "  pinned integrity:    {pinned}")?;
        }
        if let Some(computed) = &self.computed_sri {
            writeln!(f, "  computed SRI:        {computed}")?;
        }
        if let Some(sha256) = &self.computed_sha256 {
            writeln!(f, "  computed SHA-256:    {sha256}")?;
        }
        if let Some(installed) = &self.installed_integrity {
            writeln!(f, "  installed integrity: {installed}")?;
        }
        match &self.provenance {
            Some(provenance) => {
                writeln!(
                    f,
                    "  provenance:          method={} verified={}",
                    provenance.method, provenance.verified
                )?;
                if let Some(repo) = &provenance.source_repo {
                    writeln!(f, "  source repo:         {repo}")?;
                }
            }
            None => writeln!(f, "  provenance:          (none recorded)")?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_all_populated_fields() {
        let receipt = Receipt {
            emitted_at: DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            artifact_kind: "npm".to_string(),
            resolved_source: "https://registry.npmjs.org/foo/-/foo-1.0.0.tgz".to_string(),
            pinned_integrity: Some("sha512-aaaa".to_string()),
            computed_sri: Some("sha512-aaaa".to_string()),
            computed_sha256: Some("sha256:bbbb".to_string()),
            installed_integrity: Some("sha512-aaaa".to_string()),
            provenance: Some(ProvenanceSummary {
                method: "cosign_slsa".to_string(),
                verified: true,
                source_repo: Some("github.com/example/foo".to_string()),
            }),
        };
        let rendered = receipt.to_string();
        assert!(rendered.contains("pinned integrity:    sha512-aaaa"));
        assert!(rendered.contains("method=cosign_slsa verified=true"));
        assert!(rendered.contains("source repo:         github.com/example/foo"));
    }

    #[test]
    fn display_tolerates_missing_optional_fields() {
        let receipt = Receipt {
            emitted_at: Utc::now(),
            artifact_kind: "oci".to_string(),
            resolved_source: "ghcr.io/example/foo@sha256:abc".to_string(),
            pinned_integrity: None,
            computed_sri: None,
            computed_sha256: None,
            installed_integrity: None,
            provenance: None,
        };
        let rendered = receipt.to_string();
        assert!(rendered.contains("(none recorded)"));
    }
}
