/// The proxy's enforcement posture (§4.9, §7, §9 Open Question).
///
/// `AuditOnly` and `FilterOnly` are modeled as mutually exclusive variants
/// of one enum rather than two independent booleans, resolving the spec's
/// open question about their combination at the type level: there is no
/// representable "both at once" state below this boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforceMode {
    /// Deny calls, filter list responses, abort preflight on drift above
    /// threshold.
    Enforce,
    /// Log denials but forward every call unchanged; list responses are
    /// not filtered either. Preflight drift never aborts the run.
    AuditOnly,
    /// Forward every call unchanged (no denial), but list responses are
    /// still filtered. Preflight drift never aborts the run (§4.9 names
    /// both audit-only and filter-only as abort-suppressing modes).
    FilterOnly,
}

impl Default for EnforceMode {
    fn default() -> Self {
        Self::Enforce
    }
}

impl EnforceMode {
    /// Whether a denied `tools/call`/`prompts/get`/`resources/read` should
    /// actually be rejected (vs. logged and forwarded, §4.9).
    #[must_use]
    pub fn denies_calls(self) -> bool {
        matches!(self, Self::Enforce)
    }

    /// Whether list responses should be filtered against the enforcer
    /// (§4.9, §7 — filter-only "only changes list responses").
    #[must_use]
    pub fn filters_lists(self) -> bool {
        matches!(self, Self::Enforce | Self::FilterOnly)
    }

    /// Whether preflight drift at or above the fail-on threshold should
    /// abort the run (§4.9: "abort unless in audit-only or filter-only
    /// mode (then log and continue)").
    #[must_use]
    pub fn aborts_on_drift(self) -> bool {
        matches!(self, Self::Enforce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforce_denies_and_filters_and_aborts() {
        let mode = EnforceMode::Enforce;
        assert!(mode.denies_calls());
        assert!(mode.filters_lists());
        assert!(mode.aborts_on_drift());
    }

    #[test]
    fn audit_only_never_denies_never_filters_never_aborts() {
        let mode = EnforceMode::AuditOnly;
        assert!(!mode.denies_calls());
        assert!(!mode.filters_lists());
        assert!(!mode.aborts_on_drift());
    }

    #[test]
    fn filter_only_filters_lists_but_never_denies_or_aborts() {
        let mode = EnforceMode::FilterOnly;
        assert!(!mode.denies_calls());
        assert!(mode.filters_lists());
        assert!(!mode.aborts_on_drift());
    }
}
