use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("io error on {side}: {source}")]
    Io {
        side: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("oversize-ndjson-line: frame on {direction} exceeded {limit_bytes} bytes during {phase}")]
    OversizeLine {
        direction: &'static str,
        limit_bytes: usize,
        phase: &'static str,
    },

    #[error("parse-error: malformed JSON-RPC frame from {side}: {reason}")]
    Parse { side: &'static str, reason: String },

    #[error("host-id-invalid-type: id must be null, string, or number, got {0}")]
    HostIdInvalidType(&'static str),

    #[error("host-id-too-large: id literal exceeds 256 bytes")]
    HostIdTooLarge,

    #[error("pending-map-full: proxy at capacity")]
    PendingFull,

    #[error("drift-threshold: preflight drift severity {observed} met or exceeded the \"{threshold}\" fail-on threshold")]
    DriftThreshold { observed: String, threshold: String },

    #[error("scan error during preflight: {0}")]
    Scan(#[from] mcptrust_scanner::ScanError),

    #[error("differ error during preflight: {0}")]
    Differ(#[from] mcptrust_differ::DifferError),

    #[error("policy error during preflight: {0}")]
    Policy(#[from] mcptrust_policy::PolicyError),

    #[error("enforcer error: {0}")]
    Enforcer(#[from] mcptrust_enforcer::EnforcerError),

    #[error("policy violation during preflight: {0}")]
    PolicyViolation(String),

    #[error("child process exited: {0:?}")]
    ChildExited(Option<i32>),
}
