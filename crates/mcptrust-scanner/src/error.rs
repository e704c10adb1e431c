use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("io error talking to child: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse-error: {0}")]
    Parse(String),

    #[error("child returned JSON-RPC error {code}: {message}")]
    JsonRpc { code: i64, message: String },

    #[error("scan-limit-exceeded: accumulated more than {limit} items enumerating {endpoint}")]
    ScanLimitExceeded { endpoint: &'static str, limit: usize },

    #[error("scan timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("child exited before responding (code {0:?})")]
    ChildExitedEarly(Option<i32>),
}
