use thiserror::Error;

/// Failure kinds surfaced by command parsing and artifact integrity checks
/// (spec §7: `unsafe-command`, `unsupported-template`'s sibling
/// `integrity-mismatch`... this crate only raises the parsing-side kinds).
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("unsafe-command: {0}")]
    UnsafeCommand(String),

    #[error("unsupported-command: {0}")]
    UnsupportedCommand(String),

    #[error("unrecognized docker run flag: {0}")]
    UnknownFlag(String),

    #[error("invalid OCI digest: {0}")]
    InvalidOciDigest(String),

    #[error("invalid npm integrity string: {0}")]
    InvalidSri(String),
}
