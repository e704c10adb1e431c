use thiserror::Error;

/// Failure modes for canonicalization and hashing.
///
/// Both variants are fatal at lock time — there is no recovery path that
/// preserves the cross-runtime determinism invariant this crate exists for.
#[derive(Debug, Error)]
pub enum CanonError {
    #[error("invalid-number: {0}")]
    InvalidNumber(String),

    #[error("invalid-type: {0}")]
    InvalidType(String),
}
