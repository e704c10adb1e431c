use thiserror::Error;

#[derive(Debug, Error)]
pub enum DifferError {
    #[error("failed to hash value while diffing: {0}")]
    Hashing(#[from] mcptrust_canon::CanonError),
}
