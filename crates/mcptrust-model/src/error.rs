use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("parse-error: {0}")]
    Parse(String),
}
