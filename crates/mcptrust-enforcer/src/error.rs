use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnforcerError {
    #[error("unsupported resource template: {0}")]
    UnsupportedTemplate(String),
}
