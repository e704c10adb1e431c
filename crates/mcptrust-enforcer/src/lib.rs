//! Allowlist and URI-template matching compiled once from a lockfile
//! (component C8): `allowTool`/`allowPrompt`/`allowResourceURI`.

mod enforcer;
mod error;
mod template;

pub use enforcer::Enforcer;
pub use error::EnforcerError;
pub use template::compile_template;
