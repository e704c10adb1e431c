//! Compares a locked capability surface against a fresh scan and emits
//! typed, severity-tagged drift (component C4).

mod differ;
mod error;

pub use differ::diff;
pub use error::DifferError;
