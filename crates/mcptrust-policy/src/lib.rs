//! Compiles and evaluates policy rules (a small boolean expression language)
//! over a structured input document derived from a lockfile and drift report
//! (component C5).

mod config;
mod error;
mod evaluator;
mod expr;
mod input;
mod value;

pub use config::from_yaml_str;
pub use error::PolicyError;
pub use evaluator::{CompiledPolicy, PolicyResult, RuleOutcome};
pub use input::build_input;
