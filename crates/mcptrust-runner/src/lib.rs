//! Fetch-verify-install-execute for pinned npm tarball or OCI image MCP
//! servers (component C7), plus the printed integrity receipt.

mod command;
mod error;
mod npm;
mod oci;
mod receipt;

pub use error::RunnerError;
pub use npm::NpmRunnerOptions;
pub use oci::OciRunnerOptions;
pub use receipt::{ProvenanceSummary, Receipt};

use mcptrust_model::{ArtifactKind, ArtifactPin};

/// Combined options for dispatching on an `ArtifactPin`'s kind.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub npm: NpmRunnerOptions,
    pub oci: OciRunnerOptions,
}

/// Runs the artifact `pin` refers to, dispatching to the npm or OCI runner.
/// `command_line` is the original `npx ...` / `docker run ...` invocation
/// from the lockfile's server command; `trailing_args` are extra arguments
/// to append to the npm binary's invocation (unused for OCI, which takes its
/// trailing command from the parsed `docker run` instead).
pub async fn run(
    pin: &ArtifactPin,
    command_line: &str,
    trailing_args: &[String],
    options: &RunOptions,
) -> Result<Receipt, RunnerError> {
    match &pin.kind {
        ArtifactKind::Npm(npm_pin) => npm::run(npm_pin, pin.provenance.as_ref(), trailing_args, &options.npm).await,
        ArtifactKind::Oci(oci_pin) => oci::run(oci_pin, pin.provenance.as_ref(), command_line, &options.oci).await,
        ArtifactKind::Local => Err(RunnerError::NoPin),
    }
}
