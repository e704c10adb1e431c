use mcptrust_model::{OciPin, Provenance};

use crate::command::CommandSpec;
use crate::error::RunnerError;
use crate::receipt::{ProvenanceSummary, Receipt};

#[derive(Debug, Clone, Default)]
pub struct OciRunnerOptions {
    pub require_provenance: bool,
}

fn pinned_reference(pin: &OciPin) -> Result<String, RunnerError> {
    if pin.digest.is_empty() {
        return Err(RunnerError::MissingDigest);
    }
    let image = pin.image.rsplit_once(':').map_or(pin.image.as_str(), |(repo, _tag)| repo);
    Ok(format!("{image}@{}", pin.digest))
}

/// Rewrites a parsed `docker run` invocation's image token to the digest-
/// pinned reference, leaving flags and the trailing command override intact
/// (§4.7's OCI runner).
fn rewrite_docker_run(parsed: &mcptrust_integrity::DockerRunCommand, pinned_image: &str) -> Vec<String> {
    let mut argv = vec!["run".to_string()];
    argv.extend(parsed.flags.iter().cloned());
    argv.push(pinned_image.to_string());
    argv.extend(parsed.trailing.iter().cloned());
    argv
}

/// Executes a digest-pinned OCI image via `docker run`, inheriting host
/// stdio so the container's stdout/stdin carry the JSON-RPC traffic.
///
/// Attestation verification itself (invoking `cosign verify`) is outside
/// this core's scope (see spec's out-of-scope list); provenance gating here
/// checks only the two fields the core does consume, same as the npm path.
pub async fn run(
    pin: &OciPin,
    provenance: Option<&Provenance>,
    command_line: &str,
    options: &OciRunnerOptions,
) -> Result<Receipt, RunnerError> {
    if options.require_provenance {
        let satisfied = provenance.map(Provenance::satisfies_require_provenance).unwrap_or(false);
        if !satisfied {
            return Err(RunnerError::ProvenanceRequired {
                actual: provenance
                    .map(|p| format!("{:?}", p.method))
                    .unwrap_or_else(|| "unverified".to_string()),
            });
        }
    }

    let pinned_image = pinned_reference(pin)?;
    let parsed = match mcptrust_integrity::parse(command_line)? {
        mcptrust_integrity::ParsedCommand::DockerRun(docker_run) => docker_run,
        mcptrust_integrity::ParsedCommand::Npx { .. } => {
            return Err(RunnerError::MissingDigest);
        }
    };
    let argv = rewrite_docker_run(&parsed, &pinned_image);

    let exec = CommandSpec::new("docker").args(argv);
    let status = exec.run_inherited().await?;
    if !status.success() {
        return Err(RunnerError::ChildFailed {
            program: "docker run".to_string(),
            status: status.to_string(),
        });
    }

    Ok(Receipt {
        emitted_at: chrono::Utc::now(),
        artifact_kind: "oci".to_string(),
        resolved_source: pinned_image,
        pinned_integrity: Some(pin.digest.clone()),
        computed_sri: None,
        computed_sha256: None,
        installed_integrity: None,
        provenance: provenance.map(|p| ProvenanceSummary {
            method: format!("{:?}", p.method),
            verified: p.verified,
            source_repo: p.source_repo.clone(),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_reference_strips_existing_tag() {
        let pin = OciPin {
            image: "ghcr.io/example/server:latest".to_string(),
            digest: format!("sha256:{}", "a".repeat(64)),
        };
        let reference = pinned_reference(&pin).unwrap();
        assert_eq!(reference, format!("ghcr.io/example/server@sha256:{}", "a".repeat(64)));
    }

    #[test]
    fn pinned_reference_requires_a_digest() {
        let pin = OciPin {
            image: "ghcr.io/example/server".to_string(),
            digest: String::new(),
        };
        assert!(matches!(pinned_reference(&pin), Err(RunnerError::MissingDigest)));
    }

    #[test]
    fn rewrite_docker_run_substitutes_only_the_image_token() {
        let parsed = mcptrust_integrity::parse_docker_run(&[
            "--rm".to_string(),
            "alpine:latest".to_string(),
            "echo".to_string(),
            "hi".to_string(),
        ])
        .unwrap();
        let argv = rewrite_docker_run(&parsed, &format!("alpine@sha256:{}", "a".repeat(64)));
        assert_eq!(
            argv,
            vec!["run", "--rm", &format!("alpine@sha256:{}", "a".repeat(64)), "echo", "hi"]
        );
    }
}
