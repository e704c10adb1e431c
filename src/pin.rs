//! Best-effort artifact pin resolution for `lock` (§2's "Lockfile +
//! artifact pin (C6)" phase). Not a named component of its own — this is CLI
//! glue over `mcptrust-integrity`/`mcptrust-network`, mirroring the
//! resolution `mcptrust-runner` does at `run` time, but read-only: no
//! install, no execution.

use mcptrust_integrity::{parse, ParsedCommand};
use mcptrust_model::{ArtifactKind, ArtifactPin, NpmPin, OciPin};
use mcptrust_network::NetworkConfig;
use serde::Deserialize;

const REGISTRY_BASE: &str = "https://registry.npmjs.org";

#[derive(Debug, Deserialize)]
struct RegistryVersionMetadata {
    dist: RegistryDist,
}

#[derive(Debug, Deserialize)]
struct RegistryDist {
    integrity: Option<String>,
    tarball: Option<String>,
}

/// Splits `name[@version]`, handling scoped packages (`@scope/name@version`).
fn split_name_version(spec: &str) -> Option<(&str, &str)> {
    let at = if let Some(rest) = spec.strip_prefix('@') {
        rest.find('@').map(|i| i + 1)
    } else {
        spec.find('@')
    };
    let at = at?;
    let (name, version) = spec.split_at(at);
    Some((name, &version[1..]))
}

fn npx_package_spec(args: &[String]) -> Option<&str> {
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        match arg.as_str() {
            "-y" | "--yes" | "-q" | "--quiet" => continue,
            "-p" | "--package" => {
                skip_next = true;
                continue;
            }
            _ if arg.starts_with('-') => continue,
            _ => return Some(arg),
        }
    }
    None
}

/// Resolves an [`ArtifactPin`] for `command_line`, or `None` when the
/// reference can't be pinned reproducibly (a bare `npx pkg` with no version,
/// or a `docker run` image with no digest). Lock still succeeds without a
/// pin; callers should log when this returns `None`.
pub async fn resolve_pin(command_line: &str, network: &NetworkConfig) -> anyhow::Result<Option<ArtifactPin>> {
    let parsed = match parse(command_line) {
        Ok(parsed) => parsed,
        Err(_) => return Ok(None),
    };

    match parsed {
        ParsedCommand::Npx { args } => {
            let Some(spec) = npx_package_spec(&args) else {
                return Ok(None);
            };
            let Some((name, version)) = split_name_version(spec) else {
                return Ok(None);
            };

            let metadata_url = format!("{REGISTRY_BASE}/{name}/{version}");
            let fetched = mcptrust_network::fetch(&metadata_url, network).await?;
            let metadata: RegistryVersionMetadata = serde_json::from_slice(&fetched.bytes)?;
            let Some(integrity) = metadata.dist.integrity else {
                return Ok(None);
            };

            Ok(Some(ArtifactPin {
                kind: ArtifactKind::Npm(NpmPin {
                    name: name.to_string(),
                    version: version.to_string(),
                    registry: REGISTRY_BASE.to_string(),
                    integrity,
                    tarball_url: metadata.dist.tarball,
                    tarball_sha256: None,
                    tarball_size: None,
                }),
                provenance: None,
            }))
        }
        ParsedCommand::DockerRun(docker_run) => {
            let Some((image, digest)) = docker_run.image.split_once('@') else {
                return Ok(None);
            };
            if mcptrust_integrity::validate_oci_digest(digest).is_err() {
                return Ok(None);
            }
            Ok(Some(ArtifactPin {
                kind: ArtifactKind::Oci(OciPin {
                    image: image.to_string(),
                    digest: digest.to_string(),
                }),
                provenance: None,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_name_and_version() {
        assert_eq!(split_name_version("left-pad@1.3.0"), Some(("left-pad", "1.3.0")));
    }

    #[test]
    fn splits_scoped_name_and_version() {
        assert_eq!(
            split_name_version("@modelcontextprotocol/server-fs@2.1.0"),
            Some(("@modelcontextprotocol/server-fs", "2.1.0"))
        );
    }

    #[test]
    fn bare_name_has_no_version() {
        assert_eq!(split_name_version("left-pad"), None);
    }

    #[test]
    fn npx_package_spec_skips_known_flags() {
        let args = vec!["-y".to_string(), "left-pad@1.3.0".to_string()];
        assert_eq!(npx_package_spec(&args), Some("left-pad@1.3.0"));
    }

    #[test]
    fn npx_package_spec_skips_package_flag_value() {
        let args = vec![
            "-p".to_string(),
            "left-pad@1.3.0".to_string(),
            "left-pad".to_string(),
        ];
        assert_eq!(npx_package_spec(&args), Some("left-pad@1.3.0"));
    }
}
