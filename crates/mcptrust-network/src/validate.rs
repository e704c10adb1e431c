use std::net::IpAddr;

use url::{Host, Url};

use crate::cidr::blocked_reason;
use crate::error::NetworkError;

/// Host-gate configuration. The only escape hatch is `allow_private_hosts`,
/// which bypasses the IP/CIDR check only — the scheme gate is never
/// conditional (§4.10).
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityConfig {
    pub allow_private_hosts: bool,
}

pub(crate) fn validate_scheme(url: &Url) -> Result<(), NetworkError> {
    if url.scheme() != "https" {
        return Err(NetworkError::SchemeNotAllowed {
            scheme: url.scheme().to_string(),
        });
    }
    Ok(())
}

fn validate_ip(host: &str, ip: IpAddr, config: &SecurityConfig) -> Result<(), NetworkError> {
    if config.allow_private_hosts {
        return Ok(());
    }
    if let Some(reason) = blocked_reason(ip) {
        return Err(NetworkError::BlockedHost {
            host: host.to_string(),
            reason: reason.to_string(),
        });
    }
    Ok(())
}

/// Resolves `url`'s host and validates every resolved address (the DNS-time
/// gate of §4.10): a hostname that resolves to both a public and a private IP
/// is still rejected, since every resolved address is checked individually.
/// `localhost` is rejected by name regardless of what it resolves to.
pub(crate) async fn resolve_and_validate(
    url: &Url,
    config: &SecurityConfig,
) -> Result<Vec<IpAddr>, NetworkError> {
    let host_str = url
        .host_str()
        .ok_or_else(|| NetworkError::InvalidUrl(url.to_string()))?;
    if !config.allow_private_hosts && host_str.eq_ignore_ascii_case("localhost") {
        return Err(NetworkError::BlockedHost {
            host: host_str.to_string(),
            reason: "localhost".to_string(),
        });
    }

    let host = url
        .host()
        .ok_or_else(|| NetworkError::InvalidUrl(url.to_string()))?;
    let mut ips: Vec<IpAddr> = match host {
        Host::Ipv4(ip) => vec![IpAddr::V4(ip)],
        Host::Ipv6(ip) => vec![IpAddr::V6(ip)],
        Host::Domain(domain) => {
            let port = url.port_or_known_default().unwrap_or(443);
            let addrs = tokio::net::lookup_host((domain, port)).await.map_err(|source| {
                NetworkError::DnsResolution {
                    host: domain.to_string(),
                    source,
                }
            })?;
            let resolved: Vec<IpAddr> = addrs.map(|addr| addr.ip()).collect();
            if resolved.is_empty() {
                return Err(NetworkError::DnsResolution {
                    host: domain.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses returned"),
                });
            }
            resolved
        }
    };
    ips.sort();

    for ip in &ips {
        validate_ip(host_str, *ip, config)?;
    }
    Ok(ips)
}

/// Full pre-connect validation for a candidate URL: scheme gate, then the
/// DNS-time host/IP gate. Used for the initial request and, identically, for
/// every redirect hop (§4.10's "each redirect URL revalidated identically").
pub(crate) async fn validate_url(url: &Url, config: &SecurityConfig) -> Result<Vec<IpAddr>, NetworkError> {
    validate_scheme(url)?;
    resolve_and_validate(url, config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_https_scheme() {
        let url = Url::parse("http://example.com/file.tgz").unwrap();
        assert!(matches!(
            validate_scheme(&url),
            Err(NetworkError::SchemeNotAllowed { .. })
        ));
    }

    #[test]
    fn accepts_https_scheme() {
        let url = Url::parse("https://example.com/file.tgz").unwrap();
        assert!(validate_scheme(&url).is_ok());
    }

    #[tokio::test]
    async fn rejects_loopback_ip_literal() {
        let url = Url::parse("https://127.0.0.1/file.tgz").unwrap();
        let err = resolve_and_validate(&url, &SecurityConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::BlockedHost { .. }));
    }

    #[tokio::test]
    async fn allow_private_hosts_bypasses_the_ip_gate_only() {
        let url = Url::parse("https://127.0.0.1/file.tgz").unwrap();
        let config = SecurityConfig {
            allow_private_hosts: true,
        };
        assert!(resolve_and_validate(&url, &config).await.is_ok());

        let http_url = Url::parse("http://127.0.0.1/file.tgz").unwrap();
        assert!(validate_scheme(&http_url).is_err());
    }

    #[tokio::test]
    async fn rejects_literal_localhost_hostname() {
        let url = Url::parse("https://localhost/file.tgz").unwrap();
        let err = resolve_and_validate(&url, &SecurityConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::BlockedHost { .. }));
    }
}
