use std::net::IpAddr;

/// Address ranges blocked by the default host gate (§4.10): loopback, RFC
/// 1918 private space, link-local, CGNAT, benchmarking, the three TEST-NETs,
/// `0.0.0.0/8`, `240.0.0.0/4`, broadcast, multicast, unique-local v6, and the
/// IPv6 documentation range.
const DEFAULT_BLOCKED_CIDRS: &[&str] = &[
    "127.0.0.0/8",
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "169.254.0.0/16",
    "0.0.0.0/8",
    "100.64.0.0/10",
    "198.18.0.0/15",
    "192.0.2.0/24",
    "198.51.100.0/24",
    "203.0.113.0/24",
    "224.0.0.0/4",
    "240.0.0.0/4",
    "255.255.255.255/32",
    "::1/128",
    "::/128",
    "fc00::/7",
    "fe80::/10",
    "ff00::/8",
    "2001:db8::/32",
];

struct Cidr {
    network: IpAddr,
    prefix: u8,
}

fn parse_cidr(text: &str) -> Option<Cidr> {
    let (addr, prefix) = text.split_once('/')?;
    let network = addr.parse::<IpAddr>().ok()?;
    let prefix: u8 = prefix.parse().ok()?;
    match network {
        IpAddr::V4(_) if prefix > 32 => return None,
        IpAddr::V6(_) if prefix > 128 => return None,
        _ => {}
    }
    Some(Cidr { network, prefix })
}

fn prefix_match(a: &[u8], b: &[u8], prefix: u8) -> bool {
    let full_bytes = (prefix / 8) as usize;
    let rem_bits = prefix % 8;
    if a[..full_bytes] != b[..full_bytes] {
        return false;
    }
    if rem_bits == 0 {
        return true;
    }
    let mask = 0xFFu8 << (8 - rem_bits);
    (a[full_bytes] & mask) == (b[full_bytes] & mask)
}

fn ip_in_cidr(ip: IpAddr, cidr: &Cidr) -> bool {
    match (ip, cidr.network) {
        (IpAddr::V4(ip), IpAddr::V4(net)) => prefix_match(&ip.octets(), &net.octets(), cidr.prefix),
        (IpAddr::V6(ip), IpAddr::V6(net)) => prefix_match(&ip.octets(), &net.octets(), cidr.prefix),
        _ => false,
    }
}

/// Returns the matching CIDR text if `ip` falls in a blocked range.
pub(crate) fn blocked_reason(ip: IpAddr) -> Option<&'static str> {
    DEFAULT_BLOCKED_CIDRS
        .iter()
        .find(|entry| {
            let cidr = parse_cidr(entry).expect("DEFAULT_BLOCKED_CIDRS entries are well-formed");
            ip_in_cidr(ip, &cidr)
        })
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_loopback() {
        assert!(blocked_reason("127.0.0.1".parse().unwrap()).is_some());
    }

    #[test]
    fn blocks_private_rfc1918() {
        assert!(blocked_reason("10.1.2.3".parse().unwrap()).is_some());
        assert!(blocked_reason("172.16.0.1".parse().unwrap()).is_some());
        assert!(blocked_reason("192.168.1.1".parse().unwrap()).is_some());
    }

    #[test]
    fn blocks_link_local_and_cgnat() {
        assert!(blocked_reason("169.254.1.1".parse().unwrap()).is_some());
        assert!(blocked_reason("100.64.0.1".parse().unwrap()).is_some());
    }

    #[test]
    fn blocks_test_nets_and_benchmarking() {
        assert!(blocked_reason("192.0.2.1".parse().unwrap()).is_some());
        assert!(blocked_reason("198.51.100.1".parse().unwrap()).is_some());
        assert!(blocked_reason("203.0.113.1".parse().unwrap()).is_some());
        assert!(blocked_reason("198.18.0.1".parse().unwrap()).is_some());
    }

    #[test]
    fn blocks_broadcast_and_multicast() {
        assert!(blocked_reason("255.255.255.255".parse().unwrap()).is_some());
        assert!(blocked_reason("224.0.0.1".parse().unwrap()).is_some());
    }

    #[test]
    fn blocks_ipv6_loopback_unique_local_and_link_local() {
        assert!(blocked_reason("::1".parse().unwrap()).is_some());
        assert!(blocked_reason("fc00::1".parse().unwrap()).is_some());
        assert!(blocked_reason("fe80::1".parse().unwrap()).is_some());
    }

    #[test]
    fn allows_public_addresses() {
        assert!(blocked_reason("1.1.1.1".parse().unwrap()).is_none());
        assert!(blocked_reason("93.184.216.34".parse().unwrap()).is_none());
        assert!(blocked_reason("2606:4700:4700::1111".parse().unwrap()).is_none());
    }
}
