//! Client identity resolution for admission control.
//!
//! The direct TCP peer is always resolved first. Forwarding headers are only
//! consulted when the peer itself is a configured trusted proxy; otherwise a
//! client could choose its own limiter bucket by sending `X-Forwarded-For`.

use axum::http::HeaderMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// An IP network in CIDR notation.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IpCidr {
    network: IpAddr,
    prefix_len: u8,
}

impl IpCidr {
    /// Parse `addr/len` or a bare address (treated as a single host).
    pub fn parse(value: &str) -> Option<IpCidr> {
        let value = value.trim();
        let (addr, prefix_len) = match value.split_once('/') {
            Some((addr, len)) => (addr.parse::<IpAddr>().ok()?, Some(len.parse::<u8>().ok()?)),
            None => (value.parse::<IpAddr>().ok()?, None),
        };

        let max_len = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let prefix_len = prefix_len.unwrap_or(max_len);
        if prefix_len > max_len {
            return None;
        }

        Some(IpCidr {
            network: mask(addr, prefix_len),
            prefix_len,
        })
    }

    /// Whether `ip` lies inside this network. Address families never match each other.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
                mask(ip, self.prefix_len) == self.network
            }
            _ => false,
        }
    }
}

impl fmt::Debug for IpCidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl fmt::Display for IpCidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

fn mask(ip: IpAddr, prefix_len: u8) -> IpAddr {
    match ip {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let mask = u32::MAX.checked_shl(32 - u32::from(prefix_len)).unwrap_or(0);
            IpAddr::V4((bits & mask).into())
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let mask = u128::MAX.checked_shl(128 - u32::from(prefix_len)).unwrap_or(0);
            IpAddr::V6((bits & mask).into())
        }
    }
}

/// Parse a comma-separated CIDR list. Blank entries are skipped.
///
/// # Errors
///
/// Returns the first entry that is not a valid address or network.
pub fn parse_trusted_proxies(value: &str) -> Result<Vec<IpCidr>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| IpCidr::parse(entry).ok_or_else(|| entry.to_string()))
        .collect()
}

fn is_trusted_proxy(ip: IpAddr, trusted_proxies: &[IpCidr]) -> bool {
    trusted_proxies.iter().any(|cidr| cidr.contains(ip))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Resolve the limiter key for a request.
///
/// Without a peer address the key is empty, which puts the request in a
/// shared per-tier bucket.
pub fn client_key(
    peer: Option<SocketAddr>,
    headers: &HeaderMap,
    trusted_proxies: &[IpCidr],
) -> String {
    let Some(peer) = peer else {
        return String::new();
    };
    let peer_ip = peer.ip().to_canonical();

    if is_trusted_proxy(peer_ip, trusted_proxies) {
        let forwarded = header_str(headers, X_FORWARDED_FOR)
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|first| !first.is_empty());
        if let Some(first) = forwarded {
            return first.to_string();
        }
        if let Some(real_ip) = header_str(headers, X_REAL_IP) {
            return real_ip.to_string();
        }
    }

    peer_ip.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer(addr: &str) -> Option<SocketAddr> {
        Some(addr.parse().unwrap())
    }

    fn spoofed_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            X_FORWARDED_FOR,
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        headers.insert(X_REAL_IP, HeaderValue::from_static("203.0.113.10"));
        headers
    }

    #[test]
    fn test_cidr_parse_and_contains() {
        let cidr = IpCidr::parse("10.0.0.0/8").unwrap();
        assert!(cidr.contains("10.1.2.3".parse().unwrap()));
        assert!(!cidr.contains("11.0.0.1".parse().unwrap()));

        let host = IpCidr::parse("192.168.1.1").unwrap();
        assert!(host.contains("192.168.1.1".parse().unwrap()));
        assert!(!host.contains("192.168.1.2".parse().unwrap()));

        let v6 = IpCidr::parse("fd00::/8").unwrap();
        assert!(v6.contains("fd12::1".parse().unwrap()));
        assert!(!v6.contains("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_cidr_zero_prefix_matches_family() {
        let all_v4 = IpCidr::parse("0.0.0.0/0").unwrap();
        assert!(all_v4.contains("8.8.8.8".parse().unwrap()));
        assert!(!all_v4.contains("::1".parse().unwrap()));
    }

    #[test]
    fn test_cidr_parse_rejects_invalid() {
        assert!(IpCidr::parse("not-a-cidr").is_none());
        assert!(IpCidr::parse("10.0.0.0/33").is_none());
        assert!(IpCidr::parse("10.0.0.0/abc").is_none());
        assert!(IpCidr::parse("::/129").is_none());
    }

    #[test]
    fn test_cidr_normalizes_host_bits() {
        let cidr = IpCidr::parse("10.1.2.3/8").unwrap();
        assert_eq!(cidr.to_string(), "10.0.0.0/8");
    }

    #[test]
    fn test_parse_trusted_proxies() {
        let list = parse_trusted_proxies("10.0.0.0/8, ,192.168.1.1,").unwrap();
        assert_eq!(list.len(), 2);
        assert!(parse_trusted_proxies("").unwrap().is_empty());
        assert_eq!(
            parse_trusted_proxies("10.0.0.0/8,bogus").unwrap_err(),
            "bogus"
        );
    }

    #[test]
    fn test_headers_ignored_without_trusted_proxies() {
        let key = client_key(peer("198.51.100.1:4000"), &spoofed_headers(), &[]);
        assert_eq!(key, "198.51.100.1");
    }

    #[test]
    fn test_headers_ignored_from_untrusted_peer() {
        let trusted = parse_trusted_proxies("10.0.0.0/8").unwrap();
        let key = client_key(peer("198.51.100.1:4000"), &spoofed_headers(), &trusted);
        assert_eq!(key, "198.51.100.1");
    }

    #[test]
    fn test_first_forwarded_entry_used_from_trusted_peer() {
        let trusted = parse_trusted_proxies("10.0.0.0/8").unwrap();
        let key = client_key(peer("10.0.0.5:4000"), &spoofed_headers(), &trusted);
        assert_eq!(key, "203.0.113.9");
    }

    #[test]
    fn test_real_ip_used_when_forwarded_for_absent() {
        let trusted = parse_trusted_proxies("10.0.0.0/8").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(X_REAL_IP, HeaderValue::from_static(" 203.0.113.10 "));
        let key = client_key(peer("10.0.0.5:4000"), &headers, &trusted);
        assert_eq!(key, "203.0.113.10");
    }

    #[test]
    fn test_trusted_peer_without_headers_uses_peer() {
        let trusted = parse_trusted_proxies("10.0.0.0/8").unwrap();
        let key = client_key(peer("10.0.0.5:4000"), &HeaderMap::new(), &trusted);
        assert_eq!(key, "10.0.0.5");
    }

    #[test]
    fn test_empty_forwarded_entry_falls_back_to_real_ip() {
        let trusted = parse_trusted_proxies("10.0.0.0/8").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(" , 203.0.113.9"));
        headers.insert(X_REAL_IP, HeaderValue::from_static("203.0.113.10"));
        let key = client_key(peer("10.0.0.5:4000"), &headers, &trusted);
        assert_eq!(key, "203.0.113.10");
    }

    #[test]
    fn test_ipv4_mapped_peer_is_canonicalized() {
        let trusted = parse_trusted_proxies("10.0.0.0/8").unwrap();
        let key = client_key(peer("[::ffff:10.0.0.5]:4000"), &spoofed_headers(), &trusted);
        assert_eq!(key, "203.0.113.9");

        let key = client_key(peer("[::ffff:198.51.100.1]:4000"), &HeaderMap::new(), &[]);
        assert_eq!(key, "198.51.100.1");
    }

    #[test]
    fn test_missing_peer_is_empty_key() {
        assert_eq!(client_key(None, &spoofed_headers(), &[]), "");
    }
}
