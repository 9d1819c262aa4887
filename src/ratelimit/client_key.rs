//! Client identity for rate limiting.
//!
//! The first syntactically valid IP literal from a prioritized list of proxy
//! headers wins, then the socket peer. Anything else maps to `"unknown"`, so
//! every unidentifiable client shares one bucket.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

pub const UNKNOWN_CLIENT: &str = "unknown";

/// Headers consulted in priority order.
const ADDRESS_HEADERS: [&str; 5] = [
    "cf-connecting-ip",
    "true-client-ip",
    "x-real-ip",
    "x-forwarded-for",
    "x-client-ip",
];

pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    for name in ADDRESS_HEADERS {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        // X-Forwarded-For is "client, proxy1, proxy2"
        let first = value.split(',').next().unwrap_or_default();
        if let Some(ip) = parse_ip(first) {
            return ip.to_string();
        }
    }

    if let Some(ip) = headers
        .get("forwarded")
        .and_then(|v| v.to_str().ok())
        .and_then(forwarded_for)
    {
        return ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Accepts bare IPv4/IPv6 literals, bracketed IPv6 and `ip:port` forms.
pub fn parse_ip(raw: &str) -> Option<IpAddr> {
    let candidate = raw.trim().trim_matches('"');
    if candidate.is_empty() {
        return None;
    }
    if let Ok(ip) = candidate.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Ok(addr) = candidate.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    candidate
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|inner| inner.parse::<IpAddr>().ok())
}

/// `for=` parameter of the first element of an RFC 7239 `Forwarded` header.
fn forwarded_for(value: &str) -> Option<IpAddr> {
    let first = value.split(',').next()?;
    first.split(';').find_map(|pair| {
        let (name, val) = pair.trim().split_once('=')?;
        if name.trim().eq_ignore_ascii_case("for") {
            parse_ip(val)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_forwarded_for_first_entry() {
        let h = headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
        assert_eq!(client_key(&h, None), "203.0.113.7");
    }

    #[test]
    fn test_header_priority() {
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.7"),
            ("cf-connecting-ip", "198.51.100.2"),
        ]);
        assert_eq!(client_key(&h, None), "198.51.100.2");
    }

    #[test]
    fn test_invalid_header_falls_through() {
        let h = headers(&[("x-real-ip", "not-an-ip"), ("x-forwarded-for", "2001:db8::1")]);
        assert_eq!(client_key(&h, None), "2001:db8::1");
    }

    #[test]
    fn test_rfc7239_forwarded() {
        let h = headers(&[("forwarded", "for=\"[2001:db8:cafe::17]:4711\";proto=https")]);
        assert_eq!(client_key(&h, None), "2001:db8:cafe::17");
    }

    #[test]
    fn test_peer_then_unknown() {
        let peer: SocketAddr = "192.0.2.10:5555".parse().unwrap();
        assert_eq!(client_key(&HeaderMap::new(), Some(peer)), "192.0.2.10");
        assert_eq!(client_key(&HeaderMap::new(), None), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_parse_ip_forms() {
        assert!(parse_ip("10.1.2.3").is_some());
        assert!(parse_ip("10.1.2.3:8080").is_some());
        assert!(parse_ip("[::1]").is_some());
        assert!(parse_ip("999.1.1.1").is_none());
        assert!(parse_ip("").is_none());
    }
}
