//! Best-effort client address for log lines.
//!
//! Proxy headers are only trusted when the peer itself is loopback, so a
//! direct client cannot spoof its address by sending them.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

/// Placeholder used when no address can be determined.
pub const UNKNOWN_IP: &str = "unknown IP";

/// Resolve the caller's address from the peer and, behind a loopback
/// proxy, the `Forwarded` and `X-Forwarded-For` headers.
pub fn resolve_real_ip(peer: Option<SocketAddr>, headers: &HeaderMap) -> String {
    if let Some(peer) = peer {
        if !peer.ip().is_loopback() {
            return peer.ip().to_string();
        }
    }
    if let Some(ip) = from_forwarded(headers) {
        return ip.to_string();
    }
    if let Some(ip) = header_str(headers, "x-forwarded-for").and_then(|v| last_remote(v.split(',')))
    {
        return ip.to_string();
    }
    UNKNOWN_IP.to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn from_forwarded(headers: &HeaderMap) -> Option<IpAddr> {
    let header = header_str(headers, "forwarded")?;
    header.split(';').find_map(|part| {
        let part = part.trim();
        let value = part
            .strip_prefix("for=")
            .or_else(|| part.strip_prefix("For="))?;
        last_remote(value.split(','))
    })
}

/// Scan entries from the end for the first non-loopback address.
///
/// An unparseable entry stops the scan.
fn last_remote<'a>(entries: impl DoubleEndedIterator<Item = &'a str>) -> Option<IpAddr> {
    for entry in entries.rev() {
        let ip = parse_entry(entry)?;
        if !ip.is_loopback() {
            return Some(ip);
        }
    }
    None
}

fn parse_entry(entry: &str) -> Option<IpAddr> {
    let entry = entry.trim().trim_matches('"');
    let entry = entry.strip_prefix("for=").unwrap_or(entry);
    let bare = entry.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = strip_zone(bare).parse::<IpAddr>() {
        return Some(ip);
    }
    if let Ok(addr) = entry.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    let (host, port) = entry.rsplit_once(':')?;
    let _: u16 = port.parse().ok()?;
    strip_zone(host.trim_start_matches('[').trim_end_matches(']'))
        .parse()
        .ok()
}

fn strip_zone(s: &str) -> &str {
    s.split('%').next().unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for &(name, value) in pairs {
            let _ = map.insert(name, HeaderValue::from_static(value));
        }
        map
    }

    fn loopback() -> Option<SocketAddr> {
        Some("127.0.0.1:50000".parse().unwrap())
    }

    #[test]
    fn remote_peer_wins_over_headers() {
        let peer = Some("203.0.113.9:4000".parse().unwrap());
        let h = headers(&[("x-forwarded-for", "198.51.100.1")]);
        assert_eq!(resolve_real_ip(peer, &h), "203.0.113.9");
    }

    #[test]
    fn loopback_peer_uses_forwarded_for() {
        let h = headers(&[("forwarded", "proto=https;for=198.51.100.7")]);
        assert_eq!(resolve_real_ip(loopback(), &h), "198.51.100.7");
    }

    #[test]
    fn forwarded_with_bracketed_ipv6_and_port() {
        let h = headers(&[("forwarded", r#"for="[2001:db8::1]:4711""#)]);
        assert_eq!(resolve_real_ip(loopback(), &h), "2001:db8::1");
    }

    #[test]
    fn x_forwarded_for_last_non_loopback_wins() {
        let h = headers(&[("x-forwarded-for", "10.0.0.1, 198.51.100.2, 127.0.0.1")]);
        assert_eq!(resolve_real_ip(loopback(), &h), "198.51.100.2");
    }

    #[test]
    fn host_port_entries_are_accepted() {
        let h = headers(&[("x-forwarded-for", "198.51.100.3:8080")]);
        assert_eq!(resolve_real_ip(loopback(), &h), "198.51.100.3");
    }

    #[test]
    fn garbage_entry_stops_scan() {
        let h = headers(&[("x-forwarded-for", "198.51.100.4, not-an-ip")]);
        assert_eq!(resolve_real_ip(loopback(), &h), UNKNOWN_IP);
    }

    #[test]
    fn only_loopback_everywhere_is_unknown() {
        let h = headers(&[("x-forwarded-for", "127.0.0.1, ::1")]);
        assert_eq!(resolve_real_ip(loopback(), &h), UNKNOWN_IP);
        assert_eq!(resolve_real_ip(None, &HeaderMap::new()), UNKNOWN_IP);
    }
}
