use std::net::IpAddr;

use axum::http::HeaderMap;
use ipnet::IpNet;

/// Client address for rate limiting. `X-Forwarded-For` is honoured only when
/// the direct peer is a trusted proxy.
pub fn resolve(headers: &HeaderMap, peer_addr: Option<IpAddr>, trusted_proxies: &[IpNet]) -> IpAddr {
    let peer = peer_addr.unwrap_or(IpAddr::from([127, 0, 0, 1]));

    if trusted_proxies.iter().any(|net| net.contains(&peer)) {
        if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            // leftmost address that is not one of our proxies
            for ip_str in xff.split(',').map(str::trim) {
                if let Ok(ip) = ip_str.parse::<IpAddr>() {
                    if !trusted_proxies.iter().any(|net| net.contains(&ip)) {
                        return ip;
                    }
                }
            }
        }
    }

    peer
}
