#![no_main]

use axum::http::{HeaderMap, HeaderValue};
use gate_service::admission::client_identity::{client_key, IpCidr};
use libfuzzer_sys::fuzz_target;
use std::net::SocketAddr;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = HeaderValue::from_bytes(data) else {
        return;
    };
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", value.clone());
    headers.insert("x-real-ip", value);

    let trusted: Vec<IpCidr> = ["10.0.0.0/8", "::1/128"]
        .iter()
        .filter_map(|range| IpCidr::parse(range))
        .collect();

    for peer in ["10.1.2.3:443", "203.0.113.9:443", "[::1]:443"] {
        let Ok(peer) = peer.parse::<SocketAddr>() else {
            continue;
        };
        let key = client_key(Some(peer), &headers, &trusted);
        // An untrusted peer is always keyed by its own address
        if !trusted.iter().any(|range| range.contains(peer.ip())) {
            assert_eq!(key, peer.ip().to_string());
        }
    }

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = IpCidr::parse(text);
    }
});
