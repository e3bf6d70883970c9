use std::net::SocketAddr;

use axum::{extract::ConnectInfo, http::request::Parts};

/// Best-effort client address: socket peer, then the first `X-Forwarded-For` hop.
pub fn client_ip(parts: &Parts) -> Option<String> {
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip().to_string());
    }
    parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
