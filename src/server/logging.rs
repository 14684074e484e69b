//! Per-request access log

use std::net::SocketAddr;
use std::time::Instant;

use axum::body::HttpBody;
use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{error, info, warn};

/// Header set by reverse proxies in front of the node
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Log method, path, remote address, status, size and latency of a request
pub async fn log_requests(request: Request, next: Next) -> Response {
    let started = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let version = request.version();
    let socket = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let remote = remote_addr(request.headers(), socket);

    let response = next.run(request).await;

    let status = response.status();
    let size = response.body().size_hint().exact().unwrap_or(0);
    let took = started.elapsed();
    let reason = status.canonical_reason().unwrap_or("");

    if status.is_server_error() {
        error!(%method, %path, ?version, %remote, status = status.as_u16(), reason, size, ?took, "request");
    } else if status.is_client_error() {
        warn!(%method, %path, ?version, %remote, status = status.as_u16(), reason, size, ?took, "request");
    } else {
        info!(%method, %path, ?version, %remote, status = status.as_u16(), reason, size, ?took, "request");
    }

    response
}

/// `X-Real-IP` wins over the socket peer address
fn remote_addr(headers: &HeaderMap, socket: Option<SocketAddr>) -> String {
    if let Some(real_ip) = headers
        .get(REAL_IP_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return real_ip.to_string();
    }

    socket
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_real_ip_header_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(REAL_IP_HEADER, HeaderValue::from_static("203.0.113.9"));
        let socket: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        assert_eq!(remote_addr(&headers, Some(socket)), "203.0.113.9");
    }

    #[test]
    fn test_socket_address_fallback() {
        let socket: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        assert_eq!(remote_addr(&HeaderMap::new(), Some(socket)), "127.0.0.1:4000");
        assert_eq!(remote_addr(&HeaderMap::new(), None), "-");
    }

    #[test]
    fn test_empty_real_ip_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(REAL_IP_HEADER, HeaderValue::from_static(""));
        assert_eq!(remote_addr(&headers, None), "-");
    }
}
