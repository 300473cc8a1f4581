use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};
use axum::{extract::Request, middleware::Next, response::Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use tracing::info;

/// Logging middleware for request/response tracking
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = client_ip(request.headers(), request.extensions());

    info!(
        target: "fenestra_booking::middleware",
        method = %method,
        uri = %uri,
        client_ip = %client_ip,
        "Incoming request"
    );

    let response = next.run(request).await;

    let status = response.status();
    info!(
        target: "fenestra_booking::middleware",
        method = %method,
        uri = %uri,
        status = %status,
        "Request completed"
    );

    response
}

/// The rate-limit client key for a request: the client IP as seen through
/// proxy headers, falling back to the socket address. The booking core is
/// agnostic to how this string is derived.
pub struct ClientKey(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientKey
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientKey(client_ip(&parts.headers, &parts.extensions)))
    }
}

fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    // Try to get real IP from headers first
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                return first_ip.trim().to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.to_string();
        }
    }

    // Fallback to connection info
    if let Some(ConnectInfo(addr)) = extensions.get::<ConnectInfo<SocketAddr>>() {
        addr.ip().to_string()
    } else {
        "unknown".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_with_forwarded_header() {
        let mut request = Request::new(axum::body::Body::empty());
        request.headers_mut().insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );

        let ip = client_ip(request.headers(), request.extensions());
        assert_eq!(ip, "192.168.1.1");
    }

    #[test]
    fn test_client_ip_with_real_ip_header() {
        let mut request = Request::new(axum::body::Body::empty());
        request
            .headers_mut()
            .insert("x-real-ip", HeaderValue::from_static("203.0.113.1"));

        let ip = client_ip(request.headers(), request.extensions());
        assert_eq!(ip, "203.0.113.1");
    }

    #[test]
    fn test_client_ip_from_connect_info() {
        let mut request = Request::new(axum::body::Body::empty());
        let addr: SocketAddr = "198.51.100.7:44313".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));

        let ip = client_ip(request.headers(), request.extensions());
        assert_eq!(ip, "198.51.100.7");
    }

    #[test]
    fn test_client_ip_fallback() {
        let request = Request::new(axum::body::Body::empty());
        let ip = client_ip(request.headers(), request.extensions());
        assert_eq!(ip, "unknown");
    }
}
