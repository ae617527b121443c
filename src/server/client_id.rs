//! Identification of the requesting client, for rate limiting.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::SocketAddr;

const HEADER_FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN_CLIENT: &str = "unknown";

/// First `X-Forwarded-For` entry, else the peer IP, else `unknown`.
///
/// The header is trusted as-is, so the service is expected to sit behind a
/// proxy that sets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

impl ClientId {
    fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let forwarded = headers
            .get(HEADER_FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|first| !first.is_empty());

        let id = match (forwarded, peer) {
            (Some(first), _) => first.to_string(),
            (None, Some(addr)) => addr.ip().to_string(),
            (None, None) => UNKNOWN_CLIENT.to_string(),
        };
        ClientId(id)
    }
}

impl<S> FromRequestParts<S> for ClientId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientId::resolve(&parts.headers, peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.7:54321".parse().unwrap())
    }

    #[test]
    fn test_forwarded_for_first_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HEADER_FORWARDED_FOR,
            HeaderValue::from_static(" 203.0.113.9 , 10.0.0.1"),
        );
        assert_eq!(
            ClientId::resolve(&headers, peer()),
            ClientId("203.0.113.9".to_string())
        );
    }

    #[test]
    fn test_peer_address_fallback() {
        let headers = HeaderMap::new();
        assert_eq!(
            ClientId::resolve(&headers, peer()),
            ClientId("10.0.0.7".to_string())
        );

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_FORWARDED_FOR, HeaderValue::from_static(""));
        assert_eq!(
            ClientId::resolve(&headers, peer()),
            ClientId("10.0.0.7".to_string())
        );
    }

    #[test]
    fn test_unknown_without_any_source() {
        assert_eq!(
            ClientId::resolve(&HeaderMap::new(), None),
            ClientId("unknown".to_string())
        );
    }
}
