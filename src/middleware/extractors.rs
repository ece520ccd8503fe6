use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

use crate::rate_limit::UNKNOWN_CLIENT;

pub const SESSION_HEADER: &str = "x-session-id";

/// 客户端 IP，用作限流和用量统计的键
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// 请求头中的会话 ID，可能缺失
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub Option<String>);

/// 依次尝试 x-real-ip、x-forwarded-for 的第一个非空项、连接地址，都没有时返回 "unknown"
pub fn client_ip_from_headers(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    let remote_ip = remote.map(|addr| addr.ip().to_string());

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let remote = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);
        let ip = client_ip_from_headers(&parts.headers, remote);
        tracing::debug!("client ip: {}", ip);
        Ok(ClientIp(ip))
    }
}

impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        Ok(SessionId(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn real_ip_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static(" 203.0.113.5 "));
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.1"));

        assert_eq!(client_ip_from_headers(&headers, None), "203.0.113.5");
    }

    #[test]
    fn first_forwarded_entry_is_used() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" , 198.51.100.1, 10.0.0.1"),
        );

        assert_eq!(client_ip_from_headers(&headers, None), "198.51.100.1");
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "192.0.2.10:51234".parse().unwrap();

        assert_eq!(client_ip_from_headers(&headers, Some(peer)), "192.0.2.10");
        assert_eq!(client_ip_from_headers(&headers, None), UNKNOWN_CLIENT);
    }
}
