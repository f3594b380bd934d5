use std::net::SocketAddr;

use axum::{
    RequestPartsExt,
    extract::{ConnectInfo, FromRequestParts},
    http::{StatusCode, request::Parts},
};
use axum_extra::{TypedHeader, headers::UserAgent};

use crate::types::ConnectionInfo;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Extracts the peer address from `ConnectInfo`. `X-Forwarded-For` is not
/// consulted; see [`ConnectionInfo::from_parts`].
impl<S> FromRequestParts<S> for ConnectionInfo
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        ConnectionInfo::from_parts(parts, false).await
    }
}

impl ConnectionInfo {
    /// Read the client address and user agent from request parts.
    ///
    /// With `trust_forwarded_for` the first `X-Forwarded-For` entry wins over
    /// the peer address. Only set it behind a proxy that overwrites the header.
    pub async fn from_parts(
        parts: &mut Parts,
        trust_forwarded_for: bool,
    ) -> Result<Self, (StatusCode, &'static str)> {
        let user_agent = parts
            .extract::<Option<TypedHeader<UserAgent>>>()
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid user agent header"))?
            .map(|ua| ua.to_string());

        let forwarded = if trust_forwarded_for {
            parts
                .headers
                .get(X_FORWARDED_FOR)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(str::to_string)
        } else {
            None
        };

        let ip = match forwarded {
            Some(ip) => Some(ip),
            None => parts
                .extract::<ConnectInfo<SocketAddr>>()
                .await
                .ok()
                .map(|addr| addr.ip().to_string()),
        };

        Ok(ConnectionInfo { ip, user_agent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> ConnectionInfo {
        let (mut parts, _) = request.into_parts();
        ConnectionInfo::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_forwarded_for_first_entry_when_trusted() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("user-agent", "curl/8.0")
            .body(())
            .unwrap();

        let (mut parts, _) = request.into_parts();
        let info = ConnectionInfo::from_parts(&mut parts, true).await.unwrap();
        assert_eq!(info.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(info.user_agent(), "curl/8.0");
    }

    #[tokio::test]
    async fn test_forwarded_for_ignored_by_default() {
        let mut request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 1], 443))));

        let info = extract(request).await;
        assert_eq!(info.address(), "198.51.100.1");
    }

    #[tokio::test]
    async fn test_connect_info_fallback() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 1], 443))));

        let info = extract(request).await;
        assert_eq!(info.address(), "198.51.100.1");
        assert_eq!(info.user_agent(), "");
    }

    #[tokio::test]
    async fn test_unknown_address() {
        let info = extract(Request::builder().body(()).unwrap()).await;
        assert_eq!(info.address(), ConnectionInfo::UNKNOWN_ADDRESS);
    }
}
