//! Rate limiting for the login and registration endpoints.
//!
//! Uses a token bucket per client address to slow down password guessing and
//! signup spam.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::cli::IpHeader;

/// Per-client rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const LOGIN_PER_SEC: NonZeroU32 = NonZeroU32::new(1).unwrap();
const LOGIN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();
const REGISTER_PER_MIN: NonZeroU32 = NonZeroU32::new(3).unwrap();

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-client limiter for logins (5 attempts, then 1 per second)
    pub login: Arc<IpLimiter>,
    /// Per-client limiter for registrations (3 per minute)
    pub register: Arc<IpLimiter>,
    /// Trusted proxy header naming the client, `None` to use the socket address
    pub ip_header: Option<IpHeader>,
}

impl RateLimitConfig {
    /// Create rate limiters with the default quotas.
    pub fn new() -> Self {
        Self::with_quotas(
            Quota::per_second(LOGIN_PER_SEC).allow_burst(LOGIN_BURST),
            Quota::per_minute(REGISTER_PER_MIN),
        )
    }

    pub fn with_quotas(login: Quota, register: Quota) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(login)),
            register: Arc::new(RateLimiter::keyed(register)),
            ip_header: None,
        }
    }

    pub fn with_ip_header(mut self, ip_header: Option<IpHeader>) -> Self {
        self.ip_header = ip_header;
        self
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Key a request by client address.
///
/// With `ip_header` set, the address comes from that header and a missing or
/// invalid value is an error (no fallback to the socket). Otherwise the socket
/// address is used, and requests served without connect info share one bucket.
pub fn client_key(
    request: &Request,
    ip_header: Option<IpHeader>,
) -> Result<String, &'static str> {
    match ip_header {
        Some(ip_header) => {
            let value = request
                .headers()
                .get(ip_header.header_name())
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            ip_header.extract(value)
        }
        None => Ok(request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())),
    }
}

async fn limit(
    limiter: &IpLimiter,
    ip_header: Option<IpHeader>,
    request: Request,
    next: Next,
    message: &'static str,
) -> Response {
    let key = match client_key(&request, ip_header) {
        Ok(key) => key,
        Err(reason) => {
            warn!(reason, "Rejecting request without a usable client IP");
            return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
        }
    };

    match limiter.check_key(&key) {
        Ok(_) => next.run(request).await,
        Err(_) => (StatusCode::TOO_MANY_REQUESTS, message).into_response(),
    }
}

/// Middleware for rate limiting logins.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    limit(
        &config.login,
        config.ip_header,
        request,
        next,
        "Too many login attempts. Please wait before trying again.",
    )
    .await
}

/// Middleware for rate limiting registrations.
pub async fn rate_limit_register(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    limit(
        &config.register,
        config.ip_header,
        request,
        next,
        "Too many signup attempts. Please wait before trying again.",
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_from(addr: [u8; 4], forwarded: Option<&str>) -> Request {
        let mut builder = Request::builder();
        if let Some(forwarded) = forwarded {
            builder = builder.header("x-forwarded-for", forwarded);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((addr, 4000))));
        request
    }

    #[test]
    fn test_client_key_ignores_headers_by_default() {
        let request = request_from([192, 0, 2, 1], Some("203.0.113.7"));
        assert_eq!(client_key(&request, None), Ok("192.0.2.1".to_string()));
    }

    #[test]
    fn test_client_key_from_trusted_header() {
        let request = request_from([192, 0, 2, 1], Some("198.51.100.4, 203.0.113.7"));
        assert_eq!(
            client_key(&request, Some(IpHeader::XForwardedFor)),
            Ok("203.0.113.7".to_string())
        );
    }

    #[test]
    fn test_client_key_missing_trusted_header() {
        let request = request_from([192, 0, 2, 1], None);
        assert!(client_key(&request, Some(IpHeader::XRealIp)).is_err());
    }

    #[test]
    fn test_client_key_fallback() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&request, None), Ok("unknown".to_string()));
    }

    #[test]
    fn test_login_burst_is_enforced() {
        let config = RateLimitConfig::new();
        for _ in 0..LOGIN_BURST.get() {
            assert!(config.login.check_key(&"client".to_string()).is_ok());
        }
        assert!(config.login.check_key(&"client".to_string()).is_err());
        assert!(config.login.check_key(&"other".to_string()).is_ok());
    }
}
