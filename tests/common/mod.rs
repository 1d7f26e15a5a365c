#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use boardgate::db::{Database, Rank};
use boardgate::directory::UserDirectory;
use boardgate::jwt::{TokenDurations, TokenScope, TokenService};
use boardgate::rate_limit::RateLimitConfig;
use boardgate::{ServerConfig, create_app};
use governor::Quota;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-long-enough-for-hs256";
pub const TEST_ISSUER: &str = "http://localhost";
pub const PASSWORD: &str = "secret123";

pub struct TestContext {
    pub app: Router,
    pub db: Database,
    pub tokens: TokenService,
}

pub struct TestSetup {
    rate_limit: Option<RateLimitConfig>,
    secure_cookies: bool,
}

impl TestSetup {
    pub fn new() -> Self {
        Self {
            rate_limit: None,
            secure_cookies: false,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn with_secure_cookies(mut self) -> Self {
        self.secure_cookies = true;
        self
    }

    pub async fn build(self) -> TestContext {
        let db = Database::open(":memory:")
            .await
            .expect("Failed to open test database");
        let rate_limit = self.rate_limit.unwrap_or_else(generous_rate_limit);

        let config = ServerConfig {
            db: db.clone(),
            issuer: TEST_ISSUER.to_string(),
            jwt_secret: TEST_SECRET.to_vec(),
            secure_cookies: self.secure_cookies,
            token_durations: TokenDurations::default(),
            rate_limit: Arc::new(rate_limit),
        };

        TestContext {
            app: create_app(&config),
            db,
            tokens: TokenService::new(TEST_SECRET, TEST_ISSUER),
        }
    }
}

pub async fn setup() -> TestContext {
    TestSetup::new().build().await
}

fn generous_rate_limit() -> RateLimitConfig {
    let quota = Quota::per_second(NonZeroU32::new(1000).unwrap());
    RateLimitConfig::with_quotas(quota, quota)
}

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

impl TestContext {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Register a user directly in the store.
    pub async fn create_user(&self, id: &str, rank: Rank) {
        self.db.users().register(id, PASSWORD).await.unwrap();
        if rank != Rank::USER {
            self.db.users().set_rank(id, rank).await.unwrap();
        }
    }

    /// Cookie header for a fresh session, signed directly.
    pub fn session_cookie(&self, id: &str, rank: Rank) -> String {
        self.session_cookie_at(id, rank, now(), now())
    }

    /// Cookie header with an access token issued at `access_iat` and a
    /// refresh token issued at `refresh_iat`.
    pub fn session_cookie_at(
        &self,
        id: &str,
        rank: Rank,
        access_iat: u64,
        refresh_iat: u64,
    ) -> String {
        let access = self
            .tokens
            .issue_at(TokenScope::Access, id, rank, access_iat)
            .unwrap();
        let refresh = self
            .tokens
            .issue_at(TokenScope::Refresh, id, rank, refresh_iat)
            .unwrap();
        format!("token={}; refresh={}", access.token, refresh.token)
    }

    /// Cookie header whose access token has expired but whose refresh token is valid.
    pub fn expired_session_cookie(&self, id: &str, rank: Rank) -> String {
        let issued = now() - 600;
        self.session_cookie_at(id, rank, issued, issued)
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    request("GET", uri, cookie, Body::empty())
}

pub fn json(
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut request = request(method, uri, cookie, Body::from(body.to_string()));
    request.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    request
}

fn request(method: &str, uri: &str, cookie: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(body).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// All `set-cookie` values of a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Value set for cookie `name`, if the response sets it.
pub fn set_cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(response).into_iter().find_map(|cookie| {
        cookie
            .split(';')
            .next()
            .and_then(|pair| pair.strip_prefix(&prefix))
            .map(str::to_string)
    })
}
