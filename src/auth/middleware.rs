//! Per-request session middleware.
//!
//! Resolves the session cookies before the handler runs and attaches the
//! [`Identity`] to the request extensions. When the access token was rotated,
//! the new token is set as a cookie on the way out. Authentication problems
//! never fail the request; they only make it anonymous.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, access_cookie, request_cookies};
use super::resolve::resolve;
use super::types::{Identity, Resolution};
use crate::directory::UserDirectory;
use crate::jwt::TokenService;

/// Default upper bound on session resolution.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// State for [`session_layer`].
#[derive(Clone)]
pub struct SessionState<D> {
    pub tokens: Arc<TokenService>,
    pub directory: D,
    pub secure_cookies: bool,
    pub resolve_timeout: Duration,
}

impl<D> SessionState<D> {
    pub fn new(tokens: Arc<TokenService>, directory: D, secure_cookies: bool) -> Self {
        Self {
            tokens,
            directory,
            secure_cookies,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }
}

/// Resolve the request's session and set the rotated access token cookie.
///
/// Use with `axum::middleware::from_fn_with_state(state, session_layer::<D>)`.
pub async fn session_layer<D>(
    State(state): State<SessionState<D>>,
    mut request: Request,
    next: Next,
) -> Response
where
    D: UserDirectory + Clone + 'static,
{
    let cookies = request_cookies(request.headers());
    let resolution = resolve_cookies(&state, &cookies).await;

    let rotated_cookie = match resolution {
        Resolution::Anonymous => None,
        Resolution::Authenticated(identity) => {
            request.extensions_mut().insert::<Identity>(identity);
            None
        }
        Resolution::Rotated {
            identity,
            access_token,
        } => {
            request.extensions_mut().insert::<Identity>(identity);
            Some(access_cookie(
                &access_token.token,
                access_token.duration,
                state.secure_cookies,
            ))
        }
    };

    let mut response = next.run(request).await;

    // A handler that set the access cookie itself (login, logout) has the last word.
    let rotated_cookie = rotated_cookie.filter(|_| !sets_cookie(&response, ACCESS_COOKIE_NAME));
    if let Some(cookie) = rotated_cookie {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => error!(error = %e, "Failed to set refreshed access token cookie"),
        }
    }

    response
}

fn sets_cookie(response: &Response, name: &str) -> bool {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| {
            value
                .split_once('=')
                .is_some_and(|(cookie, _)| cookie.trim() == name)
        })
}

async fn resolve_cookies<D>(
    state: &SessionState<D>,
    cookies: &HashMap<String, String>,
) -> Resolution
where
    D: UserDirectory,
{
    let access = cookies.get(ACCESS_COOKIE_NAME).map(String::as_str);
    let refresh = cookies.get(REFRESH_COOKIE_NAME).map(String::as_str);

    let resolving = resolve(&state.tokens, &state.directory, access, refresh);
    match tokio::time::timeout(state.resolve_timeout, resolving).await {
        Ok(Ok(resolution)) => resolution,
        Ok(Err(e)) => {
            warn!(error = %e, "Session resolution failed, continuing anonymously");
            Resolution::Anonymous
        }
        Err(_) => {
            warn!(
                timeout_ms = state.resolve_timeout.as_millis() as u64,
                "Session resolution timed out, continuing anonymously"
            );
            Resolution::Anonymous
        }
    }
}
