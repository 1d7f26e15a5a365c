//! Cookie session authentication.
//!
//! Dual-token system: short-lived access tokens (5 min) and long-lived
//! refresh tokens (2 weeks), both stateless. The session middleware silently
//! re-issues an expired access token while the refresh token is valid, using
//! the user's current rank.

mod cookie;
mod errors;
mod extractors;
mod middleware;
mod resolve;
mod state;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, access_cookie, clear_cookie, get_cookie,
    parse_cookies, refresh_cookie, request_cookies,
};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{Auth, OptionalAuth, Viewer};
pub use middleware::{DEFAULT_RESOLVE_TIMEOUT, SessionState, session_layer};
pub use resolve::{ResolveError, resolve, resolve_at};
pub use state::HasAuthState;
pub use types::{Identity, Resolution};
