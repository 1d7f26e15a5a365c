mod boards;
mod error;
mod session;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::TokenService;
use crate::rate_limit::RateLimitConfig;

pub use error::{ApiError, ResultExt};

/// Create the API router.
pub fn create_api_router(
    db: Database,
    tokens: Arc<TokenService>,
    secure_cookies: bool,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let session_state = session::SessionApiState {
        db: db.clone(),
        tokens,
        secure_cookies,
        rate_limit_config: rate_limit_config.clone(),
    };

    let boards_state = boards::BoardsState {
        db: db.clone(),
        secure_cookies,
    };

    let users_state = users::UsersState {
        db,
        secure_cookies,
        rate_limit_config,
    };

    Router::new()
        .nest("/users", users::router(users_state))
        .nest("/session", session::router(session_state))
        .nest("/boards", boards::router(boards_state))
}
