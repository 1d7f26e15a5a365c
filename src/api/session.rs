//! Session endpoints.
//!
//! - POST `/` - Log in with id and password, sets both session cookies
//! - GET `/` - Current identity, or `null` when anonymous
//! - DELETE `/` - Log out, clears both session cookies

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

use super::error::ApiError;
use crate::auth::{
    ACCESS_COOKIE_NAME, Identity, OptionalAuth, REFRESH_COOKIE_NAME, access_cookie, clear_cookie,
    refresh_cookie,
};
use crate::db::Database;
use crate::directory::UserDirectory;
use crate::jwt::{TokenScope, TokenService};
use crate::rate_limit::{RateLimitConfig, rate_limit_login};

#[derive(Clone)]
pub struct SessionApiState {
    pub db: Database,
    pub tokens: Arc<TokenService>,
    pub secure_cookies: bool,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

pub fn router(state: SessionApiState) -> Router {
    let login_router = Router::new()
        .route("/", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    let session_router = Router::new()
        .route("/", get(current).delete(logout))
        .with_state(state);

    Router::new().merge(login_router).merge(session_router)
}

#[derive(Deserialize)]
struct LoginRequest {
    id: String,
    password: String,
}

async fn login(
    State(state): State<SessionApiState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = payload.id.trim();
    let users = state.db.users();

    if !users.verify_password(id, &payload.password).await? {
        info!(user = %id, "Failed login attempt");
        return Err(ApiError::unauthorized("Invalid id or password"));
    }

    let rank = users
        .rank(id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid id or password"))?;

    let issue = |scope| {
        state.tokens.issue(scope, id, rank).map_err(|e| {
            error!(user = %id, scope = ?scope, error = %e, "Failed to issue token");
            ApiError::internal("Failed to create session")
        })
    };
    let access = issue(TokenScope::Access)?;
    let refresh = issue(TokenScope::Refresh)?;

    info!(user = %id, rank = %rank, "User logged in");

    Ok((
        StatusCode::OK,
        AppendHeaders([
            (
                SET_COOKIE,
                access_cookie(&access.token, access.duration, state.secure_cookies),
            ),
            (
                SET_COOKIE,
                refresh_cookie(&refresh.token, refresh.duration, state.secure_cookies),
            ),
        ]),
        Json(Identity::from(&access.claims)),
    ))
}

async fn current(OptionalAuth(identity): OptionalAuth) -> Json<Option<Identity>> {
    Json(identity)
}

async fn logout(State(state): State<SessionApiState>) -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        AppendHeaders([
            (
                SET_COOKIE,
                clear_cookie(ACCESS_COOKIE_NAME, state.secure_cookies),
            ),
            (
                SET_COOKIE,
                clear_cookie(REFRESH_COOKIE_NAME, state.secure_cookies),
            ),
        ]),
    )
}
