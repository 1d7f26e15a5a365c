//! User registration and per-user blocklists.
//!
//! - POST `/` - Register a new user
//! - GET|POST|DELETE `/me/blocked-users` - Blocked authors of the current user
//! - GET|POST|DELETE `/me/blocked-tags` - Blocked tags of the current user

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt, validate_names};
use crate::auth::Auth;
use crate::db::{BlockedUser, Database, Rank};
use crate::directory::UserDirectory;
use crate::impl_has_auth_state;
use crate::rate_limit::{RateLimitConfig, rate_limit_register};

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub secure_cookies: bool,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_state!(UsersState);

pub fn router(state: UsersState) -> Router {
    let register_router = Router::new()
        .route("/", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_register,
        ));

    let blocklist_router = Router::new()
        .route(
            "/me/blocked-users",
            get(list_blocked_users)
                .post(block_user)
                .delete(unblock_users),
        )
        .route(
            "/me/blocked-tags",
            get(list_blocked_tags).post(block_tags).delete(unblock_tags),
        )
        .with_state(state);

    Router::new().merge(register_router).merge(blocklist_router)
}

#[derive(Deserialize)]
struct RegisterRequest {
    id: String,
    password: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    id: String,
    rank: Rank,
}

async fn register(
    State(state): State<UsersState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = payload.id.trim();

    state.db.users().register(id, &payload.password).await?;
    info!(user = %id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: id.to_string(),
            rank: Rank::USER,
        }),
    ))
}

#[derive(Serialize)]
struct BlockedUsersResponse {
    users: Vec<BlockedUser>,
}

async fn list_blocked_users(
    State(state): State<UsersState>,
    Auth(identity): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .db
        .users()
        .list_blocked_users(&identity.subject_id)
        .await
        .db_err("Failed to list blocked users")?;

    Ok(Json(BlockedUsersResponse { users }))
}

#[derive(Deserialize)]
struct BlockUserRequest {
    id: String,
    #[serde(default)]
    reason: String,
}

async fn block_user(
    State(state): State<UsersState>,
    Auth(identity): Auth,
    Json(payload): Json<BlockUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target = payload.id.trim();

    if target.is_empty() {
        return Err(ApiError::bad_request("User id cannot be empty"));
    }
    if target == identity.subject_id {
        return Err(ApiError::bad_request("You cannot block yourself"));
    }

    let users = state.db.users();
    if !users.exists(target).await? {
        return Err(ApiError::not_found("User not found"));
    }

    users
        .block_user(&identity.subject_id, target, payload.reason.trim())
        .await
        .db_err("Failed to block user")?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct UnblockUsersRequest {
    ids: Vec<String>,
}

#[derive(Serialize)]
struct RemovedResponse {
    removed: u64,
}

async fn unblock_users(
    State(state): State<UsersState>,
    Auth(identity): Auth,
    Json(payload): Json<UnblockUsersRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ids = validate_names(&payload.ids, "user")?;

    let removed = state
        .db
        .users()
        .unblock_users(&identity.subject_id, &ids)
        .await
        .db_err("Failed to unblock users")?;

    Ok(Json(RemovedResponse { removed }))
}

#[derive(Serialize)]
struct BlockedTagsResponse {
    tags: Vec<String>,
}

async fn list_blocked_tags(
    State(state): State<UsersState>,
    Auth(identity): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let mut tags: Vec<String> = state
        .db
        .users()
        .blocked_tags(&identity.subject_id)
        .await?
        .into_iter()
        .collect();
    tags.sort();

    Ok(Json(BlockedTagsResponse { tags }))
}

#[derive(Deserialize)]
struct TagsRequest {
    tags: Vec<String>,
}

async fn block_tags(
    State(state): State<UsersState>,
    Auth(identity): Auth,
    Json(payload): Json<TagsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tags = validate_names(&payload.tags, "tag")?;

    state
        .db
        .users()
        .block_tags(&identity.subject_id, &tags)
        .await
        .db_err("Failed to block tags")?;

    Ok(StatusCode::NO_CONTENT)
}

async fn unblock_tags(
    State(state): State<UsersState>,
    Auth(identity): Auth,
    Json(payload): Json<TagsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tags = validate_names(&payload.tags, "tag")?;

    let removed = state
        .db
        .users()
        .unblock_tags(&identity.subject_id, &tags)
        .await
        .db_err("Failed to unblock tags")?;

    Ok(Json(RemovedResponse { removed }))
}
