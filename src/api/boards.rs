//! Board API endpoints.
//!
//! - GET `/` - List public boards
//! - POST `/` - Create a board (admin only)
//! - PUT `/{id}/permissions` - Replace a board's permission map (admin only)
//! - GET `/{id}/permissions/{key}` - Check a permission for the current user
//! - GET `/{id}/articles` - Recent articles, minus those the reader blocked
//! - POST `/{id}/articles` - Post an article (requires the `write` permission)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{ApiError, ResultExt};
use crate::auth::{Auth, Identity, OptionalAuth, Viewer};
use crate::db::{Article, Board, Database, NewArticle, Rank};
use crate::directory::UserDirectory;
use crate::impl_has_auth_state;
use crate::permissions::{Decision, PermissionMap, Requester, WRITE_PERMISSION, evaluate};

/// Number of visible articles returned by a board listing.
const ARTICLE_LIST_LIMIT: i64 = 50;

const MAX_TITLE_LENGTH: usize = 200;

#[derive(Clone)]
pub struct BoardsState {
    pub db: Database,
    pub secure_cookies: bool,
}

impl_has_auth_state!(BoardsState);

pub fn router(state: BoardsState) -> Router {
    Router::new()
        .route("/", get(list_boards).post(create_board))
        .route("/{id}/permissions", put(replace_permissions))
        .route("/{id}/permissions/{key}", get(check_permission))
        .route("/{id}/articles", get(list_articles).post(create_article))
        .with_state(state)
}

impl BoardsState {
    /// Reject callers whose current rank is below Admin.
    async fn require_admin(&self, identity: &Identity) -> Result<(), ApiError> {
        let rank = self.db.users().rank(&identity.subject_id).await?;
        if rank.is_none_or(|rank| rank < Rank::ADMIN) {
            return Err(ApiError::forbidden("Admin access required"));
        }
        Ok(())
    }

    /// Evaluate a board permission with the user's current rank rather than
    /// the one embedded in their access token.
    async fn decide(
        &self,
        board_id: i64,
        key: &str,
        identity: &Identity,
    ) -> Result<Decision, ApiError> {
        let map = self
            .db
            .boards()
            .permission_map(board_id)
            .await
            .db_err("Failed to load board permissions")?
            .ok_or_else(|| ApiError::not_found("Board not found"))?;

        let Some(rank) = self.db.users().rank(&identity.subject_id).await? else {
            return Ok(Decision::Deny);
        };

        let requester = Requester {
            id: &identity.subject_id,
            rank,
        };
        Ok(evaluate(&map, key, &requester))
    }
}

#[derive(Serialize)]
struct BoardsResponse {
    boards: Vec<Board>,
}

async fn list_boards(State(state): State<BoardsState>) -> Result<impl IntoResponse, ApiError> {
    let boards = state
        .db
        .boards()
        .list_public()
        .await
        .db_err("Failed to list boards")?;

    Ok(Json(BoardsResponse { boards }))
}

#[derive(Deserialize)]
struct CreateBoardRequest {
    name: String,
    #[serde(default = "default_public")]
    public: bool,
    #[serde(default)]
    permissions: PermissionMap,
}

fn default_public() -> bool {
    true
}

#[derive(Serialize)]
struct CreatedResponse {
    id: i64,
}

async fn create_board(
    State(state): State<BoardsState>,
    Auth(identity): Auth,
    Json(payload): Json<CreateBoardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.require_admin(&identity).await?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Board name cannot be empty"));
    }

    let id = state
        .db
        .boards()
        .create(name, payload.public, &payload.permissions)
        .await
        .db_err("Failed to create board")?;

    info!(board_id = id, admin = %identity.subject_id, "Board created");

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn replace_permissions(
    State(state): State<BoardsState>,
    Auth(identity): Auth,
    Path(board_id): Path<i64>,
    Json(permissions): Json<PermissionMap>,
) -> Result<impl IntoResponse, ApiError> {
    state.require_admin(&identity).await?;

    let updated = state
        .db
        .boards()
        .set_permission_map(board_id, &permissions)
        .await
        .db_err("Failed to update board permissions")?;
    if !updated {
        return Err(ApiError::not_found("Board not found"));
    }

    info!(board_id, admin = %identity.subject_id, "Board permissions replaced");

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct PermissionResponse {
    allowed: bool,
}

async fn check_permission(
    State(state): State<BoardsState>,
    OptionalAuth(identity): OptionalAuth,
    Path((board_id, key)): Path<(i64, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let allowed = match identity {
        Some(identity) => state.decide(board_id, &key, &identity).await?.is_allowed(),
        None => {
            // Unknown boards are still reported for anonymous readers.
            state
                .db
                .boards()
                .get(board_id)
                .await
                .db_err("Failed to get board")?
                .ok_or_else(|| ApiError::not_found("Board not found"))?;
            false
        }
    };

    Ok(Json(PermissionResponse { allowed }))
}

#[derive(Serialize)]
struct ArticlesResponse {
    articles: Vec<Article>,
}

async fn list_articles(
    State(state): State<BoardsState>,
    viewer: Viewer,
    Path(board_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .boards()
        .get(board_id)
        .await
        .db_err("Failed to get board")?
        .ok_or_else(|| ApiError::not_found("Board not found"))?;

    // Hidden articles do not count towards the page; keep reading older ones.
    let mut articles = Vec::new();
    let mut before = None;
    loop {
        let page = state
            .db
            .articles()
            .list_recent(board_id, before, ARTICLE_LIST_LIMIT)
            .await
            .db_err("Failed to list articles")?;
        let exhausted = page.len() < ARTICLE_LIST_LIMIT as usize;
        before = page.last().map(|article| article.id);

        articles.extend(viewer.blocklist.retain_visible(page));
        if exhausted || articles.len() >= ARTICLE_LIST_LIMIT as usize {
            break;
        }
    }
    articles.truncate(ARTICLE_LIST_LIMIT as usize);

    Ok(Json(ArticlesResponse { articles }))
}

#[derive(Deserialize)]
struct CreateArticleRequest {
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    tags: Vec<String>,
}

async fn create_article(
    State(state): State<BoardsState>,
    Auth(identity): Auth,
    Path(board_id): Path<i64>,
    Json(payload): Json<CreateArticleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let decision = state.decide(board_id, WRITE_PERMISSION, &identity).await?;
    if !decision.is_allowed() {
        return Err(ApiError::forbidden("You may not write on this board"));
    }

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("Title cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Title cannot be longer than {} characters",
            MAX_TITLE_LENGTH
        )));
    }

    let tags: Vec<String> = payload
        .tags
        .iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();

    let id = state
        .db
        .articles()
        .create(&NewArticle {
            board_id,
            author_id: &identity.subject_id,
            title,
            content: &payload.content,
            tags: &tags,
        })
        .await
        .db_err("Failed to create article")?;

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}
