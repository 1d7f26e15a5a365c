pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod directory;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod rate_limit;
pub mod visibility;

use api::create_api_router;
use auth::{SessionState, session_layer};
use axum::{Router, middleware};
use db::{Database, UserStore};
use jwt::{TokenDurations, TokenService};
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Token issuer, the public origin of the server
    pub issuer: String,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Access and refresh token lifetimes
    pub token_durations: TokenDurations,
    /// Limiters for login and registration
    pub rate_limit: Arc<RateLimitConfig>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let tokens = Arc::new(
        TokenService::new(&config.jwt_secret, config.issuer.clone())
            .with_durations(config.token_durations),
    );

    let session = SessionState::new(tokens.clone(), config.db.users(), config.secure_cookies);

    let api_router = create_api_router(
        config.db.clone(),
        tokens,
        config.secure_cookies,
        config.rate_limit.clone(),
    );

    Router::new()
        .nest("/api", api_router)
        .layer(middleware::from_fn_with_state(
            session,
            session_layer::<UserStore>,
        ))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
