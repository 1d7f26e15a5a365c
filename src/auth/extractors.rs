//! Axum extractors reading the identity attached by the session middleware.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::error;

use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthState;
use super::types::Identity;
use crate::directory::UserDirectory;
use crate::visibility::Blocklist;

/// Optional authentication extractor - never fails.
/// Useful for endpoints that work both authenticated and unauthenticated.
pub struct OptionalAuth(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(parts.extensions.get::<Identity>().cloned()))
    }
}

/// Extractor for endpoints that require a session.
/// Returns a JSON 401 and clears the session cookies otherwise.
pub struct Auth(pub Identity);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(Auth)
            .ok_or_else(|| {
                ApiAuthError::new(AuthErrorKind::NotAuthenticated, state.secure_cookies())
            })
    }
}

/// The reader of a listing: optional identity plus their blocklist.
/// Anonymous readers get an empty blocklist.
pub struct Viewer {
    pub identity: Option<Identity>,
    pub blocklist: Blocklist,
}

impl<S> FromRequestParts<S> for Viewer
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts.extensions.get::<Identity>().cloned();

        let blocklist = match &identity {
            Some(identity) => state
                .db()
                .users()
                .blocklist(&identity.subject_id)
                .await
                .map_err(|e| {
                    error!(subject = %identity.subject_id, error = %e, "Failed to load blocklist");
                    ApiAuthError::new(AuthErrorKind::DatabaseError, state.secure_cookies())
                })?,
            None => Blocklist::default(),
        };

        Ok(Viewer {
            identity,
            blocklist,
        })
    }
}
