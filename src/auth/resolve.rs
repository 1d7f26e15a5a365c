//! Session resolution: verify, check expiry, refresh, re-issue.

use tracing::debug;

use super::types::{Identity, Resolution};
use crate::directory::{DirectoryError, UserDirectory};
use crate::jwt::{TokenError, TokenScope, TokenService, now_secs};

/// Resolve the session carried by the access and refresh cookies.
///
/// Missing, forged and expired tokens all resolve to `Anonymous`. Only a
/// failing directory lookup or a failure to sign the new access token is an
/// error.
pub async fn resolve<D>(
    tokens: &TokenService,
    directory: &D,
    access_token: Option<&str>,
    refresh_token: Option<&str>,
) -> Result<Resolution, ResolveError>
where
    D: UserDirectory,
{
    let now = now_secs()?;
    resolve_at(tokens, directory, access_token, refresh_token, now).await
}

/// Resolve as if the current time were `now`.
pub async fn resolve_at<D>(
    tokens: &TokenService,
    directory: &D,
    access_token: Option<&str>,
    refresh_token: Option<&str>,
    now: u64,
) -> Result<Resolution, ResolveError>
where
    D: UserDirectory,
{
    let Some(access_token) = access_token else {
        return Ok(Resolution::Anonymous);
    };

    let access = match tokens.verify_scoped(access_token, TokenScope::Access) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "Rejected access token");
            return Ok(Resolution::Anonymous);
        }
    };

    if !access.is_expired_at(now) {
        return Ok(Resolution::Authenticated(Identity::from(&access)));
    }

    let Some(refresh_token) = refresh_token else {
        debug!(subject = %access.sub, "Access token expired without refresh token");
        return Ok(Resolution::Anonymous);
    };

    let refresh = match tokens.verify_scoped(refresh_token, TokenScope::Refresh) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "Rejected refresh token");
            return Ok(Resolution::Anonymous);
        }
    };

    if refresh.is_expired_at(now) {
        debug!(subject = %refresh.sub, "Session expired");
        return Ok(Resolution::Anonymous);
    }

    if refresh.sub != access.sub {
        debug!(
            access_subject = %access.sub,
            refresh_subject = %refresh.sub,
            "Access and refresh tokens belong to different users"
        );
        return Ok(Resolution::Anonymous);
    }

    // The rank may have changed since either token was issued.
    let Some(rank) = directory.rank(&refresh.sub).await? else {
        debug!(subject = %refresh.sub, "Refresh token for unknown user");
        return Ok(Resolution::Anonymous);
    };

    let access_token = tokens.issue_at(TokenScope::Access, &refresh.sub, rank, now)?;
    let identity = Identity::from(&access_token.claims);
    debug!(subject = %identity.subject_id, rank = %rank, "Rotated access token");

    Ok(Resolution::Rotated {
        identity,
        access_token,
    })
}

/// Failure while resolving a session.
#[derive(Debug)]
pub enum ResolveError {
    Directory(DirectoryError),
    Token(TokenError),
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::Directory(e) => write!(f, "User lookup failed: {}", e),
            ResolveError::Token(e) => write!(f, "Token error: {}", e),
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<DirectoryError> for ResolveError {
    fn from(e: DirectoryError) -> Self {
        ResolveError::Directory(e)
    }
}

impl From<TokenError> for ResolveError {
    fn from(e: TokenError) -> Self {
        ResolveError::Token(e)
    }
}
