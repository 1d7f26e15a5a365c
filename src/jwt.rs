//! Access and refresh token issuing and verification.
//!
//! Verification and expiry are separate decisions: an expired access token is
//! still a valid token whose subject can be refreshed.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::Rank;

/// Which cookie slot a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    /// Short-lived token presented on every request
    Access,
    /// Long-lived token only used to mint access tokens
    Refresh,
}

/// JWT claims shared by both scopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer
    pub iss: String,
    /// Subject (user id)
    pub sub: String,
    pub scope: TokenScope,
    /// Rank at issue time
    pub rank: Rank,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl Claims {
    /// Expired once the current time reaches `exp`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.exp <= now
    }
}

/// Access token duration: 5 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 5 * 60;

/// Refresh token duration: 2 weeks
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 14 * 24 * 60 * 60;

/// Lifetimes per scope, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenDurations {
    pub access: u64,
    pub refresh: u64,
}

impl Default for TokenDurations {
    fn default() -> Self {
        Self {
            access: ACCESS_TOKEN_DURATION_SECS,
            refresh: REFRESH_TOKEN_DURATION_SECS,
        }
    }
}

/// A freshly signed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    pub claims: Claims,
    /// Token duration in seconds
    pub duration: u64,
}

/// Signs and verifies tokens with one HMAC secret and one issuer.
#[derive(Clone)]
pub struct TokenService {
    issuer: String,
    durations: TokenDurations,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Self {
            issuer,
            durations: TokenDurations::default(),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn with_durations(mut self, durations: TokenDurations) -> Self {
        self.durations = durations;
        self
    }

    pub fn duration(&self, scope: TokenScope) -> u64 {
        match scope {
            TokenScope::Access => self.durations.access,
            TokenScope::Refresh => self.durations.refresh,
        }
    }

    /// Issue a token of the given scope for a user.
    pub fn issue(
        &self,
        scope: TokenScope,
        subject_id: &str,
        rank: Rank,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(scope, subject_id, rank, now_secs()?)
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        scope: TokenScope,
        subject_id: &str,
        rank: Rank,
        now: u64,
    ) -> Result<IssuedToken, TokenError> {
        let duration = self.duration(scope);
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: subject_id.to_string(),
            scope,
            rank,
            iat: now,
            exp: now.saturating_add(duration),
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)?;

        Ok(IssuedToken {
            token,
            claims,
            duration,
        })
    }

    /// Check signature, issuer and structure. Expired tokens still verify.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(TokenError::Decoding)?;
        Ok(token_data.claims)
    }

    /// Verify a token read from the cookie slot of `scope`.
    pub fn verify_scoped(&self, token: &str, scope: TokenScope) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.scope != scope {
            return Err(TokenError::WrongScope);
        }
        Ok(claims)
    }

    /// A clock failure counts as expired.
    pub fn is_expired(&self, claims: &Claims) -> bool {
        match now_secs() {
            Ok(now) => claims.is_expired_at(now),
            Err(_) => true,
        }
    }
}

pub(crate) fn now_secs() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| TokenError::TimeError)
}

/// Errors that can occur during token operations.
#[derive(Debug)]
pub enum TokenError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Bad signature, issuer or structure
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Token read from the wrong cookie slot
    WrongScope,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            TokenError::TimeError => write!(f, "System time error"),
            TokenError::WrongScope => write!(f, "Wrong token scope"),
        }
    }
}

impl std::error::Error for TokenError {}
