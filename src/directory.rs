//! The user directory contract.
//!
//! Session resolution only needs `rank`; the API layer uses the rest. The
//! SQLite-backed implementation is [`crate::db::UserStore`].

use std::collections::HashSet;
use std::future::Future;

use crate::db::Rank;
use crate::password::PasswordError;
use crate::visibility::Blocklist;

/// Minimum user id length, in characters.
pub const MIN_ID_LENGTH: usize = 3;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Read/write access to user records.
pub trait UserDirectory: Send + Sync {
    /// Current rank of a user, `None` if the user does not exist.
    fn rank(&self, id: &str) -> impl Future<Output = Result<Option<Rank>, DirectoryError>> + Send;

    fn blocked_users(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<HashSet<String>, DirectoryError>> + Send;

    fn blocked_tags(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<HashSet<String>, DirectoryError>> + Send;

    fn exists(&self, id: &str) -> impl Future<Output = Result<bool, DirectoryError>> + Send;

    /// Check a plaintext password. Unknown users never verify.
    fn verify_password(
        &self,
        id: &str,
        plaintext: &str,
    ) -> impl Future<Output = Result<bool, DirectoryError>> + Send;

    /// Create a user with the default rank.
    fn register(
        &self,
        id: &str,
        plaintext: &str,
    ) -> impl Future<Output = Result<(), RegisterError>> + Send;

    /// Load both blocklists of a user.
    fn blocklist(&self, id: &str) -> impl Future<Output = Result<Blocklist, DirectoryError>> + Send {
        async move {
            let users = self.blocked_users(id).await?;
            let tags = self.blocked_tags(id).await?;
            Ok(Blocklist::new(users, tags))
        }
    }
}

/// Check registration input. Lengths are counted in characters.
pub fn validate_registration(id: &str, password: &str) -> Result<(), RegisterError> {
    if id.chars().count() < MIN_ID_LENGTH {
        return Err(RegisterError::Validation(format!(
            "Id must be at least {} characters",
            MIN_ID_LENGTH
        )));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(RegisterError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Failure talking to the backing store.
#[derive(Debug)]
pub enum DirectoryError {
    /// Store query failed
    Database(sqlx::Error),
    /// Password hashing failed
    Password(PasswordError),
    /// Store unavailable for another reason
    Unavailable(String),
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::Database(e) => write!(f, "Database error: {}", e),
            DirectoryError::Password(e) => write!(f, "Password error: {}", e),
            DirectoryError::Unavailable(msg) => write!(f, "Directory unavailable: {}", msg),
        }
    }
}

impl std::error::Error for DirectoryError {}

impl From<sqlx::Error> for DirectoryError {
    fn from(e: sqlx::Error) -> Self {
        DirectoryError::Database(e)
    }
}

impl From<PasswordError> for DirectoryError {
    fn from(e: PasswordError) -> Self {
        DirectoryError::Password(e)
    }
}

/// Why a registration was rejected.
#[derive(Debug)]
pub enum RegisterError {
    /// A user with this id already exists
    AlreadyExists,
    /// Id or password does not meet the length rules
    Validation(String),
    /// The store failed
    Directory(DirectoryError),
}

impl std::fmt::Display for RegisterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterError::AlreadyExists => write!(f, "User already exists"),
            RegisterError::Validation(msg) => write!(f, "{}", msg),
            RegisterError::Directory(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RegisterError {}

impl From<DirectoryError> for RegisterError {
    fn from(e: DirectoryError) -> Self {
        RegisterError::Directory(e)
    }
}
