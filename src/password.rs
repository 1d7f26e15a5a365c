//! Argon2 password hashing.
//!
//! Hashing is CPU-bound, so both operations run on the blocking pool.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use tracing::warn;

const SALT_LEN: usize = 16;

/// Hash a password into a PHC string.
pub async fn hash_password(plaintext: &str) -> Result<String, PasswordError> {
    let plaintext = plaintext.to_owned();
    tokio::task::spawn_blocking(move || hash_blocking(&plaintext))
        .await
        .map_err(|e| PasswordError::Join(e.to_string()))?
}

/// Check a password against a stored PHC string.
/// Malformed hashes never verify.
pub async fn verify_password(hash: &str, plaintext: &str) -> bool {
    let hash = hash.to_owned();
    let plaintext = plaintext.to_owned();
    match tokio::task::spawn_blocking(move || verify_blocking(&hash, &plaintext)).await {
        Ok(valid) => valid,
        Err(e) => {
            warn!(error = %e, "Password verification task failed");
            false
        }
    }
}

fn hash_blocking(plaintext: &str) -> Result<String, PasswordError> {
    let salt_bytes: [u8; SALT_LEN] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordError::Hash)?;
    let hash = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(PasswordError::Hash)?;
    Ok(hash.to_string())
}

fn verify_blocking(hash: &str, plaintext: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "Stored password hash is malformed");
            return false;
        }
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

#[derive(Debug)]
pub enum PasswordError {
    /// Argon2 rejected the input
    Hash(argon2::password_hash::Error),
    /// The blocking task panicked or was cancelled
    Join(String),
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordError::Hash(e) => write!(f, "Failed to hash password: {}", e),
            PasswordError::Join(e) => write!(f, "Hashing task failed: {}", e),
        }
    }
}

impl std::error::Error for PasswordError {}
