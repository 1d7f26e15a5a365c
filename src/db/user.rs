use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use crate::directory::{DirectoryError, RegisterError, UserDirectory, validate_registration};
use crate::password;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// Global privilege level. Higher is more privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(pub i64);

impl Rank {
    pub const BANNED: Rank = Rank(0);
    pub const USER: Rank = Rank(1);
    pub const MODERATOR: Rank = Rank(50);
    pub const ADMIN: Rank = Rank(100);

    /// Banned users hold the `BANNED` rank or anything below it.
    pub fn is_banned(self) -> bool {
        self <= Self::BANNED
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub rank: Rank,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    user_rank: i64,
    created_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            rank: Rank(row.user_rank),
            created_at: row.created_at,
        }
    }
}

/// A blocked author together with the reason given when blocking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedUser {
    pub id: String,
    pub reason: String,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a user by id.
    pub async fn get(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, user_rank, created_at FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// Set the rank for a user.
    pub async fn set_rank(&self, id: &str, rank: Rank) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET user_rank = ? WHERE id = ?")
            .bind(rank.0)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Block an author. Blocking the same author again replaces the reason.
    pub async fn block_user(
        &self,
        id: &str,
        target: &str,
        reason: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO blocked_users (user_id, blocked_id, reason) VALUES (?, ?, ?)
             ON CONFLICT (user_id, blocked_id) DO UPDATE SET reason = excluded.reason",
        )
        .bind(id)
        .bind(target)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove authors from the blocklist. Returns how many entries were removed.
    pub async fn unblock_users(&self, id: &str, targets: &[String]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for target in targets {
            let result =
                sqlx::query("DELETE FROM blocked_users WHERE user_id = ? AND blocked_id = ?")
                    .bind(id)
                    .bind(target)
                    .execute(&mut *tx)
                    .await?;
            removed += result.rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }

    /// List blocked authors with their reasons, oldest first.
    pub async fn list_blocked_users(&self, id: &str) -> Result<Vec<BlockedUser>, sqlx::Error> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT blocked_id, reason FROM blocked_users WHERE user_id = ? ORDER BY created_at, blocked_id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, reason)| BlockedUser { id, reason })
            .collect())
    }

    /// Add tags to the blocklist. Tags already blocked are ignored.
    pub async fn block_tags(&self, id: &str, tags: &[String]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for tag in tags {
            sqlx::query("INSERT OR IGNORE INTO blocked_tags (user_id, tag) VALUES (?, ?)")
                .bind(id)
                .bind(tag)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Remove tags from the blocklist. Returns how many entries were removed.
    pub async fn unblock_tags(&self, id: &str, tags: &[String]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for tag in tags {
            let result = sqlx::query("DELETE FROM blocked_tags WHERE user_id = ? AND tag = ?")
                .bind(id)
                .bind(tag)
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }
}

impl UserDirectory for UserStore {
    async fn rank(&self, id: &str) -> Result<Option<Rank>, DirectoryError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT user_rank FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(rank,)| Rank(rank)))
    }

    async fn blocked_users(&self, id: &str) -> Result<HashSet<String>, DirectoryError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT blocked_id FROM blocked_users WHERE user_id = ?")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(blocked,)| blocked).collect())
    }

    async fn blocked_tags(&self, id: &str) -> Result<HashSet<String>, DirectoryError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT tag FROM blocked_tags WHERE user_id = ?")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(tag,)| tag).collect())
    }

    async fn exists(&self, id: &str) -> Result<bool, DirectoryError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    async fn verify_password(&self, id: &str, plaintext: &str) -> Result<bool, DirectoryError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT password_hash FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some((hash,)) => Ok(password::verify_password(&hash, plaintext).await),
            None => Ok(false),
        }
    }

    async fn register(&self, id: &str, plaintext: &str) -> Result<(), RegisterError> {
        if self.exists(id).await? {
            return Err(RegisterError::AlreadyExists);
        }
        validate_registration(id, plaintext)?;

        let hash = password::hash_password(plaintext)
            .await
            .map_err(DirectoryError::from)?;

        sqlx::query("INSERT INTO users (id, password_hash, user_rank) VALUES (?, ?, ?)")
            .bind(id)
            .bind(&hash)
            .bind(Rank::USER.0)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                // Two registrations racing past the existence check.
                let unique = e
                    .as_database_error()
                    .is_some_and(|db_err| db_err.is_unique_violation());
                if unique {
                    RegisterError::AlreadyExists
                } else {
                    RegisterError::Directory(e.into())
                }
            })?;
        Ok(())
    }
}
