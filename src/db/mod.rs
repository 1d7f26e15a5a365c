mod article;
mod board;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use article::{Article, ArticleStore, NewArticle};
pub use board::{Board, BoardStore};
pub use user::{BlockedUser, Rank, User, UserStore};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // Users table
                "CREATE TABLE users (
                    id TEXT PRIMARY KEY NOT NULL,
                    password_hash TEXT NOT NULL,
                    user_rank INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                // Per-user blocked authors
                "CREATE TABLE blocked_users (
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    blocked_id TEXT NOT NULL,
                    reason TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    PRIMARY KEY (user_id, blocked_id)
                )",
                // Per-user blocked tags
                "CREATE TABLE blocked_tags (
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    tag TEXT NOT NULL,
                    PRIMARY KEY (user_id, tag)
                )",
                // Boards with their permission map as JSON
                "CREATE TABLE boards (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    public INTEGER NOT NULL DEFAULT 1,
                    permissions TEXT NOT NULL DEFAULT '{}',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_boards_public ON boards(public)",
                // Articles; tags kept as a JSON array
                "CREATE TABLE articles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                    author_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL DEFAULT '',
                    tags TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_articles_board ON articles(board_id, id)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the board store.
    pub fn boards(&self) -> BoardStore {
        BoardStore::new(self.pool.clone())
    }

    /// Get the article store.
    pub fn articles(&self) -> ArticleStore {
        ArticleStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{RegisterError, UserDirectory};

    #[tokio::test]
    async fn test_register_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        db.users().register("alice", "secret123").await.unwrap();

        let user = db.users().get("alice").await.unwrap().unwrap();
        assert_eq!(user.id, "alice");
        assert_eq!(user.rank, Rank::USER);
        assert!(db.users().exists("alice").await.unwrap());
        assert!(!db.users().exists("bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_registration_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.users().register("alice", "secret123").await.unwrap();
        let result = db.users().register("alice", "other-password").await;

        assert!(matches!(result, Err(RegisterError::AlreadyExists)));
    }

    #[tokio::test]
    async fn test_registration_validation() {
        let db = Database::open(":memory:").await.unwrap();

        let short_id = db.users().register("al", "secret123").await;
        assert!(matches!(short_id, Err(RegisterError::Validation(_))));

        let short_password = db.users().register("alice", "12345").await;
        assert!(matches!(short_password, Err(RegisterError::Validation(_))));

        assert!(!db.users().exists("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_password() {
        let db = Database::open(":memory:").await.unwrap();
        db.users().register("alice", "secret123").await.unwrap();

        assert!(db.users().verify_password("alice", "secret123").await.unwrap());
        assert!(!db.users().verify_password("alice", "secret124").await.unwrap());
        assert!(!db.users().verify_password("nobody", "secret123").await.unwrap());
    }

    #[tokio::test]
    async fn test_rank_changes() {
        let db = Database::open(":memory:").await.unwrap();
        db.users().register("alice", "secret123").await.unwrap();

        assert_eq!(db.users().rank("alice").await.unwrap(), Some(Rank::USER));
        assert!(db.users().set_rank("alice", Rank::ADMIN).await.unwrap());
        assert_eq!(db.users().rank("alice").await.unwrap(), Some(Rank::ADMIN));
        assert_eq!(db.users().rank("nobody").await.unwrap(), None);
        assert!(!db.users().set_rank("nobody", Rank::ADMIN).await.unwrap());
    }

    #[tokio::test]
    async fn test_block_and_unblock_users() {
        let db = Database::open(":memory:").await.unwrap();
        db.users().register("alice", "secret123").await.unwrap();
        let users = db.users();

        users.block_user("alice", "troll", "spam").await.unwrap();
        users.block_user("alice", "bore", "").await.unwrap();
        users.block_user("alice", "troll", "insults").await.unwrap();

        let blocked = users.blocked_users("alice").await.unwrap();
        assert_eq!(blocked.len(), 2);
        assert!(blocked.contains("troll"));

        let listed = users.list_blocked_users("alice").await.unwrap();
        let troll = listed.iter().find(|b| b.id == "troll").unwrap();
        assert_eq!(troll.reason, "insults");

        let removed = users
            .unblock_users("alice", &["troll".to_string(), "unknown".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        let blocked = users.blocked_users("alice").await.unwrap();
        assert_eq!(blocked.len(), 1);
        assert!(blocked.contains("bore"));
    }

    #[tokio::test]
    async fn test_block_and_unblock_tags() {
        let db = Database::open(":memory:").await.unwrap();
        db.users().register("alice", "secret123").await.unwrap();
        let users = db.users();

        users
            .block_tags("alice", &["spoiler".to_string(), "nsfw".to_string()])
            .await
            .unwrap();
        users.block_tags("alice", &["spoiler".to_string()]).await.unwrap();
        assert_eq!(users.blocked_tags("alice").await.unwrap().len(), 2);

        let removed = users
            .unblock_tags("alice", &["spoiler".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let blocklist = users.blocklist("alice").await.unwrap();
        assert!(blocklist.users.is_empty());
        assert_eq!(blocklist.tags.len(), 1);
        assert!(blocklist.tags.contains("nsfw"));
    }
}
