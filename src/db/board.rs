use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use crate::permissions::PermissionMap;

#[derive(Clone)]
pub struct BoardStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Board {
    pub id: i64,
    pub name: String,
    pub public: bool,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct BoardRow {
    id: i64,
    name: String,
    public: i32,
    created_at: String,
}

impl From<BoardRow> for Board {
    fn from(row: BoardRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            public: row.public != 0,
            created_at: row.created_at,
        }
    }
}

impl BoardStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a board. Returns the board ID.
    pub async fn create(
        &self,
        name: &str,
        public: bool,
        permissions: &PermissionMap,
    ) -> Result<i64, sqlx::Error> {
        let permissions =
            serde_json::to_string(permissions).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let result = sqlx::query("INSERT INTO boards (name, public, permissions) VALUES (?, ?, ?)")
            .bind(name)
            .bind(public as i32)
            .bind(permissions)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a board by ID.
    pub async fn get(&self, id: i64) -> Result<Option<Board>, sqlx::Error> {
        let row: Option<BoardRow> =
            sqlx::query_as("SELECT id, name, public, created_at FROM boards WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Board::from))
    }

    /// List public boards, oldest first.
    pub async fn list_public(&self) -> Result<Vec<Board>, sqlx::Error> {
        let rows: Vec<BoardRow> = sqlx::query_as(
            "SELECT id, name, public, created_at FROM boards WHERE public = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Board::from).collect())
    }

    /// Load the permission map of a board, `None` if the board does not exist.
    /// A stored map that does not parse is reported as a decode error.
    pub async fn permission_map(&self, id: i64) -> Result<Option<PermissionMap>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT permissions FROM boards WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(json,)| {
            serde_json::from_str::<PermissionMap>(&json)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))
        })
        .transpose()
    }

    /// Replace the permission map of a board.
    pub async fn set_permission_map(
        &self,
        id: i64,
        permissions: &PermissionMap,
    ) -> Result<bool, sqlx::Error> {
        let permissions =
            serde_json::to_string(permissions).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let result = sqlx::query("UPDATE boards SET permissions = ? WHERE id = ?")
            .bind(permissions)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
