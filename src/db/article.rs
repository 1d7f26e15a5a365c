use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use crate::visibility::ContentItem;

#[derive(Clone)]
pub struct ArticleStore {
    pool: SqlitePool,
}

/// Article as shown in a board listing (no content).
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: i64,
    pub board_id: i64,
    pub author_id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub created_at: String,
}

impl ContentItem for Article {
    fn author_id(&self) -> &str {
        &self.author_id
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }
}

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    board_id: i64,
    author_id: String,
    title: String,
    tags: String,
    created_at: String,
}

impl TryFrom<ArticleRow> for Article {
    type Error = sqlx::Error;

    fn try_from(row: ArticleRow) -> Result<Self, Self::Error> {
        let tags: Vec<String> =
            serde_json::from_str(&row.tags).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Self {
            id: row.id,
            board_id: row.board_id,
            author_id: row.author_id,
            title: row.title,
            tags,
            created_at: row.created_at,
        })
    }
}

/// Fields of an article to insert.
#[derive(Debug, Clone)]
pub struct NewArticle<'a> {
    pub board_id: i64,
    pub author_id: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub tags: &'a [String],
}

impl ArticleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an article. Returns the article ID.
    pub async fn create(&self, article: &NewArticle<'_>) -> Result<i64, sqlx::Error> {
        let tags =
            serde_json::to_string(article.tags).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let result = sqlx::query(
            "INSERT INTO articles (board_id, author_id, title, content, tags) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(article.board_id)
        .bind(article.author_id)
        .bind(article.title)
        .bind(article.content)
        .bind(tags)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Most recent articles of a board, newest first. With `before`, only
    /// articles with a smaller id are returned.
    pub async fn list_recent(
        &self,
        board_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Article>, sqlx::Error> {
        let rows: Vec<ArticleRow> = sqlx::query_as(
            "SELECT id, board_id, author_id, title, tags, created_at FROM articles
             WHERE board_id = ? AND (? IS NULL OR id < ?) ORDER BY id DESC LIMIT ?",
        )
        .bind(board_id)
        .bind(before)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Article::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::permissions::PermissionMap;

    #[tokio::test]
    async fn test_create_and_list_newest_first() {
        let db = Database::open(":memory:").await.unwrap();
        let board = db.boards().create("general", true, &PermissionMap::new()).await.unwrap();
        let other = db.boards().create("other", true, &PermissionMap::new()).await.unwrap();

        for (title, board_id) in [("first", board), ("second", board), ("elsewhere", other)] {
            let tags = vec!["news".to_string()];
            db.articles()
                .create(&NewArticle {
                    board_id,
                    author_id: "alice",
                    title,
                    content: "",
                    tags: &tags,
                })
                .await
                .unwrap();
        }

        let listed = db.articles().list_recent(board, None, 10).await.unwrap();
        let titles: Vec<&str> = listed.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);
        assert_eq!(listed[0].tags, vec!["news".to_string()]);
        assert_eq!(listed[0].author_id, "alice");

        let limited = db.articles().list_recent(board, None, 1).await.unwrap();
        assert_eq!(limited.len(), 1);

        let older = db
            .articles()
            .list_recent(board, Some(listed[0].id), 10)
            .await
            .unwrap();
        assert_eq!(older.len(), 1);
        assert_eq!(older[0].title, "first");
    }
}
