use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::database::models::GlobalMessage;

const GLOBAL_MESSAGE_QUERY: &str = r#"
    SELECT m.id, m.body, m.created_at,
           u.id AS author_id, u.first_name AS author_first_name,
           u.last_name AS author_last_name, u.gender AS author_gender
    FROM messages m
    JOIN users u ON u.id = m.user_id
"#;

#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: &str, body: &str) -> Result<GlobalMessage> {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO messages (user_id, body, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(user_id)
        .bind(body)
        .bind(Utc::now().naive_utc())
        .fetch_one(&self.pool)
        .await?;

        let message =
            sqlx::query_as::<_, GlobalMessage>(&format!("{GLOBAL_MESSAGE_QUERY} WHERE m.id = ?"))
                .bind(row.0)
                .fetch_one(&self.pool)
                .await?;

        Ok(message)
    }

    /// The most recent messages in chronological order (chat history replay).
    pub async fn recent(&self, limit: i64) -> Result<Vec<GlobalMessage>> {
        let mut messages = sqlx::query_as::<_, GlobalMessage>(&format!(
            "{GLOBAL_MESSAGE_QUERY} ORDER BY m.id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        messages.reverse();
        Ok(messages)
    }

    pub async fn delete_for_user(&self, user_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
