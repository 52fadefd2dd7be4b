use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::database::models::{Experience, ExperienceView};

#[derive(Clone)]
pub struct ExperienceRepository {
    pool: SqlitePool,
}

impl ExperienceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: &str, content: &str) -> Result<Experience> {
        let now = Utc::now().naive_utc();
        let experience = sqlx::query_as::<_, Experience>(
            r#"
            INSERT INTO experiences (id, user_id, content, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, user_id, content, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(content)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(experience)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Experience>> {
        let experience = sqlx::query_as::<_, Experience>(
            "SELECT id, user_id, content, created_at, updated_at FROM experiences WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(experience)
    }

    pub async fn list(&self) -> Result<Vec<ExperienceView>> {
        let experiences = sqlx::query_as::<_, ExperienceView>(
            r#"
            SELECT e.id, e.content, e.created_at,
                   u.id AS author_id, u.first_name AS author_first_name,
                   u.last_name AS author_last_name, u.gender AS author_gender
            FROM experiences e
            JOIN users u ON u.id = e.user_id
            ORDER BY e.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(experiences)
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM experiences WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_for_user(&self, user_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM experiences WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
