use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::database::models::{ChatMessage, ChatMessageView, ChatRoom};

const MESSAGE_VIEW_QUERY: &str = r#"
    SELECT m.id, m.room_id, m.body, m.created_at,
           u.id AS author_id, u.first_name AS author_first_name,
           u.last_name AS author_last_name, u.gender AS author_gender
    FROM chat_messages m
    JOIN users u ON u.id = m.user_id
"#;

#[derive(Clone)]
pub struct ChatRoomRepository {
    pool: SqlitePool,
}

impl ChatRoomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_schedule(&self, schedule_id: &str) -> Result<Option<ChatRoom>> {
        let room = sqlx::query_as::<_, ChatRoom>(
            "SELECT id, schedule_id, created_at FROM chat_rooms WHERE schedule_id = ?",
        )
        .bind(schedule_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(room)
    }

    /// Materialize the room for a schedule with the given participant
    /// snapshot, or return the existing room. Participants are written only
    /// by the creation winner; a concurrent creator reads the winner's room.
    pub async fn find_or_create(
        &self,
        schedule_id: &str,
        participants: &[String],
    ) -> Result<ChatRoom> {
        if let Some(existing) = self.find_by_schedule(schedule_id).await? {
            return Ok(existing);
        }

        let room = ChatRoom {
            id: Uuid::new_v4().to_string(),
            schedule_id: schedule_id.to_string(),
            created_at: Utc::now().naive_utc(),
        };

        // Room and snapshot commit together; a concurrent reader never
        // observes a room without its participants.
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO chat_rooms (id, schedule_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (schedule_id) DO NOTHING
            "#,
        )
        .bind(&room.id)
        .bind(&room.schedule_id)
        .bind(room.created_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return self
                .find_by_schedule(schedule_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("chat room vanished after conflicting insert"));
        }

        for user_id in participants {
            sqlx::query(
                "INSERT OR IGNORE INTO chat_participants (room_id, user_id) VALUES (?, ?)",
            )
            .bind(&room.id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(room)
    }

    pub async fn participants(&self, room_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT user_id FROM chat_participants WHERE room_id = ?")
                .bind(room_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn append_message(
        &self,
        room_id: &str,
        user_id: &str,
        body: &str,
    ) -> Result<ChatMessage> {
        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (room_id, user_id, body, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, room_id, user_id, body, created_at
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .bind(body)
        .bind(Utc::now().naive_utc())
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    pub async fn messages(&self, room_id: &str) -> Result<Vec<ChatMessageView>> {
        let messages = sqlx::query_as::<_, ChatMessageView>(&format!(
            "{MESSAGE_VIEW_QUERY} WHERE m.room_id = ? ORDER BY m.id"
        ))
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    pub async fn message_view(&self, message_id: i64) -> Result<Option<ChatMessageView>> {
        let message = sqlx::query_as::<_, ChatMessageView>(&format!(
            "{MESSAGE_VIEW_QUERY} WHERE m.id = ?"
        ))
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    pub async fn last_message_id(&self, room_id: &str) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM chat_messages WHERE room_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id,)| id))
    }

    pub async fn set_read_cursor(
        &self,
        room_id: &str,
        user_id: &str,
        message_id: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_read_cursors (room_id, user_id, last_read_message_id)
            VALUES (?, ?, ?)
            ON CONFLICT (room_id, user_id) DO UPDATE SET last_read_message_id = excluded.last_read_message_id
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Unread messages for a user in a room. "Never read" and "cursor points
    /// at a message no longer in the room" both count as fully unread.
    pub async fn unread_count(&self, room_id: &str, user_id: &str) -> Result<i64> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chat_messages WHERE room_id = ?")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await?;

        let cursor: Option<(i64,)> = sqlx::query_as(
            "SELECT last_read_message_id FROM chat_read_cursors WHERE room_id = ? AND user_id = ?",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((cursor_id,)) = cursor else {
            return Ok(total.0);
        };

        let cursor_exists: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM chat_messages WHERE room_id = ? AND id = ?")
                .bind(room_id)
                .bind(cursor_id)
                .fetch_one(&self.pool)
                .await?;
        if cursor_exists.0 == 0 {
            return Ok(total.0);
        }

        let unread: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM chat_messages WHERE room_id = ? AND id > ?")
                .bind(room_id)
                .bind(cursor_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(unread.0)
    }

    /// Remove every trace of a user from schedule chats: participation,
    /// authored messages and read cursors.
    pub async fn remove_user_footprint(&self, user_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM chat_participants WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        sqlx::query("DELETE FROM chat_messages WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        sqlx::query("DELETE FROM chat_read_cursors WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
