use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// The message thread scoped to one schedule. Participants are a snapshot
/// of the schedule's assignees taken when the room is first materialized;
/// later roster changes do not rewrite the participant set.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: String,
    pub schedule_id: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub room_id: String,
    pub user_id: String,
    pub body: String,
    pub created_at: NaiveDateTime,
}

/// A chat message populated with its author's identity.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageView {
    pub id: i64,
    pub room_id: String,
    pub body: String,
    pub created_at: NaiveDateTime,
    #[sqlx(flatten)]
    pub author: AuthorColumns,
}

/// Joined author columns, aliased to avoid clashing with message columns.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuthorColumns {
    #[sqlx(rename = "author_id")]
    pub id: String,
    #[sqlx(rename = "author_first_name")]
    pub first_name: String,
    #[sqlx(rename = "author_last_name")]
    pub last_name: String,
    #[sqlx(rename = "author_gender")]
    pub gender: crate::database::models::Gender,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoomView {
    pub id: String,
    pub schedule_id: String,
    pub participants: Vec<String>,
    pub messages: Vec<ChatMessageView>,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub message: String,
}
