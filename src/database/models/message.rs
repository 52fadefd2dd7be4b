use chrono::NaiveDateTime;
use serde::Serialize;

use crate::database::models::chat::AuthorColumns;

/// A message in the single global chat, populated with author identity.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GlobalMessage {
    pub id: i64,
    pub body: String,
    pub created_at: NaiveDateTime,
    #[sqlx(flatten)]
    pub author: AuthorColumns,
}
