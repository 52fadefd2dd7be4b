use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::database::models::chat::AuthorColumns;

pub const EXPERIENCE_MAX_LEN: usize = 2500;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceView {
    pub id: String,
    pub content: String,
    pub created_at: NaiveDateTime,
    #[sqlx(flatten)]
    pub author: AuthorColumns,
}

#[derive(Debug, Deserialize)]
pub struct CreateExperienceRequest {
    pub content: String,
}
