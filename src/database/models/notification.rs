use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::macros::string_enum;

string_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum NotificationKind {
        Availability => "availability",
        Confirmation => "confirmation",
        Schedule => "schedule",
        Chat => "chat",
        General => "general",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub kind: NotificationKind,
    pub schedule_id: Option<String>,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

impl Notification {
    pub fn new(user_id: &str, message: impl Into<String>, kind: NotificationKind) -> Self {
        Notification {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            message: message.into(),
            kind,
            schedule_id: None,
            is_read: false,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn for_schedule(
        user_id: &str,
        message: impl Into<String>,
        kind: NotificationKind,
        schedule_id: &str,
    ) -> Self {
        Notification {
            schedule_id: Some(schedule_id.to_string()),
            ..Notification::new(user_id, message, kind)
        }
    }
}
