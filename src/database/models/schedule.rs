use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::Gender;
use crate::domain::{CalendarDay, ShiftDay, ShiftTemplate};

/// The authoritative roster for one (calendar day, catalog slot) pair.
///
/// `is_confirmed` is derived, never set directly by callers: only the
/// reconciliation engine (or its eager admin paths) recomputes it from the
/// current assignee set. `version` backs the optimistic write of that flag.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub day: ShiftDay,
    pub location: String,
    pub start_time: String,
    pub end_time: String,
    pub date: CalendarDay,
    pub is_confirmed: bool,
    #[serde(skip_serializing)]
    pub version: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Schedule {
    pub fn new(template: &ShiftTemplate, date: CalendarDay) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Schedule {
            id: Uuid::new_v4().to_string(),
            day: template.day,
            location: template.location.clone(),
            start_time: template.start_time.clone(),
            end_time: template.end_time.clone(),
            date,
            is_confirmed: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn shift_template(&self) -> ShiftTemplate {
        ShiftTemplate {
            day: self.day,
            location: self.location.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
        }
    }
}

/// One member of a schedule's assignee set, populated with identity.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Assignee {
    pub user_id: String,
    pub gender: Gender,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleWithAssignees {
    #[serde(flatten)]
    pub schedule: Schedule,
    pub assigned_users: Vec<Assignee>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleRequest {
    pub shift: ShiftTemplate,
    pub date: CalendarDay,
    pub assigned_users: Vec<AssigneeRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScheduleRequest {
    pub assigned_users: Vec<AssigneeRef>,
}

/// A bare user reference in an admin roster payload; the gender on record
/// is resolved server-side, never trusted from the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssigneeRef {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MonthlyQuery {
    pub month: u32,
    pub year: i32,
}
