use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::macros::string_enum;
use crate::domain::{CalendarDay, ShiftDay, ShiftTemplate};

string_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum AvailabilityStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Rejected => "rejected",
    }
}

/// A volunteer's claim of being free for one date + catalog slot, pending
/// admin review. The slot is stored denormalized (day/location/times) so an
/// entry stays meaningful even if the catalog changes between deploys.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub id: String,
    pub user_id: String,
    pub day: ShiftDay,
    pub location: String,
    pub start_time: String,
    pub end_time: String,
    pub date: CalendarDay,
    pub status: AvailabilityStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Availability {
    pub fn new(user_id: &str, template: &ShiftTemplate, date: CalendarDay) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Availability {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            day: template.day,
            location: template.location.clone(),
            start_time: template.start_time.clone(),
            end_time: template.end_time.clone(),
            date,
            status: AvailabilityStatus::Pending,
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

/// An availability entry populated with its owner's identity (admin listing).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityWithOwner {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub entry: Availability,
    #[sqlx(flatten)]
    pub owner: OwnerColumns,
}

/// Joined owner columns, prefixed to avoid clashing with entry columns.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OwnerColumns {
    #[sqlx(rename = "owner_first_name")]
    pub first_name: String,
    #[sqlx(rename = "owner_last_name")]
    pub last_name: String,
    #[sqlx(rename = "owner_email")]
    pub email: String,
    #[sqlx(rename = "owner_gender")]
    pub gender: crate::database::models::Gender,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityItemInput {
    pub shift: ShiftTemplate,
    pub date: CalendarDay,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAvailabilitiesRequest {
    pub availabilities: Vec<AvailabilityItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct SetAvailabilityStatusRequest {
    pub status: AvailabilityStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailabilityFilter {
    pub status: Option<AvailabilityStatus>,
    pub day: Option<ShiftDay>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}
