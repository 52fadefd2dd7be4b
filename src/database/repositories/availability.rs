use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::database::models::{
    Availability, AvailabilityFilter, AvailabilityStatus, AvailabilityWithOwner,
};
use crate::domain::CalendarDay;

const ENTRY_COLUMNS: &str =
    "id, user_id, day, location, start_time, end_time, date, status, created_at, updated_at";

#[derive(Clone)]
pub struct AvailabilityRepository {
    pool: SqlitePool,
}

impl AvailabilityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &Availability) -> Result<Availability> {
        let created = sqlx::query_as::<_, Availability>(&format!(
            r#"
            INSERT INTO availabilities (id, user_id, day, location, start_time, end_time, date, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(&entry.id)
        .bind(&entry.user_id)
        .bind(entry.day)
        .bind(&entry.location)
        .bind(&entry.start_time)
        .bind(&entry.end_time)
        .bind(entry.date)
        .bind(entry.status)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Availability>> {
        let entry = sqlx::query_as::<_, Availability>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM availabilities WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    pub async fn list_for_owner(
        &self,
        user_id: &str,
        range: Option<(CalendarDay, CalendarDay)>,
    ) -> Result<Vec<Availability>> {
        let entries = if let Some((start, end)) = range {
            sqlx::query_as::<_, Availability>(&format!(
                "SELECT {ENTRY_COLUMNS} FROM availabilities WHERE user_id = ? AND date >= ? AND date <= ? ORDER BY date"
            ))
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, Availability>(&format!(
                "SELECT {ENTRY_COLUMNS} FROM availabilities WHERE user_id = ? ORDER BY date"
            ))
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(entries)
    }

    /// Admin listing with the owner identity populated. Filters compose;
    /// an empty filter returns everything sorted by date then day.
    pub async fn list_all(&self, filter: &AvailabilityFilter) -> Result<Vec<AvailabilityWithOwner>> {
        let mut sql = format!(
            r#"
            SELECT a.id, a.user_id, a.day, a.location, a.start_time, a.end_time, a.date, a.status, a.created_at, a.updated_at,
                   u.first_name AS owner_first_name, u.last_name AS owner_last_name, u.email AS owner_email, u.gender AS owner_gender
            FROM availabilities a
            JOIN users u ON u.id = a.user_id
            WHERE 1 = 1
            "#
        );

        if filter.status.is_some() {
            sql.push_str(" AND a.status = ?");
        }
        if filter.day.is_some() {
            sql.push_str(" AND a.day = ?");
        }
        let range = match (filter.month, filter.year) {
            (Some(month), Some(year)) => CalendarDay::month_bounds(month, year),
            _ => None,
        };
        if range.is_some() {
            sql.push_str(" AND a.date >= ? AND a.date <= ?");
        }
        sql.push_str(" ORDER BY a.date, a.day");

        let mut query = sqlx::query_as::<_, AvailabilityWithOwner>(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status);
        }
        if let Some(day) = filter.day {
            query = query.bind(day);
        }
        if let Some((start, end)) = range {
            query = query.bind(start).bind(end);
        }

        let entries = query.fetch_all(&self.pool).await?;
        Ok(entries)
    }

    pub async fn set_status(&self, id: &str, status: AvailabilityStatus) -> Result<Option<Availability>> {
        let entry = sqlx::query_as::<_, Availability>(&format!(
            r#"
            UPDATE availabilities SET status = ?, updated_at = ?
            WHERE id = ?
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(status)
        .bind(Utc::now().naive_utc())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM availabilities WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_for_user(&self, user_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM availabilities WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
