use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::database::models::{Assignee, Gender, Schedule};
use crate::domain::{CalendarDay, ShiftTemplate};

const SCHEDULE_COLUMNS: &str =
    "id, day, location, start_time, end_time, date, is_confirmed, version, created_at, updated_at";

#[derive(Clone)]
pub struct ScheduleRepository {
    pool: SqlitePool,
}

impl ScheduleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Schedule>> {
        let schedule = sqlx::query_as::<_, Schedule>(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(schedule)
    }

    pub async fn find_by_slot(
        &self,
        template: &ShiftTemplate,
        date: CalendarDay,
    ) -> Result<Option<Schedule>> {
        let schedule = sqlx::query_as::<_, Schedule>(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE date = ? AND day = ? AND location = ? AND start_time = ? AND end_time = ?"
        ))
        .bind(date)
        .bind(template.day)
        .bind(&template.location)
        .bind(&template.start_time)
        .bind(&template.end_time)
        .fetch_optional(&self.pool)
        .await?;

        Ok(schedule)
    }

    /// Find the aggregate for a slot, creating an empty unconfirmed one if
    /// absent. The unique slot index makes this race-safe: a concurrent
    /// creator's insert wins and we read their row back.
    pub async fn find_or_create(
        &self,
        template: &ShiftTemplate,
        date: CalendarDay,
    ) -> Result<Schedule> {
        if let Some(existing) = self.find_by_slot(template, date).await? {
            return Ok(existing);
        }

        let fresh = Schedule::new(template, date);
        let result = sqlx::query(
            r#"
            INSERT INTO schedules (id, day, location, start_time, end_time, date, is_confirmed, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (date, day, location, start_time, end_time) DO NOTHING
            "#,
        )
        .bind(&fresh.id)
        .bind(fresh.day)
        .bind(&fresh.location)
        .bind(&fresh.start_time)
        .bind(&fresh.end_time)
        .bind(fresh.date)
        .bind(fresh.is_confirmed)
        .bind(fresh.version)
        .bind(fresh.created_at)
        .bind(fresh.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(fresh);
        }

        // Lost the insert race; the winner's row must exist now
        self.find_by_slot(template, date)
            .await?
            .ok_or_else(|| anyhow::anyhow!("schedule vanished after conflicting insert"))
    }

    /// Insert a fully-formed schedule (admin direct creation). Surfaces the
    /// unique-slot violation to the caller instead of merging.
    pub async fn insert(&self, schedule: &Schedule) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO schedules (id, day, location, start_time, end_time, date, is_confirmed, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&schedule.id)
        .bind(schedule.day)
        .bind(&schedule.location)
        .bind(&schedule.start_time)
        .bind(&schedule.end_time)
        .bind(schedule.date)
        .bind(schedule.is_confirmed)
        .bind(schedule.version)
        .bind(schedule.created_at)
        .bind(schedule.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn monthly(&self, start: CalendarDay, end: CalendarDay) -> Result<Vec<Schedule>> {
        let schedules = sqlx::query_as::<_, Schedule>(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE date >= ? AND date <= ? ORDER BY date, start_time"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(schedules)
    }

    pub async fn schedules_for_user(&self, user_id: &str) -> Result<Vec<Schedule>> {
        let schedules = sqlx::query_as::<_, Schedule>(&format!(
            r#"
            SELECT {SCHEDULE_COLUMNS} FROM schedules
            WHERE id IN (SELECT schedule_id FROM schedule_assignments WHERE user_id = ?)
            ORDER BY date, start_time
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(schedules)
    }

    pub async fn assignees(&self, schedule_id: &str) -> Result<Vec<Assignee>> {
        let assignees = sqlx::query_as::<_, Assignee>(
            r#"
            SELECT sa.user_id, sa.gender, u.first_name, u.last_name
            FROM schedule_assignments sa
            JOIN users u ON u.id = sa.user_id
            WHERE sa.schedule_id = ?
            ORDER BY u.last_name, u.first_name
            "#,
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(assignees)
    }

    /// Add a user to the assignee set. Returns false when the user was
    /// already assigned (the set semantics back the idempotent confirm).
    pub async fn add_assignee(
        &self,
        schedule_id: &str,
        user_id: &str,
        gender: Gender,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO schedule_assignments (schedule_id, user_id, gender) VALUES (?, ?, ?)",
        )
        .bind(schedule_id)
        .bind(user_id)
        .bind(gender)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_assignee(&self, schedule_id: &str, user_id: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM schedule_assignments WHERE schedule_id = ? AND user_id = ?")
                .bind(schedule_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn replace_assignees(
        &self,
        schedule_id: &str,
        assignees: &[(String, Gender)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM schedule_assignments WHERE schedule_id = ?")
            .bind(schedule_id)
            .execute(&mut *tx)
            .await?;

        for (user_id, gender) in assignees {
            sqlx::query(
                "INSERT INTO schedule_assignments (schedule_id, user_id, gender) VALUES (?, ?, ?)",
            )
            .bind(schedule_id)
            .bind(user_id)
            .bind(*gender)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Optimistic write of the derived confirmation flag. Returns false on a
    /// version mismatch so the caller can re-read and retry.
    pub async fn set_confirmed_versioned(
        &self,
        schedule_id: &str,
        is_confirmed: bool,
        expected_version: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE schedules SET is_confirmed = ?, version = version + 1, updated_at = ? WHERE id = ? AND version = ?",
        )
        .bind(is_confirmed)
        .bind(Utc::now().naive_utc())
        .bind(schedule_id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, schedule_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = ?")
            .bind(schedule_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
