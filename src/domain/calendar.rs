use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A plain calendar day (year/month/day, no time or timezone component).
///
/// This is the only legal key for schedule lookups. Every date that reaches
/// the scheduling core goes through [`CalendarDay::normalize`] first, so two
/// submissions for "the same day" always resolve to the same aggregate even
/// when the client sent them with different time components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
    /// Normalize a client-supplied date into a calendar day.
    ///
    /// Accepts either a bare `YYYY-MM-DD` string or an RFC 3339 timestamp;
    /// timestamps are truncated to their UTC calendar day.
    pub fn normalize(input: &str) -> Result<Self> {
        let input = input.trim();

        if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
            return Ok(CalendarDay(date));
        }

        if let Ok(instant) = DateTime::parse_from_rfc3339(input) {
            return Ok(CalendarDay(instant.with_timezone(&Utc).date_naive()));
        }

        Err(anyhow!("Invalid date: {}", input))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        CalendarDay(date)
    }

    pub fn today_utc() -> Self {
        CalendarDay(Utc::now().date_naive())
    }

    pub fn as_date(&self) -> NaiveDate {
        self.0
    }

    /// Noon UTC on this day. Used for lead-time window checks, where a
    /// mid-day anchor tolerates up to 12 hours of client timezone skew in
    /// either direction.
    pub fn noon_utc(&self) -> DateTime<Utc> {
        let naive: NaiveDateTime = self.0.and_hms_opt(12, 0, 0).unwrap();
        Utc.from_utc_datetime(&naive)
    }

    /// First and last day of a calendar month, inclusive.
    pub fn month_bounds(month: u32, year: i32) -> Option<(CalendarDay, CalendarDay)> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
        Some((CalendarDay(first), CalendarDay(last)))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }
}

impl std::fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl Serialize for CalendarDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CalendarDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CalendarDay::normalize(&raw).map_err(serde::de::Error::custom)
    }
}

impl sqlx::Type<sqlx::Sqlite> for CalendarDay {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for CalendarDay {
    fn encode_by_ref(
        &self,
        args: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<'q, sqlx::Sqlite>>::encode_by_ref(&self.to_string(), args)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for CalendarDay {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        let date = NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|e| format!("Invalid stored calendar day {}: {}", s, e))?;
        Ok(CalendarDay(date))
    }
}
