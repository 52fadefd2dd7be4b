use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::database::models::macros::string_enum;

string_enum! {
    /// Days on which outreach shifts run. The catalog only covers these.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum ShiftDay {
        Monday => "monday",
        Thursday => "thursday",
        Friday => "friday",
        Saturday => "saturday",
        Sunday => "sunday",
    }
}

/// A fixed weekly shift slot: day of week, location and time range.
///
/// Templates are defined at deploy time; availability submissions are
/// validated against this catalog. The full tuple is the slot's identity,
/// so two Saturday slots at the same location with different hours are
/// distinct schedule keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftTemplate {
    pub day: ShiftDay,
    pub location: String,
    pub start_time: String,
    pub end_time: String,
}

impl ShiftTemplate {
    pub fn new(day: ShiftDay, location: &str, start_time: &str, end_time: &str) -> Self {
        ShiftTemplate {
            day,
            location: location.to_string(),
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
        }
    }
}

impl std::fmt::Display for ShiftTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}-{}",
            self.day, self.location, self.start_time, self.end_time
        )
    }
}

/// The deployed weekly catalog.
pub fn shift_catalog() -> &'static [ShiftTemplate] {
    static CATALOG: OnceLock<Vec<ShiftTemplate>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        vec![
            ShiftTemplate::new(ShiftDay::Monday, "Mercato delle Cure", "09:00", "11:00"),
            ShiftTemplate::new(ShiftDay::Thursday, "Mercato Sant'Ambrogio", "09:00", "11:00"),
            ShiftTemplate::new(ShiftDay::Friday, "Piazza Dalmazia", "16:00", "18:00"),
            ShiftTemplate::new(ShiftDay::Saturday, "Piazza Dalmazia", "09:00", "11:00"),
            ShiftTemplate::new(ShiftDay::Saturday, "Piazza Dalmazia", "11:00", "13:00"),
            ShiftTemplate::new(ShiftDay::Sunday, "Parco delle Cascine", "10:00", "12:00"),
        ]
    })
}

/// Whether a submitted shift matches a known catalog entry exactly.
pub fn is_known_template(template: &ShiftTemplate) -> bool {
    shift_catalog().contains(template)
}
