pub mod calendar;
pub mod catalog;

pub use calendar::CalendarDay;
pub use catalog::{shift_catalog, ShiftDay, ShiftTemplate};
