// src/utils/time.rs

//! Week-relative time arithmetic for the lesson schedule.
//!
//! Lessons are stored as offsets from the start of the week (Monday 00:00)
//! plus a biweekly week index; these helpers map a wall-clock instant onto
//! that coordinate system.

use chrono::{Datelike, Timelike};

/// Minutes in one week.
pub const WEEK_MINUTES: u32 = 7 * 24 * 60;

/// Minutes elapsed since Monday 00:00 of the current week.
pub fn week_minutes<T: Datelike + Timelike>(now: &T) -> u32 {
    now.weekday().num_days_from_monday() * 24 * 60 + now.hour() * 60 + now.minute()
}

/// Biweekly parity (0 or 1) of the week containing `now`.
///
/// Computed from the ISO week number plus a configurable offset, so the
/// schedule can be aligned with whichever week the semester started on.
pub fn week_parity<T: Datelike>(now: &T, offset: u8) -> u8 {
    ((now.iso_week().week() + offset as u32) % 2) as u8
}
