// src/models/lesson.rs

//! Lesson schedule data structures and current-lesson selection.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::time::WEEK_MINUTES;

/// A recurring schedule entry.
///
/// Start time is week-relative (minutes since Monday 00:00); `week_index`
/// selects one of the two weeks of the biweekly rotation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lesson {
    pub name: String,

    #[serde(default)]
    pub teacher: String,

    /// Minutes since Monday 00:00
    pub start_minutes: u32,

    /// Biweekly rotation index (0 or 1)
    #[serde(default)]
    pub week_index: u8,

    /// Lesson length in minutes, > 0
    pub duration_minutes: u32,

    /// Chat room id on the portal
    pub chat_id: u64,

    /// Suppress actual message sends; join and log only
    #[serde(default)]
    pub silent: bool,
}

impl Lesson {
    /// Whether the lesson's occurrence window contains the given
    /// week-relative minute in a week of the given parity.
    pub fn contains(&self, week_minute: u32, parity: u8) -> bool {
        self.week_index == parity
            && week_minute >= self.start_minutes
            && week_minute < self.start_minutes + self.duration_minutes
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("lesson name is empty"));
        }
        if self.duration_minutes == 0 {
            return Err(AppError::validation(format!(
                "lesson '{}': duration must be > 0",
                self.name
            )));
        }
        if self.start_minutes >= WEEK_MINUTES {
            return Err(AppError::validation(format!(
                "lesson '{}': start offset is outside the week",
                self.name
            )));
        }
        if self.start_minutes + self.duration_minutes > WEEK_MINUTES {
            return Err(AppError::validation(format!(
                "lesson '{}': occurrence window crosses the end of the week",
                self.name
            )));
        }
        if self.week_index > 1 {
            return Err(AppError::validation(format!(
                "lesson '{}': week index must be 0 or 1",
                self.name
            )));
        }
        Ok(())
    }
}

/// The full lesson schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schedule {
    lessons: Vec<Lesson>,
}

impl Schedule {
    pub fn new(lessons: Vec<Lesson>) -> Self {
        Self { lessons }
    }

    /// The lesson running at the given week-relative minute and week
    /// parity, if any. With overlapping entries the first in schedule
    /// order wins.
    pub fn current_lesson(&self, week_minute: u32, parity: u8) -> Option<&Lesson> {
        self.lessons
            .iter()
            .find(|lesson| lesson.contains(week_minute, parity))
    }

    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    /// Validate every entry.
    pub fn validate(&self) -> Result<()> {
        for lesson in &self.lessons {
            lesson.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn algebra() -> Lesson {
        // Monday 10:00, 90 minutes, week 0
        Lesson {
            name: "Algebra".to_string(),
            teacher: "Dr. Roe".to_string(),
            start_minutes: 10 * 60,
            week_index: 0,
            duration_minutes: 90,
            chat_id: 42,
            silent: false,
        }
    }

    #[test]
    fn test_window_selection() {
        let schedule = Schedule::new(vec![algebra()]);

        // Monday 10:30, week 0 -> current
        assert!(schedule.current_lesson(10 * 60 + 30, 0).is_some());
        // window start is inclusive
        assert!(schedule.current_lesson(10 * 60, 0).is_some());
        // Monday 09:59 -> not yet
        assert!(schedule.current_lesson(9 * 60 + 59, 0).is_none());
        // window end is exclusive
        assert!(schedule.current_lesson(11 * 60 + 30, 0).is_none());
        // Monday 11:31 -> over
        assert!(schedule.current_lesson(11 * 60 + 31, 0).is_none());
    }

    #[test]
    fn test_week_parity_mismatch() {
        let schedule = Schedule::new(vec![algebra()]);
        // Monday 10:30 of the other week -> not current
        assert!(schedule.current_lesson(10 * 60 + 30, 1).is_none());
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let mut lesson = algebra();
        lesson.duration_minutes = 0;
        assert!(Schedule::new(vec![lesson]).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_week_overflow() {
        let mut lesson = algebra();
        lesson.start_minutes = WEEK_MINUTES - 10;
        lesson.duration_minutes = 20;
        assert!(Schedule::new(vec![lesson]).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_week_index() {
        let mut lesson = algebra();
        lesson.week_index = 2;
        assert!(Schedule::new(vec![lesson]).validate().is_err());
    }
}
