//! Consecutive-day streak computation for routines.
//!
//! Completion dates are calendar-day strings (`YYYY-MM-DD`) compared as
//! strings. The walk starts at `today` and looks back at most a year. An
//! absent "today" does not break the chain — the day may simply not be over
//! yet — but any other missing day stops the count.

use chrono::{Days, NaiveDate};
use std::collections::HashSet;

/// Maximum number of days the streak walk looks back.
const LOOKBACK_DAYS: u64 = 365;

/// Formats a calendar day the way completion dates are stored.
#[must_use]
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Counts consecutive completed days ending at (or just before) `today`.
///
/// Duplicate dates are de-duplicated before counting, so a doubly recorded
/// completion cannot inflate the streak.
#[must_use]
pub fn calculate_streak(completed_dates: &[String], today: NaiveDate) -> u32 {
    if completed_dates.is_empty() {
        return 0;
    }
    let days: HashSet<&str> = completed_dates.iter().map(String::as_str).collect();

    let mut streak = 0;
    for offset in 0..=LOOKBACK_DAYS {
        let Some(check) = today.checked_sub_days(Days::new(offset)) else {
            break;
        };
        if days.contains(day_key(check).as_str()) {
            streak += 1;
        } else if offset == 0 {
            // Today not completed yet, that's ok, keep checking yesterday
        } else {
            break;
        }
    }
    streak
}
