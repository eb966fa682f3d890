//! XP accounting.
//!
//! A single monotonic counter plus a capped, newest-first log of recent
//! grants. Grants with a non-positive amount are rejected as no-ops so the
//! counter never decreases through this path.

use crate::models::{GamificationState, XpEvent};
use chrono::Utc;

/// Maximum number of entries retained in the XP log.
pub const XP_LOG_CAP: usize = 100;

/// XP awarded per action.
pub mod rewards {
    pub const ROUTINE_COMPLETE: i64 = 20;
    pub const ROUTINE_STREAK_7: i64 = 100;
    pub const ROUTINE_STREAK_30: i64 = 500;
    pub const GOAL_CREATED: i64 = 20;
    pub const GOAL_COMPLETED: i64 = 500;
    pub const FIRST_GOAL: i64 = 50;
    pub const SAVINGS_REGISTERED: i64 = 25;
    pub const TRANSACTION_LOGGED: i64 = 10;
    pub const FIRST_TRANSACTION: i64 = 30;
    pub const ALL_ROUTINES_TODAY: i64 = 100;
    pub const ROUTINE_CREATED: i64 = 20;
}

/// Applies an XP grant, returning the updated gamification state.
///
/// Non-positive amounts leave the state untouched. The log is prepended
/// (newest first) and truncated to [`XP_LOG_CAP`].
#[must_use]
pub fn grant_xp(state: &GamificationState, amount: i64, action: &str) -> GamificationState {
    if amount <= 0 {
        return state.clone();
    }
    let mut xp_log = Vec::with_capacity((state.xp_log.len() + 1).min(XP_LOG_CAP));
    xp_log.push(XpEvent {
        action: action.to_string(),
        xp: amount,
        timestamp: Utc::now(),
    });
    xp_log.extend(state.xp_log.iter().take(XP_LOG_CAP - 1).cloned());

    GamificationState {
        total_xp: state.total_xp + amount,
        xp_log,
        earned_badge_ids: state.earned_badge_ids.clone(),
    }
}
