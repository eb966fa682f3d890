//! Framework-agnostic business logic: money arithmetic, text sanitization,
//! streak computation and XP accounting.

/// XP reward constants and grant bookkeeping
pub mod gamification;
/// Fixed-precision currency parsing and arithmetic
pub mod money;
/// Free-text sanitization applied at state-store entry points
pub mod sanitize;
/// Consecutive-day streak computation for routines
pub mod streak;
