//! Domain model for the MetaFlow sync core.
//!
//! Every entity carries an opaque string id assigned client-side at creation
//! time, so optimistic local creation never needs an id rename once the
//! remote row is confirmed. Soft deletion lives on the wire (`is_deleted`
//! column); in-memory lists only ever contain live entities.
//!
//! Monetary fields are [`Decimal`] values rounded to two fractional digits;
//! see [`crate::core::money`].

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Remote tables the sync engine reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Goals,
    Transactions,
    Routines,
    Profiles,
}

impl Table {
    /// Entity tables that participate in diff-based sync (everything except
    /// the singleton profile row).
    pub const ENTITY_TABLES: [Self; 3] = [Self::Goals, Self::Transactions, Self::Routines];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Goals => "goals",
            Self::Transactions => "transactions",
            Self::Routines => "routines",
            Self::Profiles => "profiles",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    #[default]
    Expense,
    Savings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekdays,
    Weekly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Low,
    #[default]
    Medium,
    High,
}

impl Difficulty {
    /// Base XP awarded for completing a routine of this difficulty.
    #[must_use]
    pub const fn xp_value(self) -> i64 {
        match self {
            Self::Low => 10,
            Self::Medium => 20,
            Self::High => 30,
        }
    }
}

/// A savings goal with a monetary target.
///
/// `current_amount` may exceed `target_amount`; both are non-negative
/// two-decimal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub name: String,
    pub description: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub deadline: Option<NaiveDate>,
    pub priority: Priority,
    pub color: String,
    pub image_url: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A logged income/expense/savings movement.
///
/// `amount` is always a non-negative magnitude; the sign is implied by
/// `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub category: String,
    pub note: String,
    pub date: NaiveDate,
    pub goal_id: Option<String>,
    pub decision_kind: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A recurring habit with per-calendar-day completions.
///
/// `completed_dates` holds `YYYY-MM-DD` strings, unique per day. `streak`
/// is derived; see [`crate::core::streak`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Routine {
    pub id: String,
    pub name: String,
    pub objective: String,
    pub category: String,
    pub frequency: Frequency,
    pub difficulty: Difficulty,
    pub xp_value: i64,
    pub completed_dates: Vec<String>,
    pub streak: u32,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub income_sources: Vec<String>,
    pub currency: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            income_sources: Vec::new(),
            currency: "CLP".to_string(),
        }
    }
}

/// One XP grant, newest-first in [`GamificationState::xp_log`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpEvent {
    pub action: String,
    pub xp: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationState {
    /// Monotonically non-decreasing under normal operation.
    pub total_xp: i64,
    /// Bounded log of the most recent grants, newest first.
    pub xp_log: Vec<XpEvent>,
    pub earned_badge_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleTarget {
    Goal,
    Expense,
    #[default]
    Savings,
}

/// A single percentage-based income allocation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeRule {
    pub id: String,
    pub name: String,
    /// 0..=100
    pub percentage: u8,
    pub target: RuleTarget,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeConfig {
    pub enabled: bool,
    pub rules: Vec<EnvelopeRule>,
}

/// Generates a fresh opaque entity id.
#[must_use]
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
