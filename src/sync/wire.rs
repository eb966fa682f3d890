//! Domain ↔ wire schema mapping.
//!
//! Domain objects use camelCase field names; remote rows use snake_case
//! columns. Every `*_from_row` mapper supplies a defined default for every
//! field — numeric fields coerce to zero, strings to empty, arrays to empty
//! lists — so a partial or legacy row can never crash a downstream consumer.

use crate::core::money;
use crate::models::{
    EnvelopeConfig, GamificationState, Goal, Profile, Routine, Transaction,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

const DEFAULT_GOAL_COLOR: &str = "#00e5c3";
const DEFAULT_ROUTINE_CATEGORY: &str = "finance";

// ── Field extraction helpers ─────────────────────────────────────

fn str_value(row: &Value, key: &str, default: &str) -> String {
    row.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn opt_str_value(row: &Value, key: &str) -> Option<String> {
    row.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn money_value(row: &Value, key: &str) -> Decimal {
    match row.get(key) {
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(Decimal::from_f64_retain)
            .map(|d| d.round_dp(money::SCALE))
            .unwrap_or_default(),
        Some(Value::String(s)) => money::parse(s),
        _ => Decimal::ZERO,
    }
}

fn i64_value(row: &Value, key: &str, default: i64) -> i64 {
    row.get(key).and_then(Value::as_i64).unwrap_or(default)
}

fn str_vec_value(row: &Value, key: &str) -> Vec<String> {
    row.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn date_value(row: &Value, key: &str) -> Option<NaiveDate> {
    row.get(key)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

fn timestamp_value(row: &Value, key: &str) -> DateTime<Utc> {
    row.get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map_or_else(Utc::now, |dt| dt.with_timezone(&Utc))
}

/// Lowercase-string enums (priority, kind, frequency, difficulty) fall back
/// to their `Default` variant on anything unrecognized.
fn enum_value<T: DeserializeOwned + Default>(row: &Value, key: &str) -> T {
    row.get(key)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

// ── Goals ────────────────────────────────────────────────────────

#[must_use]
pub fn goal_to_row(goal: &Goal, user_id: &str) -> Value {
    json!({
        "id": goal.id,
        "user_id": user_id,
        "name": goal.name,
        "description": goal.description,
        "target_amount": goal.target_amount,
        "current_amount": goal.current_amount,
        "deadline": goal.deadline,
        "priority": goal.priority,
        "color": goal.color,
        "image_url": goal.image_url,
        "version": goal.version,
        "is_deleted": false,
        "updated_at": Utc::now().to_rfc3339(),
    })
}

#[must_use]
pub fn goal_from_row(row: &Value) -> Goal {
    Goal {
        id: str_value(row, "id", ""),
        name: str_value(row, "name", ""),
        description: str_value(row, "description", ""),
        target_amount: money_value(row, "target_amount"),
        current_amount: money_value(row, "current_amount"),
        deadline: date_value(row, "deadline"),
        priority: enum_value(row, "priority"),
        color: str_value(row, "color", DEFAULT_GOAL_COLOR),
        image_url: opt_str_value(row, "image_url"),
        version: i64_value(row, "version", 1),
        created_at: timestamp_value(row, "created_at"),
        updated_at: timestamp_value(row, "updated_at"),
    }
}

// ── Transactions ─────────────────────────────────────────────────

#[must_use]
pub fn tx_to_row(tx: &Transaction, user_id: &str) -> Value {
    json!({
        "id": tx.id,
        "user_id": user_id,
        "type": tx.kind,
        "amount": tx.amount,
        "category": tx.category,
        "note": tx.note,
        "date": tx.date,
        "goal_id": tx.goal_id,
        "decision_type": tx.decision_kind,
        "version": tx.version,
        "is_deleted": false,
        "updated_at": Utc::now().to_rfc3339(),
    })
}

#[must_use]
pub fn tx_from_row(row: &Value) -> Transaction {
    Transaction {
        id: str_value(row, "id", ""),
        kind: enum_value(row, "type"),
        amount: money_value(row, "amount"),
        category: str_value(row, "category", ""),
        note: str_value(row, "note", ""),
        date: date_value(row, "date").unwrap_or_else(|| Utc::now().date_naive()),
        goal_id: opt_str_value(row, "goal_id"),
        decision_kind: opt_str_value(row, "decision_type"),
        version: i64_value(row, "version", 1),
        created_at: timestamp_value(row, "created_at"),
        updated_at: timestamp_value(row, "updated_at"),
    }
}

// ── Routines ─────────────────────────────────────────────────────

#[must_use]
pub fn routine_to_row(routine: &Routine, user_id: &str) -> Value {
    json!({
        "id": routine.id,
        "user_id": user_id,
        "name": routine.name,
        "objective": routine.objective,
        "category": routine.category,
        "frequency": routine.frequency,
        "difficulty": routine.difficulty,
        "xp_value": routine.xp_value,
        "completed_dates": routine.completed_dates,
        "streak": routine.streak,
        "version": routine.version,
        "is_deleted": false,
        "updated_at": Utc::now().to_rfc3339(),
    })
}

#[must_use]
pub fn routine_from_row(row: &Value) -> Routine {
    Routine {
        id: str_value(row, "id", ""),
        name: str_value(row, "name", ""),
        objective: str_value(row, "objective", ""),
        category: str_value(row, "category", DEFAULT_ROUTINE_CATEGORY),
        frequency: enum_value(row, "frequency"),
        difficulty: enum_value(row, "difficulty"),
        xp_value: i64_value(row, "xp_value", 20),
        completed_dates: str_vec_value(row, "completed_dates"),
        streak: u32::try_from(i64_value(row, "streak", 0).max(0)).unwrap_or(0),
        version: i64_value(row, "version", 1),
        created_at: timestamp_value(row, "created_at"),
        updated_at: timestamp_value(row, "updated_at"),
    }
}

// ── Profile (embeds gamification + envelope config) ──────────────

#[must_use]
pub fn profile_to_row(
    profile: &Profile,
    gamification: &GamificationState,
    envelopes: &EnvelopeConfig,
    user_id: &str,
) -> Value {
    json!({
        "user_id": user_id,
        "name": profile.name,
        "email": profile.email,
        "currency": profile.currency,
        "income_sources": profile.income_sources,
        "gamification": gamification,
        "envelopes": envelopes,
        "updated_at": Utc::now().to_rfc3339(),
    })
}

/// Splits a profile row back into its three sub-states. A row missing the
/// embedded blobs yields defaults, never an error.
#[must_use]
pub fn profile_from_row(row: &Value) -> (Profile, GamificationState, EnvelopeConfig) {
    let profile = Profile {
        name: str_value(row, "name", ""),
        email: str_value(row, "email", ""),
        income_sources: str_vec_value(row, "income_sources"),
        currency: str_value(row, "currency", "CLP"),
    };
    let gamification = row
        .get("gamification")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    let envelopes = row
        .get("envelopes")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    (profile, gamification, envelopes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, TransactionKind};
    use rust_decimal_macros::dec;

    #[test]
    fn goal_from_empty_row_yields_total_defaults() {
        let goal = goal_from_row(&json!({}));
        assert_eq!(goal.id, "");
        assert_eq!(goal.name, "");
        assert_eq!(goal.target_amount, Decimal::ZERO);
        assert_eq!(goal.current_amount, Decimal::ZERO);
        assert_eq!(goal.priority, Priority::Medium);
        assert_eq!(goal.color, DEFAULT_GOAL_COLOR);
        assert_eq!(goal.version, 1);
        assert!(goal.deadline.is_none());
        assert!(goal.image_url.is_none());
    }

    #[test]
    fn goal_round_trip_preserves_fields() {
        let goal = Goal {
            id: "g1".to_string(),
            name: "Moto".to_string(),
            description: "125cc".to_string(),
            target_amount: dec!(500000),
            current_amount: dec!(120000.50),
            deadline: Some("2027-01-01".parse().unwrap()),
            priority: Priority::High,
            color: "#ff0000".to_string(),
            image_url: Some("goals/g1.jpg".to_string()),
            version: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let row = goal_to_row(&goal, "user-1");
        assert_eq!(row["user_id"], "user-1");
        assert_eq!(row["is_deleted"], false);

        let back = goal_from_row(&row);
        assert_eq!(back.id, goal.id);
        assert_eq!(back.name, goal.name);
        assert_eq!(back.target_amount, goal.target_amount);
        assert_eq!(back.current_amount, goal.current_amount);
        assert_eq!(back.deadline, goal.deadline);
        assert_eq!(back.priority, goal.priority);
        assert_eq!(back.image_url, goal.image_url);
        assert_eq!(back.version, goal.version);
    }

    #[test]
    fn tx_amount_accepts_number_or_string() {
        let from_number = tx_from_row(&json!({ "id": "t1", "amount": 19.99 }));
        assert_eq!(from_number.amount, dec!(19.99));
        let from_string = tx_from_row(&json!({ "id": "t1", "amount": "19.99" }));
        assert_eq!(from_string.amount, dec!(19.99));
        assert_eq!(from_string.kind, TransactionKind::Expense);
    }

    #[test]
    fn tx_decision_maps_to_the_decision_type_column() {
        let tx = tx_from_row(&json!({ "id": "t1", "decision_type": "impulse" }));
        assert_eq!(tx.decision_kind.as_deref(), Some("impulse"));

        let row = tx_to_row(&tx, "user-1");
        assert_eq!(row["decision_type"], "impulse");
        assert!(row.get("decision_kind").is_none());
    }

    #[test]
    fn routine_defaults_match_schema() {
        let routine = routine_from_row(&json!({ "id": "r1" }));
        assert_eq!(routine.xp_value, 20);
        assert_eq!(routine.category, DEFAULT_ROUTINE_CATEGORY);
        assert!(routine.completed_dates.is_empty());
        assert_eq!(routine.streak, 0);
    }

    #[test]
    fn profile_row_embeds_and_restores_sub_states() {
        let profile = Profile {
            name: "Bruno".to_string(),
            email: "bruno@example.com".to_string(),
            income_sources: vec!["salary".to_string()],
            currency: "CLP".to_string(),
        };
        let gamification = GamificationState {
            total_xp: 595,
            ..GamificationState::default()
        };
        let envelopes = EnvelopeConfig::default();

        let row = profile_to_row(&profile, &gamification, &envelopes, "user-1");
        let (p, g, e) = profile_from_row(&row);
        assert_eq!(p, profile);
        assert_eq!(g.total_xp, 595);
        assert!(!e.enabled);
    }

    #[test]
    fn profile_from_legacy_row_without_blobs() {
        let (p, g, e) = profile_from_row(&json!({ "name": "Old" }));
        assert_eq!(p.name, "Old");
        assert_eq!(p.currency, "CLP");
        assert_eq!(g.total_xp, 0);
        assert!(e.rules.is_empty());
    }
}
