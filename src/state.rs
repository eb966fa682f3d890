//! Application state store.
//!
//! A single reducer mediates every domain mutation. Dispatch is synchronous
//! and strictly ordered; the reducer is pure over `(state, action)` apart
//! from timestamping. Free text is sanitized and amounts are coerced at this
//! boundary, so no action can ever fail validation — a stale id is a no-op,
//! not an error.
//!
//! Destructive actions park a restore-capable snapshot on a bounded undo
//! ring. The `Sync*` action family is reserved for inbound remote changes;
//! the orchestrator is the only expected dispatcher of those.

use crate::core::gamification::{grant_xp, rewards};
use crate::core::{money, sanitize, streak};
use crate::errors::Result;
use crate::models::{
    Difficulty, EnvelopeConfig, Frequency, GamificationState, Goal, Priority, Profile, Routine,
    Table, Transaction, TransactionKind, generate_id,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// Depth of the undo ring; oldest entries are evicted first.
pub const UNDO_STACK_CAP: usize = 10;

const DEFAULT_GOAL_COLOR: &str = "#00e5c3";

// ── Action payloads ──────────────────────────────────────────────

/// Caller-supplied fields for a new goal. Amounts arrive as raw strings and
/// are coerced; a missing id is assigned at reduce time.
#[derive(Debug, Clone, Default)]
pub struct GoalDraft {
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub target_amount: String,
    pub current_amount: String,
    pub deadline: Option<NaiveDate>,
    pub priority: Priority,
    pub color: Option<String>,
    pub image_url: Option<String>,
}

/// Partial update for an existing goal; only supplied fields are merged.
#[derive(Debug, Clone, Default)]
pub struct GoalPatch {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub target_amount: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub priority: Option<Priority>,
    pub color: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionDraft {
    pub id: Option<String>,
    pub kind: TransactionKind,
    pub amount: String,
    pub category: String,
    pub note: String,
    pub date: Option<NaiveDate>,
    pub goal_id: Option<String>,
    pub decision_kind: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RoutineDraft {
    pub id: Option<String>,
    pub name: String,
    pub objective: String,
    pub category: String,
    pub frequency: Frequency,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Default)]
pub struct RoutinePatch {
    pub id: String,
    pub name: Option<String>,
    pub objective: Option<String>,
    pub category: Option<String>,
    pub frequency: Option<Frequency>,
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub income_sources: Option<Vec<String>>,
    pub currency: Option<String>,
}

/// Resolved collections handed over by hydration.
#[derive(Debug, Clone, Default)]
pub struct LoadedState {
    pub goals: Vec<Goal>,
    pub transactions: Vec<Transaction>,
    pub routines: Vec<Routine>,
    pub profile: Profile,
    pub gamification: GamificationState,
    pub envelopes: EnvelopeConfig,
}

/// A full entity pushed in from the remote change feed.
#[derive(Debug, Clone)]
pub enum SyncedEntity {
    Goal(Goal),
    Transaction(Transaction),
    Routine(Routine),
}

/// Tagged union of restore-capable deletion snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoEntry {
    RestoreGoal {
        snapshot: Goal,
        deleted_at: DateTime<Utc>,
    },
    RestoreTransaction {
        snapshot: Transaction,
        deleted_at: DateTime<Utc>,
    },
    RestoreRoutine {
        snapshot: Routine,
        deleted_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub enum Action {
    LoadData(Box<LoadedState>),

    AddGoal(GoalDraft),
    UpdateGoal(GoalPatch),
    DeleteGoal { id: String },
    AddSavingsToGoal { goal_id: String, amount: String },

    AddTransaction(TransactionDraft),
    DeleteTransaction { id: String },

    AddRoutine(RoutineDraft),
    UpdateRoutine(RoutinePatch),
    DeleteRoutine { id: String },
    CompleteRoutine { id: String, date: NaiveDate },

    SetEnvelopes(EnvelopeConfig),
    UpdateProfile(ProfilePatch),
    UndoLast,

    // Remote-apply family, dispatched by the sync orchestrator only.
    SyncUpsert(SyncedEntity),
    SyncRemove { table: Table, id: String },
    SyncProfile {
        profile: Profile,
        gamification: GamificationState,
        envelopes: EnvelopeConfig,
    },
}

// ── State ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub goals: Vec<Goal>,
    /// Most recent first.
    pub transactions: Vec<Transaction>,
    pub routines: Vec<Routine>,
    pub profile: Profile,
    pub gamification: GamificationState,
    pub envelopes: EnvelopeConfig,
    pub undo_stack: VecDeque<UndoEntry>,
}

impl AppState {
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }
}

fn push_undo(mut stack: VecDeque<UndoEntry>, entry: UndoEntry) -> VecDeque<UndoEntry> {
    stack.push_back(entry);
    while stack.len() > UNDO_STACK_CAP {
        stack.pop_front();
    }
    stack
}

// ── Reducer ──────────────────────────────────────────────────────

/// Applies an action, producing the next state.
///
/// Never panics and never fails: malformed input coerces to defaults and
/// actions targeting a vanished id (a concurrent remote deletion is always
/// possible) leave the state unchanged.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn reduce(state: &AppState, action: Action) -> AppState {
    match action {
        Action::LoadData(loaded) => AppState {
            goals: loaded.goals,
            transactions: loaded.transactions,
            routines: loaded.routines,
            profile: loaded.profile,
            gamification: loaded.gamification,
            envelopes: loaded.envelopes,
            undo_stack: state.undo_stack.clone(),
        },

        // ── Goals ────────────────────────────────────────────────
        Action::AddGoal(draft) => {
            let now = Utc::now();
            let goal = Goal {
                id: draft.id.unwrap_or_else(generate_id),
                name: sanitize::html(&draft.name),
                description: sanitize::html(&draft.description),
                target_amount: money::parse(&draft.target_amount),
                current_amount: money::parse(&draft.current_amount),
                deadline: draft.deadline,
                priority: draft.priority,
                color: draft.color.unwrap_or_else(|| DEFAULT_GOAL_COLOR.to_string()),
                image_url: draft.image_url,
                version: 1,
                created_at: now,
                updated_at: now,
            };
            let xp = if state.goals.is_empty() {
                rewards::FIRST_GOAL + rewards::GOAL_CREATED
            } else {
                rewards::GOAL_CREATED
            };
            let mut next = state.clone();
            next.goals.push(goal);
            next.gamification = grant_xp(&state.gamification, xp, "GOAL_CREATED");
            next
        }

        Action::UpdateGoal(patch) => {
            let mut next = state.clone();
            if let Some(goal) = next.goals.iter_mut().find(|g| g.id == patch.id) {
                if let Some(name) = patch.name {
                    goal.name = sanitize::html(&name);
                }
                if let Some(description) = patch.description {
                    goal.description = sanitize::html(&description);
                }
                if let Some(target) = patch.target_amount {
                    goal.target_amount = money::parse(&target);
                }
                if let Some(deadline) = patch.deadline {
                    goal.deadline = Some(deadline);
                }
                if let Some(priority) = patch.priority {
                    goal.priority = priority;
                }
                if let Some(color) = patch.color {
                    goal.color = color;
                }
                if let Some(image_url) = patch.image_url {
                    goal.image_url = Some(image_url);
                }
                goal.updated_at = Utc::now();
            }
            next
        }

        Action::DeleteGoal { id } => {
            let Some(snapshot) = state.goals.iter().find(|g| g.id == id).cloned() else {
                return state.clone();
            };
            let mut next = state.clone();
            next.goals.retain(|g| g.id != id);
            next.undo_stack = push_undo(
                next.undo_stack,
                UndoEntry::RestoreGoal {
                    snapshot,
                    deleted_at: Utc::now(),
                },
            );
            next
        }

        Action::AddSavingsToGoal { goal_id, amount } => {
            let Some(goal) = state.goals.iter().find(|g| g.id == goal_id) else {
                return state.clone();
            };
            // This path only ever increases the amount.
            let delta = money::parse(&amount).max(Decimal::ZERO);
            let old_amount = goal.current_amount;
            let new_amount = money::add(old_amount, delta);

            let completion_bonus = if old_amount < goal.target_amount
                && new_amount >= goal.target_amount
            {
                rewards::GOAL_COMPLETED
            } else {
                0
            };

            let mut next = state.clone();
            if let Some(g) = next.goals.iter_mut().find(|g| g.id == goal_id) {
                g.current_amount = new_amount;
                g.updated_at = Utc::now();
            }
            next.gamification = grant_xp(
                &state.gamification,
                rewards::SAVINGS_REGISTERED + completion_bonus,
                "SAVINGS_REGISTERED",
            );
            next
        }

        // ── Transactions ─────────────────────────────────────────
        Action::AddTransaction(draft) => {
            let now = Utc::now();
            let tx = Transaction {
                id: draft.id.unwrap_or_else(generate_id),
                kind: draft.kind,
                // Magnitude only; the sign is implied by `kind`.
                amount: money::parse(&draft.amount).abs(),
                category: draft.category,
                note: sanitize::html(&draft.note),
                date: draft.date.unwrap_or_else(|| Utc::now().date_naive()),
                goal_id: draft.goal_id,
                decision_kind: draft.decision_kind,
                version: 1,
                created_at: now,
                updated_at: now,
            };
            let xp = if state.transactions.is_empty() {
                rewards::FIRST_TRANSACTION + rewards::TRANSACTION_LOGGED
            } else {
                rewards::TRANSACTION_LOGGED
            };
            let mut next = state.clone();
            next.transactions.insert(0, tx);
            next.gamification = grant_xp(&state.gamification, xp, "TRANSACTION_LOGGED");
            next
        }

        Action::DeleteTransaction { id } => {
            let Some(snapshot) = state.transactions.iter().find(|t| t.id == id).cloned() else {
                return state.clone();
            };
            let mut next = state.clone();
            next.transactions.retain(|t| t.id != id);
            next.undo_stack = push_undo(
                next.undo_stack,
                UndoEntry::RestoreTransaction {
                    snapshot,
                    deleted_at: Utc::now(),
                },
            );
            next
        }

        // ── Routines ─────────────────────────────────────────────
        Action::AddRoutine(draft) => {
            let now = Utc::now();
            let routine = Routine {
                id: draft.id.unwrap_or_else(generate_id),
                name: sanitize::html(&draft.name),
                objective: sanitize::html(&draft.objective),
                category: draft.category,
                frequency: draft.frequency,
                difficulty: draft.difficulty,
                xp_value: draft.difficulty.xp_value(),
                completed_dates: Vec::new(),
                streak: 0,
                version: 1,
                created_at: now,
                updated_at: now,
            };
            let mut next = state.clone();
            next.routines.push(routine);
            next.gamification = grant_xp(
                &state.gamification,
                rewards::ROUTINE_CREATED,
                "ROUTINE_CREATED",
            );
            next
        }

        Action::UpdateRoutine(patch) => {
            let mut next = state.clone();
            if let Some(routine) = next.routines.iter_mut().find(|r| r.id == patch.id) {
                if let Some(name) = patch.name {
                    routine.name = sanitize::html(&name);
                }
                if let Some(objective) = patch.objective {
                    routine.objective = sanitize::html(&objective);
                }
                if let Some(category) = patch.category {
                    routine.category = category;
                }
                if let Some(frequency) = patch.frequency {
                    routine.frequency = frequency;
                }
                if let Some(difficulty) = patch.difficulty {
                    routine.difficulty = difficulty;
                    routine.xp_value = difficulty.xp_value();
                }
                routine.updated_at = Utc::now();
            }
            next
        }

        Action::DeleteRoutine { id } => {
            let Some(snapshot) = state.routines.iter().find(|r| r.id == id).cloned() else {
                return state.clone();
            };
            let mut next = state.clone();
            next.routines.retain(|r| r.id != id);
            next.undo_stack = push_undo(
                next.undo_stack,
                UndoEntry::RestoreRoutine {
                    snapshot,
                    deleted_at: Utc::now(),
                },
            );
            next
        }

        Action::CompleteRoutine { id, date } => {
            let Some(routine) = state.routines.iter().find(|r| r.id == id) else {
                return state.clone();
            };
            let day = streak::day_key(date);
            let mut completed_dates = routine.completed_dates.clone();
            if !completed_dates.contains(&day) {
                completed_dates.push(day.clone());
            }
            let new_streak = streak::calculate_streak(&completed_dates, date);

            let mut bonus = 0;
            if new_streak == 7 {
                bonus += rewards::ROUTINE_STREAK_7;
            }
            if new_streak == 30 {
                bonus += rewards::ROUTINE_STREAK_30;
            }
            let all_done_today = state
                .routines
                .iter()
                .all(|r| r.id == id || r.completed_dates.contains(&day));
            if all_done_today && state.routines.len() > 1 {
                bonus += rewards::ALL_ROUTINES_TODAY;
            }

            let mut next = state.clone();
            if let Some(r) = next.routines.iter_mut().find(|r| r.id == id) {
                r.completed_dates = completed_dates;
                r.streak = new_streak;
                r.updated_at = Utc::now();
            }
            next.gamification = grant_xp(
                &state.gamification,
                routine.xp_value + bonus,
                "ROUTINE_COMPLETE",
            );
            next
        }

        // ── Envelopes & profile ──────────────────────────────────
        Action::SetEnvelopes(mut config) => {
            for rule in &mut config.rules {
                rule.name = sanitize::html(&rule.name);
                rule.percentage = rule.percentage.min(100);
            }
            let mut next = state.clone();
            next.envelopes = config;
            next
        }

        Action::UpdateProfile(patch) => {
            let mut next = state.clone();
            if let Some(name) = patch.name {
                next.profile.name = sanitize::html(&name);
            }
            if let Some(email) = patch.email {
                next.profile.email = email;
            }
            if let Some(sources) = patch.income_sources {
                next.profile.income_sources = sources;
            }
            if let Some(currency) = patch.currency {
                next.profile.currency = currency;
            }
            next
        }

        // ── Undo ─────────────────────────────────────────────────
        Action::UndoLast => {
            let mut next = state.clone();
            match next.undo_stack.pop_back() {
                Some(UndoEntry::RestoreGoal { snapshot, .. }) => next.goals.push(snapshot),
                Some(UndoEntry::RestoreTransaction { snapshot, .. }) => {
                    // Transactions keep most-recent-first ordering.
                    next.transactions.insert(0, snapshot);
                }
                Some(UndoEntry::RestoreRoutine { snapshot, .. }) => next.routines.push(snapshot),
                None => {}
            }
            next
        }

        // ── Remote apply ─────────────────────────────────────────
        Action::SyncUpsert(entity) => {
            let mut next = state.clone();
            match entity {
                SyncedEntity::Goal(goal) => {
                    if let Some(existing) = next.goals.iter_mut().find(|g| g.id == goal.id) {
                        *existing = goal;
                    } else {
                        next.goals.push(goal);
                    }
                }
                SyncedEntity::Transaction(tx) => {
                    if let Some(existing) = next.transactions.iter_mut().find(|t| t.id == tx.id) {
                        *existing = tx;
                    } else {
                        next.transactions.insert(0, tx);
                    }
                }
                SyncedEntity::Routine(routine) => {
                    if let Some(existing) = next.routines.iter_mut().find(|r| r.id == routine.id) {
                        *existing = routine;
                    } else {
                        next.routines.push(routine);
                    }
                }
            }
            next
        }

        Action::SyncRemove { table, id } => {
            let mut next = state.clone();
            match table {
                Table::Goals => next.goals.retain(|g| g.id != id),
                Table::Transactions => next.transactions.retain(|t| t.id != id),
                Table::Routines => next.routines.retain(|r| r.id != id),
                Table::Profiles => {}
            }
            next
        }

        Action::SyncProfile {
            profile,
            gamification,
            envelopes,
        } => {
            let mut next = state.clone();
            next.profile = profile;
            next.gamification = gamification;
            next.envelopes = envelopes;
            next
        }
    }
}

// ── Store ────────────────────────────────────────────────────────

type ChangeListener = Box<dyn Fn(&AppState) + Send + Sync>;

/// Owns the canonical in-memory state and fans out change notifications.
///
/// Observers run synchronously after every dispatch, in subscription order;
/// the local-mirror writer and the sync orchestrator are the expected
/// subscribers.
#[derive(Default)]
pub struct AppStore {
    state: AppState,
    listeners: Vec<ChangeListener>,
}

impl AppStore {
    #[must_use]
    pub fn new(initial: AppState) -> Self {
        Self {
            state: initial,
            listeners: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn subscribe(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }

    /// Applies an action and notifies all observers of the new state.
    pub fn dispatch(&mut self, action: Action) {
        self.state = reduce(&self.state, action);
        self.notify();
    }

    /// Optimistic action wrapper: applies the action immediately, then runs
    /// the associated remote call. On failure the pre-action snapshot is
    /// restored and the error re-raised so the caller can surface it.
    ///
    /// # Errors
    /// Propagates whatever the remote future fails with; local state has
    /// already been rolled back when it does.
    pub async fn dispatch_with_rollback<F>(&mut self, action: Action, remote: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        let backup = self.state.clone();
        self.dispatch(action);
        match remote.await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = backup;
                self.notify();
                Err(e)
            }
        }
    }

    fn notify(&self) {
        for listener in &self.listeners {
            listener(&self.state);
        }
    }
}
