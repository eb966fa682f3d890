//! Sync orchestrator.
//!
//! Bridges the application state store and the remote backend for the
//! lifetime of an authenticated session:
//!
//! - debounces local state changes and enqueues the resulting delta,
//! - flushes the durable write queue and reflects the outcome in a status
//!   signal,
//! - ingests realtime change events and dispatches remote-apply actions,
//! - suppresses write loops via a TTL'd map of recently applied remote rows
//!   (a per-row guard rather than a single shared flag, so two rapid inbound
//!   events cannot race each other's suppression). The guard remembers what
//!   each remote apply wrote, and only a delta still equal to that value is
//!   treated as an echo, so a user edit landing in the same debounce window
//!   is pushed rather than swallowed.
//!
//! The orchestrator is an explicitly constructed object with injected
//! dependencies and an `init`/`destroy` lifecycle; it holds no global state.

use crate::models::{
    EnvelopeConfig, GamificationState, Goal, Profile, Routine, Table, Transaction,
};
use crate::state::{Action, AppState, SyncedEntity};
use crate::sync::backend::RemoteBackend;
use crate::sync::queue::{OpKind, WriteQueue};
use crate::sync::wire;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Quiet period required before an outbound sync cycle starts.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1500);

/// How long an inbound remote row suppresses its own echo.
const ECHO_TTL: Duration = Duration::from_secs(10);

/// Externally observable sync state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Syncing,
    Error,
    Offline,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Syncing => write!(f, "syncing"),
            Self::Error => write!(f, "error"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Callback the orchestrator uses to apply inbound changes to the store.
pub type DispatchFn = Arc<dyn Fn(Action) + Send + Sync>;

/// The value a remote apply wrote into local state, kept so the guard can
/// tell an echo apart from a genuine edit.
enum AppliedRemote {
    Goal(Goal),
    Transaction(Transaction),
    Routine(Routine),
}

/// Recently applied remote rows, keyed by `(table, id)` with a TTL.
///
/// A local delta for a guarded row counts as an echo only while the row is
/// still equal to what the remote apply wrote. A row that was edited again
/// before the debounce fired no longer matches its entry, so the edit goes
/// out instead of being suppressed.
struct EchoGuard {
    entries: HashMap<(Table, String), (Instant, AppliedRemote)>,
    profile: Option<(Instant, Profile, GamificationState, EnvelopeConfig)>,
    ttl: Duration,
}

impl EchoGuard {
    fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            profile: None,
            ttl,
        }
    }

    fn note(&mut self, table: Table, id: &str, applied: AppliedRemote) {
        self.entries
            .insert((table, id.to_string()), (Instant::now(), applied));
    }

    fn note_profile(
        &mut self,
        profile: Profile,
        gamification: GamificationState,
        envelopes: EnvelopeConfig,
    ) {
        self.profile = Some((Instant::now(), profile, gamification, envelopes));
    }

    fn consume_entity(&mut self, table: Table, id: &str) -> Option<AppliedRemote> {
        let (noted_at, applied) = self.entries.remove(&(table, id.to_string()))?;
        (noted_at.elapsed() <= self.ttl).then_some(applied)
    }

    /// True when the goal is the unmodified result of a fresh remote apply.
    /// The entry is consumed either way.
    fn consume_goal(&mut self, goal: &Goal) -> bool {
        matches!(
            self.consume_entity(Table::Goals, &goal.id),
            Some(AppliedRemote::Goal(applied)) if applied == *goal
        )
    }

    fn consume_tx(&mut self, tx: &Transaction) -> bool {
        matches!(
            self.consume_entity(Table::Transactions, &tx.id),
            Some(AppliedRemote::Transaction(applied)) if applied == *tx
        )
    }

    fn consume_routine(&mut self, routine: &Routine) -> bool {
        matches!(
            self.consume_entity(Table::Routines, &routine.id),
            Some(AppliedRemote::Routine(applied)) if applied == *routine
        )
    }

    fn consume_profile(
        &mut self,
        profile: &Profile,
        gamification: &GamificationState,
        envelopes: &EnvelopeConfig,
    ) -> bool {
        match self.profile.take() {
            Some((noted_at, p, g, e)) => {
                noted_at.elapsed() <= self.ttl
                    && p == *profile
                    && g == *gamification
                    && e == *envelopes
            }
            None => false,
        }
    }

    fn sweep(&mut self) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, (noted_at, _)| noted_at.elapsed() <= ttl);
        if self
            .profile
            .as_ref()
            .is_some_and(|(noted_at, ..)| noted_at.elapsed() > ttl)
        {
            self.profile = None;
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.profile = None;
    }
}

struct Session {
    user_id: String,
    dispatch: DispatchFn,
    realtime_tasks: Vec<JoinHandle<()>>,
}

struct Inner {
    session: Option<Session>,
    debounce_task: Option<JoinHandle<()>>,
    /// Baseline for delta detection; `None` means everything counts as
    /// changed (which is exactly what the migration push needs).
    last_synced: Option<AppState>,
    echo: EchoGuard,
    online: bool,
}

/// The stateful coordinator between local state and the remote store.
pub struct SyncOrchestrator {
    backend: Arc<dyn RemoteBackend>,
    queue: Arc<WriteQueue>,
    debounce: Duration,
    inner: Mutex<Inner>,
    status_tx: watch::Sender<SyncStatus>,
    /// Self-handle for the tasks the orchestrator spawns.
    weak: Weak<Self>,
}

impl SyncOrchestrator {
    #[must_use]
    pub fn new(backend: Arc<dyn RemoteBackend>, queue: Arc<WriteQueue>) -> Arc<Self> {
        Self::with_debounce(backend, queue, DEFAULT_DEBOUNCE)
    }

    #[must_use]
    pub fn with_debounce(
        backend: Arc<dyn RemoteBackend>,
        queue: Arc<WriteQueue>,
        debounce: Duration,
    ) -> Arc<Self> {
        let (status_tx, _) = watch::channel(SyncStatus::Idle);
        Arc::new_cyclic(|weak| Self {
            backend,
            queue,
            debounce,
            inner: Mutex::new(Inner {
                session: None,
                debounce_task: None,
                last_synced: None,
                echo: EchoGuard::new(ECHO_TTL),
                online: true,
            }),
            status_tx,
            weak: weak.clone(),
        })
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        *self.status_tx.borrow()
    }

    /// Watch channel for status indicators.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    /// Binds the orchestrator to an authenticated session: opens realtime
    /// subscriptions for every synced table and immediately retries any
    /// operations left over from a prior interrupted session.
    ///
    /// Calling `init` again (e.g. with a refreshed session after the
    /// realtime subscriptions dropped) tears down the previous
    /// subscriptions first.
    pub fn init(&self, user_id: &str, dispatch: DispatchFn) {
        let Some(strong) = self.weak.upgrade() else {
            return;
        };
        let tables = Table::ENTITY_TABLES.into_iter().chain([Table::Profiles]);
        let mut realtime_tasks = Vec::with_capacity(Table::ENTITY_TABLES.len() + 1);
        for table in tables {
            let mut rx = self.backend.subscribe(table, user_id);
            let this = Arc::clone(&strong);
            realtime_tasks.push(tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    this.handle_remote_event(table, &event);
                }
            }));
        }

        {
            let mut inner = self.lock_inner();
            if let Some(previous) = inner.session.take() {
                for task in previous.realtime_tasks {
                    task.abort();
                }
            }
            inner.session = Some(Session {
                user_id: user_id.to_string(),
                dispatch,
                realtime_tasks,
            });
        }
        info!(user_id, "sync session initialized; realtime subscriptions active");

        tokio::spawn(async move {
            strong.flush_pending().await;
        });
    }

    /// Tears down subscriptions and cancels any pending debounce timer.
    /// Idempotent; safe to call when never initialized.
    pub fn destroy(&self) {
        let mut inner = self.lock_inner();
        if let Some(session) = inner.session.take() {
            for task in session.realtime_tasks {
                task.abort();
            }
        }
        if let Some(task) = inner.debounce_task.take() {
            task.abort();
        }
        inner.last_synced = None;
        inner.echo.clear();
    }

    /// Marks `state` as already in sync with the remote store, making it
    /// the delta baseline. Called after a remote-sourced hydration so the
    /// freshly loaded state is not immediately written back out.
    pub fn mark_synced(&self, state: &AppState) {
        self.lock_inner().last_synced = Some(state.clone());
    }

    /// Observer for local state transitions. Debounced: the outbound cycle
    /// runs only after a quiet period with no further calls, collapsing a
    /// burst of rapid edits into one round trip.
    pub fn on_state_change(&self, state: &AppState) {
        let Some(this) = self.weak.upgrade() else {
            return;
        };
        let mut inner = self.lock_inner();
        if inner.session.is_none() {
            return;
        }
        if let Some(task) = inner.debounce_task.take() {
            task.abort();
        }
        let state = state.clone();
        let delay = self.debounce;
        inner.debounce_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.persist_diff(state).await;
        }));
    }

    /// Enqueues and flushes a deletion immediately, bypassing the debounce:
    /// a delayed delete could lose the race against a queued upsert and
    /// resurrect the row on another device.
    pub async fn sync_delete(&self, table: Table, id: &str) {
        let user_id = {
            let mut inner = self.lock_inner();
            let Some(session) = inner.session.as_ref() else {
                return;
            };
            let user_id = session.user_id.clone();
            // Drop the row from the baseline so a later diff pass cannot
            // re-upsert it from a stale snapshot.
            if let Some(baseline) = inner.last_synced.as_mut() {
                match table {
                    Table::Goals => baseline.goals.retain(|g| g.id != id),
                    Table::Transactions => baseline.transactions.retain(|t| t.id != id),
                    Table::Routines => baseline.routines.retain(|r| r.id != id),
                    Table::Profiles => {}
                }
            }
            user_id
        };
        self.queue.enqueue(
            OpKind::Delete,
            table,
            serde_json::json!({ "id": id }),
            &user_id,
        );
        self.flush_pending().await;
    }

    /// Explicit retry entry point (status indicators expose this as
    /// "sync now").
    pub async fn force_sync(&self) {
        self.flush_pending().await;
    }

    /// Network availability toggle. Going offline surfaces immediately in
    /// the status signal; coming back online retries the queue.
    pub fn set_online(&self, online: bool) {
        {
            let mut inner = self.lock_inner();
            inner.online = online;
        }
        if online {
            self.set_status(SyncStatus::Idle);
            if let Some(this) = self.weak.upgrade() {
                tokio::spawn(async move {
                    this.flush_pending().await;
                });
            }
        } else {
            self.set_status(SyncStatus::Offline);
        }
    }

    // ── Inbound path ─────────────────────────────────────────────

    fn handle_remote_event(&self, table: Table, event: &crate::sync::backend::ChangeEvent) {
        let (dispatch, action) = {
            let mut inner = self.lock_inner();
            let Some(session) = inner.session.as_ref() else {
                return;
            };
            let dispatch = Arc::clone(&session.dispatch);

            let action = if table == Table::Profiles {
                let Some(row) = event.new_row.as_ref() else {
                    return;
                };
                let (profile, gamification, envelopes) = wire::profile_from_row(row);
                inner.echo.note_profile(
                    profile.clone(),
                    gamification.clone(),
                    envelopes.clone(),
                );
                Action::SyncProfile {
                    profile,
                    gamification,
                    envelopes,
                }
            } else {
                let Some(id) = event.row_id().map(ToString::to_string) else {
                    return;
                };
                if event.is_removal() {
                    // Removed rows never show up in the outbound diff, so
                    // no guard entry is needed.
                    Action::SyncRemove { table, id }
                } else {
                    let Some(row) = event.new_row.as_ref() else {
                        return;
                    };
                    let entity = match table {
                        Table::Goals => SyncedEntity::Goal(wire::goal_from_row(row)),
                        Table::Transactions => SyncedEntity::Transaction(wire::tx_from_row(row)),
                        Table::Routines => SyncedEntity::Routine(wire::routine_from_row(row)),
                        Table::Profiles => unreachable!(),
                    };
                    let applied = match &entity {
                        SyncedEntity::Goal(g) => AppliedRemote::Goal(g.clone()),
                        SyncedEntity::Transaction(t) => AppliedRemote::Transaction(t.clone()),
                        SyncedEntity::Routine(r) => AppliedRemote::Routine(r.clone()),
                    };
                    inner.echo.note(table, &id, applied);
                    Action::SyncUpsert(entity)
                }
            };
            (dispatch, action)
        };
        // Dispatch outside the lock: the store's change observers re-enter
        // `on_state_change`.
        debug!(%table, "applying inbound remote change");
        dispatch(action);
    }

    // ── Outbound path ────────────────────────────────────────────

    async fn persist_diff(&self, state: AppState) {
        let (enqueued, online) = {
            let mut inner = self.lock_inner();
            let Some(session) = inner.session.as_ref() else {
                return;
            };
            let user_id = session.user_id.clone();
            inner.echo.sweep();

            let mut enqueued = 0usize;

            let baseline = inner.last_synced.take();
            for goal in &state.goals {
                let changed = baseline
                    .as_ref()
                    .is_none_or(|b| !b.goals.iter().any(|g| g == goal));
                if changed && !inner.echo.consume_goal(goal) {
                    self.queue.enqueue(
                        OpKind::Upsert,
                        Table::Goals,
                        wire::goal_to_row(goal, &user_id),
                        &user_id,
                    );
                    enqueued += 1;
                }
            }
            for tx in &state.transactions {
                let changed = baseline
                    .as_ref()
                    .is_none_or(|b| !b.transactions.iter().any(|t| t == tx));
                if changed && !inner.echo.consume_tx(tx) {
                    self.queue.enqueue(
                        OpKind::Upsert,
                        Table::Transactions,
                        wire::tx_to_row(tx, &user_id),
                        &user_id,
                    );
                    enqueued += 1;
                }
            }
            for routine in &state.routines {
                let changed = baseline
                    .as_ref()
                    .is_none_or(|b| !b.routines.iter().any(|r| r == routine));
                if changed && !inner.echo.consume_routine(routine) {
                    self.queue.enqueue(
                        OpKind::Upsert,
                        Table::Routines,
                        wire::routine_to_row(routine, &user_id),
                        &user_id,
                    );
                    enqueued += 1;
                }
            }

            let profile_changed = baseline.as_ref().map_or_else(
                || {
                    state.profile != Profile::default()
                        || state.gamification != GamificationState::default()
                        || state.envelopes != EnvelopeConfig::default()
                },
                |b| {
                    b.profile != state.profile
                        || b.gamification != state.gamification
                        || b.envelopes != state.envelopes
                },
            );
            if profile_changed
                && !inner.echo.consume_profile(
                    &state.profile,
                    &state.gamification,
                    &state.envelopes,
                )
            {
                self.queue.enqueue(
                    OpKind::Upsert,
                    Table::Profiles,
                    wire::profile_to_row(
                        &state.profile,
                        &state.gamification,
                        &state.envelopes,
                        &user_id,
                    ),
                    &user_id,
                );
                enqueued += 1;
            }

            // The queue now durably holds the delta, so the baseline can
            // advance even if the flush below fails.
            inner.last_synced = Some(state);
            (enqueued, inner.online)
        };

        if enqueued == 0 {
            return;
        }
        if !online {
            self.set_status(SyncStatus::Offline);
            return;
        }
        self.flush_pending().await;
    }

    async fn flush_pending(&self) {
        if self.queue.pending_count() == 0 {
            return;
        }
        {
            let inner = self.lock_inner();
            if inner.session.is_none() {
                return;
            }
            if !inner.online {
                self.set_status(SyncStatus::Offline);
                return;
            }
        }
        self.set_status(SyncStatus::Syncing);
        match self.queue.flush(self.backend.as_ref()).await {
            Ok(report) if report.fully_applied() => self.set_status(SyncStatus::Idle),
            Ok(report) => {
                warn!(failed = report.failed, "flush left operations queued");
                self.set_status(SyncStatus::Error);
            }
            Err(e) => {
                warn!(error = %e, "flush failed");
                self.set_status(SyncStatus::Error);
            }
        }
    }

    fn set_status(&self, status: SyncStatus) {
        if *self.status_tx.borrow() != status {
            debug!(%status, "sync status change");
        }
        let _ = self.status_tx.send(status);
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SyncOrchestrator {
    fn drop(&mut self) {
        self.destroy();
    }
}
