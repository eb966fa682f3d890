//! Shared test fixtures: an in-memory [`RemoteBackend`] double and a few
//! entity builders. Compiled only for tests.

use crate::errors::{Error, Result};
use crate::models::{Goal, Priority, Table};
use crate::state::{GoalDraft, RoutineDraft, TransactionDraft};
use crate::sync::backend::{ChangeEvent, RemoteBackend};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

/// Holds the next upsert on a table open until released, so a test can
/// interleave other work with an in-flight backend call.
pub struct UpsertGate {
    /// Resolves once the backend call has started.
    pub entered: oneshot::Receiver<()>,
    /// Lets the held call proceed.
    pub release: oneshot::Sender<()>,
}

struct GateInner {
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// Scriptable remote backend: seedable row sets, per-table injected
/// failures, recorded calls, and a hand-cranked change feed.
#[derive(Default)]
pub struct MockBackend {
    rows: Mutex<HashMap<Table, Vec<Value>>>,
    profile: Mutex<Option<Value>>,
    failing: Mutex<HashSet<Table>>,
    upserts: Mutex<Vec<(Table, Vec<Value>)>>,
    deletes: Mutex<Vec<(Table, String)>>,
    feeds: Mutex<HashMap<Table, Vec<mpsc::UnboundedSender<ChangeEvent>>>>,
    gates: Mutex<HashMap<Table, GateInner>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed_rows(&self, table: Table, rows: Vec<Value>) {
        self.rows.lock().unwrap().insert(table, rows);
    }

    pub fn seed_profile(&self, row: Value) {
        *self.profile.lock().unwrap() = Some(row);
    }

    /// Makes every call touching `table` fail until [`clear_failures`].
    ///
    /// [`clear_failures`]: Self::clear_failures
    pub fn fail_table(&self, table: Table) {
        self.failing.lock().unwrap().insert(table);
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn upsert_calls(&self) -> Vec<(Table, Vec<Value>)> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn delete_calls(&self) -> Vec<(Table, String)> {
        self.deletes.lock().unwrap().clone()
    }

    /// Delivers a change event to every open subscription on `table`.
    pub fn push_event(&self, table: Table, event: ChangeEvent) {
        let mut feeds = self.feeds.lock().unwrap();
        if let Some(senders) = feeds.get_mut(&table) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    /// Arms a gate on the next `upsert_rows` call for `table`.
    pub fn gate_next_upsert(&self, table: Table) -> UpsertGate {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(
            table,
            GateInner {
                entered: entered_tx,
                release: release_rx,
            },
        );
        UpsertGate {
            entered: entered_rx,
            release: release_tx,
        }
    }

    fn check(&self, table: Table) -> Result<()> {
        if self.failing.lock().unwrap().contains(&table) {
            return Err(Error::Remote {
                message: format!("injected failure for {table}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for MockBackend {
    async fn fetch_rows(&self, table: Table, _user_id: &str) -> Result<Vec<Value>> {
        self.check(table)?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&table)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_profile(&self, _user_id: &str) -> Result<Option<Value>> {
        self.check(Table::Profiles)?;
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn upsert_rows(&self, table: Table, rows: Vec<Value>) -> Result<()> {
        let gate = self.gates.lock().unwrap().remove(&table);
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.release.await;
        }
        self.check(table)?;
        self.upserts.lock().unwrap().push((table, rows));
        Ok(())
    }

    async fn soft_delete_row(&self, table: Table, id: &str, _user_id: &str) -> Result<()> {
        self.check(table)?;
        self.deletes.lock().unwrap().push((table, id.to_string()));
        Ok(())
    }

    fn subscribe(&self, table: Table, _user_id: &str) -> mpsc::UnboundedReceiver<ChangeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().unwrap().entry(table).or_default().push(tx);
        rx
    }
}

// ── Entity builders ──────────────────────────────────────────────

pub fn goal_draft(name: &str, target_amount: &str) -> GoalDraft {
    GoalDraft {
        name: name.to_string(),
        target_amount: target_amount.to_string(),
        ..GoalDraft::default()
    }
}

pub fn tx_draft(note: &str, amount: &str) -> TransactionDraft {
    TransactionDraft {
        note: note.to_string(),
        amount: amount.to_string(),
        category: "general".to_string(),
        ..TransactionDraft::default()
    }
}

pub fn routine_draft(name: &str) -> RoutineDraft {
    RoutineDraft {
        name: name.to_string(),
        category: "habit".to_string(),
        ..RoutineDraft::default()
    }
}

pub fn sample_goal(id: &str, name: &str) -> Goal {
    let now = Utc::now();
    Goal {
        id: id.to_string(),
        name: name.to_string(),
        description: String::new(),
        target_amount: dec!(100000),
        current_amount: dec!(0),
        deadline: None,
        priority: Priority::Medium,
        color: "#00e5c3".to_string(),
        image_url: None,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

/// A goal in the remote's snake_case row shape.
pub fn sample_goal_row(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "user_id": "u1",
        "name": name,
        "description": "",
        "target_amount": 100000,
        "current_amount": 0,
        "priority": "medium",
        "color": "#00e5c3",
        "version": 1,
        "is_deleted": false,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339(),
    })
}
