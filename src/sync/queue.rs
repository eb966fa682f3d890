//! Durable outbound write queue.
//!
//! Pending operations are deduplicated by `(table, entity id)` — a later
//! enqueue supersedes an earlier un-flushed one, and a DELETE replaces any
//! queued UPSERT for the same row. The queue is mirrored to the local store
//! on every mutation, so an interrupted session resumes exactly where it
//! left off.
//!
//! `flush` never propagates per-operation failures: a failed operation stays
//! queued for the next attempt and the rest of the queue is still tried.

use crate::errors::Result;
use crate::models::Table;
use crate::storage::{LocalStore, keys};
use crate::sync::backend::RemoteBackend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpKind {
    Upsert,
    Delete,
}

/// One queued remote operation, payload already wire-mapped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Monotonic sequence number; a superseding enqueue gets a fresh one,
    /// which is how an in-flight flush knows not to drop the newer write.
    pub seq: u64,
    pub op: OpKind,
    pub table: Table,
    pub payload: Value,
    pub user_id: String,
    pub enqueued_at: DateTime<Utc>,
}

impl PendingOperation {
    fn entity_id(&self) -> &str {
        self.payload
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// Outcome of one flush pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlushReport {
    pub applied: usize,
    pub failed: usize,
}

impl FlushReport {
    #[must_use]
    pub const fn fully_applied(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Default)]
struct QueueInner {
    ops: Vec<PendingOperation>,
    next_seq: u64,
}

/// Ordered, deduplicated, durable queue of outbound operations.
pub struct WriteQueue {
    store: Arc<LocalStore>,
    inner: Mutex<QueueInner>,
    size_tx: watch::Sender<usize>,
    /// Serializes overlapping flushes so operations are applied at most once.
    flush_gate: tokio::sync::Mutex<()>,
}

impl WriteQueue {
    /// Creates the queue, recovering any operations a previous session left
    /// in the durable mirror.
    #[must_use]
    pub fn new(store: Arc<LocalStore>) -> Self {
        let ops: Vec<PendingOperation> = store.get(keys::WRITE_QUEUE).unwrap_or_default();
        let next_seq = ops.iter().map(|op| op.seq + 1).max().unwrap_or(0);
        if !ops.is_empty() {
            debug!(pending = ops.len(), "recovered write queue from local store");
        }
        let (size_tx, _) = watch::channel(ops.len());
        Self {
            store,
            inner: Mutex::new(QueueInner { ops, next_seq }),
            size_tx,
            flush_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Inserts or replaces the pending operation for the payload's
    /// `(table, id)`. The replacement keeps the original queue position so
    /// per-entity enqueue order is preserved.
    pub fn enqueue(&self, op: OpKind, table: Table, payload: Value, user_id: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let pending = PendingOperation {
            seq,
            op,
            table,
            payload,
            user_id: user_id.to_string(),
            enqueued_at: Utc::now(),
        };
        let id = pending.entity_id().to_string();
        let existing = (!id.is_empty())
            .then(|| {
                inner
                    .ops
                    .iter()
                    .position(|o| o.table == table && o.entity_id() == id)
            })
            .flatten();
        match existing {
            Some(index) => inner.ops[index] = pending,
            None => inner.ops.push(pending),
        }
        self.persist_and_signal(&inner);
    }

    /// Number of operations waiting to be applied.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .ops
            .len()
    }

    /// Watch channel observers use to react to queue growth/shrink.
    #[must_use]
    pub fn watch_size(&self) -> watch::Receiver<usize> {
        self.size_tx.subscribe()
    }

    /// Applies every queued operation against the backend, upserts grouped
    /// per table to minimize round trips, deletes individually.
    ///
    /// A failure on one group leaves its operations queued and does not stop
    /// the rest. Safe to call concurrently with itself and with `enqueue`:
    /// an operation superseded while in flight keeps its newer form queued.
    ///
    /// # Errors
    /// Only fails if the durable mirror itself cannot be updated; network
    /// and backend errors are reflected in the [`FlushReport`] instead.
    pub async fn flush(&self, backend: &dyn RemoteBackend) -> Result<FlushReport> {
        let _gate = self.flush_gate.lock().await;

        let snapshot: Vec<PendingOperation> = {
            let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            inner.ops.clone()
        };
        if snapshot.is_empty() {
            return Ok(FlushReport::default());
        }

        let mut report = FlushReport::default();
        let mut applied_seqs: HashSet<u64> = HashSet::new();

        // Upserts, batched per table in first-seen order.
        let mut upsert_tables: Vec<Table> = Vec::new();
        for op in snapshot.iter().filter(|o| o.op == OpKind::Upsert) {
            if !upsert_tables.contains(&op.table) {
                upsert_tables.push(op.table);
            }
        }
        for table in upsert_tables {
            let group: Vec<&PendingOperation> = snapshot
                .iter()
                .filter(|o| o.op == OpKind::Upsert && o.table == table)
                .collect();
            let rows: Vec<Value> = group.iter().map(|o| o.payload.clone()).collect();
            match backend.upsert_rows(table, rows).await {
                Ok(()) => {
                    report.applied += group.len();
                    applied_seqs.extend(group.iter().map(|o| o.seq));
                }
                Err(e) => {
                    warn!(%table, count = group.len(), error = %e, "upsert batch failed; operations stay queued");
                    report.failed += group.len();
                }
            }
        }

        // Deletes, one by one, in enqueue order.
        for op in snapshot.iter().filter(|o| o.op == OpKind::Delete) {
            match backend
                .soft_delete_row(op.table, op.entity_id(), &op.user_id)
                .await
            {
                Ok(()) => {
                    report.applied += 1;
                    applied_seqs.insert(op.seq);
                }
                Err(e) => {
                    warn!(table = %op.table, id = op.entity_id(), error = %e, "delete failed; operation stays queued");
                    report.failed += 1;
                }
            }
        }

        {
            let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            inner.ops.retain(|o| !applied_seqs.contains(&o.seq));
            self.persist_and_signal(&inner);
        }

        debug!(applied = report.applied, failed = report.failed, "flush pass complete");
        Ok(report)
    }

    fn persist_and_signal(&self, inner: &QueueInner) {
        if !self.store.set(keys::WRITE_QUEUE, &inner.ops) {
            warn!("failed to mirror write queue to local store");
        }
        let _ = self.size_tx.send(inner.ops.len());
    }
}
