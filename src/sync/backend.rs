//! Remote backend seam.
//!
//! The sync engine never talks to a concrete service directly; everything
//! goes through [`RemoteBackend`], injected at construction time. Rows are
//! untyped JSON objects in the remote's snake_case schema (see
//! [`crate::sync::wire`]); every table carries an `is_deleted` soft-delete
//! column and a `user_id` owner column the backend filters on.
//!
//! The backend is assumed tolerant of forward references (a transaction row
//! may arrive before the goal row its `goal_id` points at); the client does
//! not sequence cross-table flushes.

use crate::errors::Result;
use crate::models::Table;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// Event type of a realtime change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level change pushed by the remote change feed.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub new_row: Option<Value>,
    pub old_row: Option<Value>,
}

impl ChangeEvent {
    /// Id of the affected row, preferring the surviving (`new`) side.
    #[must_use]
    pub fn row_id(&self) -> Option<&str> {
        self.new_row
            .as_ref()
            .and_then(|r| r.get("id"))
            .or_else(|| self.old_row.as_ref().and_then(|r| r.get("id")))
            .and_then(Value::as_str)
    }

    /// Whether this event removes the row from the live set, either via a
    /// hard DELETE event or a soft-delete flag on the updated row.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        if self.kind == ChangeKind::Delete {
            return true;
        }
        self.new_row
            .as_ref()
            .and_then(|r| r.get("is_deleted"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Row-level access to the remote store, scoped per owning user.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Fetches all live (non-soft-deleted) rows of a table for a user.
    async fn fetch_rows(&self, table: Table, user_id: &str) -> Result<Vec<Value>>;

    /// Fetches the singleton profile row, `None` if the user has none yet.
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Value>>;

    /// Upserts a batch of rows into one table in a single round trip.
    async fn upsert_rows(&self, table: Table, rows: Vec<Value>) -> Result<()>;

    /// Marks a row soft-deleted.
    async fn soft_delete_row(&self, table: Table, id: &str, user_id: &str) -> Result<()>;

    /// Opens a realtime change subscription for one table, filtered
    /// server-side to the owning user. The subscription ends when the
    /// receiver is dropped; it is not assumed to live forever, and a
    /// re-`init` of the orchestrator re-subscribes.
    fn subscribe(&self, table: Table, user_id: &str) -> mpsc::UnboundedReceiver<ChangeEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn removal_is_detected_from_event_kind_or_soft_flag() {
        let hard = ChangeEvent {
            kind: ChangeKind::Delete,
            new_row: None,
            old_row: Some(json!({ "id": "g1" })),
        };
        assert!(hard.is_removal());
        assert_eq!(hard.row_id(), Some("g1"));

        let soft = ChangeEvent {
            kind: ChangeKind::Update,
            new_row: Some(json!({ "id": "g2", "is_deleted": true })),
            old_row: None,
        };
        assert!(soft.is_removal());

        let live = ChangeEvent {
            kind: ChangeKind::Update,
            new_row: Some(json!({ "id": "g3", "is_deleted": false })),
            old_row: None,
        };
        assert!(!live.is_removal());
        assert_eq!(live.row_id(), Some("g3"));
    }
}
