//! Bidirectional synchronization between the local state store and the
//! remote multi-device store.
//!
//! Outbound: state deltas are debounced, translated to wire rows and pushed
//! through a durable write queue. Inbound: realtime change events are mapped
//! back to domain entities and applied through the reducer, guarded against
//! write loops.

/// Remote backend seam (row CRUD + change feed)
pub mod backend;
/// Session-start source-of-truth resolution
pub mod hydrate;
/// Debounce, delta detection, realtime ingestion, status signal
pub mod orchestrator;
/// Durable, deduplicated outbound operation queue
pub mod queue;
/// Domain ↔ wire row mapping with total defaults
pub mod wire;
