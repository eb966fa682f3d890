//! Session-start hydration.
//!
//! Runs once per session and decides the single source of truth: local data
//! for guests, remote data when the remote store has any, and local data
//! flagged for migration when an authenticated user's remote store is still
//! empty (first login after offline use). Remote wins wholesale over local
//! on first hydration; offline edits made before first login are not merged.
//!
//! A failed remote fetch is never fatal — the already-loaded local state
//! carries the session and the failure is only logged.

use crate::errors::Result;
use crate::models::Table;
use crate::state::LoadedState;
use crate::storage::LocalStore;
use crate::sync::backend::RemoteBackend;
use crate::sync::wire;
use tracing::{info, warn};

/// Provenance of the resolved session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSource {
    Local,
    Remote,
    Defaults,
}

/// Result of session-start hydration.
#[derive(Debug)]
pub struct Hydration {
    pub state: LoadedState,
    pub source: StateSource,
    /// True when local-only data should be pushed to the remote store
    /// (first authenticated session of a previously offline device).
    pub needs_migration: bool,
}

fn load_local(store: &LocalStore) -> LoadedState {
    LoadedState {
        goals: store.goals(),
        transactions: store.transactions(),
        routines: store.routines(),
        profile: store.profile(),
        gamification: store.gamification(),
        envelopes: store.envelopes(),
    }
}

fn has_entities(state: &LoadedState) -> bool {
    !state.goals.is_empty() || !state.transactions.is_empty() || !state.routines.is_empty()
}

async fn fetch_remote(backend: &dyn RemoteBackend, user_id: &str) -> Result<LoadedState> {
    let goal_rows = backend.fetch_rows(Table::Goals, user_id).await?;
    let tx_rows = backend.fetch_rows(Table::Transactions, user_id).await?;
    let routine_rows = backend.fetch_rows(Table::Routines, user_id).await?;
    let profile_row = backend.fetch_profile(user_id).await?;

    let mut state = LoadedState {
        goals: goal_rows.iter().map(wire::goal_from_row).collect(),
        transactions: tx_rows.iter().map(wire::tx_from_row).collect(),
        routines: routine_rows.iter().map(wire::routine_from_row).collect(),
        ..LoadedState::default()
    };
    if let Some(row) = profile_row {
        let (profile, gamification, envelopes) = wire::profile_from_row(&row);
        state.profile = profile;
        state.gamification = gamification;
        state.envelopes = envelopes;
    }
    Ok(state)
}

/// Resolves the session's source of truth.
///
/// Local data is loaded unconditionally first (fast path). Without an
/// authenticated session it is final. With one, the remote entity set is
/// fetched and the precedence of the sync design applies: non-empty remote
/// wins wholesale; empty remote with non-empty local flags migration; both
/// empty starts from defaults.
pub async fn hydrate(
    store: &LocalStore,
    backend: Option<&dyn RemoteBackend>,
    user_id: Option<&str>,
) -> Hydration {
    let local = load_local(store);

    let (Some(backend), Some(user_id)) = (backend, user_id) else {
        return Hydration {
            state: local,
            source: StateSource::Local,
            needs_migration: false,
        };
    };

    let remote = match fetch_remote(backend, user_id).await {
        Ok(remote) => remote,
        Err(e) => {
            warn!(error = %e, "remote hydration failed; continuing with local state");
            return Hydration {
                state: local,
                source: StateSource::Local,
                needs_migration: false,
            };
        }
    };

    if has_entities(&remote) {
        info!("hydrated from remote store");
        return Hydration {
            state: remote,
            source: StateSource::Remote,
            needs_migration: false,
        };
    }

    if has_entities(&local) {
        info!("remote store empty; adopting local data and scheduling migration");
        return Hydration {
            state: local,
            source: StateSource::Local,
            needs_migration: true,
        };
    }

    Hydration {
        state: LoadedState::default(),
        source: StateSource::Defaults,
        needs_migration: false,
    }
}
