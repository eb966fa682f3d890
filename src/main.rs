use dotenvy::dotenv;
use metaflow::config;
use metaflow::errors::Result;
use metaflow::state::{Action, AppState, AppStore};
use metaflow::storage::LocalStore;
use metaflow::sync::hydrate;
use metaflow::sync::queue::WriteQueue;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file (as early as possible)
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = config::load_app_configuration()?;
    info!(data_dir = %app_config.data_dir.display(), "configuration loaded");

    // 4. Open the durable local mirror
    let store = Arc::new(LocalStore::open(&app_config.data_dir)?);

    // 5. Hydrate. No remote backend is wired into this binary, so hydration
    //    resolves to local state; a host application injects its own
    //    `RemoteBackend` and `SyncOrchestrator` on top of this crate.
    let hydration = hydrate::hydrate(&store, None, app_config.user_id.as_deref()).await;
    info!(source = ?hydration.source, "session hydrated");

    let mut app = AppStore::new(AppState::default());
    app.dispatch(Action::LoadData(Box::new(hydration.state)));

    let queue = WriteQueue::new(Arc::clone(&store));
    let state = app.state();
    info!(
        goals = state.goals.len(),
        transactions = state.transactions.len(),
        routines = state.routines.len(),
        total_xp = state.gamification.total_xp,
        pending_writes = queue.pending_count(),
        "MetaFlow core ready"
    );

    Ok(())
}
