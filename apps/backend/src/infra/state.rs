use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::repos::MatchRepository;
use crate::services::game::GameService;
use crate::services::timeouts::TimeoutListener;
use crate::state::app_state::AppState;
use crate::store::{CoordinationStore, MemoryStore, RedisStore};
use crate::ws::hub::Hub;

/// Builder for AppState (used in both tests and main). Building starts the
/// hub loop and the timeout listener; both stop when `AppState::shutdown`
/// is cancelled.
pub struct StateBuilder {
    config: Config,
    store: Option<Arc<dyn CoordinationStore>>,
}

impl StateBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: None,
        }
    }

    /// Use an already connected store instead of the one `store_url` names.
    /// Tests pass a shared `MemoryStore` to simulate several processes.
    pub fn with_store(mut self, store: Arc<dyn CoordinationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn build(self) -> Result<AppState, AppError> {
        let config = self.config;
        let store = match self.store {
            Some(store) => store,
            None => connect_store(&config).await?,
        };

        // An unreachable store at startup is fatal.
        store.ping().await?;

        let shutdown = CancellationToken::new();
        let repo = MatchRepository::new(store.clone(), config.lock_ttl);
        let (hub, hub_loop) = Hub::new(config.server_id.clone(), store.clone());
        let game = Arc::new(GameService::new(
            repo.clone(),
            Arc::new(hub.clone()),
            config.timings,
            config.finished_match_ttl,
        ));

        hub_loop.spawn(game.clone(), shutdown.child_token());
        TimeoutListener::new(store, game.clone()).spawn(shutdown.child_token());

        info!(server_id = %config.server_id, "application state ready");
        Ok(AppState {
            hub,
            game,
            repo,
            shutdown,
        })
    }
}

pub fn build_state(config: Config) -> StateBuilder {
    StateBuilder::new(config)
}

async fn connect_store(config: &Config) -> Result<Arc<dyn CoordinationStore>, AppError> {
    if config.uses_memory_store() {
        info!("using in-process store; state is not shared between processes");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = RedisStore::connect(&config.store_url).await?;
    store.enable_expiry_events().await;
    Ok(Arc::new(store))
}
