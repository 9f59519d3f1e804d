use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::repos::MatchRepository;
use crate::services::game::GameService;
use crate::ws::hub::Hub;

/// Handles shared by every HTTP worker. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub game: Arc<GameService>,
    pub repo: MatchRepository,
    /// Cancels the hub loop, its forwarders and the timeout listener.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn server_id(&self) -> &str {
        self.hub.server_id()
    }
}
