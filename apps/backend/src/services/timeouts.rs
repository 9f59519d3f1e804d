//! Routes key-expiration events to the game service.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::services::game::GameService;
use crate::store::keys::TimerKey;
use crate::store::CoordinationStore;
use crate::utils::backoff::{
    is_transient, retry_contended, retry_delay, ATTEMPT_CEILING, ATTEMPT_FLOOR,
};

#[derive(Clone)]
pub struct TimeoutListener {
    store: Arc<dyn CoordinationStore>,
    game: Arc<GameService>,
}

impl TimeoutListener {
    pub fn new(store: Arc<dyn CoordinationStore>, game: Arc<GameService>) -> Self {
        Self { store, game }
    }

    /// Run the listener until `shutdown` fires. The subscription is
    /// re-established with backoff when it drops.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    async fn run(self, shutdown: CancellationToken) {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.listen(&shutdown).await {
                Ok(()) => {
                    info!("timeout listener stopped");
                    return;
                }
                Err(err) if !is_transient(&err) => {
                    error!(error = %err, attempt, "timeout listener failed permanently");
                    return;
                }
                Err(err) => {
                    let delay = retry_delay(attempt);
                    warn!(
                        error = %err,
                        attempt,
                        retry_delay_secs = delay.as_secs_f64(),
                        "expiration subscription lost, retrying"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => return,
                        _ = sleep(delay) => {}
                    }
                    if attempt >= ATTEMPT_CEILING {
                        attempt = ATTEMPT_FLOOR;
                    }
                }
            }
        }
    }

    async fn listen(&self, shutdown: &CancellationToken) -> Result<(), AppError> {
        let mut expirations = self.store.expirations().await?;
        info!("listening for timer expirations");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                next = expirations.next() => {
                    let Some(msg) = next else {
                        return Err(AppError::store_unavailable("expiration stream ended"));
                    };
                    self.dispatch_key(&msg.payload);
                }
            }
        }
    }

    /// Hand an expired key to its handler on a separate task so that one slow
    /// match never delays the timers of another. Returns `None` for keys that
    /// are not timers.
    pub fn dispatch_key(&self, key: &str) -> Option<JoinHandle<()>> {
        let Some(timer) = TimerKey::parse(key) else {
            debug!(key = %key, "ignoring expired non-timer key");
            return None;
        };
        let this = self.clone();
        Some(tokio::spawn(async move { this.fire(timer).await }))
    }

    async fn fire(&self, timer: TimerKey) {
        let key = timer.to_key();
        if let Err(err) = retry_contended(&key, || self.route(&timer)).await {
            warn!(error = %err, timer = %key, "timer handler failed");
        }
    }

    async fn route(&self, timer: &TimerKey) -> Result<(), AppError> {
        match timer {
            TimerKey::Turn { match_id } => self.game.handle_turn_timeout(match_id).await,
            TimerKey::Placement { match_id } => self.game.handle_place_timeout(match_id).await,
            TimerKey::MatchLimit { match_id } => self.game.handle_match_limit(match_id).await,
            TimerKey::Disconnect {
                match_id,
                player_id,
            } => self.game.handle_disconnect(match_id, player_id).await,
        }
    }
}
