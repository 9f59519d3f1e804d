//! Bridges between store pub/sub and the hub's dispatch queue.
//!
//! Each forwarder owns one subscription, turns incoming store messages into
//! [`Dispatch`] items for the hub loop, and re-subscribes with backoff if the
//! store connection drops. Forwarders stop when their token is cancelled.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::store::{keys, CoordinationStore, StoreMessage, Subscription};
use crate::utils::backoff::{is_transient, retry_delay, ATTEMPT_CEILING, ATTEMPT_FLOOR};
use crate::ws::hub::Dispatch;

/// What a forwarder listens to.
#[derive(Debug, Clone)]
pub(crate) enum Source {
    /// One room's broadcast channel.
    Room(String),
    /// Every solo channel addressed to this server.
    Solo { server_id: String },
}

impl Source {
    async fn subscribe(&self, store: &dyn CoordinationStore) -> Result<Subscription, AppError> {
        match self {
            Source::Room(room_id) => store.subscribe(&keys::room_channel(room_id)).await,
            Source::Solo { server_id } => store.psubscribe(&keys::solo_pattern(server_id)).await,
        }
    }

    fn to_dispatch(&self, msg: StoreMessage) -> Option<Dispatch> {
        match self {
            Source::Room(room_id) => Some(Dispatch::Room {
                room_id: room_id.clone(),
                payload: msg.payload,
            }),
            Source::Solo { server_id } => {
                let Some(player_id) = keys::solo_player(server_id, &msg.channel) else {
                    warn!(channel = %msg.channel, "[WS BROKER] solo message on foreign channel");
                    return None;
                };
                Some(Dispatch::Solo {
                    player_id: player_id.to_string(),
                    payload: msg.payload,
                })
            }
        }
    }
}

/// Spawn a forwarder. `initial` is an already-established subscription, so
/// a caller that awaited it knows delivery is live before the task starts.
pub(crate) fn spawn_forwarder(
    store: Arc<dyn CoordinationStore>,
    source: Source,
    initial: Subscription,
    dispatch: mpsc::Sender<Dispatch>,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        run_forwarder_with_retry(store, source, initial, dispatch, token).await;
    });
}

async fn run_forwarder_with_retry(
    store: Arc<dyn CoordinationStore>,
    source: Source,
    initial: Subscription,
    dispatch: mpsc::Sender<Dispatch>,
    token: CancellationToken,
) {
    let mut subscription = Some(initial);
    let mut attempt = 0u32;

    loop {
        let sub = match subscription.take() {
            Some(sub) => sub,
            None => {
                attempt += 1;
                match source.subscribe(store.as_ref()).await {
                    Ok(sub) => {
                        info!(source = ?source, attempt, "[WS BROKER] subscription re-established");
                        attempt = 0;
                        sub
                    }
                    Err(err) if !is_transient(&err) => {
                        error!(error = %err, source = ?source, "[WS BROKER] permanent subscription failure");
                        return;
                    }
                    Err(err) => {
                        let delay = retry_delay(attempt);
                        warn!(
                            error = %err,
                            source = ?source,
                            attempt,
                            retry_delay_secs = delay.as_secs_f64(),
                            "[WS BROKER] subscribe failed, retrying"
                        );
                        tokio::select! {
                            _ = token.cancelled() => return,
                            _ = sleep(delay) => {}
                        }
                        if attempt >= ATTEMPT_CEILING {
                            attempt = ATTEMPT_FLOOR;
                        }
                        continue;
                    }
                }
            }
        };

        match forward(&source, sub, &dispatch, &token).await {
            Flow::Stopped => {
                debug!(source = ?source, "[WS BROKER] forwarder stopped");
                return;
            }
            Flow::Lost => {
                warn!(source = ?source, "[WS BROKER] subscription stream ended, reconnecting");
            }
        }
    }
}

enum Flow {
    Stopped,
    Lost,
}

async fn forward(
    source: &Source,
    mut sub: Subscription,
    dispatch: &mpsc::Sender<Dispatch>,
    token: &CancellationToken,
) -> Flow {
    loop {
        tokio::select! {
            _ = token.cancelled() => return Flow::Stopped,
            next = sub.next() => {
                let Some(msg) = next else {
                    return Flow::Lost;
                };
                let Some(item) = source.to_dispatch(msg) else {
                    continue;
                };
                if dispatch.send(item).await.is_err() {
                    // Hub loop is gone.
                    return Flow::Stopped;
                }
            }
        }
    }
}
