//! Connection hub: the process-local registry of live connections.
//!
//! All registry mutations happen on one task, [`HubLoop`], which selects over
//! three bounded queues (register, unregister, dispatch). [`Hub`] is the cheap
//! cloneable handle used by sessions and by the game service; it never touches
//! the registry directly. Cross-process fan-out goes through the store: the
//! hub publishes, and per-room forwarders on every process feed matching
//! messages back into their local dispatch queue.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::errors::ErrorCode;
use crate::repos::MatchRepository;
use crate::services::game::GameService;
use crate::services::notifier::Notifier;
use crate::store::{keys, CoordinationStore};
use crate::utils::backoff::retry_contended;
use crate::ws::broker::{spawn_forwarder, Source};
use crate::ws::protocol::ServerMsg;

pub type ConnId = Uuid;

/// Outbound frames buffered per connection before it is considered
/// unresponsive.
pub const OUTBOUND_CAPACITY: usize = 256;

const QUEUE_CAPACITY: usize = 1024;

/// Hub-side half of one live connection. Dropping it closes the session's
/// outbound stream, which ends the session.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnId,
    pub room_id: String,
    pub player_id: String,
    outbound: mpsc::Sender<String>,
}

impl Connection {
    pub fn new(
        room_id: impl Into<String>,
        player_id: impl Into<String>,
    ) -> (Self, mpsc::Receiver<String>) {
        Self::with_capacity(room_id, player_id, OUTBOUND_CAPACITY)
    }

    pub fn with_capacity(
        room_id: impl Into<String>,
        player_id: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(capacity);
        let conn = Self {
            id: Uuid::new_v4(),
            room_id: room_id.into(),
            player_id: player_id.into(),
            outbound,
        };
        (conn, rx)
    }
}

/// Work item for local delivery.
#[derive(Debug, Clone)]
pub enum Dispatch {
    Room { room_id: String, payload: String },
    Solo { player_id: String, payload: String },
}

#[derive(Debug)]
struct Unregister {
    conn_id: ConnId,
    /// Last frame to push before closing, e.g. the reason for a rejection.
    farewell: Option<String>,
}

#[derive(Clone)]
pub struct Hub {
    server_id: Arc<str>,
    store: Arc<dyn CoordinationStore>,
    register_tx: mpsc::Sender<Connection>,
    unregister_tx: mpsc::Sender<Unregister>,
    dispatch_tx: mpsc::Sender<Dispatch>,
}

impl Hub {
    /// Build the handle and its (not yet running) loop. The loop is started
    /// separately so the handle can be given to the game service first.
    pub fn new(server_id: impl Into<String>, store: Arc<dyn CoordinationStore>) -> (Self, HubLoop) {
        let (register_tx, register_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (unregister_tx, unregister_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (dispatch_tx, dispatch_rx) = mpsc::channel(QUEUE_CAPACITY);

        let hub = Self {
            server_id: Arc::from(server_id.into()),
            store,
            register_tx,
            unregister_tx,
            dispatch_tx,
        };
        let hub_loop = HubLoop {
            hub: hub.clone(),
            register_rx,
            unregister_rx,
            dispatch_rx,
            rooms: HashMap::new(),
            connections: HashMap::new(),
            players: HashMap::new(),
        };
        (hub, hub_loop)
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub async fn register(&self, conn: Connection) -> Result<(), AppError> {
        self.register_tx
            .send(conn)
            .await
            .map_err(|_| hub_stopped())
    }

    /// Idempotent; unknown or already removed connections are ignored.
    pub async fn unregister(&self, conn_id: ConnId) -> Result<(), AppError> {
        self.unregister_tx
            .send(Unregister {
                conn_id,
                farewell: None,
            })
            .await
            .map_err(|_| hub_stopped())
    }

    /// Push `err` to the connection, then unregister it.
    pub async fn reject(&self, conn_id: ConnId, err: &AppError) -> Result<(), AppError> {
        let farewell = ServerMsg::error(err).to_json().ok();
        self.unregister_tx
            .send(Unregister { conn_id, farewell })
            .await
            .map_err(|_| hub_stopped())
    }

    /// Publish to `room_id` on every process.
    pub async fn broadcast_to_room(&self, room_id: &str, payload: &str) -> Result<(), AppError> {
        self.store
            .publish(&keys::room_channel(room_id), payload)
            .await
    }

    /// Publish on a solo channel; only the owning process delivers it.
    pub async fn send_to_player(&self, channel: &str, payload: &str) -> Result<(), AppError> {
        self.store.publish(channel, payload).await
    }
}

#[async_trait]
impl Notifier for Hub {
    async fn broadcast(&self, room_id: &str, payload: String) -> Result<(), AppError> {
        self.broadcast_to_room(room_id, &payload).await
    }

    async fn solo(&self, channel: &str, payload: String) -> Result<(), AppError> {
        self.send_to_player(channel, &payload).await
    }
}

fn hub_stopped() -> AppError {
    AppError::internal(ErrorCode::Internal, "connection hub is not running")
}

struct Room {
    members: HashSet<ConnId>,
    subscription: CancellationToken,
}

/// The task that owns the registry.
pub struct HubLoop {
    hub: Hub,
    register_rx: mpsc::Receiver<Connection>,
    unregister_rx: mpsc::Receiver<Unregister>,
    dispatch_rx: mpsc::Receiver<Dispatch>,
    rooms: HashMap<String, Room>,
    connections: HashMap<ConnId, Connection>,
    /// Current local connection of each player.
    players: HashMap<String, ConnId>,
}

impl HubLoop {
    pub fn spawn(self, game: Arc<GameService>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(game, shutdown))
    }

    async fn run(mut self, game: Arc<GameService>, shutdown: CancellationToken) {
        let repo = game.repo().clone();
        let server_id = self.hub.server_id().to_string();

        let solo = Source::Solo {
            server_id: server_id.clone(),
        };
        match self
            .hub
            .store
            .psubscribe(&keys::solo_pattern(&server_id))
            .await
        {
            Ok(sub) => spawn_forwarder(
                self.hub.store.clone(),
                solo,
                sub,
                self.hub.dispatch_tx.clone(),
                shutdown.child_token(),
            ),
            Err(err) => {
                error!(error = %err, server_id = %server_id, "[WS HUB] solo subscription failed; hub not started");
                return;
            }
        }

        info!(server_id = %server_id, "[WS HUB] running");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(conn) = self.register_rx.recv() => {
                    self.on_register(conn, &game, &repo, &shutdown).await;
                }
                Some(req) = self.unregister_rx.recv() => {
                    self.on_unregister(req, &game, &repo).await;
                }
                Some(item) = self.dispatch_rx.recv() => {
                    self.on_dispatch(item, &game, &repo).await;
                }
                else => break,
            }
        }

        for room in self.rooms.values() {
            room.subscription.cancel();
        }
        info!(server_id = %server_id, "[WS HUB] stopped");
    }

    async fn on_register(
        &mut self,
        conn: Connection,
        game: &Arc<GameService>,
        repo: &MatchRepository,
        shutdown: &CancellationToken,
    ) {
        let conn_id = conn.id;
        let room_id = conn.room_id.clone();
        let player_id = conn.player_id.clone();

        // A page refresh opens a second connection for the same player; the
        // newest one wins.
        if let Some(previous) = self.players.get(&player_id).copied() {
            info!(player_id = %player_id, old = %previous, new = %conn_id, "[WS HUB] replacing connection");
            self.detach(previous);
        }

        if !self.rooms.contains_key(&room_id) {
            match self
                .hub
                .store
                .subscribe(&keys::room_channel(&room_id))
                .await
            {
                Ok(sub) => {
                    let token = shutdown.child_token();
                    spawn_forwarder(
                        self.hub.store.clone(),
                        Source::Room(room_id.clone()),
                        sub,
                        self.hub.dispatch_tx.clone(),
                        token.clone(),
                    );
                    self.rooms.insert(
                        room_id.clone(),
                        Room {
                            members: HashSet::new(),
                            subscription: token,
                        },
                    );
                    debug!(room_id = %room_id, "[WS HUB] room subscription opened");
                }
                Err(err) => {
                    warn!(error = %err, room_id = %room_id, "[WS HUB] room subscription failed; refusing connection");
                    refuse(conn, &err);
                    return;
                }
            }
        }

        if let Err(err) = repo.set_presence(&player_id, self.hub.server_id()).await {
            warn!(error = %err, player_id = %player_id, "[WS HUB] presence write failed; refusing connection");
            self.close_room_if_empty(&room_id);
            refuse(conn, &err);
            return;
        }

        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.members.insert(conn_id);
        }
        self.players.insert(player_id.clone(), conn_id);
        self.connections.insert(conn_id, conn);
        info!(conn_id = %conn_id, room_id = %room_id, player_id = %player_id, "[WS HUB] registered");

        let game = game.clone();
        let hub = self.hub.clone();
        tokio::spawn(async move {
            // The opponent's join, a move or a timer may hold the match lock;
            // only a real refusal closes the connection.
            let res = retry_contended("join", || game.handle_join(&room_id, &player_id)).await;
            if let Err(err) = res {
                warn!(error = %err, room_id = %room_id, player_id = %player_id, "[WS HUB] join failed");
                let _ = hub.reject(conn_id, &err).await;
            }
        });
    }

    async fn on_unregister(
        &mut self,
        req: Unregister,
        game: &Arc<GameService>,
        repo: &MatchRepository,
    ) {
        let Some(conn) = self.connections.get(&req.conn_id) else {
            return;
        };
        if let Some(farewell) = req.farewell {
            let _ = conn.outbound.try_send(farewell);
        }
        self.remove(req.conn_id, game, repo).await;
    }

    async fn on_dispatch(&mut self, item: Dispatch, game: &Arc<GameService>, repo: &MatchRepository) {
        match item {
            Dispatch::Room { room_id, payload } => {
                let Some(room) = self.rooms.get(&room_id) else {
                    return;
                };
                let mut dead = Vec::new();
                for conn_id in &room.members {
                    let Some(conn) = self.connections.get(conn_id) else {
                        continue;
                    };
                    match conn.outbound.try_send(payload.clone()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            warn!(conn_id = %conn_id, player_id = %conn.player_id, "[WS HUB] outbound buffer full; dropping connection");
                            dead.push(*conn_id);
                        }
                        Err(TrySendError::Closed(_)) => dead.push(*conn_id),
                    }
                }
                for conn_id in dead {
                    self.remove(conn_id, game, repo).await;
                }
            }
            Dispatch::Solo { player_id, payload } => {
                let Some(conn_id) = self.players.get(&player_id).copied() else {
                    debug!(player_id = %player_id, "[WS HUB] solo message for absent player dropped");
                    return;
                };
                let Some(conn) = self.connections.get(&conn_id) else {
                    return;
                };
                match conn.outbound.try_send(payload) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!(conn_id = %conn_id, player_id = %player_id, "[WS HUB] outbound buffer full; dropping connection");
                        self.remove(conn_id, game, repo).await;
                    }
                    Err(TrySendError::Closed(_)) => self.remove(conn_id, game, repo).await,
                }
            }
        }
    }

    /// Remove a connection that is going away for good: drop it from the
    /// registry, release presence, and tell the game service the player left.
    async fn remove(&mut self, conn_id: ConnId, game: &Arc<GameService>, repo: &MatchRepository) {
        let Some(conn) = self.detach(conn_id) else {
            return;
        };
        info!(conn_id = %conn_id, room_id = %conn.room_id, player_id = %conn.player_id, "[WS HUB] unregistered");

        match repo
            .remove_presence(&conn.player_id, self.hub.server_id())
            .await
        {
            Ok(true) => {
                let game = game.clone();
                let (room_id, player_id) = (conn.room_id.clone(), conn.player_id.clone());
                tokio::spawn(async move {
                    let res =
                        retry_contended("leave", || game.handle_leave(&room_id, &player_id)).await;
                    if let Err(err) = res {
                        warn!(error = %err, room_id = %room_id, player_id = %player_id, "[WS HUB] leave handling failed");
                    }
                });
            }
            Ok(false) => {
                debug!(player_id = %conn.player_id, "[WS HUB] presence owned elsewhere; not leaving");
            }
            Err(err) => {
                warn!(error = %err, player_id = %conn.player_id, "[WS HUB] presence removal failed");
            }
        }
    }

    /// Drop a connection from the registry without any store side effects.
    fn detach(&mut self, conn_id: ConnId) -> Option<Connection> {
        let conn = self.connections.remove(&conn_id)?;
        if self.players.get(&conn.player_id) == Some(&conn_id) {
            self.players.remove(&conn.player_id);
        }
        if let Some(room) = self.rooms.get_mut(&conn.room_id) {
            room.members.remove(&conn_id);
        }
        self.close_room_if_empty(&conn.room_id);
        Some(conn)
    }

    fn close_room_if_empty(&mut self, room_id: &str) {
        let empty = self
            .rooms
            .get(room_id)
            .is_some_and(|room| room.members.is_empty());
        if empty {
            if let Some(room) = self.rooms.remove(room_id) {
                room.subscription.cancel();
                debug!(room_id = %room_id, "[WS HUB] room subscription closed");
            }
        }
    }
}

/// Tell a connection why it was not accepted, then drop it.
fn refuse(conn: Connection, err: &AppError) {
    if let Ok(frame) = ServerMsg::error(err).to_json() {
        let _ = conn.outbound.try_send(frame);
    }
}
