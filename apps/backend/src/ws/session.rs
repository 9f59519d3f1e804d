use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::errors::ErrorCode;
use crate::services::game::GameService;
use crate::state::app_state::AppState;
use crate::store::keys;
use crate::utils::clock::unix_millis;
use crate::ws::hub::{Connection, Hub};
use crate::ws::protocol::ServerMsg;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(40);

/// Largest inbound frame accepted; game messages are tiny.
pub const MAX_FRAME_SIZE: usize = 1024;

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    #[serde(rename = "roomID")]
    pub room_id: Option<String>,
    #[serde(rename = "playerID")]
    pub player_id: Option<String>,
}

impl ConnectQuery {
    /// Both ids are required, trimmed, and must be safe to embed in store
    /// keys and channel names.
    pub fn identity(&self) -> Result<(String, String), AppError> {
        let room = self.room_id.as_deref().map(str::trim).unwrap_or_default();
        let player = self.player_id.as_deref().map(str::trim).unwrap_or_default();
        if room.is_empty() || player.is_empty() {
            return Err(AppError::invalid(
                ErrorCode::MissingIdentity,
                "roomID and playerID query parameters are required",
            ));
        }
        for (name, value) in [("roomID", room), ("playerID", player)] {
            if !keys::is_valid_id(value) {
                return Err(AppError::invalid(
                    ErrorCode::InvalidIdentity,
                    format!(
                        "{name} must be at most {} characters without ':' or whitespace",
                        keys::MAX_ID_LEN
                    ),
                ));
            }
        }
        Ok((room.to_string(), player.to_string()))
    }
}

pub async fn upgrade(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<ConnectQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (room_id, player_id) = query.identity()?;

    let session = WsSession::new(
        room_id,
        player_id,
        app_state.hub.clone(),
        app_state.game.clone(),
    );
    ws::WsResponseBuilder::new(session, &req, stream)
        .frame_size(MAX_FRAME_SIZE)
        .start()
}

pub struct WsSession {
    conn_id: Uuid,
    room_id: String,
    player_id: String,
    hub: Hub,
    game: Arc<GameService>,

    // Handed to the hub and the actor context in `started`.
    pending: Option<(Connection, mpsc::Receiver<String>)>,

    last_heartbeat: Instant,
}

impl WsSession {
    fn new(room_id: String, player_id: String, hub: Hub, game: Arc<GameService>) -> Self {
        let (conn, rx) = Connection::new(room_id.clone(), player_id.clone());
        Self {
            conn_id: conn.id,
            room_id,
            player_id,
            hub,
            game,
            pending: Some((conn, rx)),
            last_heartbeat: Instant::now(),
        }
    }

    fn send_json(ctx: &mut ws::WebsocketContext<Self>, msg: &ServerMsg) {
        match msg.to_json() {
            Ok(payload) => ctx.text(payload),
            Err(err) => warn!(error = %err, "[WS SESSION] failed to serialize outbound message"),
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |actor, ctx| {
            if Instant::now().duration_since(actor.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(
                    conn_id = %actor.conn_id,
                    player_id = %actor.player_id,
                    "[WS SESSION] heartbeat timed out"
                );
                ctx.close(Some(ws::CloseReason::from(ws::CloseCode::Normal)));
                ctx.stop();
                return;
            }
            ctx.ping(b"keepalive");
        });
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(
            conn_id = %self.conn_id,
            room_id = %self.room_id,
            player_id = %self.player_id,
            "[WS SESSION] started"
        );

        // Clock sync goes out before anything the hub may push.
        Self::send_json(
            ctx,
            &ServerMsg::SyncTime {
                server_time: unix_millis(),
            },
        );

        let Some((conn, rx)) = self.pending.take() else {
            return;
        };
        ctx.add_stream(ReceiverStream::new(rx));

        let hub = self.hub.clone();
        ctx.spawn(
            async move { hub.register(conn).await }
                .into_actor(self)
                .map(|res, actor, ctx| {
                    if let Err(err) = res {
                        warn!(
                            error = %err,
                            conn_id = %actor.conn_id,
                            "[WS SESSION] hub registration failed"
                        );
                        Self::send_json(ctx, &ServerMsg::error(&err));
                        ctx.close(Some(ws::CloseReason::from(ws::CloseCode::Error)));
                        ctx.stop();
                    }
                }),
        );

        self.start_heartbeat(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        let hub = self.hub.clone();
        let conn_id = self.conn_id;
        actix::spawn(async move {
            if let Err(err) = hub.unregister(conn_id).await {
                debug!(error = %err, conn_id = %conn_id, "[WS SESSION] unregister skipped");
            }
        });
        info!(
            conn_id = %self.conn_id,
            player_id = %self.player_id,
            "[WS SESSION] stopped"
        );
    }
}

/// Frames pushed by the hub.
impl StreamHandler<String> for WsSession {
    fn handle(&mut self, payload: String, ctx: &mut Self::Context) {
        ctx.text(payload);
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        // The hub dropped this connection (replaced, rejected or too slow).
        debug!(conn_id = %self.conn_id, "[WS SESSION] outbound channel closed");
        ctx.close(Some(ws::CloseReason::from(ws::CloseCode::Normal)));
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();

                let game = self.game.clone();
                let room_id = self.room_id.clone();
                let player_id = self.player_id.clone();
                let text = text.to_string();
                // One frame at a time: the next frame from this client is
                // not read until this one has been handled, so a player's
                // moves never race each other for the match lock.
                ctx.wait(
                    async move {
                        // Errors were already reported to the player as ERROR frames.
                        let _ = game.handle_message(&room_id, &player_id, &text).await;
                    }
                    .into_actor(self),
                );
            }
            Ok(ws::Message::Binary(_)) => {
                self.last_heartbeat = Instant::now();
                Self::send_json(
                    ctx,
                    &ServerMsg::error(&AppError::invalid(
                        ErrorCode::MalformedPayload,
                        "binary frames are not supported",
                    )),
                );
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {
                self.last_heartbeat = Instant::now();
            }
            Err(err) => {
                warn!(
                    conn_id = %self.conn_id,
                    player_id = %self.player_id,
                    error = %err,
                    "[WS SESSION] protocol error"
                );
                ctx.close(Some(ws::CloseReason::from(ws::CloseCode::Error)));
                ctx.stop();
            }
        }
    }
}
