//! Outbound helpers. Delivery failures are logged and swallowed: by the time
//! anything is sent the match state is already persisted.

use tracing::{debug, warn};

use super::GameService;
use crate::domain::{player_view, Match};
use crate::error::AppError;
use crate::store::keys;
use crate::ws::protocol::ServerMsg;

impl GameService {
    pub(super) async fn broadcast(&self, room_id: &str, msg: &ServerMsg) {
        let payload = match msg.to_json() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, room_id = %room_id, "dropping unencodable broadcast");
                return;
            }
        };
        if let Err(err) = self.notifier.broadcast(room_id, payload).await {
            warn!(error = %err, room_id = %room_id, "room broadcast failed");
        }
    }

    /// Route `msg` to whichever process currently owns `player`'s
    /// connection. Players without presence are skipped.
    pub(super) async fn send_to_player(&self, player: &str, msg: &ServerMsg) {
        let server_id = match self.repo.get_owning_process(player).await {
            Ok(Some(server_id)) => server_id,
            Ok(None) => {
                debug!(player = %player, "player not connected; dropping solo message");
                return;
            }
            Err(err) => {
                warn!(error = %err, player = %player, "presence lookup failed");
                return;
            }
        };
        let payload = match msg.to_json() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, player = %player, "dropping unencodable solo message");
                return;
            }
        };
        let channel = keys::solo_channel(&server_id, player);
        if let Err(err) = self.notifier.solo(&channel, payload).await {
            warn!(error = %err, player = %player, "solo delivery failed");
        }
    }

    pub(super) async fn report(&self, player: &str, err: &AppError) {
        self.send_to_player(player, &ServerMsg::error(err)).await;
    }

    /// Send `player` their own view of the match.
    pub(super) async fn push_state(&self, state: &Match, player: &str) {
        match player_view(state, player) {
            Ok(view) => self.send_to_player(player, &ServerMsg::GameState(view)).await,
            Err(err) => warn!(error = %err, match_id = %state.id, player = %player, "cannot build player view"),
        }
    }

    pub(super) async fn push_state_to_all(&self, state: &Match) {
        for player in &state.players {
            self.push_state(state, player).await;
        }
    }
}
