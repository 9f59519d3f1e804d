//! Player-initiated actions: firing, placing the fleet, chatting.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::GameService;
use crate::domain::{fire, place_ships, Match, Point, ShotResult};
use crate::error::AppError;
use crate::store::keys::TimerKey;
use crate::utils::clock::unix_millis;
use crate::ws::protocol::{
    decode_payload, ChatPayload, MovePayload, PlaceShipPayload, ServerMsg, TYPE_CHAT, TYPE_MOVE,
    TYPE_PLACE_SHIP,
};

impl GameService {
    pub async fn handle_move(
        &self,
        room_id: &str,
        player: &str,
        payload: &Value,
    ) -> Result<(), AppError> {
        let target = decode_payload::<MovePayload>(TYPE_MOVE, payload)?.target();

        let guard = self.acquire(room_id).await?;
        let res = self.move_locked(room_id, player, target).await;
        self.release(guard).await;
        let (state, shot) = res?;

        debug!(
            room_id = %room_id,
            player = %player,
            x = target.x,
            y = target.y,
            outcome = ?shot.outcome,
            "shot resolved"
        );

        self.broadcast(
            room_id,
            &ServerMsg::Move {
                x: target.x,
                y: target.y,
                result: shot.outcome,
                next_turn: shot.next_turn.clone(),
                by: player.to_string(),
                end_at: state.end_at,
            },
        )
        .await;

        if let Some(winner) = shot.winner {
            info!(room_id = %room_id, winner = %winner, "match won");
            self.broadcast(room_id, &ServerMsg::GameOver { winner: Some(winner) })
                .await;
        }
        Ok(())
    }

    async fn move_locked(
        &self,
        room_id: &str,
        player: &str,
        target: Point,
    ) -> Result<(Match, ShotResult), AppError> {
        let mut state = self.repo.require(room_id).await?;
        let shot = fire(&mut state, player, target)?;

        if shot.winner.is_some() {
            state.end_at = None;
        } else {
            state.arm_deadline(unix_millis(), self.timings.turn);
        }

        // The shot is valid; stop the running turn clock before persisting so
        // it cannot fire against the new turn.
        let turn = TimerKey::turn(room_id);
        self.repo.clear_timeout(&turn).await?;
        if let Err(err) = self.repo.save(&state).await {
            warn!(error = %err, room_id = %room_id, "save failed after clearing turn timer; re-arming");
            self.arm(&turn, self.timings.turn).await;
            return Err(err);
        }

        if state.is_over() {
            self.retire(&state).await;
        } else {
            self.arm(&turn, self.timings.turn).await;
        }
        Ok((state, shot))
    }

    pub async fn handle_place(
        &self,
        room_id: &str,
        player: &str,
        payload: &Value,
    ) -> Result<(), AppError> {
        let ships = decode_payload::<PlaceShipPayload>(TYPE_PLACE_SHIP, payload)?.ships;

        let guard = self.acquire(room_id).await?;
        let res = self.place_locked(room_id, player, &ships).await;
        self.release(guard).await;
        let (state, started) = res?;

        if started {
            info!(room_id = %room_id, first = %state.active_player, "fleets placed, match active");
            self.broadcast(room_id, &ServerMsg::update("all ships placed, battle begins"))
                .await;
            self.push_state_to_all(&state).await;
        } else {
            debug!(room_id = %room_id, player = %player, "fleet placed, waiting for opponent");
            self.push_state(&state, player).await;
        }
        Ok(())
    }

    async fn place_locked(
        &self,
        room_id: &str,
        player: &str,
        ships: &[Point],
    ) -> Result<(Match, bool), AppError> {
        let mut state = self.repo.require(room_id).await?;
        let placed = place_ships(&mut state, player, ships)?;

        if placed.match_started {
            state.arm_deadline(unix_millis(), self.timings.turn);
        }
        self.repo.save(&state).await?;

        if placed.match_started {
            self.disarm(&TimerKey::placement(room_id)).await;
            self.arm(&TimerKey::turn(room_id), self.timings.turn).await;
        }
        Ok((state, placed.match_started))
    }

    /// Relay a chat line to the room. Chat does not touch match state, so no
    /// lock is taken.
    pub async fn handle_chat(
        &self,
        room_id: &str,
        player: &str,
        payload: &Value,
    ) -> Result<(), AppError> {
        let chat = decode_payload::<ChatPayload>(TYPE_CHAT, payload)?;
        self.broadcast(
            room_id,
            &ServerMsg::Chat {
                sender: player.to_string(),
                message: chat.message,
            },
        )
        .await;
        Ok(())
    }
}
