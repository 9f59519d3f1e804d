//! Joining and leaving: match creation, state replay, hold and resume.

use tracing::{debug, info};

use super::GameService;
use crate::domain::lifecycle::{hold, resume};
use crate::domain::rules::PLAYERS;
use crate::domain::{Match, MatchStatus, PlayerId};
use crate::error::AppError;
use crate::errors::ErrorCode;
use crate::store::keys::{self, TimerKey};
use crate::utils::clock::unix_millis;
use crate::ws::protocol::ServerMsg;

enum JoinOutcome {
    /// First player in the room; nothing to play yet.
    Waiting,
    /// Second player arrived and the match was created.
    Created(Match),
    /// Known player reconnected; replay their view.
    Rejoined(Match),
    /// The player whose disconnect held the match came back.
    Resumed(Match),
}

impl GameService {
    /// A connection for `player` was registered in `room_id`.
    ///
    /// Errors are returned to the caller, which owns the connection and
    /// decides how to reject it.
    pub async fn handle_join(&self, room_id: &str, player: &str) -> Result<(), AppError> {
        if room_id.is_empty() || player.is_empty() {
            return Err(AppError::invalid(
                ErrorCode::MissingIdentity,
                "roomID and playerID are required",
            ));
        }
        if !keys::is_valid_id(room_id) || !keys::is_valid_id(player) {
            return Err(AppError::invalid(
                ErrorCode::InvalidIdentity,
                format!("room {room_id:?} or player {player:?} is not a valid id"),
            ));
        }

        let guard = self.acquire(room_id).await?;
        let res = self.join_locked(room_id, player).await;
        self.release(guard).await;

        match res? {
            JoinOutcome::Waiting => {
                debug!(room_id = %room_id, player = %player, "waiting for opponent");
                self.send_to_player(player, &ServerMsg::update("waiting for an opponent to join"))
                    .await;
            }
            JoinOutcome::Created(state) => {
                info!(room_id = %room_id, players = ?state.players, "match created");
                self.broadcast(room_id, &ServerMsg::update("opponent joined, place your ships"))
                    .await;
                self.push_state_to_all(&state).await;
            }
            JoinOutcome::Rejoined(state) => {
                debug!(room_id = %room_id, player = %player, "replaying state to rejoining player");
                self.push_state(&state, player).await;
            }
            JoinOutcome::Resumed(state) => {
                info!(room_id = %room_id, player = %player, "match resumed");
                self.broadcast(room_id, &ServerMsg::update(format!("{player} reconnected")))
                    .await;
                self.push_state_to_all(&state).await;
            }
        }
        Ok(())
    }

    async fn join_locked(&self, room_id: &str, player: &str) -> Result<JoinOutcome, AppError> {
        if let Some(mut state) = self.repo.get(room_id).await? {
            if !state.is_player(player) {
                return Err(room_full(room_id));
            }
            if state.status != MatchStatus::Hold || state.held_by.as_deref() != Some(player) {
                return Ok(JoinOutcome::Rejoined(state));
            }

            resume(&mut state, player)?;
            state.arm_deadline(unix_millis(), self.timings.turn);
            self.repo.save(&state).await?;
            self.disarm(&TimerKey::disconnect(room_id, player)).await;
            self.arm(&TimerKey::turn(room_id), self.timings.turn).await;
            return Ok(JoinOutcome::Resumed(state));
        }

        let members = self.repo.add_player_to_match(room_id, player).await?;
        if members < PLAYERS {
            return Ok(JoinOutcome::Waiting);
        }

        let first: PlayerId = self
            .repo
            .get_players(room_id)
            .await?
            .into_iter()
            .find(|p| p != player)
            .ok_or_else(|| {
                AppError::internal(
                    ErrorCode::DataCorruption,
                    format!("room {room_id} is full but has no opponent for {player}"),
                )
            })?;

        let mut state = Match::new(room_id, first, player)?;
        state.arm_deadline(unix_millis(), self.timings.placement);
        self.repo.save(&state).await?;
        self.arm(&TimerKey::placement(room_id), self.timings.placement)
            .await;
        self.arm(&TimerKey::match_limit(room_id), self.timings.match_limit)
            .await;
        Ok(JoinOutcome::Created(state))
    }

    /// `player`'s last local connection in `room_id` went away.
    ///
    /// An active match is put on hold and the grace timer armed; the match is
    /// forfeited if it expires before the player rejoins.
    pub async fn handle_leave(&self, room_id: &str, player: &str) -> Result<(), AppError> {
        let guard = self.acquire(room_id).await?;
        let res = self.leave_locked(room_id, player).await;
        self.release(guard).await;

        let Some(state) = res? else {
            return Ok(());
        };

        info!(room_id = %room_id, player = %player, "match on hold");
        let grace = self.timings.disconnect_grace.as_secs();
        self.broadcast(
            room_id,
            &ServerMsg::update(format!(
                "{player} disconnected, waiting {grace}s for them to return"
            )),
        )
        .await;
        self.push_state(&state, state.opponent_of(player)).await;
        Ok(())
    }

    async fn leave_locked(&self, room_id: &str, player: &str) -> Result<Option<Match>, AppError> {
        let Some(mut state) = self.repo.get(room_id).await? else {
            return Ok(None);
        };
        if state.status != MatchStatus::Active || !state.is_player(player) {
            return Ok(None);
        }
        // A reconnect may already have landed, here or on another process.
        if self.repo.get_owning_process(player).await?.is_some() {
            debug!(room_id = %room_id, player = %player, "player already reconnected; not holding");
            return Ok(None);
        }

        hold(&mut state, player)?;
        state.arm_deadline(unix_millis(), self.timings.disconnect_grace);
        self.repo.save(&state).await?;
        self.disarm(&TimerKey::turn(room_id)).await;
        self.arm(
            &TimerKey::disconnect(room_id, player),
            self.timings.disconnect_grace,
        )
        .await;
        Ok(Some(state))
    }
}

fn room_full(room_id: &str) -> AppError {
    AppError::conflict(
        ErrorCode::RoomFull,
        format!("room {room_id} already has two players"),
    )
}
