//! Timer-driven transitions.
//!
//! Every process receives every expiration event, so each handler re-checks
//! the match phase under the lock and treats anything that no longer applies
//! as a stale event. Only one process ever performs a given transition.

use tracing::{debug, info};

use super::{GameService, DEADLINE_SLACK_MS};
use crate::domain::lifecycle::{
    declare_winner, forfeit, forfeit_turn, leader_by_hits, placement_defaulter,
};
use crate::domain::{Match, MatchStatus, PlayerId};
use crate::error::AppError;
use crate::store::keys::TimerKey;
use crate::utils::clock::unix_millis;
use crate::ws::protocol::ServerMsg;

/// How a timer-ended match finished.
enum Ending {
    Won(PlayerId),
    /// Nobody could be declared the winner; the match was deleted.
    Abandoned,
}

impl GameService {
    /// The active player ran out of time; the turn passes to the opponent.
    pub async fn handle_turn_timeout(&self, room_id: &str) -> Result<(), AppError> {
        let guard = self.acquire(room_id).await?;
        let res = self.turn_timeout_locked(room_id).await;
        self.release(guard).await;

        let Some(state) = res? else {
            return Ok(());
        };
        info!(room_id = %room_id, next_turn = %state.active_player, "turn timed out");
        self.broadcast(
            room_id,
            &ServerMsg::TurnTimeout {
                next_turn: state.active_player.clone(),
                end_at: state.end_at,
            },
        )
        .await;
        Ok(())
    }

    async fn turn_timeout_locked(&self, room_id: &str) -> Result<Option<Match>, AppError> {
        let Some(mut state) = self.repo.get(room_id).await? else {
            return Ok(None);
        };
        let now = unix_millis();
        if state.status != MatchStatus::Active || !state.deadline_passed(now, DEADLINE_SLACK_MS) {
            debug!(room_id = %room_id, status = ?state.status, "stale turn timeout ignored");
            return Ok(None);
        }

        forfeit_turn(&mut state)?;
        state.arm_deadline(now, self.timings.turn);
        self.repo.save(&state).await?;
        self.arm(&TimerKey::turn(room_id), self.timings.turn).await;
        Ok(Some(state))
    }

    /// The placement window closed. A player who placed beats one who did
    /// not; if nobody placed the match is abandoned.
    pub async fn handle_place_timeout(&self, room_id: &str) -> Result<(), AppError> {
        let guard = self.acquire(room_id).await?;
        let res = self.place_timeout_locked(room_id).await;
        self.release(guard).await;

        if let Some(ending) = res? {
            self.announce_ending(room_id, "ship placement time expired", ending)
                .await;
        }
        Ok(())
    }

    async fn place_timeout_locked(&self, room_id: &str) -> Result<Option<Ending>, AppError> {
        let Some(mut state) = self.repo.get(room_id).await? else {
            return Ok(None);
        };
        if state.status != MatchStatus::WaitingForShips
            || !state.deadline_passed(unix_millis(), DEADLINE_SLACK_MS)
        {
            debug!(room_id = %room_id, status = ?state.status, "stale placement timeout ignored");
            return Ok(None);
        }

        match placement_defaulter(&state) {
            Some(loser) => {
                let winner = forfeit(&mut state, &loser)?;
                self.repo.save(&state).await?;
                self.retire(&state).await;
                Ok(Some(Ending::Won(winner)))
            }
            None => {
                self.repo.discard(room_id, &state.players).await?;
                Ok(Some(Ending::Abandoned))
            }
        }
    }

    /// The overall match clock ran out. Most hits wins; a tie abandons.
    pub async fn handle_match_limit(&self, room_id: &str) -> Result<(), AppError> {
        let guard = self.acquire(room_id).await?;
        let res = self.match_limit_locked(room_id).await;
        self.release(guard).await;

        if let Some(ending) = res? {
            self.announce_ending(room_id, "match time limit reached", ending)
                .await;
        }
        Ok(())
    }

    async fn match_limit_locked(&self, room_id: &str) -> Result<Option<Ending>, AppError> {
        let Some(mut state) = self.repo.get(room_id).await? else {
            return Ok(None);
        };
        if state.is_over() {
            debug!(room_id = %room_id, "match limit fired for finished match");
            return Ok(None);
        }

        match leader_by_hits(&state) {
            Some(winner) => {
                declare_winner(&mut state, &winner)?;
                self.repo.save(&state).await?;
                self.retire(&state).await;
                Ok(Some(Ending::Won(winner)))
            }
            None => {
                self.repo.discard(room_id, &state.players).await?;
                Ok(Some(Ending::Abandoned))
            }
        }
    }

    /// The reconnection grace period of `player` expired; they forfeit.
    pub async fn handle_disconnect(&self, room_id: &str, player: &str) -> Result<(), AppError> {
        let guard = self.acquire(room_id).await?;
        let res = self.disconnect_locked(room_id, player).await;
        self.release(guard).await;

        if let Some(ending) = res? {
            self.announce_ending(room_id, &format!("{player} did not reconnect"), ending)
                .await;
        }
        Ok(())
    }

    async fn disconnect_locked(
        &self,
        room_id: &str,
        player: &str,
    ) -> Result<Option<Ending>, AppError> {
        let Some(mut state) = self.repo.get(room_id).await? else {
            return Ok(None);
        };
        if state.status != MatchStatus::Hold || state.held_by.as_deref() != Some(player) {
            debug!(room_id = %room_id, player = %player, "stale disconnect timeout ignored");
            return Ok(None);
        }

        let winner = forfeit(&mut state, player)?;
        self.repo.save(&state).await?;
        self.retire(&state).await;
        Ok(Some(Ending::Won(winner)))
    }

    async fn announce_ending(&self, room_id: &str, reason: &str, ending: Ending) {
        let winner = match ending {
            Ending::Won(winner) => {
                info!(room_id = %room_id, winner = %winner, reason, "match ended");
                Some(winner)
            }
            Ending::Abandoned => {
                info!(room_id = %room_id, reason, "match abandoned");
                None
            }
        };
        self.broadcast(room_id, &ServerMsg::update(reason)).await;
        self.broadcast(room_id, &ServerMsg::GameOver { winner }).await;
    }
}
