//! Game service: runs one logical turn or lifecycle event end to end.
//!
//! Every mutating handler follows the same shape: decode and validate the
//! input, take the match lock, load the match, apply exactly one domain
//! transition, persist, arm the next timer, release the lock, and only then
//! fan messages out. The lock is released whatever the outcome.

mod actions;
mod delivery;
mod lifecycle;
mod membership;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{Match, Timings};
use crate::error::AppError;
use crate::errors::ErrorCode;
use crate::repos::{LockGuard, MatchRepository};
use crate::services::notifier::Notifier;
use crate::store::keys::TimerKey;
use crate::ws::protocol::{ClientEnvelope, TYPE_CHAT, TYPE_MOVE, TYPE_PLACE_SHIP};

/// Clock disagreement tolerated between processes when deciding whether a
/// timer event is due.
const DEADLINE_SLACK_MS: i64 = 1_000;

pub struct GameService {
    repo: MatchRepository,
    notifier: Arc<dyn Notifier>,
    timings: Timings,
    finished_match_ttl: Duration,
}

impl GameService {
    pub fn new(
        repo: MatchRepository,
        notifier: Arc<dyn Notifier>,
        timings: Timings,
        finished_match_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            notifier,
            timings,
            finished_match_ttl,
        }
    }

    pub fn repo(&self) -> &MatchRepository {
        &self.repo
    }

    pub fn timings(&self) -> Timings {
        self.timings
    }

    /// Entry point for a text frame from `player`'s connection in `room_id`.
    /// Failures are reported to the sender as an `ERROR` frame and returned.
    pub async fn handle_message(
        &self,
        room_id: &str,
        player: &str,
        text: &str,
    ) -> Result<(), AppError> {
        let res = self.route_message(room_id, player, text).await;
        if let Err(err) = &res {
            debug!(room_id = %room_id, player = %player, code = %err.code(), "rejecting client message");
            self.report(player, err).await;
        }
        res
    }

    async fn route_message(&self, room_id: &str, player: &str, text: &str) -> Result<(), AppError> {
        let envelope = ClientEnvelope::parse(text)?;

        if let Some(sender) = envelope.sender.as_deref() {
            if sender != player {
                return Err(AppError::invalid(
                    ErrorCode::SenderMismatch,
                    format!("sender {sender} does not match this connection"),
                ));
            }
        }

        match envelope.kind.as_str() {
            TYPE_MOVE => self.handle_move(room_id, player, &envelope.payload).await,
            TYPE_PLACE_SHIP => self.handle_place(room_id, player, &envelope.payload).await,
            TYPE_CHAT => self.handle_chat(room_id, player, &envelope.payload).await,
            other => {
                warn!(room_id = %room_id, player = %player, kind = %other, "ignoring unknown message type");
                Ok(())
            }
        }
    }

    async fn acquire(&self, match_id: &str) -> Result<LockGuard, AppError> {
        self.repo
            .lock(match_id)
            .await?
            .ok_or_else(|| AppError::lock_contention(match_id))
    }

    async fn release(&self, guard: LockGuard) {
        if let Err(err) = self.repo.unlock(guard).await {
            warn!(error = %err, "failed to release match lock; it will lapse on its TTL");
        }
    }

    /// Arm a timer. A failure is logged rather than returned: the state is
    /// already saved, and the match-limit timer still bounds the match.
    async fn arm(&self, timer: &TimerKey, after: Duration) {
        if let Err(err) = self.repo.set_timeout(timer, after).await {
            warn!(error = %err, timer = %timer.to_key(), "failed to arm timer");
        }
    }

    async fn disarm(&self, timer: &TimerKey) {
        if let Err(err) = self.repo.clear_timeout(timer).await {
            warn!(error = %err, timer = %timer.to_key(), "failed to clear timer");
        }
    }

    /// Housekeeping for a match that just reached Over: drop its timers and
    /// let its keys expire.
    async fn retire(&self, state: &Match) {
        if let Err(err) = self.repo.clear_match_timers(&state.id, &state.players).await {
            warn!(error = %err, match_id = %state.id, "failed to clear timers of finished match");
        }
        if let Err(err) = self.repo.retire(&state.id, self.finished_match_ttl).await {
            warn!(error = %err, match_id = %state.id, "failed to retire finished match");
        }
    }
}
