//! Match repository: persistence and coordination primitives for matches.
//!
//! Everything here is a thin, typed layer over [`CoordinationStore`]; the
//! repository owns the keyspace and the JSON encoding of [`Match`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::rules::PLAYERS;
use crate::domain::{Match, PlayerId};
use crate::error::AppError;
use crate::errors::ErrorCode;
use crate::store::keys::{self, TimerKey};
use crate::store::{BoundedAdd, CoordinationStore};

/// Proof of holding a match lock. Must be handed back to
/// [`MatchRepository::unlock`].
#[derive(Debug)]
#[must_use = "a held lock must be released with MatchRepository::unlock"]
pub struct LockGuard {
    key: String,
    token: String,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Clone)]
pub struct MatchRepository {
    store: Arc<dyn CoordinationStore>,
    lock_ttl: Duration,
}

impl MatchRepository {
    pub fn new(store: Arc<dyn CoordinationStore>, lock_ttl: Duration) -> Self {
        Self { store, lock_ttl }
    }

    pub fn store(&self) -> &Arc<dyn CoordinationStore> {
        &self.store
    }

    /// Persist the whole match. Overwrites any retirement TTL on the key.
    pub async fn save(&self, state: &Match) -> Result<(), AppError> {
        let encoded = serde_json::to_string(state).map_err(|err| {
            AppError::internal(
                ErrorCode::Internal,
                format!("failed to encode match {}: {err}", state.id),
            )
        })?;
        self.store.set(&keys::match_state(&state.id), &encoded).await
    }

    pub async fn get(&self, match_id: &str) -> Result<Option<Match>, AppError> {
        let Some(raw) = self.store.get(&keys::match_state(match_id)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|err| {
            AppError::internal(
                ErrorCode::DataCorruption,
                format!("stored match {match_id} could not be decoded: {err}"),
            )
        })
    }

    /// Like [`get`](Self::get) but a missing match is an error.
    pub async fn require(&self, match_id: &str) -> Result<Match, AppError> {
        self.get(match_id).await?.ok_or_else(|| {
            AppError::not_found(
                ErrorCode::GameNotFound,
                format!("game {match_id} not found"),
            )
        })
    }

    /// Try to take the match lock. `None` means another holder has it.
    pub async fn lock(&self, match_id: &str) -> Result<Option<LockGuard>, AppError> {
        let key = keys::match_lock(match_id);
        let token = Uuid::new_v4().to_string();
        let acquired = self
            .store
            .set_if_absent(&key, &token, self.lock_ttl)
            .await?;
        if !acquired {
            debug!(match_id = %match_id, "match lock contended");
            return Ok(None);
        }
        Ok(Some(LockGuard { key, token }))
    }

    /// Release a lock. A lock that lapsed and was taken by someone else is
    /// left alone; that case returns `false`.
    pub async fn unlock(&self, guard: LockGuard) -> Result<bool, AppError> {
        let released = self
            .store
            .delete_if_equals(&guard.key, &guard.token)
            .await?;
        if !released {
            warn!(key = %guard.key, "match lock expired before release");
        }
        Ok(released)
    }

    /// Record `player` as a member of the match. Returns the member count.
    pub async fn add_player_to_match(
        &self,
        match_id: &str,
        player: &str,
    ) -> Result<usize, AppError> {
        match self
            .store
            .set_add_bounded(&keys::match_members(match_id), player, PLAYERS)
            .await?
        {
            BoundedAdd::Added(size) | BoundedAdd::AlreadyMember(size) => Ok(size),
            BoundedAdd::Full => Err(AppError::conflict(
                ErrorCode::RoomFull,
                format!("room {match_id} already has two players"),
            )),
        }
    }

    pub async fn get_players(&self, match_id: &str) -> Result<Vec<PlayerId>, AppError> {
        self.store.set_members(&keys::match_members(match_id)).await
    }

    pub async fn is_player_in_match(&self, match_id: &str, player: &str) -> Result<bool, AppError> {
        self.store
            .set_contains(&keys::match_members(match_id), player)
            .await
    }

    /// Arm (or re-arm) a timer. Its expiry event drives the transition.
    pub async fn set_timeout(&self, timer: &TimerKey, after: Duration) -> Result<(), AppError> {
        self.store
            .set_with_ttl(&timer.to_key(), timer.match_id(), after)
            .await
    }

    pub async fn clear_timeout(&self, timer: &TimerKey) -> Result<(), AppError> {
        self.store.delete(&timer.to_key()).await.map(|_| ())
    }

    pub async fn set_presence(&self, player: &str, server_id: &str) -> Result<(), AppError> {
        self.store.hash_set(keys::PRESENCE, player, server_id).await
    }

    /// Drop presence only if it still points at `server_id`; a newer
    /// connection on another process keeps its entry.
    pub async fn remove_presence(&self, player: &str, server_id: &str) -> Result<bool, AppError> {
        self.store
            .hash_delete_if_equals(keys::PRESENCE, player, server_id)
            .await
    }

    pub async fn get_owning_process(&self, player: &str) -> Result<Option<String>, AppError> {
        self.store.hash_get(keys::PRESENCE, player).await
    }

    /// Bound the lifetime of a finished match's state and membership.
    pub async fn retire(&self, match_id: &str, ttl: Duration) -> Result<(), AppError> {
        self.store.expire(&keys::match_state(match_id), ttl).await?;
        self.store
            .expire(&keys::match_members(match_id), ttl)
            .await?;
        Ok(())
    }

    /// Delete a match outright, along with its pending timers.
    pub async fn discard(&self, match_id: &str, players: &[PlayerId]) -> Result<(), AppError> {
        self.store.delete(&keys::match_state(match_id)).await?;
        self.store.delete(&keys::match_members(match_id)).await?;
        self.clear_match_timers(match_id, players).await
    }

    /// Clear every timer a match can have armed.
    pub async fn clear_match_timers(
        &self,
        match_id: &str,
        players: &[PlayerId],
    ) -> Result<(), AppError> {
        let mut timers = vec![
            TimerKey::turn(match_id),
            TimerKey::placement(match_id),
            TimerKey::match_limit(match_id),
        ];
        timers.extend(players.iter().map(|p| TimerKey::disconnect(match_id, p)));
        for timer in &timers {
            self.clear_timeout(timer).await?;
        }
        Ok(())
    }

    pub async fn register_room(&self, room_id: &str) -> Result<(), AppError> {
        self.store.set_add(keys::ROOMS, room_id).await.map(|_| ())
    }
}
