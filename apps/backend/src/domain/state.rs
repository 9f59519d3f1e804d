use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::board::{Board, CellState};
use crate::domain::rules::BOARD_SIZE;
use crate::errors::domain::{DomainError, ValidationKind};

/// Opaque, client-supplied player identifier.
pub type PlayerId = String;

/// Match lifecycle.
///
/// `WaitingForShips -> Active -> Over`, with `Active <-> Hold` while a
/// disconnected player is inside their reconnection grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    WaitingForShips,
    Active,
    Hold,
    Over,
}

/// Authoritative state of one two-player match.
///
/// Every mutation round-trips the whole value through the store, so this is
/// the unit of persistence as well as the unit of game logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    /// Fixed order; `players[0]` takes the first turn.
    pub players: [PlayerId; 2],
    /// Each player's own ship layout, keyed by owner.
    pub boards: BTreeMap<PlayerId, Board>,
    pub active_player: PlayerId,
    pub status: MatchStatus,
    pub winner: Option<PlayerId>,
    /// Deadline of the current phase in unix milliseconds.
    pub end_at: Option<i64>,
    /// Players whose placement has been accepted.
    #[serde(default)]
    pub ships_placed: Vec<PlayerId>,
    /// Player whose disconnect put the match on hold.
    #[serde(default)]
    pub held_by: Option<PlayerId>,
}

impl Match {
    pub fn new(
        id: impl Into<String>,
        first: impl Into<PlayerId>,
        second: impl Into<PlayerId>,
    ) -> Result<Self, DomainError> {
        let first = first.into();
        let second = second.into();
        if first.is_empty() || second.is_empty() || first == second {
            return Err(DomainError::validation(
                ValidationKind::InvalidPlayers,
                "a match needs two distinct, non-empty players",
            ));
        }

        let boards = [&first, &second]
            .into_iter()
            .map(|p| (p.clone(), Board::new(BOARD_SIZE)))
            .collect();

        Ok(Self {
            id: id.into(),
            active_player: first.clone(),
            players: [first, second],
            boards,
            status: MatchStatus::WaitingForShips,
            winner: None,
            end_at: None,
            ships_placed: Vec::new(),
            held_by: None,
        })
    }

    pub fn is_player(&self, who: &str) -> bool {
        self.players.iter().any(|p| p == who)
    }

    /// The other player. Anyone who is not `players[0]` is answered with
    /// `players[0]`.
    pub fn opponent_of(&self, who: &str) -> &PlayerId {
        if who != self.players[0] {
            &self.players[0]
        } else {
            &self.players[1]
        }
    }

    pub fn board(&self, owner: &str) -> Result<&Board, DomainError> {
        self.boards.get(owner).ok_or_else(unknown_player)
    }

    pub(crate) fn board_mut(&mut self, owner: &str) -> Result<&mut Board, DomainError> {
        self.boards.get_mut(owner).ok_or_else(unknown_player)
    }

    pub fn has_placed(&self, who: &str) -> bool {
        self.ships_placed.iter().any(|p| p == who)
    }

    /// Number of hits `who` has landed on the opponent's board.
    pub fn hits_by(&self, who: &str) -> usize {
        self.boards
            .get(self.opponent_of(who))
            .map(|b| b.count(CellState::Hit))
            .unwrap_or(0)
    }

    pub fn is_over(&self) -> bool {
        self.status == MatchStatus::Over
    }

    /// Sets the phase deadline to `now_ms + after`.
    pub fn arm_deadline(&mut self, now_ms: i64, after: Duration) {
        let after_ms = i64::try_from(after.as_millis()).unwrap_or(i64::MAX);
        self.end_at = Some(now_ms.saturating_add(after_ms));
    }

    /// True once the current deadline has passed, allowing `slack_ms` of
    /// clock disagreement between processes.
    pub fn deadline_passed(&self, now_ms: i64, slack_ms: i64) -> bool {
        match self.end_at {
            Some(end_at) => now_ms.saturating_add(slack_ms) >= end_at,
            None => true,
        }
    }
}

fn unknown_player() -> DomainError {
    DomainError::validation(
        ValidationKind::UnknownPlayer,
        "player is not part of this match",
    )
}
