use std::collections::HashSet;

use crate::domain::board::{CellState, Point};
use crate::domain::rules::SHIPS_PER_PLAYER;
use crate::domain::state::{Match, MatchStatus};
use crate::errors::domain::{DomainError, ValidationKind};

/// Result of an accepted placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementResult {
    /// True when this placement was the second one and the match went Active.
    pub match_started: bool,
}

/// Place all of `who`'s ships at once.
///
/// The whole placement is validated before any cell is written, so a rejected
/// placement never leaves a partially filled board.
pub fn place_ships(
    state: &mut Match,
    who: &str,
    ships: &[Point],
) -> Result<PlacementResult, DomainError> {
    if state.status != MatchStatus::WaitingForShips {
        return Err(DomainError::validation(
            ValidationKind::PlacementClosed,
            "ship placement window is closed",
        ));
    }

    if !state.is_player(who) {
        return Err(DomainError::validation(
            ValidationKind::UnknownPlayer,
            "player is not part of this match",
        ));
    }

    if state.has_placed(who) {
        return Err(DomainError::validation(
            ValidationKind::ShipsAlreadyPlaced,
            "ship already placed",
        ));
    }

    if ships.len() != SHIPS_PER_PLAYER {
        return Err(DomainError::validation(
            ValidationKind::WrongShipCount,
            format!("expected {SHIPS_PER_PLAYER} ships, got {}", ships.len()),
        ));
    }

    let board = state.board(who)?;
    if ships.iter().any(|p| !board.in_bounds(*p)) {
        return Err(DomainError::validation(
            ValidationKind::OutOfBounds,
            "ship coordinates are out of bounds",
        ));
    }

    let mut seen = HashSet::with_capacity(ships.len());
    if !ships.iter().all(|p| seen.insert(*p)) {
        return Err(DomainError::validation(
            ValidationKind::OverlappingShips,
            "ships overlap",
        ));
    }

    let board = state.board_mut(who)?;
    for p in ships {
        board.set(*p, CellState::Ship);
    }
    state.ships_placed.push(who.to_string());

    let match_started = state.players.iter().all(|p| state.has_placed(p));
    if match_started {
        state.status = MatchStatus::Active;
        state.active_player = state.players[0].clone();
    }

    Ok(PlacementResult { match_started })
}
