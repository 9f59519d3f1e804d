//! Forced transitions driven by timers and connection events rather than by
//! player moves.

use std::cmp::Ordering;

use crate::domain::state::{Match, MatchStatus, PlayerId};
use crate::errors::domain::{DomainError, ValidationKind};

/// The active player loses their turn. Returns the new active player.
pub fn forfeit_turn(state: &mut Match) -> Result<PlayerId, DomainError> {
    if state.status != MatchStatus::Active {
        return Err(phase_mismatch("turn can only be forfeited while active"));
    }
    let next = state.opponent_of(&state.active_player).clone();
    state.active_player = next.clone();
    Ok(next)
}

/// Pause an active match because `who` dropped their connection.
pub fn hold(state: &mut Match, who: &str) -> Result<(), DomainError> {
    if state.status != MatchStatus::Active {
        return Err(phase_mismatch("only an active match can be put on hold"));
    }
    if !state.is_player(who) {
        return Err(unknown_player());
    }
    state.status = MatchStatus::Hold;
    state.held_by = Some(who.to_string());
    Ok(())
}

/// Resume a held match when the player who caused the hold comes back.
pub fn resume(state: &mut Match, who: &str) -> Result<(), DomainError> {
    if state.status != MatchStatus::Hold || state.held_by.as_deref() != Some(who) {
        return Err(phase_mismatch("match is not held by this player"));
    }
    state.status = MatchStatus::Active;
    state.held_by = None;
    Ok(())
}

/// End the match with `loser`'s opponent as the winner.
pub fn forfeit(state: &mut Match, loser: &str) -> Result<PlayerId, DomainError> {
    if state.is_over() {
        return Err(DomainError::validation(
            ValidationKind::GameOver,
            "game is over",
        ));
    }
    if !state.is_player(loser) {
        return Err(unknown_player());
    }
    let winner = state.opponent_of(loser).clone();
    declare_winner(state, &winner)?;
    Ok(winner)
}

/// End the match in `winner`'s favour.
pub fn declare_winner(state: &mut Match, winner: &str) -> Result<(), DomainError> {
    if state.is_over() {
        return Err(DomainError::validation(
            ValidationKind::GameOver,
            "game is over",
        ));
    }
    if !state.is_player(winner) {
        return Err(unknown_player());
    }
    state.status = MatchStatus::Over;
    state.winner = Some(winner.to_string());
    state.held_by = None;
    state.end_at = None;
    Ok(())
}

/// Player with strictly more hits on the opponent's board, if any.
pub fn leader_by_hits(state: &Match) -> Option<PlayerId> {
    let [first, second] = &state.players;
    match state.hits_by(first).cmp(&state.hits_by(second)) {
        Ordering::Greater => Some(first.clone()),
        Ordering::Less => Some(second.clone()),
        Ordering::Equal => None,
    }
}

/// When the placement window closes with exactly one player ready, the other
/// player is the one who forfeits.
pub fn placement_defaulter(state: &Match) -> Option<PlayerId> {
    match state.ships_placed.as_slice() {
        [ready] => Some(state.opponent_of(ready).clone()),
        _ => None,
    }
}

fn phase_mismatch(detail: &str) -> DomainError {
    DomainError::validation(ValidationKind::PhaseMismatch, detail)
}

fn unknown_player() -> DomainError {
    DomainError::validation(
        ValidationKind::UnknownPlayer,
        "player is not part of this match",
    )
}
