use crate::domain::board::{CellState, Point};
use crate::domain::state::{Match, MatchStatus, PlayerId};
use crate::errors::domain::{DomainError, ValidationKind};

/// Result of a resolved shot, describing what state changes occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShotResult {
    pub target: Point,
    /// Either `Hit` or `Miss`.
    pub outcome: CellState,
    /// Player to act next (unchanged after a hit).
    pub next_turn: PlayerId,
    /// Set when this shot sank the opponent's last ship.
    pub winner: Option<PlayerId>,
}

/// Fire at the opponent's board, enforcing phase, turn, bounds and
/// single-resolution of cells.
///
/// A hit keeps the turn with the shooter; a miss passes it on.
pub fn fire(state: &mut Match, who: &str, target: Point) -> Result<ShotResult, DomainError> {
    match state.status {
        MatchStatus::Active => {}
        MatchStatus::Over => {
            return Err(DomainError::validation(
                ValidationKind::GameOver,
                "game is over",
            ))
        }
        MatchStatus::WaitingForShips | MatchStatus::Hold => {
            return Err(DomainError::validation(
                ValidationKind::NotActive,
                "game is not active",
            ))
        }
    }

    if state.active_player != who {
        return Err(DomainError::validation(
            ValidationKind::NotYourTurn,
            "not your turn",
        ));
    }

    let opponent = state.opponent_of(who).clone();
    let board = state.board_mut(&opponent)?;

    let outcome = match board.cell(target) {
        None => {
            return Err(DomainError::validation(
                ValidationKind::OutOfBounds,
                "target is out of bounds",
            ))
        }
        Some(cell) if cell.is_resolved() => {
            return Err(DomainError::validation(
                ValidationKind::AlreadyTargeted,
                "cell already targeted",
            ))
        }
        Some(CellState::Ship) => CellState::Hit,
        Some(_) => CellState::Miss,
    };
    board.set(target, outcome);

    let sunk_all = board.count(CellState::Ship) == 0 && board.count(CellState::Hit) > 0;

    if sunk_all {
        state.status = MatchStatus::Over;
        state.winner = Some(who.to_string());
    } else if outcome == CellState::Miss {
        state.active_player = opponent;
    }

    Ok(ShotResult {
        target,
        outcome,
        next_turn: state.active_player.clone(),
        winner: state.winner.clone(),
    })
}
