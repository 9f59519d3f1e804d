//! What one player is allowed to see of a match.

use serde::{Deserialize, Serialize};

use crate::domain::board::Board;
use crate::domain::state::{Match, MatchStatus, PlayerId};
use crate::errors::domain::DomainError;

/// Full state snapshot for a single viewer. The opponent's board has its
/// un-hit ships masked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: String,
    pub your_board: Board,
    pub opponent_board: Board,
    pub active_player: PlayerId,
    pub winner: Option<PlayerId>,
    pub status: MatchStatus,
    pub end_at: Option<i64>,
}

pub fn player_view(state: &Match, viewer: &str) -> Result<PlayerView, DomainError> {
    let your_board = state.board(viewer)?.clone();
    let opponent_board = state.board(state.opponent_of(viewer))?.masked();

    Ok(PlayerView {
        id: state.id.clone(),
        your_board,
        opponent_board,
        active_player: state.active_player.clone(),
        winner: state.winner.clone(),
        status: state.status,
        end_at: state.end_at,
    })
}
