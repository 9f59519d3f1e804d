use std::time::Duration;

pub const PLAYERS: usize = 2;

/// Side length of every board.
pub const BOARD_SIZE: usize = 5;

/// Each player places one single-cell ship per board row.
pub const SHIPS_PER_PLAYER: usize = BOARD_SIZE;

/// Per-phase deadlines used when arming timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub turn: Duration,
    pub placement: Duration,
    pub disconnect_grace: Duration,
    pub match_limit: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            turn: Duration::from_secs(40),
            placement: Duration::from_secs(60),
            disconnect_grace: Duration::from_secs(30),
            match_limit: Duration::from_secs(30 * 60),
        }
    }
}
