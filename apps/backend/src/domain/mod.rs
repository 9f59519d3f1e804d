//! Domain layer: pure match rules, no I/O.

pub mod board;
pub mod lifecycle;
pub mod placement;
pub mod player_view;
pub mod rules;
pub mod shots;
pub mod state;

#[cfg(test)]
mod test_prelude;
#[cfg(test)]
mod tests_placement;
#[cfg(test)]
mod tests_props_shots;
#[cfg(test)]
mod tests_shots;

// Re-exports for ergonomics
pub use board::{Board, CellState, Point};
pub use placement::{place_ships, PlacementResult};
pub use player_view::{player_view, PlayerView};
pub use rules::{Timings, BOARD_SIZE, SHIPS_PER_PLAYER};
pub use shots::{fire, ShotResult};
pub use state::{Match, MatchStatus, PlayerId};
