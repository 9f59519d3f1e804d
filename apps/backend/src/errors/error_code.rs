//! Error codes for the Broadside realtime backend.
//!
//! This module defines all error codes used throughout the application.
//! Add new codes here; never pass ad-hoc strings as error codes.
//!
//! All error codes are SCREAMING_SNAKE_CASE and map 1:1 to the strings
//! that appear in `ERROR` payloads and HTTP problem responses.

use core::fmt;

use crate::errors::domain::ValidationKind;

/// Centralized error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Request Validation
    /// Payload could not be decoded
    MalformedPayload,
    /// Envelope `sender` disagrees with the connection's player
    SenderMismatch,
    /// Connection attempted without room or player id
    MissingIdentity,
    /// Room or player id contains characters reserved by the keyspace
    InvalidIdentity,

    // Rule Violations
    /// Shot by the player who is not active
    NotYourTurn,
    /// Coordinate outside the board
    OutOfBounds,
    /// Cell already resolved as hit or miss
    AlreadyTargeted,
    /// Player already placed their fleet
    ShipsAlreadyPlaced,
    /// Fleet size does not match the rules
    WrongShipCount,
    /// Two ships on the same cell
    OverlappingShips,
    /// Placement attempted after the placement phase
    PlacementClosed,
    /// Action requires an active match
    NotActive,
    /// Match already finished
    GameOver,
    /// Transition not valid in the current status
    PhaseMismatch,
    /// Match cannot be built from the given players
    InvalidPlayers,

    // Resource Not Found
    /// Match not found
    GameNotFound,
    /// Player not part of the match
    PlayerNotFound,

    // Conflicts
    /// Another mutation holds the match lock
    LockContention,
    /// Room already has two players
    RoomFull,

    // System Errors
    /// Coordination store command failed
    StoreError,
    /// Coordination store not reachable
    StoreUnavailable,
    /// Stored match could not be decoded
    DataCorruption,
    /// Configuration error
    ConfigError,
    /// Internal server error
    Internal,
}

impl ErrorCode {
    /// Returns the canonical SCREAMING_SNAKE_CASE string for this error code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedPayload => "MALFORMED_PAYLOAD",
            Self::SenderMismatch => "SENDER_MISMATCH",
            Self::MissingIdentity => "MISSING_IDENTITY",
            Self::InvalidIdentity => "INVALID_IDENTITY",

            Self::NotYourTurn => "NOT_YOUR_TURN",
            Self::OutOfBounds => "OUT_OF_BOUNDS",
            Self::AlreadyTargeted => "ALREADY_TARGETED",
            Self::ShipsAlreadyPlaced => "SHIPS_ALREADY_PLACED",
            Self::WrongShipCount => "WRONG_SHIP_COUNT",
            Self::OverlappingShips => "OVERLAPPING_SHIPS",
            Self::PlacementClosed => "PLACEMENT_CLOSED",
            Self::NotActive => "NOT_ACTIVE",
            Self::GameOver => "GAME_OVER",
            Self::PhaseMismatch => "PHASE_MISMATCH",
            Self::InvalidPlayers => "INVALID_PLAYERS",

            Self::GameNotFound => "GAME_NOT_FOUND",
            Self::PlayerNotFound => "PLAYER_NOT_FOUND",

            Self::LockContention => "LOCK_CONTENTION",
            Self::RoomFull => "ROOM_FULL",

            Self::StoreError => "STORE_ERROR",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::DataCorruption => "DATA_CORRUPTION",
            Self::ConfigError => "CONFIG_ERROR",
            Self::Internal => "INTERNAL",
        }
    }
}

impl From<ValidationKind> for ErrorCode {
    fn from(kind: ValidationKind) -> Self {
        match kind {
            ValidationKind::NotYourTurn => Self::NotYourTurn,
            ValidationKind::OutOfBounds => Self::OutOfBounds,
            ValidationKind::AlreadyTargeted => Self::AlreadyTargeted,
            ValidationKind::ShipsAlreadyPlaced => Self::ShipsAlreadyPlaced,
            ValidationKind::WrongShipCount => Self::WrongShipCount,
            ValidationKind::OverlappingShips => Self::OverlappingShips,
            ValidationKind::PlacementClosed => Self::PlacementClosed,
            ValidationKind::NotActive => Self::NotActive,
            ValidationKind::GameOver => Self::GameOver,
            ValidationKind::PhaseMismatch => Self::PhaseMismatch,
            ValidationKind::UnknownPlayer => Self::PlayerNotFound,
            ValidationKind::InvalidPlayers => Self::InvalidPlayers,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
