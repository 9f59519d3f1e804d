//! Domain-level error type used by the pure game rules.
//!
//! This error type is transport- and store-agnostic. Services return
//! `Result<T, crate::error::AppError>` and convert from `DomainError`
//! using the provided `From<DomainError> for AppError` implementation.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Rule violations a client can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationKind {
    NotYourTurn,
    OutOfBounds,
    AlreadyTargeted,
    ShipsAlreadyPlaced,
    WrongShipCount,
    OverlappingShips,
    PlacementClosed,
    NotActive,
    GameOver,
    PhaseMismatch,
    UnknownPlayer,
    InvalidPlayers,
}

/// Central domain error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input validation or business rule violation
    Validation(ValidationKind, String),
}

impl Display for DomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DomainError::Validation(_, d) => write!(f, "{d}"),
        }
    }
}

impl Error for DomainError {}

impl DomainError {
    pub fn validation(kind: ValidationKind, detail: impl Into<String>) -> Self {
        Self::Validation(kind, detail.into())
    }

    pub fn kind(&self) -> ValidationKind {
        match self {
            DomainError::Validation(kind, _) => *kind,
        }
    }
}
