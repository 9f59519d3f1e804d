//! Wire format of WebSocket frames.
//!
//! Every frame is a JSON envelope `{"type": ..., "payload": ...}`. Inbound
//! frames may also carry a `sender`, which must agree with the player the
//! connection was opened for.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{CellState, PlayerId, PlayerView, Point};
use crate::error::AppError;
use crate::errors::ErrorCode;

pub const TYPE_MOVE: &str = "MOVE";
pub const TYPE_PLACE_SHIP: &str = "PLACE_SHIP";
pub const TYPE_CHAT: &str = "CHAT";

/// Raw inbound envelope. The payload is decoded once the type is known.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl ClientEnvelope {
    pub fn parse(text: &str) -> Result<Self, AppError> {
        serde_json::from_str(text).map_err(|err| {
            AppError::invalid(
                ErrorCode::MalformedPayload,
                format!("invalid message envelope: {err}"),
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MovePayload {
    pub x: i32,
    pub y: i32,
}

impl MovePayload {
    pub fn target(self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaceShipPayload {
    pub ships: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatPayload {
    pub message: String,
}

/// Decode the payload of a typed inbound message.
pub fn decode_payload<T: serde::de::DeserializeOwned>(
    kind: &str,
    payload: &Value,
) -> Result<T, AppError> {
    T::deserialize(payload).map_err(|err| {
        AppError::invalid(
            ErrorCode::MalformedPayload,
            format!("invalid {kind} payload: {err}"),
        )
    })
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum ServerMsg {
    GameState(PlayerView),

    GameOver {
        winner: Option<PlayerId>,
    },

    Error {
        message: String,
        code: &'static str,
    },

    GameUpdate {
        message: String,
    },

    #[serde(rename_all = "camelCase")]
    SyncTime {
        server_time: i64,
    },

    #[serde(rename_all = "camelCase")]
    Move {
        x: i32,
        y: i32,
        result: CellState,
        next_turn: PlayerId,
        by: PlayerId,
        end_at: Option<i64>,
    },

    #[serde(rename_all = "camelCase")]
    TurnTimeout {
        next_turn: PlayerId,
        end_at: Option<i64>,
    },

    Chat {
        sender: PlayerId,
        message: String,
    },
}

impl ServerMsg {
    pub fn error(err: &AppError) -> Self {
        ServerMsg::Error {
            message: err.client_message(),
            code: err.code().as_str(),
        }
    }

    pub fn update(message: impl Into<String>) -> Self {
        ServerMsg::GameUpdate {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string(self).map_err(|err| {
            AppError::internal(
                ErrorCode::Internal,
                format!("failed to encode server message: {err}"),
            )
        })
    }
}
