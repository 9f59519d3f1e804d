//! Notifier stand-in that records every outbound message instead of
//! publishing it.

use std::sync::Arc;

use async_trait::async_trait;
use broadside::services::Notifier;
use broadside::AppError;
use parking_lot::Mutex;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Room { room_id: String, msg: Value },
    Solo { channel: String, msg: Value },
}

impl Sent {
    pub fn msg(&self) -> &Value {
        match self {
            Sent::Room { msg, .. } | Sent::Solo { msg, .. } => msg,
        }
    }

    pub fn kind(&self) -> &str {
        self.msg()["type"].as_str().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    /// Room broadcasts of the given `type`, payload only.
    pub fn room(&self, kind: &str) -> Vec<Value> {
        self.all()
            .into_iter()
            .filter(|s| matches!(s, Sent::Room { .. }) && s.kind() == kind)
            .map(|s| s.msg()["payload"].clone())
            .collect()
    }

    /// Solo messages of the given `type` that were sent to `player`.
    pub fn solo(&self, player: &str, kind: &str) -> Vec<Value> {
        let suffix = format!(":{player}");
        self.all()
            .into_iter()
            .filter(|s| match s {
                Sent::Solo { channel, .. } => channel.ends_with(&suffix),
                Sent::Room { .. } => false,
            })
            .filter(|s| s.kind() == kind)
            .map(|s| s.msg()["payload"].clone())
            .collect()
    }

    /// Error codes reported to `player`, in order.
    pub fn error_codes(&self, player: &str) -> Vec<String> {
        self.solo(player, "ERROR")
            .into_iter()
            .filter_map(|p| p["code"].as_str().map(str::to_string))
            .collect()
    }

    pub fn room_updates(&self) -> Vec<String> {
        self.room("GAME_UPDATE")
            .into_iter()
            .filter_map(|p| p["message"].as_str().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn broadcast(&self, room_id: &str, payload: String) -> Result<(), AppError> {
        let msg = serde_json::from_str(&payload).map_err(|e| AppError::store(e.to_string()))?;
        self.sent.lock().push(Sent::Room {
            room_id: room_id.to_string(),
            msg,
        });
        Ok(())
    }

    async fn solo(&self, channel: &str, payload: String) -> Result<(), AppError> {
        let msg = serde_json::from_str(&payload).map_err(|e| AppError::store(e.to_string()))?;
        self.sent.lock().push(Sent::Solo {
            channel: channel.to_string(),
            msg,
        });
        Ok(())
    }
}
