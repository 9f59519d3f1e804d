//! Outbound delivery seam between the game service and the connection hub.

use async_trait::async_trait;

use crate::error::AppError;

/// Fan-out operations the game service needs. The hub implements this by
/// publishing through the coordination store; tests substitute a recorder.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `payload` to every connection in `room_id`, on every process.
    async fn broadcast(&self, room_id: &str, payload: String) -> Result<(), AppError>;

    /// Deliver `payload` on a solo channel (`solo:<serverId>:<playerId>`).
    async fn solo(&self, channel: &str, payload: String) -> Result<(), AppError>;
}
