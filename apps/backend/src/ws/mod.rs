//! WebSocket transport: per-connection sessions, the process-local hub, and
//! the wire protocol.

pub mod broker;
pub mod hub;
pub mod protocol;
pub mod session;
