//! Repositories over the coordination store.

pub mod matches;

pub use matches::{LockGuard, MatchRepository};
