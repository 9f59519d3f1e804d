//! Coordination store: the one resource shared by every server process.
//!
//! Game state, locks, presence, membership, timers and cross-process
//! messaging all go through [`CoordinationStore`]. Production runs against
//! Redis; tests and single-process development use [`MemoryStore`].

pub mod keys;
pub mod memory;
pub mod redis_store;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;

use crate::error::AppError;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// One pub/sub delivery. For expiration events `payload` is the expired key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreMessage {
    pub channel: String,
    pub payload: String,
}

/// Live subscription. Dropping it unsubscribes.
pub type Subscription = Pin<Box<dyn Stream<Item = StoreMessage> + Send>>;

/// Outcome of adding a member to a capacity-bounded set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundedAdd {
    /// Newly added; carries the set size afterwards.
    Added(usize),
    /// Already present; carries the current set size.
    AlreadyMember(usize),
    /// Rejected because the set is at capacity.
    Full,
}

#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn ping(&self) -> Result<(), AppError>;

    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Plain set; clears any TTL on the key.
    async fn set(&self, key: &str, value: &str) -> Result<(), AppError>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError>;

    /// Atomic set-if-absent with TTL. Returns whether the key was written.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, AppError>;

    async fn delete(&self, key: &str) -> Result<bool, AppError>;

    /// Atomically delete `key` only while it still holds `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, AppError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, AppError>;

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, AppError>;

    /// Atomic add to a set that may hold at most `capacity` members.
    async fn set_add_bounded(
        &self,
        key: &str,
        member: &str,
        capacity: usize,
    ) -> Result<BoundedAdd, AppError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, AppError>;

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, AppError>;

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), AppError>;

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, AppError>;

    /// Delete `field` only while it still maps to `expected`.
    async fn hash_delete_if_equals(
        &self,
        key: &str,
        field: &str,
        expected: &str,
    ) -> Result<bool, AppError>;

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), AppError>;

    /// Subscribe to a single channel. The subscription is active when this
    /// returns.
    async fn subscribe(&self, channel: &str) -> Result<Subscription, AppError>;

    /// Subscribe to every channel matching a glob pattern.
    async fn psubscribe(&self, pattern: &str) -> Result<Subscription, AppError>;

    /// Stream of key-expiration events; each payload is the expired key.
    async fn expirations(&self) -> Result<Subscription, AppError>;
}

/// Glob match supporting `*` (any run) and `?` (any single char), enough for
/// pub/sub patterns.
pub(crate) fn glob_matches(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star_p, star_t)) = backtrack {
            pi = star_p + 1;
            ti = star_t + 1;
            backtrack = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}
