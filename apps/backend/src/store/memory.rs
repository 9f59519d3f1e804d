//! In-process coordination store.
//!
//! Behaves like the subset of Redis the backend relies on: TTLs that fire
//! expiration events, channel and pattern subscriptions, atomic conditional
//! writes. Several hubs sharing one `MemoryStore` behave like several
//! processes sharing one Redis, which is what the integration tests rely on.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::keys::MEMORY_EXPIRED_CHANNEL;
use super::{glob_matches, BoundedAdd, CoordinationStore, StoreMessage, Subscription};
use crate::error::AppError;

const BUS_CAPACITY: usize = 1024;

#[derive(Debug)]
enum Value {
    Str(String),
    Set(BTreeSet<String>),
    Hash(HashMap<String, String>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
    /// Bumped on every TTL change so a stale expiry task leaves the key alone.
    generation: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    next_generation: u64,
}

impl Inner {
    fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Live entry for `key`, dropping it first if its deadline has passed.
    /// Returns whether an expiry was observed so the caller can announce it.
    fn live(&mut self, key: &str) -> (Option<&mut Entry>, bool) {
        let expired = self
            .entries
            .get(key)
            .and_then(|e| e.expires_at)
            .is_some_and(|at| at <= Instant::now());
        if expired {
            self.entries.remove(key);
            return (None, true);
        }
        (self.entries.get_mut(key), false)
    }
}

enum Filter {
    Exact(String),
    Pattern(String),
}

impl Filter {
    fn accepts(&self, channel: &str) -> bool {
        match self {
            Filter::Exact(c) => c == channel,
            Filter::Pattern(p) => glob_matches(p, channel),
        }
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    bus: broadcast::Sender<StoreMessage>,
    latency: Option<Duration>,
    /// Plain writes to keys under this prefix fail while set.
    failing_prefix: Arc<Mutex<Option<String>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            bus,
            latency: None,
            failing_prefix: Arc::new(Mutex::new(None)),
        }
    }

    /// Delay every operation by `latency`, approximating a network round trip.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make `set` and `set_with_ttl` fail for keys starting with `prefix`,
    /// as a Redis write would during a failover. Shared by all clones.
    pub fn fail_writes_to(&self, prefix: impl Into<String>) {
        *self.failing_prefix.lock() = Some(prefix.into());
    }

    pub fn heal_writes(&self) {
        *self.failing_prefix.lock() = None;
    }

    fn check_write(&self, key: &str) -> Result<(), AppError> {
        match self.failing_prefix.lock().as_deref() {
            Some(prefix) if key.starts_with(prefix) => Err(AppError::store_unavailable(format!(
                "write to {key} refused: store is read-only"
            ))),
            _ => Ok(()),
        }
    }

    async fn round_trip(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn announce_expired(&self, key: &str) {
        debug!(key = %key, "memory store key expired");
        let _ = self.bus.send(StoreMessage {
            channel: MEMORY_EXPIRED_CHANNEL.to_string(),
            payload: key.to_string(),
        });
    }

    /// Run `f` against the live entry for `key`, announcing a lazy expiry.
    fn with_live<T>(&self, key: &str, f: impl FnOnce(Option<&mut Entry>) -> T) -> T {
        let (out, expired) = {
            let mut inner = self.inner.lock();
            let (entry, expired) = inner.live(key);
            (f(entry), expired)
        };
        if expired {
            self.announce_expired(key);
        }
        out
    }

    fn arm_expiry(&self, key: &str, ttl: Duration) {
        let generation = {
            let mut inner = self.inner.lock();
            let generation = inner.bump();
            match inner.entries.get_mut(key) {
                Some(entry) => {
                    entry.expires_at = Some(Instant::now() + ttl);
                    entry.generation = generation;
                }
                None => return,
            }
            generation
        };

        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let bus = self.bus.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let removed = {
                let mut inner = inner.lock();
                match inner.entries.get(&key) {
                    Some(entry) if entry.generation == generation => {
                        inner.entries.remove(&key);
                        true
                    }
                    _ => false,
                }
            };
            if removed {
                debug!(key = %key, "memory store key expired");
                let _ = bus.send(StoreMessage {
                    channel: MEMORY_EXPIRED_CHANNEL.to_string(),
                    payload: key,
                });
            }
        });
    }

    fn put(&self, key: &str, value: Value) {
        let mut inner = self.inner.lock();
        let generation = inner.bump();
        inner.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: None,
                generation,
            },
        );
    }

    fn listen(&self, filter: Filter) -> Subscription {
        let rx = self.bus.subscribe();
        Box::pin(stream::unfold((rx, filter), |(mut rx, filter)| async move {
            loop {
                match rx.recv().await {
                    Ok(msg) if filter.accepts(&msg.channel) => return Some((msg, (rx, filter))),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "memory store subscriber lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }))
    }
}

fn wrong_type(key: &str) -> AppError {
    AppError::store(format!(
        "WRONGTYPE operation against key {key} holding the wrong kind of value"
    ))
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        self.round_trip().await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.round_trip().await;
        self.with_live(key, |entry| match entry {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.round_trip().await;
        self.check_write(key)?;
        self.put(key, Value::Str(value.to_string()));
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        self.round_trip().await;
        self.check_write(key)?;
        self.put(key, Value::Str(value.to_string()));
        self.arm_expiry(key, ttl);
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, AppError> {
        self.round_trip().await;
        self.with_live(key, |_| ());
        {
            let mut inner = self.inner.lock();
            if inner.entries.contains_key(key) {
                return Ok(false);
            }
            let generation = inner.bump();
            inner.entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Str(value.to_string()),
                    expires_at: None,
                    generation,
                },
            );
        }
        self.arm_expiry(key, ttl);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        self.round_trip().await;
        let present = self.with_live(key, |entry| entry.is_some());
        if present {
            self.inner.lock().entries.remove(key);
        }
        Ok(present)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, AppError> {
        self.round_trip().await;
        let matches = self.with_live(key, |entry| {
            matches!(entry, Some(Entry { value: Value::Str(s), .. }) if s.as_str() == expected)
        });
        if matches {
            self.inner.lock().entries.remove(key);
        }
        Ok(matches)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, AppError> {
        self.round_trip().await;
        let present = self.with_live(key, |entry| entry.is_some());
        if present {
            self.arm_expiry(key, ttl);
        }
        Ok(present)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, AppError> {
        self.round_trip().await;
        self.with_live(key, |_| ());
        let mut inner = self.inner.lock();
        let generation = inner.bump();
        let entry = inner.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Set(BTreeSet::new()),
            expires_at: None,
            generation,
        });
        match &mut entry.value {
            Value::Set(set) => Ok(set.insert(member.to_string())),
            _ => Err(wrong_type(key)),
        }
    }

    async fn set_add_bounded(
        &self,
        key: &str,
        member: &str,
        capacity: usize,
    ) -> Result<BoundedAdd, AppError> {
        self.round_trip().await;
        self.with_live(key, |_| ());
        let mut inner = self.inner.lock();
        let generation = inner.bump();
        let entry = inner.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Set(BTreeSet::new()),
            expires_at: None,
            generation,
        });
        let Value::Set(set) = &mut entry.value else {
            return Err(wrong_type(key));
        };
        if set.contains(member) {
            return Ok(BoundedAdd::AlreadyMember(set.len()));
        }
        if set.len() >= capacity {
            return Ok(BoundedAdd::Full);
        }
        set.insert(member.to_string());
        Ok(BoundedAdd::Added(set.len()))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, AppError> {
        self.round_trip().await;
        self.with_live(key, |entry| match entry {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, AppError> {
        self.round_trip().await;
        self.with_live(key, |entry| match entry {
            None => Ok(false),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.contains(member)),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), AppError> {
        self.round_trip().await;
        self.with_live(key, |_| ());
        let mut inner = self.inner.lock();
        let generation = inner.bump();
        let entry = inner.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Hash(HashMap::new()),
            expires_at: None,
            generation,
        });
        match &mut entry.value {
            Value::Hash(map) => {
                map.insert(field.to_string(), value.to_string());
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, AppError> {
        self.round_trip().await;
        self.with_live(key, |entry| match entry {
            None => Ok(None),
            Some(Entry {
                value: Value::Hash(map),
                ..
            }) => Ok(map.get(field).cloned()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn hash_delete_if_equals(
        &self,
        key: &str,
        field: &str,
        expected: &str,
    ) -> Result<bool, AppError> {
        self.round_trip().await;
        self.with_live(key, |entry| match entry {
            None => Ok(false),
            Some(Entry {
                value: Value::Hash(map),
                ..
            }) => {
                if map.get(field).map(String::as_str) == Some(expected) {
                    map.remove(field);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), AppError> {
        self.round_trip().await;
        // No receivers is not an error; Redis reports zero deliveries too.
        let _ = self.bus.send(StoreMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, AppError> {
        self.round_trip().await;
        Ok(self.listen(Filter::Exact(channel.to_string())))
    }

    async fn psubscribe(&self, pattern: &str) -> Result<Subscription, AppError> {
        self.round_trip().await;
        Ok(self.listen(Filter::Pattern(pattern.to_string())))
    }

    async fn expirations(&self) -> Result<Subscription, AppError> {
        self.subscribe(MEMORY_EXPIRED_CHANNEL).await
    }
}
