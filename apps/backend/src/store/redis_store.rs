//! Redis-backed coordination store used in production.

use std::time::Duration;

use async_trait::async_trait;
use futures::{future, StreamExt};
use once_cell::sync::Lazy;
use redis::aio::{ConnectionManager, PubSub};
use redis::{AsyncCommands, Client, Script};
use tokio::time::sleep;
use tracing::{info, warn};

use super::keys::EXPIRED_PATTERN;
use super::{BoundedAdd, CoordinationStore, StoreMessage, Subscription};
use crate::error::AppError;
use crate::errors::ErrorCode;

const PUBLISHER_MAX_ATTEMPTS: u32 = 3;
const PUBLISHER_INITIAL_RETRY_DELAY_MS: u64 = 50;
const PUBLISHER_MAX_RETRY_DELAY_MS: u64 = 200;

static DELETE_IF_EQUALS: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
        if redis.call('GET', KEYS[1]) == ARGV[1] then
            return redis.call('DEL', KEYS[1])
        end
        return 0
        ",
    )
});

static HASH_DELETE_IF_EQUALS: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
        if redis.call('HGET', KEYS[1], ARGV[1]) == ARGV[2] then
            return redis.call('HDEL', KEYS[1], ARGV[1])
        end
        return 0
        ",
    )
});

// Returns {status, size}: 0 added, 1 already a member, 2 full.
static BOUNDED_SET_ADD: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
        local size = redis.call('SCARD', KEYS[1])
        if redis.call('SISMEMBER', KEYS[1], ARGV[1]) == 1 then
            return {1, size}
        end
        if size >= tonumber(ARGV[2]) then
            return {2, size}
        end
        redis.call('SADD', KEYS[1], ARGV[1])
        return {0, size + 1}
        ",
    )
});

#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, AppError> {
        let client = Client::open(redis_url)
            .map_err(|err| AppError::config(format!("invalid REDIS_URL: {err}")))?;

        let manager = ConnectionManager::new(client.clone())
            .await
            .map_err(|err| {
                AppError::store_unavailable(format!(
                    "unable to initialize redis connection manager: {err}"
                ))
            })?;

        Ok(Self { client, manager })
    }

    /// Ask Redis to publish expired-key events. Managed deployments often
    /// forbid `CONFIG`, so failure is only logged; timers then rely on the
    /// server already being configured.
    pub async fn enable_expiry_events(&self) {
        let mut conn = self.manager.clone();
        let res: Result<(), redis::RedisError> = redis::cmd("CONFIG")
            .arg("SET")
            .arg("notify-keyspace-events")
            .arg("Ex")
            .query_async(&mut conn)
            .await;
        match res {
            Ok(()) => info!("redis keyspace expiration events enabled"),
            Err(err) => warn!(
                error = %err,
                "could not enable keyspace expiration events; timers depend on server config"
            ),
        }
    }

    async fn open_pubsub(&self) -> Result<PubSub, AppError> {
        Ok(self.client.get_async_pubsub().await?)
    }
}

fn into_subscription(pubsub: PubSub) -> Subscription {
    Box::pin(pubsub.into_on_message().filter_map(|msg| {
        let decoded = match (msg.get_channel::<String>(), msg.get_payload::<String>()) {
            (Ok(channel), Ok(payload)) => Some(StoreMessage { channel, payload }),
            _ => {
                warn!("dropping redis message with non-utf8 channel or payload");
                None
            }
        };
        future::ready(decoded)
    }))
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, AppError> {
        let mut conn = self.manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let mut conn = self.manager.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, AppError> {
        let mut conn = self.manager.clone();
        let removed: i64 = DELETE_IF_EQUALS
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, AppError> {
        let mut conn = self.manager.clone();
        let applied: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(applied == 1)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, AppError> {
        let mut conn = self.manager.clone();
        let added: i64 = conn.sadd(key, member).await?;
        Ok(added > 0)
    }

    async fn set_add_bounded(
        &self,
        key: &str,
        member: &str,
        capacity: usize,
    ) -> Result<BoundedAdd, AppError> {
        let mut conn = self.manager.clone();
        let (status, size): (i64, i64) = BOUNDED_SET_ADD
            .key(key)
            .arg(member)
            .arg(capacity)
            .invoke_async(&mut conn)
            .await?;
        let size = usize::try_from(size).unwrap_or(0);
        match status {
            0 => Ok(BoundedAdd::Added(size)),
            1 => Ok(BoundedAdd::AlreadyMember(size)),
            2 => Ok(BoundedAdd::Full),
            other => Err(AppError::internal(
                ErrorCode::Internal,
                format!("unexpected bounded add status {other}"),
            )),
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, AppError> {
        let mut conn = self.manager.clone();
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, AppError> {
        let mut conn = self.manager.clone();
        let present: bool = conn.sismember(key, member).await?;
        Ok(present)
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: i64 = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.hget(key, field).await?;
        Ok(value)
    }

    async fn hash_delete_if_equals(
        &self,
        key: &str,
        field: &str,
        expected: &str,
    ) -> Result<bool, AppError> {
        let mut conn = self.manager.clone();
        let removed: i64 = HASH_DELETE_IF_EQUALS
            .key(key)
            .arg(field)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), AppError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let mut conn = self.manager.clone();
            let res: Result<i64, redis::RedisError> = conn.publish(channel, payload).await;
            let err = match res {
                Ok(_) => return Ok(()),
                Err(err) => AppError::from(err),
            };

            if attempt >= PUBLISHER_MAX_ATTEMPTS || err.code() != ErrorCode::StoreUnavailable {
                return Err(err);
            }

            let delay_ms = PUBLISHER_INITIAL_RETRY_DELAY_MS
                .saturating_mul(2_u64.pow(attempt - 1))
                .min(PUBLISHER_MAX_RETRY_DELAY_MS);
            warn!(
                error = %err,
                channel = %channel,
                attempt,
                retry_delay_ms = delay_ms,
                "redis publish failed, retrying"
            );
            sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, AppError> {
        let mut pubsub = self.open_pubsub().await?;
        pubsub.subscribe(channel).await?;
        Ok(into_subscription(pubsub))
    }

    async fn psubscribe(&self, pattern: &str) -> Result<Subscription, AppError> {
        let mut pubsub = self.open_pubsub().await?;
        pubsub.psubscribe(pattern).await?;
        Ok(into_subscription(pubsub))
    }

    async fn expirations(&self) -> Result<Subscription, AppError> {
        self.psubscribe(EXPIRED_PATTERN).await
    }
}
