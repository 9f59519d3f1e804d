//! Process configuration, read once from the environment at startup.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use uuid::Uuid;

use crate::domain::Timings;
use crate::error::AppError;

/// Store URL that selects the in-process store instead of Redis.
pub const MEMORY_STORE_URL: &str = "memory://";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub store_url: String,
    pub server_id: String,
    pub timings: Timings,
    pub lock_ttl: Duration,
    pub finished_match_ttl: Duration,
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let timings = Timings {
            turn: secs(&var, "TURN_TIMEOUT_SECS", 40)?,
            placement: secs(&var, "PLACE_TIMEOUT_SECS", 60)?,
            disconnect_grace: secs(&var, "DISCONNECT_GRACE_SECS", 30)?,
            match_limit: secs(&var, "MATCH_LIMIT_SECS", 30 * 60)?,
        };

        let lock_ttl_ms: u64 = parsed(&var, "LOCK_TTL_MS", 5_000)?;
        if lock_ttl_ms == 0 {
            return Err(AppError::config("LOCK_TTL_MS must be positive"));
        }

        Ok(Self {
            host: var("BACKEND_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed(&var, "BACKEND_PORT", 8080)?,
            store_url: var("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379/0".to_string()),
            server_id: var("SERVER_ID").unwrap_or_else(|| Uuid::new_v4().to_string()),
            timings,
            lock_ttl: Duration::from_millis(lock_ttl_ms),
            finished_match_ttl: secs(&var, "FINISHED_MATCH_TTL_SECS", 600)?,
            cors_allowed_origins: origins(var("CORS_ALLOWED_ORIGINS")),
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.store_url == MEMORY_STORE_URL
    }
}

fn parsed<T, F>(var: &F, name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::config(format!("{name} has an invalid value: '{raw}'"))),
    }
}

/// A positive number of seconds.
fn secs<F>(var: &F, name: &str, default: u64) -> Result<Duration, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let value: u64 = parsed(var, name, default)?;
    if value == 0 {
        return Err(AppError::config(format!("{name} must be positive")));
    }
    Ok(Duration::from_secs(value))
}

// Comma-separated; only http(s) origins are kept.
fn origins(raw: Option<String>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| s.starts_with("http://") || s.starts_with("https://"))
        .map(str::to_string)
        .collect()
}
