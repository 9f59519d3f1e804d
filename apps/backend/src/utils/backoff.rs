//! Retry policies: reconnect backoff for long-lived store subscriptions, and
//! short fixed-delay retries for events that lost the match lock race.

use std::future::Future;
use std::time::Duration;

use rand::random;
use tokio::time::sleep;
use tracing::debug;

use crate::error::AppError;

/// Server-side events (joins, leaves, timer expirations) have no client to
/// retry them, so a contended one is retried this many times.
pub const CONTENTION_ATTEMPTS: u32 = 10;
pub const CONTENTION_RETRY_DELAY: Duration = Duration::from_millis(100);

const INITIAL_RETRY_DELAY_SECS: f64 = 1.0;
const MAX_RETRY_DELAY_SECS: f64 = 60.0;
const RETRY_DELAY_MULTIPLIER: f64 = 2.0;
const JITTER_PERCENT: f64 = 0.2;

/// Attempt counter is folded back to this value once it passes
/// `ATTEMPT_CEILING`, keeping delays near the cap without overflowing.
pub const ATTEMPT_FLOOR: u32 = 10;
pub const ATTEMPT_CEILING: u32 = 20;

/// Exponential delay with +/-20% jitter, capped at one minute.
pub fn retry_delay(attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
    let base = INITIAL_RETRY_DELAY_SECS * RETRY_DELAY_MULTIPLIER.powi(exponent);
    let capped = base.min(MAX_RETRY_DELAY_SECS);

    let jitter = (random::<f64>() * 2.0 - 1.0) * capped * JITTER_PERCENT;
    Duration::from_secs_f64((capped + jitter).max(0.1))
}

/// Configuration mistakes will not fix themselves; everything else is worth
/// another attempt.
pub fn is_transient(err: &AppError) -> bool {
    !matches!(err, AppError::Config { .. })
}

/// Run `op` until it returns anything other than lock contention, giving up
/// after `CONTENTION_ATTEMPTS` tries with the last contention error.
pub async fn retry_contended<T, F, Fut>(event: &str, mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Err(err) if err.is_lock_contention() && attempt < CONTENTION_ATTEMPTS => {
                debug!(event, attempt, "match lock contended, retrying");
                sleep(CONTENTION_RETRY_DELAY).await;
            }
            res => return res,
        }
    }
}
