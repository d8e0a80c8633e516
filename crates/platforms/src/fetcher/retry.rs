use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::debug;

use super::error::FetchError;

/// Bounded retry with exponential backoff.
///
/// Attempt `n` (zero based) waits `base_delay_ms * 2^n` before the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
        }
    }

    /// A single attempt, no backoff.
    pub fn none() -> Self {
        Self::new(1, 0)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(1 << attempt.min(16)))
    }
}

/// Runs `op` until it succeeds, `should_retry` rejects the error, or the
/// attempt budget is spent. The last error is returned on exhaustion.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    should_retry: fn(&FetchError) -> bool,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= attempts || !should_retry(&e) {
                    return Err(e);
                }
                let delay = policy.delay_for(attempt - 1);
                debug!("attempt {}/{} failed: {}, retrying in {:?}", attempt, attempts, e, delay);
                sleep(delay).await;
            }
        }
    }
}
