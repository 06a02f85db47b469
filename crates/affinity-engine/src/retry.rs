//! Unified retry policy for network-calling components
//!
//! One policy object covers LLM calls, search queries, and image generation
//! so backoff behavior is consistent and injectable instead of being
//! re-implemented per component.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Exponential backoff policy: delay doubles per attempt, capped at
/// `max_delay_ms`, with optional jitter of up to 25% of the computed delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            jitter: true,
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter: false,
        }
    }

    /// Delay before the given retry (attempt is 1-based; attempt 1 ran
    /// with no delay, so this is the wait before attempt 2, 3, ...)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let raw = self.base_delay_ms.saturating_mul(1u64 << exp);
        let capped = raw.min(self.max_delay_ms);
        let with_jitter = if self.jitter && capped > 0 {
            let jitter = rand::thread_rng().gen_range(0..=capped / 4);
            capped + jitter
        } else {
            capped
        };
        Duration::from_millis(with_jitter)
    }

    /// Run `op` up to `max_attempts` times, sleeping between attempts.
    /// Returns the first success or the last error.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        "[RETRY] {} attempt {}/{} failed: {} (retrying in {:?})",
                        label,
                        attempt,
                        self.max_attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        "[RETRY] {} exhausted after {} attempts: {}",
                        label,
                        attempt,
                        err
                    );
                    return Err(err);
                }
            }
        }
    }
}
