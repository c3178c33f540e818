//! Provider-level retry with exponential backoff.
//!
//! Only transient failures (timeouts, dropped connections, HTTP 429/5xx)
//! are retried. A "not found" or an undecodable body is final.

use std::future::Future;
use std::time::Duration;

use tracing::debug;
use varprio_common::config::RetryConfig;

use crate::annotation::{ProviderFailure, SourceKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self { max_attempts: 1, initial_backoff: Duration::ZERO, max_backoff: Duration::ZERO }
    }

    /// Delay before attempt `attempt + 1`, doubling from the initial backoff.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, source: SourceKind, mut op: F) -> Result<T, ProviderFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderFailure>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(failure) if failure.kind.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff_after(attempt);
                    debug!(
                        source = %source,
                        attempt,
                        kind = %failure.kind,
                        delay_ms = delay.as_millis() as u64,
                        "Transient provider failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure),
            }
        }
    }
}
