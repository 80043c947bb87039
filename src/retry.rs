//! Bounded exponential backoff for reads against an eventually-consistent store.

use std::{future::Future, time::Duration};

use anyhow::Result;
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(1_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
        }
    }

    /// Single attempt, no waiting.
    pub fn immediate() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Delay slept after the zero-based `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Runs `probe` until it yields `Some`, sleeping with exponential backoff
    /// between attempts. Returns `None` once every attempt came back empty.
    /// Errors from `probe` end the wait immediately.
    pub async fn poll<T, F, Fut>(&self, what: &str, mut probe: F) -> Result<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let attempts = self.max_attempts.max(1);
        for attempt in 0..attempts {
            if let Some(found) = probe().await? {
                return Ok(Some(found));
            }
            if attempt + 1 < attempts {
                let delay = self.delay_for(attempt);
                debug!(
                    "{what} not ready after attempt {}/{attempts}; retrying in {delay:?}",
                    attempt + 1
                );
                tokio::time::sleep(delay).await;
            }
        }
        Ok(None)
    }
}
