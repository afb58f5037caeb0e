//! Bounded retry with exponential backoff.
//!
//! Every gateway call goes through one [`RetryPolicy`] so that attempt counts, delays and the retryable predicate are
//! decided in a single place.
use std::{fmt::Display, future::Future, time::Duration};

use log::*;

use crate::GatewayError;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS, base_delay: DEFAULT_BASE_DELAY, max_delay: DEFAULT_MAX_DELAY }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay, ..Default::default() }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// The pause after `failures` consecutive failed attempts: `base × 2^(failures - 1)`, capped at `max_delay`.
    pub fn delay_after(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(16);
        self.base_delay.checked_mul(1 << exp).unwrap_or(self.max_delay).min(self.max_delay)
    }

    /// Runs `op` under this policy, using [`GatewayError::is_retryable`] to decide whether a failure is worth another
    /// attempt.
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        self.run_with(label, op, GatewayError::is_retryable).await
    }

    pub async fn run_with<T, E, F, Fut, P>(&self, label: &str, mut op: F, retryable: P) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let attempts = self.attempts();
        let mut failures = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    failures += 1;
                    if !retryable(&e) {
                        debug!("🏦️ {label} failed with a non-retryable error. {e}");
                        return Err(e);
                    }
                    if failures >= attempts {
                        warn!("🏦️ {label} failed after {failures} attempts. {e}");
                        return Err(e);
                    }
                    let delay = self.delay_after(failures);
                    info!("🏦️ {label} attempt {failures}/{attempts} failed. Retrying in {delay:?}. {e}");
                    tokio::time::sleep(delay).await;
                },
            }
        }
    }
}
