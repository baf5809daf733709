use std::future::Future;
use std::time::Duration;

use sweep_models::{AgentsConfig, ProviderKind};
use tracing::warn;

use crate::error::AgentError;

/// Fixed-delay retry: `max_attempts` tries in total, no backoff, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &AgentsConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.retry_delay_ms))
    }

    /// Run `op` until it succeeds or the budget is spent. `op` receives the
    /// 1-based attempt number. Exhaustion yields `ProviderExhausted` wrapping
    /// the last error.
    pub async fn run<T, F, Fut>(&self, provider: ProviderKind, mut op: F) -> Result<T, AgentError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= max_attempts => {
                    return Err(AgentError::ProviderExhausted {
                        provider,
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    warn!(
                        provider = %provider,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
