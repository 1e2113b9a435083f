use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::config::CleanupConfig;

/// Bounded retry with a fixed pause between attempts.
///
/// Used for filesystem operations that can fail while another process
/// (an indexer, a sync client, a video player) still holds the file open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &CleanupConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_secs(config.wait_secs))
    }

    /// Run `op` until it succeeds or `max_attempts` is reached.
    ///
    /// Sleeps `backoff` after each failed attempt except the last one.
    /// Returns the first success or the error of the final attempt.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        what,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(what, attempts = attempt, error = %e, "giving up");
                    return Err(e);
                }
            }
        }
    }
}
