use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Exponential retry schedule for [`with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Wait before the first retry; doubled for each one after.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt with zero-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Run `op`, retrying failures with exponential backoff.
///
/// Validation errors are returned immediately. Once retries are exhausted the
/// last error is returned.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let total = policy.max_retries + 1;
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_validation() => return Err(e),
            Err(e) => {
                warn!("Request failed (attempt {}/{}): {}", attempt + 1, total, e);
                if attempt >= policy.max_retries {
                    return Err(e);
                }
                let wait = policy.delay_for(attempt);
                debug!("Retrying in {:?}...", wait);
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}
