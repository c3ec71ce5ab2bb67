//! Bounded exponential backoff for transient store errors.
//!
//! Only errors classified transient (`StoreError::is_transient`) are
//! retried. Exhaustion propagates the last error to the caller, which
//! degrades the feature rather than retrying further.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::StoreError;

/// Retry policy: `attempts` total tries, delay doubling from `base_delay`.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl BackoffPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Run `op`, retrying transient failures per `policy`.
pub async fn with_backoff<T, F, Fut>(
    label: &str,
    policy: &BackoffPolicy,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < policy.attempts => {
                let delay = policy.delay_for(attempt);
                warn!(op = label, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Transient store error, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
