use std::time::Duration;

use crate::error::Result;
use crate::utils::time::backoff_delay;

pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Re-runs transient warehouse and generator failures. Validation errors are returned on
/// the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// A single attempt.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }

    #[must_use]
    pub const fn with_retries(retries: u32) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }

    pub fn run<T>(&self, operation: &str, mut attempt: impl FnMut() -> Result<T>) -> Result<T> {
        let max_attempts = self.max_attempts.max(1);
        let mut current = 1;
        loop {
            match attempt() {
                Ok(value) => return Ok(value),
                Err(error) if error.kind().is_transient() && current < max_attempts => {
                    let delay = backoff_delay(self.initial_backoff, current);
                    tracing::warn!(
                        operation,
                        attempt = current,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "transient failure, retrying: {error}"
                    );
                    std::thread::sleep(delay);
                    current += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
