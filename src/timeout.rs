//! Per-attempt timeout for provider calls.
//!
//! Semantics
//! - Wraps one async provider attempt and yields [`ProviderError::Timeout`]
//!   when the deadline elapses.
//! - Uses `tokio::time::timeout`; on timeout the inner future is dropped, not
//!   forcibly aborted, so the attempt must be cancellation-safe.
//! - The timeout applies to the attempt only — never to the retry sleep that
//!   may follow it.

use crate::error::ProviderError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Maximum allowed per-attempt timeout, guarding accidental `u64::MAX`-style
/// durations. Provider configs are bounded far tighter (see
/// [`crate::model::ProviderConfig`]).
pub const MAX_TIMEOUT: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Errors returned when configuring timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutError {
    /// Duration must be greater than zero.
    ZeroDuration,
    /// Duration exceeded the allowed maximum.
    ExceedsMaximum { requested: Duration, limit: Duration },
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutError::ZeroDuration => write!(f, "timeout duration must be > 0"),
            TimeoutError::ExceedsMaximum { requested, limit } => {
                write!(f, "timeout duration {requested:?} exceeds maximum allowed {limit:?}")
            }
        }
    }
}

impl std::error::Error for TimeoutError {}

/// Policy that bounds the duration of a single provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    duration: Duration,
}

impl TimeoutPolicy {
    /// Creates a timeout policy with the specified duration.
    ///
    /// # Errors
    ///
    /// Returns [`TimeoutError::ZeroDuration`] if `duration` is zero, or
    /// [`TimeoutError::ExceedsMaximum`] if it exceeds [`MAX_TIMEOUT`].
    #[must_use = "the result must be checked for validation errors"]
    pub fn new(duration: Duration) -> Result<Self, TimeoutError> {
        if duration.is_zero() {
            return Err(TimeoutError::ZeroDuration);
        }
        if duration > MAX_TIMEOUT {
            return Err(TimeoutError::ExceedsMaximum { requested: duration, limit: MAX_TIMEOUT });
        }
        Ok(Self { duration })
    }

    /// Returns the configured timeout duration.
    #[must_use]
    #[inline]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Execute one attempt under this deadline.
    ///
    /// `elapsed` in the resulting [`ProviderError::Timeout`] is measured from
    /// just before the attempt starts and can exceed the limit slightly due
    /// to scheduling overhead.
    pub async fn execute<T, Fut, Op>(&self, operation: Op) -> Result<T, ProviderError>
    where
        T: Send,
        Fut: Future<Output = Result<T, ProviderError>> + Send,
        Op: FnOnce() -> Fut + Send,
    {
        let start = Instant::now();

        match tokio::time::timeout(self.duration, operation()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                elapsed: start.elapsed(),
                limit: self.duration,
            }),
        }
    }
}
