//! Pacing between retry attempts.
//!
//! The delay before a retry is the only place the engine waits on the clock,
//! so it sits behind one seam: production pacing sleeps on the tokio timer,
//! while tests swap in a recorder that skips every delay and keeps the
//! schedule for assertions.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Waits out the delay between two retry attempts.
#[async_trait]
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    async fn sleep(&self, duration: Duration);
}

/// Production pacing on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

/// Test pacing: returns immediately and remembers what it skipped.
///
/// Retry tests assert the exact backoff or `Retry-After` schedule through
/// [`RecordingSleeper::recorded`] without ever waiting for it. Clones share
/// one log, so a single recorder can be handed to several policies.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    schedule: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skipped delays, in the order they were requested.
    pub fn recorded(&self) -> Vec<Duration> {
        self.log().clone()
    }

    /// Sum of every skipped delay: the wall-clock time a real run would
    /// have spent waiting.
    pub fn total_delay(&self) -> Duration {
        self.log().iter().sum()
    }

    fn log(&self) -> MutexGuard<'_, Vec<Duration>> {
        self.schedule.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.log().push(duration);
    }
}
