//! Jitter strategies to prevent thundering herd.

use rand::Rng;
use std::time::Duration;

/// Jitter applied on top of a backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    /// No jitter - use the exact backoff delay.
    None,
    /// Additive: a uniform random amount in `[0, max]` added to the delay.
    Additive { max: Duration },
}

impl Jitter {
    /// Create an additive jitter strategy.
    pub fn additive(max: Duration) -> Self {
        Jitter::Additive { max }
    }

    /// Apply jitter to a delay duration.
    pub fn apply(&self, delay: Duration) -> Duration {
        self.apply_with_rng(delay, &mut rand::rng())
    }

    /// Apply jitter with a caller-supplied RNG (for deterministic tests).
    pub fn apply_with_rng<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        match self {
            Jitter::None => delay,
            Jitter::Additive { max } => {
                let max_millis = max.as_millis() as u64;
                if max_millis == 0 {
                    return delay;
                }
                delay + Duration::from_millis(rng.random_range(0..=max_millis))
            }
        }
    }
}
