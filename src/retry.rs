//! Retry engine: bounded exponential backoff with jitter, driven by error
//! classification.
//!
//! Wraps a single provider call. TRANSIENT failures are retried until the
//! attempt budget runs out; PERMANENT and CRITICAL failures are returned
//! immediately. Every attempt outcome is reported to the surrounding circuit
//! breaker through [`RetryHooks`] — one failure event per failed attempt, one
//! success event on success.

use crate::backoff::Backoff;
use crate::classify::classify;
use crate::error::ProviderError;
use crate::jitter::Jitter;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::timeout::TimeoutPolicy;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Attempt-outcome hooks, implemented by the per-provider circuit breaker.
pub trait RetryHooks: Send + Sync {
    fn on_success(&self) {}
    fn on_failure(&self) {}
}

/// Hooks that ignore every event, for call sites without a breaker.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl RetryHooks for NoHooks {}

/// Hard ceiling on attempts per call; provider configs stay within it.
pub const MAX_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff: Backoff,
    jitter: Jitter,
    attempt_timeout: Option<TimeoutPolicy>,
    respect_retry_after: bool,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("jitter", &self.jitter)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("respect_retry_after", &self.respect_retry_after)
            .field("sleeper", &"<sleeper>")
            .finish()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum BuildError {
    /// `max_attempts` must be in `1..=MAX_ATTEMPTS`.
    InvalidMaxAttempts(usize),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::InvalidMaxAttempts(n) => {
                write!(f, "max_attempts must be in 1..={MAX_ATTEMPTS} (got {n})")
            }
        }
    }
}

impl std::error::Error for BuildError {}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Execute `operation` until it succeeds or the policy is exhausted.
    ///
    /// The per-attempt timeout, when configured, bounds the thunk only — the
    /// sleep between attempts is never counted against it. The wait before a
    /// retry is the provider's `Retry-After` hint when present (and honoured),
    /// otherwise jittered exponential backoff.
    pub async fn execute<T, Fut, Op, H>(
        &self,
        hooks: &H,
        mut operation: Op,
    ) -> Result<T, ProviderError>
    where
        T: Send,
        Fut: Future<Output = Result<T, ProviderError>> + Send,
        Op: FnMut() -> Fut + Send,
        H: RetryHooks + ?Sized,
    {
        for attempt in 1..=self.max_attempts {
            let outcome = match &self.attempt_timeout {
                Some(timeout) => timeout.execute(|| operation()).await,
                None => operation().await,
            };

            let err = match outcome {
                Ok(value) => {
                    hooks.on_success();
                    return Ok(value);
                }
                Err(err) => err,
            };

            hooks.on_failure();

            let verdict = classify(&err);
            if !verdict.category.is_retryable() || attempt >= self.max_attempts {
                return Err(err);
            }

            let wait = match verdict.retry_after {
                Some(hint) if self.respect_retry_after => hint,
                _ => self.jitter.apply(self.backoff.delay(attempt)),
            };

            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                category = %verdict.category,
                delay_ms = wait.as_millis() as u64,
                error = %err,
                "transient failure, retrying"
            );

            self.sleeper.sleep(wait).await;
        }

        unreachable!("retry loop always returns before exhausting the range")
    }
}

#[derive(Debug)]
pub struct RetryPolicyBuilder {
    max_attempts: usize,
    backoff: Backoff,
    jitter: Jitter,
    attempt_timeout: Option<TimeoutPolicy>,
    respect_retry_after: bool,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::new(Duration::from_secs(1), Duration::from_secs(10))
                .expect("default backoff bounds are valid"),
            jitter: Jitter::additive(Duration::from_secs(2)),
            attempt_timeout: None,
            respect_retry_after: true,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn max_attempts(mut self, attempts: usize) -> Result<Self, BuildError> {
        if attempts == 0 || attempts > MAX_ATTEMPTS {
            return Err(BuildError::InvalidMaxAttempts(attempts));
        }
        self.max_attempts = attempts;
        Ok(self)
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn attempt_timeout(mut self, timeout: TimeoutPolicy) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn respect_retry_after(mut self, respect: bool) -> Self {
        self.respect_retry_after = respect;
        self
    }

    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Share an existing sleeper across several policies.
    pub fn with_shared_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            jitter: self.jitter,
            attempt_timeout: self.attempt_timeout,
            respect_retry_after: self.respect_retry_after,
            sleeper: self.sleeper,
        }
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
