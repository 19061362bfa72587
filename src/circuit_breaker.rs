//! Per-provider circuit breaker: CLOSED → OPEN → HALF_OPEN state machine.
//!
//! One instance per provider, strictly isolated — a failing provider can
//! never trip another's breaker. All operations take the breaker's single
//! mutex, perform O(1) work, and do no I/O, so `allow()` answers in
//! microseconds even under contention.

use crate::clock::{Clock, MonotonicClock};
use crate::retry::RetryHooks;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Breaker state, also mirrored into health metrics for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in CLOSED before opening.
    pub failure_threshold: usize,
    /// Successes in HALF_OPEN before closing again.
    pub success_threshold: usize,
    /// Time spent OPEN before probes are allowed.
    pub open_timeout: Duration,
    /// Concurrent probe budget while HALF_OPEN.
    pub half_open_max_calls: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(60),
            half_open_max_calls: 1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Tighter settings for less-trusted dependencies that should fail fast.
    pub fn fail_fast() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(30),
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Failures within the current CLOSED window.
    failure_count: usize,
    /// Successes within the current HALF_OPEN window.
    success_count: usize,
    opened_at_millis: u64,
    half_open_in_flight: usize,
}

/// Read-only view of a breaker for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: usize,
    pub success_count: usize,
}

pub struct CircuitBreaker {
    service: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("service", &self.service)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            service: service.into(),
            config,
            clock: Arc::new(MonotonicClock::default()),
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at_millis: 0,
                half_open_in_flight: 0,
            }),
        }
    }

    /// Override the clock (deterministic recovery-window tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether a call may proceed. Promotes OPEN → HALF_OPEN once the open
    /// timeout has elapsed; while HALF_OPEN, admits at most
    /// `half_open_max_calls` concurrent probes.
    pub fn allow(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = self.clock.now_millis().saturating_sub(inner.opened_at_millis);
                if elapsed >= self.config.open_timeout.as_millis() as u64 {
                    let failures = inner.failure_count;
                    self.transition(&mut inner, CircuitState::HalfOpen, failures);
                    inner.success_count = 0;
                    inner.half_open_in_flight = 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight < self.config.half_open_max_calls {
                    inner.half_open_in_flight += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Non-consuming peek used when sizing a fan-out: would [`Self::allow`]
    /// admit a call right now? No promotion happens and no probe budget is
    /// reserved.
    pub fn would_allow(&self) -> bool {
        let inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = self.clock.now_millis().saturating_sub(inner.opened_at_millis);
                elapsed >= self.config.open_timeout.as_millis() as u64
            }
            CircuitState::HalfOpen => inner.half_open_in_flight < self.config.half_open_max_calls,
        }
    }

    pub fn on_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    let failures = inner.failure_count;
                    self.transition(&mut inner, CircuitState::Closed, failures);
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.opened_at_millis = 0;
                    inner.half_open_in_flight = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn on_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    let failures = inner.failure_count;
                    self.transition(&mut inner, CircuitState::Open, failures);
                    inner.opened_at_millis = self.clock.now_millis();
                }
            }
            CircuitState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                let failures = inner.failure_count;
                self.transition(&mut inner, CircuitState::Open, failures);
                inner.opened_at_millis = self.clock.now_millis();
                inner.success_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Current state without side effects (no OPEN → HALF_OPEN promotion).
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
        }
    }

    /// Force back to CLOSED, clearing all counters (admin/tests).
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.opened_at_millis = 0;
        inner.half_open_in_flight = 0;
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState, failure_count: usize) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        if to == CircuitState::Open {
            tracing::warn!(
                service = %self.service,
                old_state = %from,
                new_state = %to,
                failure_count,
                "circuit breaker state transition"
            );
        } else {
            tracing::info!(
                service = %self.service,
                old_state = %from,
                new_state = %to,
                failure_count,
                "circuit breaker state transition"
            );
        }
    }
}

impl RetryHooks for CircuitBreaker {
    fn on_success(&self) {
        CircuitBreaker::on_success(self)
    }
    fn on_failure(&self) {
        CircuitBreaker::on_failure(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn breaker_with_clock(config: CircuitBreakerConfig) -> (CircuitBreaker, ManualClock) {
        let clock = ManualClock::new();
        let breaker = CircuitBreaker::new("gemini", config).with_clock(clock.clone());
        (breaker, clock)
    }

    #[test]
    fn starts_closed_and_allows() {
        let breaker = CircuitBreaker::new("gemini", CircuitBreakerConfig::default());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow());
    }

    #[test]
    fn opens_after_exactly_threshold_failures() {
        let (breaker, _clock) = breaker_with_clock(CircuitBreakerConfig::default());

        for _ in 0..4 {
            breaker.on_failure();
            assert_eq!(breaker.state(), CircuitState::Closed);
        }
        breaker.on_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow());
    }

    #[test]
    fn success_in_closed_resets_failure_streak() {
        let (breaker, _clock) = breaker_with_clock(CircuitBreakerConfig::default());

        for _ in 0..4 {
            breaker.on_failure();
        }
        breaker.on_success();
        for _ in 0..4 {
            breaker.on_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn open_rejects_until_timeout_then_half_opens() {
        let (breaker, clock) = breaker_with_clock(CircuitBreakerConfig::default());

        for _ in 0..5 {
            breaker.on_failure();
        }
        assert!(!breaker.allow());

        clock.advance(59_999);
        assert!(!breaker.allow());

        clock.advance(1);
        assert!(breaker.allow(), "first probe after the window is admitted");
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        // Probe budget (1) is spent until an outcome is reported.
        assert!(!breaker.allow());
    }

    #[test]
    fn closes_after_success_threshold_in_half_open() {
        let (breaker, clock) = breaker_with_clock(CircuitBreakerConfig::default());

        for _ in 0..5 {
            breaker.on_failure();
        }
        clock.advance(60_000);

        assert!(breaker.allow());
        breaker.on_success();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        assert!(breaker.allow());
        breaker.on_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().failure_count, 0);
    }

    #[test]
    fn failure_in_half_open_reopens_and_restarts_window() {
        let (breaker, clock) = breaker_with_clock(CircuitBreakerConfig::default());

        for _ in 0..5 {
            breaker.on_failure();
        }
        clock.advance(60_000);
        assert!(breaker.allow());

        breaker.on_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        // The 60s window restarts from the half-open failure.
        clock.advance(59_999);
        assert!(!breaker.allow());
        clock.advance(1);
        assert!(breaker.allow());
    }

    #[test]
    fn half_open_admits_up_to_probe_budget() {
        let config = CircuitBreakerConfig { half_open_max_calls: 2, ..Default::default() };
        let (breaker, clock) = breaker_with_clock(config);

        for _ in 0..5 {
            breaker.on_failure();
        }
        clock.advance(60_000);

        assert!(breaker.allow());
        assert!(breaker.allow());
        assert!(!breaker.allow(), "third concurrent probe rejected");

        breaker.on_success();
        assert!(breaker.allow(), "budget frees as probes complete");
    }

    #[test]
    fn would_allow_peeks_without_consuming_budget() {
        let (breaker, clock) = breaker_with_clock(CircuitBreakerConfig::default());

        assert!(breaker.would_allow());
        for _ in 0..5 {
            breaker.on_failure();
        }
        assert!(!breaker.would_allow());

        clock.advance(60_000);
        assert!(breaker.would_allow());
        assert_eq!(breaker.state(), CircuitState::Open, "peek does not promote");

        assert!(breaker.allow());
        assert!(!breaker.would_allow(), "probe budget is spent by allow, not the peek");
    }

    #[test]
    fn breakers_are_isolated_per_service() {
        let a = CircuitBreaker::new("gemini", CircuitBreakerConfig::default());
        let b = CircuitBreaker::new("claude", CircuitBreakerConfig::default());

        for _ in 0..5 {
            a.on_failure();
        }

        assert_eq!(a.state(), CircuitState::Open);
        assert_eq!(b.state(), CircuitState::Closed);
        assert!(b.allow());
    }

    #[test]
    fn fail_fast_profile_trips_sooner() {
        let (breaker, clock) = breaker_with_clock(CircuitBreakerConfig::fail_fast());

        for _ in 0..3 {
            breaker.on_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        clock.advance(30_000);
        assert!(breaker.allow());
    }

    #[test]
    fn reset_returns_to_closed() {
        let (breaker, _clock) = breaker_with_clock(CircuitBreakerConfig::default());
        for _ in 0..5 {
            breaker.on_failure();
        }
        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow());
    }

    #[test]
    fn allow_is_fast() {
        let breaker = CircuitBreaker::new("gemini", CircuitBreakerConfig::default());
        let start = std::time::Instant::now();
        for _ in 0..1_000_000 {
            let _ = breaker.allow();
        }
        let per_call = start.elapsed() / 1_000_000;
        assert!(per_call < std::time::Duration::from_millis(1), "allow() took {per_call:?}");
    }

    #[test]
    fn circuit_state_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&CircuitState::HalfOpen).unwrap(), "\"half_open\"");
        let parsed: CircuitState = serde_json::from_str("\"open\"").unwrap();
        assert_eq!(parsed, CircuitState::Open);
    }
}
