//! Durable per-provider health tracking.
//!
//! Records success/failure outcomes, rolling latency, and failure streaks,
//! persisting to `health_metrics.json` after every mutation. Records are
//! created lazily on first use and never deleted, only reset.

use crate::circuit_breaker::CircuitState;
use crate::error::{OrchestratorError, ProviderError};
use crate::model::{HealthMetrics, ProviderId};
use crate::persist::JsonStore;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Smoothing factor for the rolling response-time average. The first
/// observation seeds the average; each later one moves it by a tenth of the
/// difference.
const LATENCY_ALPHA: f64 = 0.1;

/// Stored error messages are capped at this many characters.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

pub const HEALTH_FILE: &str = "health_metrics.json";

pub struct HealthTracker {
    unhealthy_threshold: u32,
    store: JsonStore,
    inner: Mutex<HashMap<ProviderId, HealthMetrics>>,
}

impl std::fmt::Debug for HealthTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthTracker")
            .field("unhealthy_threshold", &self.unhealthy_threshold)
            .field("path", &self.store.path())
            .finish()
    }
}

impl HealthTracker {
    /// Open (or lazily create) the tracker backed by
    /// `<data_dir>/health_metrics.json`.
    pub fn new(data_dir: impl AsRef<Path>, unhealthy_threshold: u32) -> Self {
        let store = JsonStore::new(data_dir.as_ref().join(HEALTH_FILE));
        let loaded: HashMap<ProviderId, HealthMetrics> = store.load();
        if !loaded.is_empty() {
            tracing::info!(
                providers = loaded.len(),
                path = %store.path().display(),
                "loaded prior health metrics"
            );
        }
        Self { unhealthy_threshold, store, inner: Mutex::new(loaded) }
    }

    /// Record a successful call and its latency, then persist.
    pub fn record_success(
        &self,
        provider: ProviderId,
        latency_ms: f64,
    ) -> Result<(), OrchestratorError> {
        let mut inner = self.lock();
        let record = inner.entry(provider).or_default();

        record.success_count += 1;
        record.consecutive_failures = 0;
        record.avg_response_ms = if record.success_count == 1 {
            latency_ms
        } else {
            record.avg_response_ms + LATENCY_ALPHA * (latency_ms - record.avg_response_ms)
        };
        record.last_success_at = Some(Utc::now());
        record.updated_at = Utc::now();

        self.store.save(&*inner)
    }

    /// Record a failed call with its (truncated) error message, then persist.
    pub fn record_failure(
        &self,
        provider: ProviderId,
        error: &ProviderError,
    ) -> Result<(), OrchestratorError> {
        let mut inner = self.lock();
        let record = inner.entry(provider).or_default();

        record.failure_count += 1;
        record.consecutive_failures += 1;
        record.last_error_message = Some(truncate(&error.to_string()));
        record.last_failure_at = Some(Utc::now());
        record.updated_at = Utc::now();

        if record.consecutive_failures == self.unhealthy_threshold {
            tracing::warn!(
                provider = %provider,
                consecutive_failures = record.consecutive_failures,
                "provider crossed the unhealthy threshold"
            );
        }

        self.store.save(&*inner)
    }

    /// Mirror the breaker state into the durable record. Persists only when
    /// the stored value actually changes; the breaker stays authoritative.
    pub fn note_circuit_state(
        &self,
        provider: ProviderId,
        state: CircuitState,
    ) -> Result<(), OrchestratorError> {
        let mut inner = self.lock();
        let record = inner.entry(provider).or_default();
        if record.circuit_state == state {
            return Ok(());
        }
        record.circuit_state = state;
        record.updated_at = Utc::now();
        self.store.save(&*inner)
    }

    /// A provider with no record yet is healthy.
    pub fn is_healthy(&self, provider: ProviderId) -> bool {
        self.lock()
            .get(&provider)
            .map(|record| record.is_healthy(self.unhealthy_threshold))
            .unwrap_or(true)
    }

    /// Success rate in `[0, 1]`; `0.0` for untracked providers.
    pub fn success_rate(&self, provider: ProviderId) -> f64 {
        self.lock().get(&provider).map(HealthMetrics::success_rate).unwrap_or(0.0)
    }

    /// Deep copy of every record for read-only inspection.
    pub fn snapshot(&self) -> HashMap<ProviderId, HealthMetrics> {
        self.lock().clone()
    }

    /// Empty one provider's record (admin/tests), then persist.
    pub fn reset(&self, provider: ProviderId) -> Result<(), OrchestratorError> {
        let mut inner = self.lock();
        inner.insert(provider, HealthMetrics::default());
        self.store.save(&*inner)
    }

    pub fn unhealthy_threshold(&self) -> u32 {
        self.unhealthy_threshold
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProviderId, HealthMetrics>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn truncate(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        return message.to_string();
    }
    message.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
}
