//! Durable per-provider cost tracking.
//!
//! Records token consumption and computes monetary cost from the configured
//! per-million-token pricing. Same persistence discipline as the health
//! tracker, backed by `cost_metrics.json`.

use crate::error::OrchestratorError;
use crate::model::{CostMetrics, ProviderId, TokenUsage};
use crate::persist::JsonStore;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub const COST_FILE: &str = "cost_metrics.json";

/// USD per 1,000,000 tokens, input and output sides.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pricing {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

impl Pricing {
    pub fn new(input_per_mtok: f64, output_per_mtok: f64) -> Self {
        Self { input_per_mtok, output_per_mtok }
    }

    /// Cost of one call at this pricing.
    pub fn cost_of(&self, usage: TokenUsage) -> f64 {
        (usage.input_tokens as f64 / 1_000_000.0) * self.input_per_mtok
            + (usage.output_tokens as f64 / 1_000_000.0) * self.output_per_mtok
    }
}

pub struct CostTracker {
    pricing: HashMap<ProviderId, Pricing>,
    store: JsonStore,
    inner: Mutex<HashMap<ProviderId, CostMetrics>>,
}

impl std::fmt::Debug for CostTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostTracker")
            .field("providers", &self.pricing.len())
            .field("path", &self.store.path())
            .finish()
    }
}

impl CostTracker {
    /// Open (or lazily create) the tracker backed by
    /// `<data_dir>/cost_metrics.json`.
    pub fn new(data_dir: impl AsRef<Path>, pricing: HashMap<ProviderId, Pricing>) -> Self {
        let store = JsonStore::new(data_dir.as_ref().join(COST_FILE));
        let loaded: HashMap<ProviderId, CostMetrics> = store.load();
        if !loaded.is_empty() {
            tracing::info!(
                providers = loaded.len(),
                path = %store.path().display(),
                "loaded prior cost metrics"
            );
        }
        Self { pricing, store, inner: Mutex::new(loaded) }
    }

    /// Record one call's token usage, recompute derived fields, persist.
    ///
    /// A provider without configured pricing records tokens at zero cost.
    pub fn record(&self, provider: ProviderId, usage: TokenUsage) -> Result<(), OrchestratorError> {
        let call_cost = match self.pricing.get(&provider) {
            Some(pricing) => pricing.cost_of(usage),
            None => {
                tracing::warn!(provider = %provider, "no pricing configured, recording zero cost");
                0.0
            }
        };

        let mut inner = self.lock();
        let record = inner.entry(provider).or_default();

        record.total_calls += 1;
        record.total_input_tokens += usage.input_tokens;
        record.total_output_tokens += usage.output_tokens;
        record.total_tokens = record.total_input_tokens + record.total_output_tokens;
        record.total_cost_usd += call_cost;
        record.avg_cost_per_call = record.total_cost_usd / record.total_calls as f64;
        record.updated_at = Utc::now();

        tracing::debug!(
            provider = %provider,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            call_cost_usd = call_cost,
            total_cost_usd = record.total_cost_usd,
            "recorded provider usage"
        );

        self.store.save(&*inner)
    }

    /// Deep copy of every record for read-only inspection.
    pub fn snapshot(&self) -> HashMap<ProviderId, CostMetrics> {
        self.lock().clone()
    }

    /// Empty one provider's record (admin/tests), then persist.
    pub fn reset(&self, provider: ProviderId) -> Result<(), OrchestratorError> {
        let mut inner = self.lock();
        inner.insert(provider, CostMetrics::default());
        self.store.save(&*inner)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProviderId, CostMetrics>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
