//! Orchestrator facade: strategy dispatch, status aggregation, provider
//! probes, and credential resolution.

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::cost::CostTracker;
use crate::error::OrchestratorError;
use crate::health::HealthTracker;
use crate::model::{
    ExtractionResult, OrchestrationConfig, ProviderConfig, ProviderId, Strategy,
};
use crate::presets;
use crate::provider::Provider;
use crate::registry::ProviderRegistry;
use crate::secrets::{CredentialResolver, SecretError};
use crate::sleeper::Sleeper;
use crate::strategies::{self, ProviderTag, Shared};
use crate::timeout::TimeoutPolicy;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Minimal text used by [`Orchestrator::test_provider`] probes.
const PROBE_TEXT: &str = "Connectivity check: reply with an empty extraction.";

/// Per-request knobs for [`Orchestrator::extract`].
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Override the session strategy for this one request.
    pub strategy: Option<Strategy>,
    /// Correlation key echoed into the result.
    pub email_id: Option<String>,
    /// Opaque context document (e.g. a rendered companies catalogue).
    pub context: Option<String>,
}

/// A successful extraction and the provider that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub result: ExtractionResult,
    pub provider: ProviderTag,
}

/// Monitoring view joining health, cost, and live circuit state.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStatus {
    pub provider: ProviderId,
    pub display_name: String,
    pub enabled: bool,
    pub healthy: bool,
    pub success_rate: f64,
    pub avg_response_ms: f64,
    pub total_calls: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub circuit_state: CircuitState,
    pub total_cost_usd: f64,
    pub avg_cost_per_call: f64,
    pub total_tokens: u64,
}

/// Outcome of a direct provider probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProbe {
    pub ok: bool,
    pub latency_ms: f64,
    pub error: Option<String>,
}

pub struct Orchestrator {
    shared: Arc<Shared>,
    strategy: Mutex<Strategy>,
    secrets: Arc<CredentialResolver>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.shared.registry.len())
            .field("strategy", &self.strategy())
            .finish()
    }
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Extract the five entity fields from `text` using the session strategy
    /// (or a per-request override).
    pub async fn extract(
        &self,
        text: &str,
        options: ExtractOptions,
    ) -> Result<Extraction, OrchestratorError> {
        let strategy = options.strategy.unwrap_or_else(|| self.strategy());
        tracing::info!(
            strategy = %strategy,
            email_id = options.email_id.as_deref().unwrap_or("-"),
            "dispatching extraction"
        );

        let context = options.context.as_deref();
        let email_id = options.email_id.as_deref();
        let (result, provider) = match strategy {
            Strategy::Failover => {
                strategies::failover::run(&self.shared, text, context, email_id).await?
            }
            Strategy::Consensus => {
                strategies::consensus::run(&self.shared, text, context, email_id).await?
            }
            Strategy::BestMatch => {
                strategies::best_match::run(&self.shared, text, context, email_id).await?
            }
        };

        Ok(Extraction { result, provider })
    }

    /// Per-provider health, cost, and live circuit view.
    pub fn status(&self) -> BTreeMap<ProviderId, ProviderStatus> {
        let health = self.shared.health.snapshot();
        let cost = self.shared.cost.snapshot();
        let threshold = self.shared.health.unhealthy_threshold();

        self.shared
            .registry
            .all()
            .map(|config| {
                let id = config.provider_name;
                let h = health.get(&id).cloned().unwrap_or_default();
                let c = cost.get(&id).cloned().unwrap_or_default();
                let status = ProviderStatus {
                    provider: id,
                    display_name: config.display_name.clone(),
                    enabled: config.enabled,
                    healthy: h.is_healthy(threshold),
                    success_rate: h.success_rate(),
                    avg_response_ms: h.avg_response_ms,
                    total_calls: h.success_count + h.failure_count,
                    last_success_at: h.last_success_at,
                    last_failure_at: h.last_failure_at,
                    circuit_state: self.shared.breaker(id).state(),
                    total_cost_usd: c.total_cost_usd,
                    avg_cost_per_call: c.avg_cost_per_call,
                    total_tokens: c.total_tokens,
                };
                (id, status)
            })
            .collect()
    }

    pub fn strategy(&self) -> Strategy {
        *self.strategy.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_strategy(&self, strategy: Strategy) {
        let mut current = self.strategy.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *current != strategy {
            tracing::info!(old = %*current, new = %strategy, "strategy changed");
            *current = strategy;
        }
    }

    /// Probe one provider directly, bypassing the breaker gate (so an open
    /// circuit cannot hide a recovered provider) while still recording the
    /// outcome in the breaker and trackers.
    pub async fn test_provider(
        &self,
        id: ProviderId,
    ) -> Result<ProviderProbe, OrchestratorError> {
        let provider = match self.shared.providers.get(&id) {
            Some(provider) => Arc::clone(provider),
            None => {
                return Ok(ProviderProbe {
                    ok: false,
                    latency_ms: 0.0,
                    error: Some(format!("no handle registered for provider {id}")),
                })
            }
        };
        let timeout = self
            .shared
            .registry
            .get(id)
            .map(|config| TimeoutPolicy::new(config.timeout))
            .transpose()
            .map_err(|err| OrchestratorError::Configuration(err.to_string()))?;

        let breaker = self.shared.breaker(id);
        let started = Instant::now();
        let outcome = match timeout {
            Some(timeout) => timeout.execute(|| provider.extract(PROBE_TEXT, None, None)).await,
            None => provider.extract(PROBE_TEXT, None, None).await,
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let probe = match outcome {
            Ok((_, usage)) => {
                breaker.on_success();
                self.shared.health.record_success(id, latency_ms)?;
                self.shared.cost.record(id, usage)?;
                ProviderProbe { ok: true, latency_ms, error: None }
            }
            Err(err) => {
                breaker.on_failure();
                self.shared.health.record_failure(id, &err)?;
                ProviderProbe { ok: false, latency_ms, error: Some(err.to_string()) }
            }
        };
        self.shared.health.note_circuit_state(id, breaker.state())?;

        Ok(probe)
    }

    /// Resolve a provider's API key through the credential store tiers.
    pub async fn credential(&self, id: ProviderId) -> Result<String, SecretError> {
        match self.shared.registry.get(id) {
            Some(config) => self.secrets.lookup(&config.credential_ref).await,
            None => Err(SecretError::NotFound(id.to_string())),
        }
    }
}

pub struct OrchestratorBuilder {
    provider_configs: Vec<ProviderConfig>,
    config: OrchestrationConfig,
    data_dir: PathBuf,
    providers: HashMap<ProviderId, Arc<dyn Provider>>,
    secrets: Option<Arc<CredentialResolver>>,
    retry_sleeper: Option<Arc<dyn Sleeper>>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            provider_configs: Vec::new(),
            config: OrchestrationConfig::default(),
            data_dir: PathBuf::from("./llm_health"),
            providers: HashMap::new(),
            secrets: None,
            retry_sleeper: None,
        }
    }

    /// Register a provider's static config.
    pub fn provider_config(mut self, config: ProviderConfig) -> Self {
        self.provider_configs.push(config);
        self
    }

    /// Register the call handle serving one configured provider.
    pub fn provider_handle(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(provider.id(), provider);
        self
    }

    pub fn orchestration(mut self, config: OrchestrationConfig) -> Self {
        self.config = config;
        self
    }

    /// Directory holding `health_metrics.json` and `cost_metrics.json`.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn credential_resolver(mut self, resolver: Arc<CredentialResolver>) -> Self {
        self.secrets = Some(resolver);
        self
    }

    /// Replace the retry sleeper for every provider policy (tests).
    pub fn retry_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.retry_sleeper = Some(sleeper);
        self
    }

    pub fn build(self) -> Result<Orchestrator, OrchestratorError> {
        self.config.validate().map_err(OrchestratorError::Configuration)?;
        let registry = ProviderRegistry::new(self.provider_configs)?;
        registry.validate_priority_list(&self.config.provider_priority)?;

        for &id in &self.config.provider_priority {
            let enabled = registry.get(id).map(|c| c.enabled).unwrap_or(false);
            if enabled && !self.providers.contains_key(&id) {
                return Err(OrchestratorError::Configuration(format!(
                    "enabled provider {id} has no call handle registered"
                )));
            }
        }

        let mut breakers = HashMap::new();
        let mut retries = HashMap::new();
        for config in registry.all() {
            let id = config.provider_name;
            breakers.insert(
                id,
                Arc::new(CircuitBreaker::new(id.as_str(), presets::provider_breaker(&self.config))),
            );

            let mut builder = presets::provider_retry_builder(config)?;
            if let Some(sleeper) = &self.retry_sleeper {
                builder = builder.with_shared_sleeper(Arc::clone(sleeper));
            }
            retries.insert(id, builder.build());
        }

        let data_dir = self.data_dir;
        let health = HealthTracker::new(&data_dir, self.config.unhealthy_threshold);
        let cost = CostTracker::new(&data_dir, registry.pricing());

        let secrets = match self.secrets {
            Some(resolver) => resolver,
            None => Arc::new(CredentialResolver::env_only()?),
        };

        let strategy = self.config.default_strategy;
        let shared = Arc::new(Shared {
            registry,
            config: self.config,
            health,
            cost,
            breakers,
            retries,
            providers: self.providers,
        });

        tracing::info!(
            providers = shared.registry.len(),
            strategy = %strategy,
            data_dir = %data_dir.display(),
            "orchestrator ready"
        );

        Ok(Orchestrator { shared, strategy: Mutex::new(strategy), secrets })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
