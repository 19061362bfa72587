//! Orchestration strategies: failover, consensus, and best-match.
//!
//! Each strategy composes the registry, trackers, breakers, and retry
//! policies around the provider handles. Gating is uniform: a provider is
//! dispatched only when it is enabled, healthy, and its breaker admits the
//! call. An open circuit is a skip, never a recorded failure or cost.

pub(crate) mod best_match;
pub(crate) mod consensus;
pub(crate) mod failover;

use crate::circuit_breaker::CircuitBreaker;
use crate::classify::{classify, ErrorCategory};
use crate::cost::CostTracker;
use crate::error::{OrchestratorError, ProviderError, ProviderFailure};
use crate::health::HealthTracker;
use crate::model::{ExtractionResult, OrchestrationConfig, ProviderId, TokenUsage};
use crate::provider::Provider;
use crate::registry::ProviderRegistry;
use crate::retry::RetryPolicy;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Which provider produced a returned result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderTag {
    Provider(ProviderId),
    /// The result was merged from several providers.
    Consensus,
}

impl ProviderTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provider(id) => id.as_str(),
            Self::Consensus => "consensus",
        }
    }
}

impl std::fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the strategies share, held behind one `Arc` by the facade.
pub(crate) struct Shared {
    pub registry: ProviderRegistry,
    pub config: OrchestrationConfig,
    pub health: HealthTracker,
    pub cost: CostTracker,
    pub breakers: HashMap<ProviderId, Arc<CircuitBreaker>>,
    pub retries: HashMap<ProviderId, RetryPolicy>,
    pub providers: HashMap<ProviderId, Arc<dyn Provider>>,
}

impl Shared {
    /// Breakers are created for every registry member at build time.
    pub(crate) fn breaker(&self, id: ProviderId) -> &Arc<CircuitBreaker> {
        &self.breakers[&id]
    }
}

/// Providers that pass the gating rules, in failover priority order. Uses the
/// breaker's non-consuming peek so sizing a fan-out spends no probe budget.
pub(crate) fn eligible_providers(shared: &Shared) -> Vec<ProviderId> {
    shared
        .config
        .provider_priority
        .iter()
        .copied()
        .filter(|&id| {
            let enabled = shared.registry.get(id).map(|c| c.enabled).unwrap_or(false);
            if !enabled {
                tracing::debug!(provider = %id, "skipping disabled provider");
                return false;
            }
            if !shared.health.is_healthy(id) {
                tracing::debug!(provider = %id, "skipping unhealthy provider");
                return false;
            }
            if !shared.breaker(id).would_allow() {
                tracing::debug!(provider = %id, "skipping provider with open circuit");
                return false;
            }
            true
        })
        .collect()
}

/// One gated provider call through the retry engine, with the outcome
/// recorded in the health tracker, cost tracker, and breaker mirror.
///
/// The outer `Result` carries fatal persistence failures; the inner one is
/// the provider's own success or failure.
pub(crate) async fn execute_call(
    shared: &Shared,
    id: ProviderId,
    text: &str,
    context: Option<&str>,
    email_id: Option<&str>,
) -> Result<Result<(ExtractionResult, TokenUsage), ProviderError>, OrchestratorError> {
    let provider = match shared.providers.get(&id) {
        Some(provider) => Arc::clone(provider),
        None => {
            return Ok(Err(ProviderError::other(format!(
                "no handle registered for provider {id}"
            ))))
        }
    };
    let breaker = Arc::clone(shared.breaker(id));
    let retry = &shared.retries[&id];

    let started = Instant::now();
    let outcome =
        retry.execute(breaker.as_ref(), || provider.extract(text, context, email_id)).await;
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    match &outcome {
        Ok((_, usage)) => {
            shared.health.record_success(id, latency_ms)?;
            shared.cost.record(id, *usage)?;
        }
        Err(err) => {
            shared.health.record_failure(id, err)?;
        }
    }
    shared.health.note_circuit_state(id, breaker.state())?;

    Ok(outcome)
}

/// Results of a parallel dispatch round.
pub(crate) struct FanOut {
    /// Successful `(provider, result)` pairs in dispatch (priority) order.
    pub successes: Vec<(ProviderId, ExtractionResult)>,
    pub failures: Vec<ProviderFailure>,
}

/// Dispatch all eligible providers concurrently and gather under the overall
/// deadline. Tasks still running at the deadline are aborted and count as
/// transient failures for their provider.
pub(crate) async fn fan_out(
    shared: &Arc<Shared>,
    eligible: Vec<ProviderId>,
    text: &str,
    context: Option<&str>,
    email_id: Option<&str>,
) -> Result<FanOut, OrchestratorError> {
    let deadline = tokio::time::Instant::now() + shared.config.overall_timeout;

    let mut handles = Vec::with_capacity(eligible.len());
    for id in eligible {
        if !shared.breaker(id).allow() {
            tracing::debug!(provider = %id, "circuit refused the call at dispatch");
            continue;
        }
        let shared = Arc::clone(shared);
        let text = text.to_string();
        let context = context.map(str::to_string);
        let email_id = email_id.map(str::to_string);
        let handle = tokio::spawn(async move {
            execute_call(&shared, id, &text, context.as_deref(), email_id.as_deref()).await
        });
        handles.push((id, handle));
    }

    // One gather over every task, all sharing the same deadline.
    let gathered: Vec<_> = futures::future::join_all(
        handles.iter_mut().map(|(_, handle)| tokio::time::timeout_at(deadline, handle)),
    )
    .await;

    let mut successes = Vec::new();
    let mut failures = Vec::new();

    for ((id, handle), timed) in handles.iter().zip(gathered) {
        let id = *id;
        let joined = match timed {
            Ok(joined) => joined,
            Err(_) => {
                // Deadline elapsed with the call still in flight.
                handle.abort();
                let err = ProviderError::Timeout {
                    elapsed: shared.config.overall_timeout,
                    limit: shared.config.overall_timeout,
                };
                shared.breaker(id).on_failure();
                shared.health.record_failure(id, &err)?;
                shared.health.note_circuit_state(id, shared.breaker(id).state())?;
                failures.push(ProviderFailure {
                    provider: id,
                    category: ErrorCategory::Transient,
                    message: err.to_string(),
                });
                continue;
            }
        };

        let call = match joined {
            Ok(call) => call,
            Err(join_err) => {
                failures.push(ProviderFailure {
                    provider: id,
                    category: ErrorCategory::Permanent,
                    message: format!("dispatch task failed: {join_err}"),
                });
                continue;
            }
        };

        match call? {
            Ok((result, _usage)) => successes.push((id, result)),
            Err(err) => {
                let category = classify(&err).category;
                if category == ErrorCategory::Critical {
                    tracing::error!(provider = %id, error = %err, "critical provider failure");
                }
                failures.push(ProviderFailure { provider: id, category, message: err.to_string() });
            }
        }
    }

    Ok(FanOut { successes, failures })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_tag_strings() {
        assert_eq!(ProviderTag::Provider(ProviderId::Gemini).as_str(), "gemini");
        assert_eq!(ProviderTag::Consensus.as_str(), "consensus");
        assert_eq!(ProviderTag::Consensus.to_string(), "consensus");
    }
}
