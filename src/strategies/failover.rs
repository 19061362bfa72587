//! Failover: deterministic single-provider dispatch in priority order.

use super::{execute_call, ProviderTag, Shared};
use crate::classify::{classify, ErrorCategory};
use crate::error::{OrchestratorError, ProviderFailure};
use crate::model::ExtractionResult;
use std::sync::Arc;

/// Try providers serially in priority order until one succeeds.
///
/// CRITICAL failures are logged loudly but do not stop the cascade; an
/// exhausted list yields [`OrchestratorError::AllProvidersFailed`]
/// summarising each provider's last error.
pub(crate) async fn run(
    shared: &Arc<Shared>,
    text: &str,
    context: Option<&str>,
    email_id: Option<&str>,
) -> Result<(ExtractionResult, ProviderTag), OrchestratorError> {
    let mut summary = Vec::new();

    for &id in &shared.config.provider_priority {
        let enabled = shared.registry.get(id).map(|c| c.enabled).unwrap_or(false);
        if !enabled {
            tracing::debug!(provider = %id, "skipping disabled provider");
            continue;
        }
        if !shared.health.is_healthy(id) {
            tracing::debug!(provider = %id, "skipping unhealthy provider");
            continue;
        }
        if !shared.breaker(id).allow() {
            // No network call happens for a gated provider.
            tracing::debug!(provider = %id, "skipping provider with open circuit");
            continue;
        }

        match execute_call(shared, id, text, context, email_id).await? {
            Ok((result, _usage)) => {
                tracing::info!(provider = %id, "failover extraction succeeded");
                return Ok((result, ProviderTag::Provider(id)));
            }
            Err(err) => {
                let category = classify(&err).category;
                if category == ErrorCategory::Critical {
                    tracing::error!(
                        provider = %id,
                        error = %err,
                        "critical provider failure, cascading to next provider"
                    );
                } else {
                    tracing::warn!(provider = %id, error = %err, "provider failed, trying next");
                }
                summary.push(ProviderFailure { provider: id, category, message: err.to_string() });
            }
        }
    }

    Err(OrchestratorError::AllProvidersFailed { summary })
}
