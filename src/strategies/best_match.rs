//! Best-match: parallel dispatch, return the single highest-confidence
//! response instead of merging.

use super::{eligible_providers, fan_out, ProviderTag, Shared};
use crate::error::OrchestratorError;
use crate::model::{ExtractionResult, ProviderId};
use std::sync::Arc;

pub(crate) async fn run(
    shared: &Arc<Shared>,
    text: &str,
    context: Option<&str>,
    email_id: Option<&str>,
) -> Result<(ExtractionResult, ProviderTag), OrchestratorError> {
    let need = shared.config.consensus_min_agreement;

    let eligible = eligible_providers(shared);
    if eligible.len() < need {
        tracing::warn!(
            eligible = eligible.len(),
            need,
            "insufficient healthy providers for best-match"
        );
        return Err(OrchestratorError::AllProvidersFailed { summary: vec![] });
    }

    let outcome = fan_out(shared, eligible, text, context, email_id).await?;
    if outcome.successes.len() < need {
        return Err(OrchestratorError::InsufficientResponses {
            got: outcome.successes.len(),
            need,
        });
    }

    let priority_of = |id: ProviderId| {
        shared.registry.get(id).map(|c| c.priority).unwrap_or(u32::MAX)
    };

    let mut best: Option<(ProviderId, ExtractionResult, f64)> = None;
    for (id, result) in outcome.successes {
        let score = result.overall_confidence();
        let wins = match &best {
            None => true,
            Some((best_id, _, best_score)) => {
                if score != *best_score {
                    score > *best_score
                } else {
                    priority_of(id) < priority_of(*best_id)
                }
            }
        };
        if wins {
            best = Some((id, result, score));
        }
    }

    match best {
        Some((id, result, score)) => {
            tracing::info!(provider = %id, overall_confidence = score, "best-match selected");
            Ok((result, ProviderTag::Provider(id)))
        }
        // Unreachable past the minimum-response check; kept as a typed error.
        None => Err(OrchestratorError::InsufficientResponses { got: 0, need }),
    }
}
