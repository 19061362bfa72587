//! Consensus: parallel dispatch to all eligible providers, merged by
//! confidence-weighted fuzzy voting.

use super::{eligible_providers, fan_out, ProviderTag, Shared};
use crate::error::OrchestratorError;
use crate::merge::{merge, MergeCandidate, MergeConfig, MergeError};
use crate::model::ExtractionResult;
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
            "insufficient healthy providers for consensus"
        );
        return Err(OrchestratorError::AllProvidersFailed { summary: vec![] });
    }

    let outcome = fan_out(shared, eligible, text, context, email_id).await?;
    if outcome.successes.len() < need {
        tracing::warn!(
            got = outcome.successes.len(),
            need,
            failures = outcome.failures.len(),
            "insufficient responses for consensus"
        );
        return Err(OrchestratorError::InsufficientResponses {
            got: outcome.successes.len(),
            need,
        });
    }

    let mut successes = outcome.successes;
    if successes.len() == 1 {
        // min_agreement of 1: merging a single result is the identity.
        let (provider, result) = successes.remove(0);
        tracing::info!(provider = %provider, "consensus degenerated to a single response");
        return Ok((result, ProviderTag::Consensus));
    }

    let rates = shared.health.snapshot();
    let candidates: Vec<MergeCandidate> = successes
        .into_iter()
        .map(|(id, result)| MergeCandidate {
            result,
            success_rate: rates.get(&id).map(|m| m.success_rate()).unwrap_or(0.0),
        })
        .collect();

    let config = MergeConfig {
        fuzzy_threshold: shared.config.fuzzy_threshold,
        abstention_confidence_threshold: shared.config.abstention_confidence_threshold,
    };
    let merged = match merge(&candidates, &config, email_id) {
        Ok(merged) => merged,
        // Unreachable past the minimum-response check; kept as a typed error.
        Err(MergeError::NoCandidates) => {
            return Err(OrchestratorError::InsufficientResponses { got: 0, need })
        }
    };
    tracing::info!(
        responses = candidates.len(),
        overall_confidence = merged.overall_confidence(),
        "consensus merge complete"
    );

    Ok((merged, ProviderTag::Consensus))
}
