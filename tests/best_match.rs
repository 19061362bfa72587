//! Best-match strategy: parallel dispatch, highest-confidence winner.

mod common;

use common::{build_orchestrator, sample_result, ScriptedProvider};
use quorum::{
    ExtractOptions, OrchestrationConfig, OrchestratorError, ProviderError, ProviderId,
    ProviderTag, Strategy,
};

fn best_match_options(email_id: &str) -> ExtractOptions {
    ExtractOptions {
        strategy: Some(Strategy::BestMatch),
        email_id: Some(email_id.to_string()),
        context: None,
    }
}

#[tokio::test]
async fn highest_mean_confidence_wins() {
    let dir = tempfile::tempdir().unwrap();
    let gemini = ScriptedProvider::succeeding(ProviderId::Gemini, sample_result(0.72));
    let claude = ScriptedProvider::succeeding(ProviderId::Claude, sample_result(0.94));
    let openai = ScriptedProvider::succeeding(ProviderId::Openai, sample_result(0.81));

    let orchestrator = build_orchestrator(
        dir.path(),
        common::three_provider_configs(),
        OrchestrationConfig::default(),
        vec![gemini.clone(), claude, openai.clone()],
    );

    let extraction = orchestrator.extract("kickoff mail", best_match_options("mail-1")).await.unwrap();

    assert_eq!(extraction.provider, ProviderTag::Provider(ProviderId::Claude));
    assert!((extraction.result.overall_confidence() - 0.94).abs() < 1e-9);
    // Everyone was still dispatched in parallel.
    assert_eq!(gemini.calls(), 1);
    assert_eq!(openai.calls(), 1);
}

#[tokio::test]
async fn ties_break_by_provider_priority() {
    let dir = tempfile::tempdir().unwrap();
    let gemini = ScriptedProvider::succeeding(ProviderId::Gemini, sample_result(0.9));
    let claude = ScriptedProvider::succeeding(ProviderId::Claude, sample_result(0.9));
    let openai = ScriptedProvider::succeeding(ProviderId::Openai, sample_result(0.9));

    let orchestrator = build_orchestrator(
        dir.path(),
        common::three_provider_configs(),
        OrchestrationConfig::default(),
        vec![gemini, claude, openai],
    );

    let extraction = orchestrator.extract("kickoff mail", best_match_options("mail-2")).await.unwrap();
    assert_eq!(extraction.provider, ProviderTag::Provider(ProviderId::Gemini));
}

#[tokio::test]
async fn gating_matches_consensus_rules() {
    let dir = tempfile::tempdir().unwrap();
    let gemini = ScriptedProvider::succeeding(ProviderId::Gemini, sample_result(0.9));
    let claude =
        ScriptedProvider::failing(ProviderId::Claude, ProviderError::http(500, "boom"));
    let openai =
        ScriptedProvider::failing(ProviderId::Openai, ProviderError::http(500, "boom"));

    let orchestrator = build_orchestrator(
        dir.path(),
        common::three_provider_configs(),
        OrchestrationConfig::default(),
        vec![gemini, claude, openai],
    );

    // Only one success against a minimum of two.
    let err = orchestrator.extract("kickoff mail", best_match_options("mail-3")).await.unwrap_err();
    match err {
        OrchestratorError::InsufficientResponses { got, need } => {
            assert_eq!((got, need), (1, 2));
        }
        other => panic!("expected InsufficientResponses, got {other:?}"),
    }
}
