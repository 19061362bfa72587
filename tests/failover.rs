//! Failover strategy end-to-end, driven through scripted providers.

mod common;

use common::{build_orchestrator, provider_config, sample_result, ScriptedProvider};
use quorum::{
    CircuitState, ExtractOptions, OrchestrationConfig, OrchestratorError, ProviderError,
    ProviderId, ProviderTag,
};
use std::time::Duration;

fn options(email_id: &str) -> ExtractOptions {
    ExtractOptions { email_id: Some(email_id.to_string()), ..Default::default() }
}

#[tokio::test]
async fn happy_path_uses_the_top_priority_provider() {
    let dir = tempfile::tempdir().unwrap();
    let gemini = ScriptedProvider::succeeding(ProviderId::Gemini, sample_result(0.9));
    let claude = ScriptedProvider::succeeding(ProviderId::Claude, sample_result(0.8));
    let openai = ScriptedProvider::succeeding(ProviderId::Openai, sample_result(0.7));

    let orchestrator = build_orchestrator(
        dir.path(),
        common::three_provider_configs(),
        OrchestrationConfig::default(),
        vec![gemini.clone(), claude.clone(), openai.clone()],
    );

    let extraction = orchestrator.extract("kickoff mail", options("mail-1")).await.unwrap();

    assert_eq!(extraction.provider, ProviderTag::Provider(ProviderId::Gemini));
    assert_eq!(extraction.result.person.as_deref(), Some("김철수"));
    assert_eq!(extraction.result.startup.as_deref(), Some("본봄"));
    assert_eq!(extraction.result.partner.as_deref(), Some("신세계"));
    assert_eq!(extraction.result.details.as_deref(), Some("kickoff"));
    assert_eq!(extraction.result.date.map(|d| d.to_string()).as_deref(), Some("2025-11-01"));
    assert_eq!(extraction.result.email_id.as_deref(), Some("mail-1"));

    // Only the winner was called; only its metrics moved.
    assert_eq!(gemini.calls(), 1);
    assert_eq!(claude.calls(), 0);
    assert_eq!(openai.calls(), 0);

    let status = orchestrator.status();
    assert_eq!(status[&ProviderId::Gemini].total_calls, 1);
    assert!((status[&ProviderId::Gemini].success_rate - 1.0).abs() < 1e-9);
    assert_eq!(status[&ProviderId::Claude].total_calls, 0);
    assert_eq!(status[&ProviderId::Openai].total_calls, 0);
}

#[tokio::test]
async fn critical_failure_cascades_to_the_next_provider() {
    let dir = tempfile::tempdir().unwrap();
    let gemini =
        ScriptedProvider::failing(ProviderId::Gemini, ProviderError::http(401, "bad api key"));
    let claude = ScriptedProvider::succeeding(ProviderId::Claude, sample_result(0.9));
    let openai = ScriptedProvider::succeeding(ProviderId::Openai, sample_result(0.7));

    let orchestrator = build_orchestrator(
        dir.path(),
        common::three_provider_configs(),
        OrchestrationConfig::default(),
        vec![gemini.clone(), claude.clone(), openai.clone()],
    );

    let extraction = orchestrator.extract("kickoff mail", options("mail-2")).await.unwrap();

    assert_eq!(extraction.provider, ProviderTag::Provider(ProviderId::Claude));
    assert_eq!(extraction.result.startup.as_deref(), Some("본봄"));
    assert_eq!(gemini.calls(), 1);
    assert_eq!(claude.calls(), 1);
    assert_eq!(openai.calls(), 0);

    let status = orchestrator.status();
    assert_eq!(status[&ProviderId::Gemini].total_calls, 1);
    assert!((status[&ProviderId::Gemini].success_rate - 0.0).abs() < 1e-9);
    assert!(status[&ProviderId::Gemini].last_failure_at.is_some());
    // One 401 is far from the breaker threshold.
    assert_eq!(status[&ProviderId::Gemini].circuit_state, CircuitState::Closed);
}

#[tokio::test]
async fn exhausted_list_reports_every_provider() {
    let dir = tempfile::tempdir().unwrap();
    let gemini =
        ScriptedProvider::failing(ProviderId::Gemini, ProviderError::http(401, "bad key"));
    let claude =
        ScriptedProvider::failing(ProviderId::Claude, ProviderError::http(503, "overloaded"));
    let openai =
        ScriptedProvider::failing(ProviderId::Openai, ProviderError::schema("missing fields"));

    let orchestrator = build_orchestrator(
        dir.path(),
        common::three_provider_configs(),
        OrchestrationConfig::default(),
        vec![gemini, claude, openai],
    );

    let err = orchestrator.extract("kickoff mail", options("mail-3")).await.unwrap_err();
    match err {
        OrchestratorError::AllProvidersFailed { summary } => {
            assert_eq!(summary.len(), 3);
            assert_eq!(summary[0].provider, ProviderId::Gemini);
            assert_eq!(summary[0].category, quorum::ErrorCategory::Critical);
            assert_eq!(summary[1].category, quorum::ErrorCategory::Transient);
            assert_eq!(summary[2].category, quorum::ErrorCategory::Permanent);
        }
        other => panic!("expected AllProvidersFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn disabled_providers_are_never_called() {
    let dir = tempfile::tempdir().unwrap();
    let mut configs = common::three_provider_configs();
    configs[0].enabled = false;

    let gemini = ScriptedProvider::succeeding(ProviderId::Gemini, sample_result(0.9));
    let claude = ScriptedProvider::succeeding(ProviderId::Claude, sample_result(0.8));
    let openai = ScriptedProvider::succeeding(ProviderId::Openai, sample_result(0.7));

    let orchestrator = build_orchestrator(
        dir.path(),
        configs,
        OrchestrationConfig::default(),
        vec![gemini.clone(), claude.clone(), openai],
    );

    let extraction = orchestrator.extract("kickoff mail", options("mail-4")).await.unwrap();
    assert_eq!(extraction.provider, ProviderTag::Provider(ProviderId::Claude));
    assert_eq!(gemini.calls(), 0);
    assert_eq!(claude.calls(), 1);
}

#[tokio::test]
async fn unhealthy_providers_are_skipped_without_a_call() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestration = OrchestrationConfig::default();
    orchestration.unhealthy_threshold = 3;

    let gemini =
        ScriptedProvider::failing(ProviderId::Gemini, ProviderError::http(503, "overloaded"));
    let claude = ScriptedProvider::succeeding(ProviderId::Claude, sample_result(0.8));
    let openai = ScriptedProvider::succeeding(ProviderId::Openai, sample_result(0.7));

    let orchestrator = build_orchestrator(
        dir.path(),
        common::three_provider_configs(),
        orchestration,
        vec![gemini.clone(), claude.clone(), openai],
    );

    for i in 0..3 {
        let extraction =
            orchestrator.extract("kickoff mail", options(&format!("mail-{i}"))).await.unwrap();
        assert_eq!(extraction.provider, ProviderTag::Provider(ProviderId::Claude));
    }
    assert_eq!(gemini.calls(), 3);

    // Three consecutive failures crossed the unhealthy threshold; the next
    // request must not touch gemini at all.
    let extraction = orchestrator.extract("kickoff mail", options("mail-next")).await.unwrap();
    assert_eq!(extraction.provider, ProviderTag::Provider(ProviderId::Claude));
    assert_eq!(gemini.calls(), 3);
    assert!(!orchestrator.status()[&ProviderId::Gemini].healthy);
}

#[tokio::test]
async fn open_circuit_gates_the_provider_with_no_network_io() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestration = OrchestrationConfig::default();
    // Keep health gating out of the way so the breaker is what trips.
    orchestration.unhealthy_threshold = 10;

    let gemini = ScriptedProvider::failing(
        ProviderId::Gemini,
        ProviderError::Timeout {
            elapsed: Duration::from_secs(6),
            limit: Duration::from_secs(5),
        },
    );
    let claude = ScriptedProvider::succeeding(ProviderId::Claude, sample_result(0.8));
    let openai = ScriptedProvider::succeeding(ProviderId::Openai, sample_result(0.7));

    let orchestrator = build_orchestrator(
        dir.path(),
        common::three_provider_configs(),
        orchestration,
        vec![gemini.clone(), claude.clone(), openai],
    );

    // Five timeouts on separate calls open the breaker.
    for i in 0..5 {
        let extraction =
            orchestrator.extract("kickoff mail", options(&format!("mail-{i}"))).await.unwrap();
        assert_eq!(extraction.provider, ProviderTag::Provider(ProviderId::Claude));
    }
    assert_eq!(gemini.calls(), 5);
    assert_eq!(orchestrator.status()[&ProviderId::Gemini].circuit_state, CircuitState::Open);

    // The sixth call skips gemini entirely and goes straight to claude.
    let extraction = orchestrator.extract("kickoff mail", options("mail-6")).await.unwrap();
    assert_eq!(extraction.provider, ProviderTag::Provider(ProviderId::Claude));
    assert_eq!(gemini.calls(), 5, "no network call for the gated provider");
}

#[tokio::test]
async fn priority_order_comes_from_the_priority_list() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestration = OrchestrationConfig::default();
    orchestration.provider_priority =
        vec![ProviderId::Openai, ProviderId::Claude, ProviderId::Gemini];

    let gemini = ScriptedProvider::succeeding(ProviderId::Gemini, sample_result(0.9));
    let claude = ScriptedProvider::succeeding(ProviderId::Claude, sample_result(0.8));
    let openai = ScriptedProvider::succeeding(ProviderId::Openai, sample_result(0.7));

    let orchestrator = build_orchestrator(
        dir.path(),
        common::three_provider_configs(),
        orchestration,
        vec![gemini.clone(), claude, openai.clone()],
    );

    let extraction = orchestrator.extract("kickoff mail", options("mail-7")).await.unwrap();
    assert_eq!(extraction.provider, ProviderTag::Provider(ProviderId::Openai));
    assert_eq!(openai.calls(), 1);
    assert_eq!(gemini.calls(), 0);

    // The config priority list also ignores providers it does not name.
    let configs = vec![
        provider_config(ProviderId::Gemini, 1),
        provider_config(ProviderId::Claude, 2),
    ];
    let dir2 = tempfile::tempdir().unwrap();
    let mut orchestration = OrchestrationConfig::default();
    orchestration.provider_priority = vec![ProviderId::Claude, ProviderId::Gemini];
    let gemini2 = ScriptedProvider::succeeding(ProviderId::Gemini, sample_result(0.9));
    let claude2 = ScriptedProvider::succeeding(ProviderId::Claude, sample_result(0.8));
    let orchestrator = build_orchestrator(
        dir2.path(),
        configs,
        orchestration,
        vec![gemini2, claude2.clone()],
    );
    let extraction = orchestrator.extract("kickoff mail", options("mail-8")).await.unwrap();
    assert_eq!(extraction.provider, ProviderTag::Provider(ProviderId::Claude));
}
