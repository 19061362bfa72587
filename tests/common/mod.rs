#![allow(dead_code)]

//! Shared fixtures: a scriptable provider and orchestrator builders.

use async_trait::async_trait;
use chrono::NaiveDate;
use quorum::{
    ExtractionResult, FieldConfidences, OrchestrationConfig, Orchestrator, Provider,
    ProviderConfig, ProviderError, ProviderId, TokenUsage,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type CallOutcome = Result<(ExtractionResult, TokenUsage), ProviderError>;

/// Provider double that replays a queue of outcomes, then a fallback.
pub struct ScriptedProvider {
    id: ProviderId,
    script: Mutex<VecDeque<CallOutcome>>,
    fallback: CallOutcome,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(id: ProviderId, fallback: CallOutcome) -> Arc<Self> {
        Arc::new(Self {
            id,
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn succeeding(id: ProviderId, result: ExtractionResult) -> Arc<Self> {
        Self::new(id, Ok((result, TokenUsage::new(1_000, 200))))
    }

    pub fn succeeding_with_usage(
        id: ProviderId,
        result: ExtractionResult,
        usage: TokenUsage,
    ) -> Arc<Self> {
        Self::new(id, Ok((result, usage)))
    }

    pub fn failing(id: ProviderId, error: ProviderError) -> Arc<Self> {
        Self::new(id, Err(error))
    }

    /// Always sleeps `delay` before answering; pair with a short overall
    /// timeout to simulate a hung provider.
    pub fn slow(id: ProviderId, delay: Duration, result: ExtractionResult) -> Arc<Self> {
        Arc::new(Self {
            id,
            script: Mutex::new(VecDeque::new()),
            fallback: Ok((result, TokenUsage::new(1_000, 200))),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    /// Queue one outcome ahead of the fallback.
    pub fn push(&self, outcome: CallOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn extract(
        &self,
        _text: &str,
        _context: Option<&str>,
        email_id: Option<&str>,
    ) -> CallOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match outcome {
            Ok((mut result, usage)) => {
                result.email_id = email_id.map(str::to_string);
                Ok((result, usage))
            }
            err => err,
        }
    }
}

/// The S1 fixture result: every field populated at the given confidence.
pub fn sample_result(confidence: f64) -> ExtractionResult {
    result_with(
        Some("김철수"),
        Some("본봄"),
        Some("신세계"),
        Some("kickoff"),
        NaiveDate::from_ymd_opt(2025, 11, 1),
        FieldConfidences::uniform(confidence),
    )
}

pub fn result_with(
    person: Option<&str>,
    startup: Option<&str>,
    partner: Option<&str>,
    details: Option<&str>,
    date: Option<NaiveDate>,
    confidence: FieldConfidences,
) -> ExtractionResult {
    let mut result = ExtractionResult::empty(None);
    result.person = person.map(str::to_string);
    result.startup = startup.map(str::to_string);
    result.partner = partner.map(str::to_string);
    result.details = details.map(str::to_string);
    result.date = date;
    result.confidence = confidence;
    result
}

/// Minimal valid config: shortest allowed timeout, no retries, free tier.
pub fn provider_config(id: ProviderId, priority: u32) -> ProviderConfig {
    ProviderConfig {
        provider_name: id,
        display_name: id.as_str().to_string(),
        model_id: format!("{id}-model"),
        credential_ref: format!("{}_API_KEY", id.as_str().to_uppercase()),
        enabled: true,
        priority,
        timeout: Duration::from_secs(5),
        max_retries: 0,
        input_token_price: 0.0,
        output_token_price: 0.0,
    }
}

/// Standard three-provider setup in gemini → claude → openai priority order.
pub fn three_provider_configs() -> Vec<ProviderConfig> {
    vec![
        provider_config(ProviderId::Gemini, 1),
        provider_config(ProviderId::Claude, 2),
        provider_config(ProviderId::Openai, 3),
    ]
}

pub fn build_orchestrator(
    data_dir: &Path,
    configs: Vec<ProviderConfig>,
    orchestration: OrchestrationConfig,
    handles: Vec<Arc<ScriptedProvider>>,
) -> Orchestrator {
    let mut builder = Orchestrator::builder().data_dir(data_dir).orchestration(orchestration);
    for config in configs {
        builder = builder.provider_config(config);
    }
    for handle in handles {
        builder = builder.provider_handle(handle);
    }
    builder.build().expect("orchestrator builds")
}
