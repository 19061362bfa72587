#![forbid(unsafe_code)]

//! # Quorum
//!
//! Fault-tolerant orchestration over a heterogeneous pool of remote LLM
//! providers. One extraction request fans out (or fails over) across the
//! configured providers and comes back as a single authoritative result,
//! with per-provider retry, circuit breaking, and durable health/cost
//! accounting along the way.
//!
//! ## Features
//!
//! - **Three strategies**: serial failover, parallel consensus with a
//!   fuzzy-matched confidence-weighted merge, and best-match selection
//! - **Per-call resilience**: classified retries with bounded exponential
//!   backoff, jitter, and `Retry-After` hints
//! - **Per-provider circuit breakers** with half-open recovery probes
//! - **Durable trackers**: rolling health and cost metrics persisted as
//!   JSON with atomic writes, surviving restarts
//! - **Three-tier credential resolution**: remote store → TTL cache →
//!   environment
//!
//! ## Quick start
//!
//! ```no_run
//! use quorum::{
//!     ExtractOptions, Orchestrator, OrchestrationConfig, ProviderConfig, ProviderId,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn handles() -> Vec<Arc<dyn quorum::Provider>> { Vec::new() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut builder = Orchestrator::builder()
//!         .data_dir("./llm_health")
//!         .orchestration(OrchestrationConfig::default())
//!         .provider_config(ProviderConfig {
//!             provider_name: ProviderId::Gemini,
//!             display_name: "Gemini".into(),
//!             model_id: "gemini-2.5-flash".into(),
//!             credential_ref: "GEMINI_API_KEY".into(),
//!             enabled: true,
//!             priority: 1,
//!             timeout: Duration::from_secs(60),
//!             max_retries: 3,
//!             input_token_price: 0.0,
//!             output_token_price: 0.0,
//!         });
//!     for handle in handles() {
//!         builder = builder.provider_handle(handle);
//!     }
//!     let orchestrator = builder.build()?;
//!
//!     let extraction = orchestrator
//!         .extract("kickoff mail body…", ExtractOptions::default())
//!         .await?;
//!     println!("{} via {}", extraction.result.overall_confidence(), extraction.provider);
//!     Ok(())
//! }
//! ```

mod backoff;
mod circuit_breaker;
mod classify;
mod clock;
mod cost;
mod error;
mod health;
mod jitter;
mod merge;
mod model;
mod orchestrator;
mod persist;
mod presets;
mod provider;
mod registry;
mod retry;
mod secrets;
mod sleeper;
mod strategies;
mod timeout;

// Re-exports
pub use backoff::{Backoff, BackoffError};
pub use circuit_breaker::{
    BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitState,
};
pub use classify::{classify, is_retryable, Classification, ErrorCategory};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use cost::{CostTracker, Pricing, COST_FILE};
pub use error::{OrchestratorError, ProviderError, ProviderFailure};
pub use health::{HealthTracker, HEALTH_FILE};
pub use jitter::Jitter;
pub use merge::{fuzzy_match, merge, similarity, MergeCandidate, MergeConfig, MergeError};
pub use model::{
    CostMetrics, ExtractionResult, Field, FieldConfidences, HealthMetrics, OrchestrationConfig,
    ProviderConfig, ProviderId, Strategy, TokenUsage, UnknownProvider, UnknownStrategy,
};
pub use orchestrator::{
    ExtractOptions, Extraction, Orchestrator, OrchestratorBuilder, ProviderProbe, ProviderStatus,
};
pub use persist::JsonStore;
pub use presets::{
    provider_breaker, provider_retry, provider_retry_builder, secret_store_breaker,
    secret_store_retry,
};
pub use provider::Provider;
pub use registry::ProviderRegistry;
pub use retry::{BuildError, NoHooks, RetryHooks, RetryPolicy, RetryPolicyBuilder, MAX_ATTEMPTS};
pub use secrets::{CredentialResolver, SecretError, SecretStore};
pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};
pub use strategies::ProviderTag;
pub use timeout::{TimeoutError, TimeoutPolicy, MAX_TIMEOUT};

pub mod prelude;
