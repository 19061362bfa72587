//! Convenient re-exports for common Quorum types.
pub use crate::{
    classify::{classify, Classification, ErrorCategory},
    error::{OrchestratorError, ProviderError, ProviderFailure},
    merge::{merge, MergeCandidate, MergeConfig, MergeError},
    model::{
        ExtractionResult, Field, FieldConfidences, OrchestrationConfig, ProviderConfig,
        ProviderId, Strategy, TokenUsage,
    },
    orchestrator::{ExtractOptions, Extraction, Orchestrator, ProviderProbe, ProviderStatus},
    provider::Provider,
    secrets::{CredentialResolver, SecretStore},
    strategies::ProviderTag,
    CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryPolicy,
};
