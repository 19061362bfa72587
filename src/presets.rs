//! Retry and breaker profiles for the two dependency tiers.
//!
//! Provider calls get the standard profile (attempts from the provider
//! config, 1s-10s exponential backoff with up to 2s of jitter, Retry-After
//! honoured). The external secret store has an `.env` fallback behind it, so
//! it gets a tighter profile that fails over to the next tier quickly.

use crate::backoff::Backoff;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::OrchestratorError;
use crate::jitter::Jitter;
use crate::model::{OrchestrationConfig, ProviderConfig};
use crate::retry::{RetryPolicy, RetryPolicyBuilder, MAX_ATTEMPTS};
use crate::timeout::TimeoutPolicy;
use std::time::Duration;

const BACKOFF_MIN: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(10);
const JITTER_MAX: Duration = Duration::from_secs(2);

const SECRET_STORE_ATTEMPTS: usize = 2;
const SECRET_STORE_TIMEOUT: Duration = Duration::from_secs(10);

fn base_builder(
    attempts: usize,
    timeout: TimeoutPolicy,
) -> Result<RetryPolicyBuilder, OrchestratorError> {
    let backoff = Backoff::new(BACKOFF_MIN, BACKOFF_MAX)
        .map_err(|err| OrchestratorError::Configuration(err.to_string()))?;
    let builder = RetryPolicy::builder()
        .max_attempts(attempts)
        .map_err(|err| OrchestratorError::Configuration(err.to_string()))?
        .backoff(backoff)
        .with_jitter(Jitter::additive(JITTER_MAX))
        .attempt_timeout(timeout)
        .respect_retry_after(true);
    Ok(builder)
}

/// Retry builder for one provider. `max_retries` counts total attempts, with
/// zero meaning a single unretried attempt.
pub fn provider_retry_builder(
    config: &ProviderConfig,
) -> Result<RetryPolicyBuilder, OrchestratorError> {
    let attempts = (config.max_retries.max(1) as usize).min(MAX_ATTEMPTS);
    let timeout = TimeoutPolicy::new(config.timeout)
        .map_err(|err| OrchestratorError::Configuration(err.to_string()))?;
    base_builder(attempts, timeout)
}

/// Ready-built provider retry policy.
pub fn provider_retry(config: &ProviderConfig) -> Result<RetryPolicy, OrchestratorError> {
    Ok(provider_retry_builder(config)?.build())
}

/// Breaker settings for provider calls: the standard 5-failure /
/// 2-success thresholds with the orchestration config's recovery window.
pub fn provider_breaker(config: &OrchestrationConfig) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        open_timeout: config.circuit_open_timeout,
        half_open_max_calls: config.half_open_max_calls,
        ..CircuitBreakerConfig::default()
    }
}

/// Retry policy for the remote secret store tier.
pub fn secret_store_retry() -> Result<RetryPolicy, OrchestratorError> {
    let timeout = TimeoutPolicy::new(SECRET_STORE_TIMEOUT)
        .map_err(|err| OrchestratorError::Configuration(err.to_string()))?;
    Ok(base_builder(SECRET_STORE_ATTEMPTS, timeout)?.build())
}

/// Breaker settings for the remote secret store tier: trip after 3 failures,
/// probe again after 30s.
pub fn secret_store_breaker() -> CircuitBreakerConfig {
    CircuitBreakerConfig::fail_fast()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProviderId;

    fn config(max_retries: u32) -> ProviderConfig {
        ProviderConfig {
            provider_name: ProviderId::Gemini,
            display_name: "Gemini".to_string(),
            model_id: "gemini-2.5-flash".to_string(),
            credential_ref: "GEMINI_API_KEY".to_string(),
            enabled: true,
            priority: 1,
            timeout: Duration::from_secs(60),
            max_retries,
            input_token_price: 0.0,
            output_token_price: 0.0,
        }
    }

    #[test]
    fn provider_attempts_come_from_config() {
        assert_eq!(provider_retry(&config(3)).unwrap().max_attempts(), 3);
        assert_eq!(provider_retry(&config(5)).unwrap().max_attempts(), 5);
    }

    #[test]
    fn zero_retries_still_means_one_attempt() {
        assert_eq!(provider_retry(&config(0)).unwrap().max_attempts(), 1);
    }

    #[test]
    fn provider_breaker_uses_orchestration_recovery_window() {
        let mut orchestration = OrchestrationConfig::default();
        orchestration.circuit_open_timeout = Duration::from_secs(45);
        orchestration.half_open_max_calls = 2;

        let breaker = provider_breaker(&orchestration);
        assert_eq!(breaker.failure_threshold, 5);
        assert_eq!(breaker.success_threshold, 2);
        assert_eq!(breaker.open_timeout, Duration::from_secs(45));
        assert_eq!(breaker.half_open_max_calls, 2);
    }

    #[test]
    fn secret_store_profile_fails_fast() {
        assert_eq!(secret_store_retry().unwrap().max_attempts(), 2);
        let breaker = secret_store_breaker();
        assert_eq!(breaker.failure_threshold, 3);
        assert_eq!(breaker.open_timeout, Duration::from_secs(30));
    }
}
