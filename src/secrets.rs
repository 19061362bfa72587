//! Credential resolution with a three-tier fallback.
//!
//! Tier order: remote secret store → in-process cache (TTL-bounded) →
//! environment variable of the same name. The remote tier sits behind its
//! own fail-fast breaker and short retry profile so a broken store degrades
//! to the local tiers within a couple of seconds instead of stalling every
//! lookup.

use crate::circuit_breaker::CircuitBreaker;
use crate::error::{OrchestratorError, ProviderError};
use crate::presets;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// External secret store (e.g. a remote vault). Errors arrive in the same
/// transport-agnostic shape as provider errors so the retry engine can
/// classify them.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn lookup(&self, name: &str) -> Result<String, ProviderError>;
}

/// Errors surfaced by [`CredentialResolver::lookup`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretError {
    /// No tier produced a value.
    #[error("secret '{0}' not found in store, cache, or environment")]
    NotFound(String),
}

#[derive(Debug, Clone)]
struct CachedSecret {
    value: String,
    fetched_at: Instant,
}

pub struct CredentialResolver {
    remote: Option<Arc<dyn SecretStore>>,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
    cache: Mutex<HashMap<String, CachedSecret>>,
    ttl: Duration,
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("remote", &self.remote.is_some())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl CredentialResolver {
    pub fn new(
        remote: Option<Arc<dyn SecretStore>>,
        ttl: Duration,
    ) -> Result<Self, OrchestratorError> {
        Ok(Self {
            remote,
            retry: presets::secret_store_retry()?,
            breaker: CircuitBreaker::new("secret-store", presets::secret_store_breaker()),
            cache: Mutex::new(HashMap::new()),
            ttl,
        })
    }

    /// Resolver with no remote tier: cache seeds never appear, so lookups go
    /// straight to the environment.
    pub fn env_only() -> Result<Self, OrchestratorError> {
        Self::new(None, Duration::from_secs(300))
    }

    /// Resolve `name` through the tiers.
    pub async fn lookup(&self, name: &str) -> Result<String, SecretError> {
        if let Some(value) = self.lookup_remote(name).await {
            return Ok(value);
        }

        if let Some(value) = self.lookup_cache(name) {
            tracing::debug!(secret = name, "served secret from cache");
            return Ok(value);
        }

        match std::env::var(name) {
            Ok(value) if !value.is_empty() => {
                tracing::debug!(secret = name, "served secret from environment");
                Ok(value)
            }
            _ => Err(SecretError::NotFound(name.to_string())),
        }
    }

    async fn lookup_remote(&self, name: &str) -> Option<String> {
        let remote = self.remote.as_ref()?;
        if !self.breaker.allow() {
            tracing::debug!(secret = name, "secret store circuit open, using local tiers");
            return None;
        }

        let outcome = self
            .retry
            .execute(&self.breaker, || {
                let remote = Arc::clone(remote);
                let name = name.to_string();
                async move { remote.lookup(&name).await }
            })
            .await;

        match outcome {
            Ok(value) => {
                self.cache_insert(name, &value);
                Some(value)
            }
            Err(err) => {
                tracing::warn!(
                    secret = name,
                    error = %err,
                    "remote secret store failed, falling back to local tiers"
                );
                None
            }
        }
    }

    fn lookup_cache(&self, name: &str) -> Option<String> {
        let cache = self.lock();
        let entry = cache.get(name)?;
        if entry.fetched_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.value.clone())
    }

    fn cache_insert(&self, name: &str, value: &str) {
        self.lock().insert(
            name.to_string(),
            CachedSecret { value: value.to_string(), fetched_at: Instant::now() },
        );
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedSecret>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
