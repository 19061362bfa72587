//! Read-only provider registry.
//!
//! Single source of truth for the configured providers. Built once at
//! startup; construction rejects duplicate providers, duplicate priorities,
//! and any per-provider constraint violation, so nothing downstream needs to
//! re-validate.

use crate::cost::Pricing;
use crate::error::OrchestratorError;
use crate::model::{ProviderConfig, ProviderId};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    configs: HashMap<ProviderId, ProviderConfig>,
    /// Provider ids sorted by ascending priority number (1 = highest).
    ordered: Vec<ProviderId>,
}

impl ProviderRegistry {
    pub fn new(configs: Vec<ProviderConfig>) -> Result<Self, OrchestratorError> {
        if configs.is_empty() {
            return Err(OrchestratorError::Configuration(
                "at least one provider must be configured".to_string(),
            ));
        }

        let mut by_id: HashMap<ProviderId, ProviderConfig> = HashMap::new();
        let mut priorities: HashMap<u32, ProviderId> = HashMap::new();

        for config in configs {
            config.validate().map_err(OrchestratorError::Configuration)?;

            if let Some(previous) = priorities.insert(config.priority, config.provider_name) {
                return Err(OrchestratorError::Configuration(format!(
                    "providers {previous} and {} share priority {}",
                    config.provider_name, config.priority
                )));
            }
            if by_id.insert(config.provider_name, config.clone()).is_some() {
                return Err(OrchestratorError::Configuration(format!(
                    "provider {} is configured twice",
                    config.provider_name
                )));
            }
        }

        let mut ordered: Vec<ProviderId> = by_id.keys().copied().collect();
        ordered.sort_by_key(|id| by_id[id].priority);

        Ok(Self { configs: by_id, ordered })
    }

    pub fn get(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.configs.get(&id)
    }

    /// All configs in priority order.
    pub fn all(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.ordered.iter().map(|id| &self.configs[id])
    }

    /// Provider ids in priority order (priority 1 first).
    pub fn by_priority(&self) -> &[ProviderId] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Per-provider pricing table for the cost tracker.
    pub fn pricing(&self) -> HashMap<ProviderId, Pricing> {
        self.configs
            .iter()
            .map(|(id, config)| {
                (*id, Pricing::new(config.input_token_price, config.output_token_price))
            })
            .collect()
    }

    /// Check that every id in a failover priority list is configured.
    pub fn validate_priority_list(&self, list: &[ProviderId]) -> Result<(), OrchestratorError> {
        if list.is_empty() {
            return Err(OrchestratorError::Configuration(
                "provider_priority must not be empty".to_string(),
            ));
        }
        for id in list {
            if !self.configs.contains_key(id) {
                return Err(OrchestratorError::Configuration(format!(
                    "provider_priority references unconfigured provider {id}"
                )));
            }
        }
        Ok(())
    }
}
