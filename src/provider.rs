//! The provider seam: one opaque extraction operation per remote LLM.
//!
//! Transports, prompt templates, and response parsing all live behind this
//! trait in the host application. The orchestrator only ever sees the
//! `(result, usage)` pair or a [`ProviderError`].

use crate::error::ProviderError;
use crate::model::{ExtractionResult, ProviderId, TokenUsage};
use async_trait::async_trait;

/// A remote text-to-structured-entity extraction service.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Which configured provider this handle serves.
    fn id(&self) -> ProviderId;

    /// Extract the five entity fields from `text`.
    ///
    /// `context` is an opaque document (e.g. a rendered companies catalogue)
    /// the provider must tolerate being absent. `email_id` is the caller's
    /// correlation key and should be echoed into the result.
    async fn extract(
        &self,
        text: &str,
        context: Option<&str>,
        email_id: Option<&str>,
    ) -> Result<(ExtractionResult, TokenUsage), ProviderError>;
}
