//! Error types for the orchestration core.

use std::time::Duration;

use crate::classify::ErrorCategory;
use crate::model::ProviderId;

/// Boundary error returned by provider calls.
///
/// Provider transports live outside this crate; their failures arrive here in
/// a transport-agnostic shape the classifier can inspect. Matching semantic
/// API errors by name (`Api`) is allowed only at this boundary — everything
/// past the classifier works with [`ErrorCategory`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Connection-level failure: reset, refused, DNS resolution.
    #[error("network error: {message}")]
    Network { message: String },

    /// HTTP-shaped failure. `retry_after` carries the raw `Retry-After`
    /// header value when the response had one.
    #[error("http {status}: {message}")]
    Http {
        status: u16,
        message: String,
        retry_after: Option<String>,
    },

    /// Provider-semantic error identified by name, e.g. `ResourceExhausted`
    /// or `rate_limited`.
    #[error("{name}: {message}")]
    Api { name: String, message: String },

    /// The response failed schema validation or parsing. Never retried.
    #[error("schema validation failed: {message}")]
    Schema { message: String },

    /// The per-attempt deadline elapsed.
    #[error("attempt timed out after {elapsed:?} (limit {limit:?})")]
    Timeout { elapsed: Duration, limit: Duration },

    /// Anything the provider surfaced that fits no other shape.
    #[error("{message}")]
    Other { message: String },
}

impl ProviderError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http { status, message: message.into(), retry_after: None }
    }

    pub fn http_with_retry_after(
        status: u16,
        message: impl Into<String>,
        retry_after: impl Into<String>,
    ) -> Self {
        Self::Http {
            status,
            message: message.into(),
            retry_after: Some(retry_after.into()),
        }
    }

    pub fn api(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api { name: name.into(), message: message.into() }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema { message: message.into() }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other { message: message.into() }
    }

    /// HTTP status code, if this error is HTTP-shaped.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this error is a per-attempt timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// One provider's terminal failure inside an orchestration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: ProviderId,
    pub category: ErrorCategory,
    pub message: String,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: [{}] {}", self.provider, self.category, self.message)
    }
}

/// Errors the orchestrator surfaces to its caller.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Every eligible provider failed, or none were eligible.
    #[error("all providers failed: {}", format_summary(summary))]
    AllProvidersFailed { summary: Vec<ProviderFailure> },

    /// Consensus/best-match only: fewer successful responses than
    /// `consensus_min_agreement`.
    #[error("insufficient responses: {got} of {need} required providers answered")]
    InsufficientResponses { got: usize, need: usize },

    /// Registry / priority list / pricing inconsistency at construction.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A durable tracker could not write its backing file.
    #[error("failed to persist {}: {source}", path.display())]
    Persistence {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OrchestratorError {
    /// Per-provider failure summary, when this error carries one.
    pub fn summary(&self) -> Option<&[ProviderFailure]> {
        match self {
            Self::AllProvidersFailed { summary } => Some(summary.as_slice()),
            _ => None,
        }
    }
}

fn format_summary(summary: &[ProviderFailure]) -> String {
    if summary.is_empty() {
        return "no eligible providers".to_string();
    }
    summary
        .iter()
        .map(ProviderFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
