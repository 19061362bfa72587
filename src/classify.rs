//! Error classification for retry decisions.
//!
//! Maps a [`ProviderError`] to one of three categories and, for rate-limit
//! style responses, extracts a `Retry-After` hint. The classifier is pure and
//! infallible: anything it cannot place defaults to PERMANENT, which is safer
//! than an accidental retry loop.

use std::time::{Duration, SystemTime};

use crate::error::ProviderError;

/// What a failure means for retry and circuit-breaker handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Worth retrying: network blips, timeouts, rate limits, 5xx.
    Transient,
    /// Retrying cannot help: bad requests, missing objects, schema failures.
    Permanent,
    /// Credentials are broken; surfaced loudly and never retried.
    Critical,
}

impl ErrorCategory {
    /// Only TRANSIENT failures are retryable.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "TRANSIENT",
            Self::Permanent => "PERMANENT",
            Self::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier verdict for one error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: ErrorCategory,
    /// Wait this long before the next attempt, when the provider said so.
    pub retry_after: Option<Duration>,
}

impl Classification {
    fn of(category: ErrorCategory) -> Self {
        Self { category, retry_after: None }
    }
}

const TRANSIENT_API_ERRORS: &[&str] = &["ResourceExhausted", "DeadlineExceeded", "rate_limited"];
const CRITICAL_API_ERRORS: &[&str] = &["Unauthenticated", "unauthorized"];

/// Classify a provider error. Rules are evaluated in order, first match wins:
///
/// 1. Network-layer errors and attempt timeouts → TRANSIENT.
/// 2. HTTP status: 401 → CRITICAL; 429 → TRANSIENT; 400/403/404/501 →
///    PERMANENT; 5xx → TRANSIENT.
/// 3. Provider-semantic error names (Google/Notion style).
/// 4. Schema/validation failures → PERMANENT.
/// 5. Everything else → PERMANENT.
pub fn classify(err: &ProviderError) -> Classification {
    match err {
        ProviderError::Network { .. } | ProviderError::Timeout { .. } => {
            Classification::of(ErrorCategory::Transient)
        }
        ProviderError::Http { status, retry_after, .. } => {
            let category = match *status {
                401 => ErrorCategory::Critical,
                429 => ErrorCategory::Transient,
                400 | 403 | 404 | 501 => ErrorCategory::Permanent,
                500..=599 => ErrorCategory::Transient,
                _ => ErrorCategory::Permanent,
            };
            Classification {
                category,
                retry_after: retry_after.as_deref().and_then(parse_retry_after),
            }
        }
        ProviderError::Api { name, .. } => {
            let category = if TRANSIENT_API_ERRORS.contains(&name.as_str()) {
                ErrorCategory::Transient
            } else if CRITICAL_API_ERRORS.contains(&name.as_str()) {
                ErrorCategory::Critical
            } else {
                // PermissionDenied, InvalidArgument, object_not_found,
                // restricted_resource, and anything unrecognized.
                ErrorCategory::Permanent
            };
            Classification::of(category)
        }
        ProviderError::Schema { .. } | ProviderError::Other { .. } => {
            Classification::of(ErrorCategory::Permanent)
        }
    }
}

/// Shorthand for `classify(err).category.is_retryable()`.
pub fn is_retryable(err: &ProviderError) -> bool {
    classify(err).category.is_retryable()
}

/// Parse a raw `Retry-After` header value.
///
/// Supports delta-seconds (`Retry-After: 5`) and HTTP-date
/// (`Retry-After: Wed, 21 Oct 2015 07:28:00 GMT`). A date in the past
/// yields a zero delay, never a negative one.
fn parse_retry_after(raw: &str) -> Option<Duration> {
    let raw = raw.trim();

    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    if let Ok(when) = httpdate::parse_http_date(raw) {
        return Some(
            when.duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO),
        );
    }

    None
}
