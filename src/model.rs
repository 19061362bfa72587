//! Domain types: provider identity, extraction results, configuration, and
//! the persistent per-provider metric records.

use crate::circuit_breaker::CircuitState;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A configured remote LLM provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Gemini,
    Claude,
    Openai,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Gemini, ProviderId::Claude, ProviderId::Openai];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Claude => "claude",
            Self::Openai => "openai",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognized provider names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProvider(pub String);

impl std::fmt::Display for UnknownProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown provider '{}' (expected gemini, claude, or openai)", self.0)
    }
}

impl std::error::Error for UnknownProvider {}

impl std::str::FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gemini" => Ok(Self::Gemini),
            "claude" => Ok(Self::Claude),
            "openai" => Ok(Self::Openai),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Orchestration strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Failover,
    Consensus,
    BestMatch,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Failover => "failover",
            Self::Consensus => "consensus",
            Self::BestMatch => "best_match",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognized strategy names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStrategy(pub String);

impl std::fmt::Display for UnknownStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown strategy '{}' (expected failover, consensus, or best_match)",
            self.0
        )
    }
}

impl std::error::Error for UnknownStrategy {}

impl std::str::FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "failover" => Ok(Self::Failover),
            "consensus" => Ok(Self::Consensus),
            "best_match" => Ok(Self::BestMatch),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

/// The five extracted entity fields, in their canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Person,
    Startup,
    Partner,
    Details,
    Date,
}

impl Field {
    pub const ALL: [Field; 5] =
        [Field::Person, Field::Startup, Field::Partner, Field::Details, Field::Date];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Startup => "startup",
            Self::Partner => "partner",
            Self::Details => "details",
            Self::Date => "date",
        }
    }
}

/// Per-field confidence scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldConfidences {
    pub person: f64,
    pub startup: f64,
    pub partner: f64,
    pub details: f64,
    pub date: f64,
}

impl FieldConfidences {
    pub fn uniform(value: f64) -> Self {
        Self { person: value, startup: value, partner: value, details: value, date: value }
    }

    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::Person => self.person,
            Field::Startup => self.startup,
            Field::Partner => self.partner,
            Field::Details => self.details,
            Field::Date => self.date,
        }
    }

    pub fn set(&mut self, field: Field, value: f64) {
        let slot = match field {
            Field::Person => &mut self.person,
            Field::Startup => &mut self.startup,
            Field::Partner => &mut self.partner,
            Field::Details => &mut self.details,
            Field::Date => &mut self.date,
        };
        *slot = value;
    }

    /// Arithmetic mean of the five scores.
    pub fn mean(&self) -> f64 {
        (self.person + self.startup + self.partner + self.details + self.date) / 5.0
    }
}

/// One provider's structured extraction of an input text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub person: Option<String>,
    pub startup: Option<String>,
    pub partner: Option<String>,
    pub details: Option<String>,
    /// Normalized calendar date, when one was present in the text.
    pub date: Option<NaiveDate>,
    pub confidence: FieldConfidences,
    /// Opaque correlation key supplied by the caller.
    pub email_id: Option<String>,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractionResult {
    /// Empty result with zero confidences, stamped now.
    pub fn empty(email_id: Option<String>) -> Self {
        Self {
            person: None,
            startup: None,
            partner: None,
            details: None,
            date: None,
            confidence: FieldConfidences::default(),
            email_id,
            extracted_at: Utc::now(),
        }
    }

    /// Field value rendered as a string; dates use ISO-8601 so identical
    /// dates compare equal and different dates never fuzzy-match.
    pub fn field_text(&self, field: Field) -> Option<String> {
        match field {
            Field::Person => self.person.clone(),
            Field::Startup => self.startup.clone(),
            Field::Partner => self.partner.clone(),
            Field::Details => self.details.clone(),
            Field::Date => self.date.map(|d| d.to_string()),
        }
    }

    /// Store a merged field value back; an unparseable date becomes null.
    pub fn set_field_text(&mut self, field: Field, value: Option<String>) {
        match field {
            Field::Person => self.person = value,
            Field::Startup => self.startup = value,
            Field::Partner => self.partner = value,
            Field::Details => self.details = value,
            Field::Date => self.date = value.and_then(|v| v.parse().ok()),
        }
    }

    /// Mean of the five per-field confidences.
    pub fn overall_confidence(&self) -> f64 {
        self.confidence.mean()
    }
}

/// Token counts for one provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self { input_tokens, output_tokens }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Durable health record for one provider.
///
/// Unknown keys found in the backing file are kept in `extra` and re-emitted
/// on save, so fields added by future versions survive a round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub failure_count: u64,
    #[serde(default)]
    pub consecutive_failures: u32,
    /// Exponentially smoothed response time (α = 0.1); the first observation
    /// seeds the average.
    #[serde(default)]
    pub avg_response_ms: f64,
    #[serde(default)]
    pub last_success_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_failure_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error_message: Option<String>,
    /// Mirror of the breaker state for observability; derived, never
    /// authoritative.
    #[serde(default = "default_circuit_state")]
    pub circuit_state: CircuitState,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_circuit_state() -> CircuitState {
    CircuitState::Closed
}

impl Default for HealthMetrics {
    fn default() -> Self {
        Self {
            success_count: 0,
            failure_count: 0,
            consecutive_failures: 0,
            avg_response_ms: 0.0,
            last_success_at: None,
            last_failure_at: None,
            last_error_message: None,
            circuit_state: CircuitState::Closed,
            updated_at: Utc::now(),
            extra: serde_json::Map::new(),
        }
    }
}

impl HealthMetrics {
    /// Fraction of calls that succeeded, `0.0` when nothing was recorded.
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            return 0.0;
        }
        self.success_count as f64 / total as f64
    }

    pub fn is_healthy(&self, unhealthy_threshold: u32) -> bool {
        self.consecutive_failures < unhealthy_threshold
    }
}

/// Durable cost record for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostMetrics {
    #[serde(default)]
    pub total_calls: u64,
    #[serde(default)]
    pub total_input_tokens: u64,
    #[serde(default)]
    pub total_output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub avg_cost_per_call: f64,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for CostMetrics {
    fn default() -> Self {
        Self {
            total_calls: 0,
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_tokens: 0,
            total_cost_usd: 0.0,
            avg_cost_per_call: 0.0,
            updated_at: Utc::now(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Static configuration for one provider. Immutable for a process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider_name: ProviderId,
    pub display_name: String,
    pub model_id: String,
    /// Name of the secret in the credential store holding the API key.
    pub credential_ref: String,
    pub enabled: bool,
    /// 1 is the highest priority.
    pub priority: u32,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    pub max_retries: u32,
    /// USD per 1,000,000 input tokens; 0 for free tiers.
    pub input_token_price: f64,
    /// USD per 1,000,000 output tokens; 0 for free tiers.
    pub output_token_price: f64,
}

pub(crate) const MIN_PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const MAX_PROVIDER_TIMEOUT: Duration = Duration::from_secs(300);
pub(crate) const MAX_PROVIDER_RETRIES: u32 = 5;

impl ProviderConfig {
    /// Check the per-field constraints; the registry calls this at build
    /// time so no invalid config outlives construction.
    pub fn validate(&self) -> Result<(), String> {
        if self.priority == 0 {
            return Err(format!("{}: priority must be >= 1", self.provider_name));
        }
        if self.timeout < MIN_PROVIDER_TIMEOUT || self.timeout > MAX_PROVIDER_TIMEOUT {
            return Err(format!(
                "{}: timeout {:?} outside {:?}..={:?}",
                self.provider_name, self.timeout, MIN_PROVIDER_TIMEOUT, MAX_PROVIDER_TIMEOUT
            ));
        }
        if self.max_retries > MAX_PROVIDER_RETRIES {
            return Err(format!(
                "{}: max_retries {} exceeds {}",
                self.provider_name, self.max_retries, MAX_PROVIDER_RETRIES
            ));
        }
        for (label, price) in [
            ("input_token_price", self.input_token_price),
            ("output_token_price", self.output_token_price),
        ] {
            if !price.is_finite() || price < 0.0 {
                return Err(format!("{}: {label} must be finite and >= 0", self.provider_name));
            }
        }
        if self.credential_ref.is_empty() {
            return Err(format!("{}: credential_ref must not be empty", self.provider_name));
        }
        Ok(())
    }
}

/// Process-wide orchestration settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestrationConfig {
    pub default_strategy: Strategy,
    /// Failover order; every entry must exist in the registry.
    pub provider_priority: Vec<ProviderId>,
    /// Deadline for one whole orchestration, spanning all fan-out calls.
    pub overall_timeout: Duration,
    /// Consecutive failures before a provider counts as unhealthy.
    pub unhealthy_threshold: u32,
    /// Minimum successful responses for consensus/best-match.
    pub consensus_min_agreement: usize,
    /// Jaro-Winkler similarity needed to group two values.
    pub fuzzy_threshold: f64,
    /// Merged fields below this confidence abstain to null.
    pub abstention_confidence_threshold: f64,
    /// Time a breaker stays OPEN before probing.
    pub circuit_open_timeout: Duration,
    /// Probe budget while HALF_OPEN.
    pub half_open_max_calls: usize,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            default_strategy: Strategy::Failover,
            provider_priority: vec![ProviderId::Gemini, ProviderId::Claude, ProviderId::Openai],
            overall_timeout: Duration::from_secs(90),
            unhealthy_threshold: 5,
            consensus_min_agreement: 2,
            fuzzy_threshold: 0.85,
            abstention_confidence_threshold: 0.25,
            circuit_open_timeout: Duration::from_secs(60),
            half_open_max_calls: 3,
        }
    }
}

impl OrchestrationConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.overall_timeout.is_zero() {
            return Err("overall_timeout must be > 0".to_string());
        }
        if self.unhealthy_threshold == 0 {
            return Err("unhealthy_threshold must be >= 1".to_string());
        }
        if self.consensus_min_agreement == 0 {
            return Err("consensus_min_agreement must be >= 1".to_string());
        }
        for (label, value) in [
            ("fuzzy_threshold", self.fuzzy_threshold),
            ("abstention_confidence_threshold", self.abstention_confidence_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{label} must be in [0, 1] (got {value})"));
            }
        }
        if self.circuit_open_timeout.is_zero() {
            return Err("circuit_open_timeout must be > 0".to_string());
        }
        if self.half_open_max_calls == 0 {
            return Err("half_open_max_calls must be >= 1".to_string());
        }
        Ok(())
    }
}
