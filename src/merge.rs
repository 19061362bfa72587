//! Consensus merge: fuzzy-matched, confidence-weighted voting over the five
//! extracted fields.
//!
//! Pure and deterministic given its inputs; only the `extracted_at` stamp on
//! the merged result reads the clock. Each field is merged independently:
//! values bucket by Jaro-Winkler similarity, buckets are scored by
//! `Σ confidence · provider success-rate`, and the winning bucket's best
//! member becomes the representative value with a recomputed confidence.

use crate::model::{ExtractionResult, Field};
use chrono::Utc;

/// One successful provider result plus that provider's historical
/// success-rate, which weights its votes.
#[derive(Debug, Clone)]
pub struct MergeCandidate {
    pub result: ExtractionResult,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeConfig {
    /// Jaro-Winkler similarity at or above which two values share a bucket.
    pub fuzzy_threshold: f64,
    /// A merged field below this confidence abstains to null.
    pub abstention_confidence_threshold: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self { fuzzy_threshold: 0.85, abstention_confidence_threshold: 0.25 }
    }
}

/// Errors returned when merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeError {
    /// The candidate list was empty.
    NoCandidates,
}

impl std::fmt::Display for MergeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeError::NoCandidates => write!(f, "merge requires at least one candidate"),
        }
    }
}

impl std::error::Error for MergeError {}

/// Jaro-Winkler similarity over the raw strings, in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(a, b)
}

/// Whether two candidate values belong in the same bucket. Two nulls are
/// equivalent; a null and a non-null never group.
pub fn fuzzy_match(a: Option<&str>, b: Option<&str>, threshold: f64) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => similarity(a, b) >= threshold,
        _ => false,
    }
}

/// Merge `k >= 1` successful results into one. The merged result carries the
/// caller's `email_id` and a fresh `extracted_at`; the `"consensus"` provider
/// tag is applied by the strategy layer.
///
/// # Errors
///
/// Returns [`MergeError::NoCandidates`] when `candidates` is empty.
pub fn merge(
    candidates: &[MergeCandidate],
    config: &MergeConfig,
    email_id: Option<&str>,
) -> Result<ExtractionResult, MergeError> {
    if candidates.is_empty() {
        return Err(MergeError::NoCandidates);
    }

    let mut merged = ExtractionResult::empty(email_id.map(str::to_string));
    for field in Field::ALL {
        let (value, confidence) = merge_field(candidates, field, config);
        merged.set_field_text(field, value);
        merged.confidence.set(field, confidence);
    }
    merged.extracted_at = Utc::now();
    Ok(merged)
}

fn merge_field(
    candidates: &[MergeCandidate],
    field: Field,
    config: &MergeConfig,
) -> (Option<String>, f64) {
    let k = candidates.len();
    let values: Vec<Option<String>> =
        candidates.iter().map(|c| c.result.field_text(field)).collect();
    let confidences: Vec<f64> =
        candidates.iter().map(|c| c.result.confidence.get(field)).collect();

    // Step 1: single-linkage bucketing, values attach to the first bucket
    // they match. Deterministic in input order.
    let mut buckets: Vec<Vec<usize>> = Vec::new();
    'values: for i in 0..k {
        for bucket in buckets.iter_mut() {
            let matches = bucket.iter().any(|&j| {
                fuzzy_match(values[i].as_deref(), values[j].as_deref(), config.fuzzy_threshold)
            });
            if matches {
                bucket.push(i);
                continue 'values;
            }
        }
        buckets.push(vec![i]);
    }

    // Steps 2-3: score each bucket, pick the winner. Ties break by bucket
    // size, then max member confidence; a full tie keeps the earlier bucket,
    // whose members have the lower input indices.
    let score_of = |bucket: &[usize]| -> f64 {
        bucket.iter().map(|&i| confidences[i] * candidates[i].success_rate).sum()
    };
    let max_confidence_of =
        |bucket: &[usize]| -> f64 { bucket.iter().map(|&i| confidences[i]).fold(0.0, f64::max) };

    let mut winner = 0usize;
    for b in 1..buckets.len() {
        let (new, cur) = (&buckets[b], &buckets[winner]);
        let (new_score, cur_score) = (score_of(new), score_of(cur));
        let wins = if new_score != cur_score {
            new_score > cur_score
        } else if new.len() != cur.len() {
            new.len() > cur.len()
        } else {
            max_confidence_of(new) > max_confidence_of(cur)
        };
        if wins {
            winner = b;
        }
    }
    let winning = &buckets[winner];

    // Step 4: representative value — highest confidence, then longest string
    // (more specific), then input order.
    let mut rep = winning[0];
    for &i in &winning[1..] {
        let wins = if confidences[i] != confidences[rep] {
            confidences[i] > confidences[rep]
        } else {
            let len = |v: &Option<String>| v.as_ref().map_or(0, |s| s.chars().count());
            len(&values[i]) > len(&values[rep])
        };
        if wins {
            rep = i;
        }
    }

    // Step 5: recompute confidence from in-bucket agreement.
    let agree = winning.len() as f64 / k as f64;
    let mean = winning.iter().map(|&i| confidences[i]).sum::<f64>() / winning.len() as f64;
    let confidence = (mean * (0.5 + 0.5 * agree)).clamp(0.0, 1.0);

    // Step 6: abstain when the recomputed confidence is too weak.
    if confidence < config.abstention_confidence_threshold {
        return (None, 0.0);
    }

    (values[rep].clone(), confidence)
}
