//! Grounding of model claims in the note's evidence units.
//!
//! A claim is kept only when its text overlaps lexically with at least one
//! evidence unit it cites. Overlap is the Jaccard similarity of lowercase
//! alphanumeric token sets; a claim's support score is the best similarity
//! over its valid citations.
//!
//! Rejection is a routine outcome, not an error: unsupported claims are
//! dropped silently and validation never fails.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::config::GroundingConfig;
use crate::record::{
    CandidateRecord, Citations, Claim, Recommendation, SummaryPoint, ValidatedRecommendation,
    ValidatedRecord, ValidatedSummaryPoint,
};
use crate::segment::EvidenceIndex;

lazy_static! {
    static ref TOKEN_PATTERN: Regex = Regex::new(r"[a-z0-9]+").unwrap();
}

/// Lowercase text and collect its distinct alphanumeric runs.
pub fn tokenize(text: &str) -> HashSet<String> {
    TOKEN_PATTERN
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// `|A ∩ B| / |A ∪ B|` over token sets; `0.0` when either side is empty.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    jaccard(&tokenize(a), &tokenize(b))
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Best similarity between a claim and any evidence unit it cites.
///
/// Citations to ids missing from the index contribute nothing. A claim
/// without any valid citation scores `0.0`.
pub fn support_score<C: Claim + ?Sized>(claim: &C, index: &EvidenceIndex) -> f64 {
    let claim_tokens = tokenize(&claim.claim_text());
    claim
        .citations()
        .iter()
        .filter_map(|id| index.get(*id))
        .map(|text| jaccard(&claim_tokens, &tokenize(text)))
        .fold(0.0, f64::max)
}

/// Clamp a raw confidence into `[0, 1]` by replacing anything else with `0.0`.
pub fn coerce_confidence(raw: Option<f64>) -> f64 {
    raw.filter(|c| c.is_finite() && (0.0..=1.0).contains(c))
        .unwrap_or(0.0)
}

/// Filters candidate claims by their support in the evidence index.
#[derive(Debug, Clone)]
pub struct GroundingValidator {
    threshold: f64,
}

struct Grounding {
    citations: Citations,
    support_score: f64,
}

impl GroundingValidator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &GroundingConfig) -> Self {
        Self::new(config.threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Keep the claims whose support score reaches the threshold.
    ///
    /// Retained claims keep their candidate order and lose any citation to
    /// an id the index does not contain. The result carries a copy of the
    /// index and an empty `model_info`.
    pub fn validate(&self, candidate: &CandidateRecord, index: &EvidenceIndex) -> ValidatedRecord {
        let summary_bullets: Vec<ValidatedSummaryPoint> = candidate
            .summary_bullets
            .iter()
            .filter_map(|point| self.ground_point(point, index))
            .collect();
        let suggested_orders: Vec<ValidatedRecommendation> = candidate
            .suggested_orders
            .iter()
            .filter_map(|order| self.ground_order(order, index))
            .collect();

        tracing::debug!(
            bullets_kept = summary_bullets.len(),
            bullets_dropped = candidate.summary_bullets.len() - summary_bullets.len(),
            orders_kept = suggested_orders.len(),
            orders_dropped = candidate.suggested_orders.len() - suggested_orders.len(),
            threshold = self.threshold,
            "Grounding complete"
        );

        ValidatedRecord {
            summary_bullets,
            suggested_orders,
            evidence: index.clone(),
            model_info: Value::Object(Map::new()),
        }
    }

    fn ground_point(
        &self,
        point: &SummaryPoint,
        index: &EvidenceIndex,
    ) -> Option<ValidatedSummaryPoint> {
        let grounding = self.assess(point, index)?;
        Some(ValidatedSummaryPoint {
            text: point.text.clone(),
            citations: grounding.citations,
            support_score: grounding.support_score,
        })
    }

    fn ground_order(
        &self,
        order: &Recommendation,
        index: &EvidenceIndex,
    ) -> Option<ValidatedRecommendation> {
        let grounding = self.assess(order, index)?;
        Some(ValidatedRecommendation {
            category: order.category,
            name: order.name.clone(),
            reason: order.reason.clone(),
            citations: grounding.citations,
            support_score: grounding.support_score,
            confidence: coerce_confidence(order.confidence),
            external_citations: order.external_citations.clone(),
        })
    }

    fn assess<C: Claim>(&self, claim: &C, index: &EvidenceIndex) -> Option<Grounding> {
        let citations: Citations = claim
            .citations()
            .iter()
            .copied()
            .filter(|id| index.contains(*id))
            .collect();

        // Citations are mandatory evidence, whatever the threshold.
        if citations.is_empty() {
            tracing::debug!(claim = %claim.claim_text(), "Dropping claim without valid citations");
            return None;
        }

        let support_score = support_score(claim, index);
        if support_score >= self.threshold {
            Some(Grounding {
                citations,
                support_score,
            })
        } else {
            tracing::debug!(
                claim = %claim.claim_text(),
                support_score,
                "Dropping unsupported claim"
            );
            None
        }
    }
}

impl Default for GroundingValidator {
    fn default() -> Self {
        Self::from_config(&GroundingConfig::default())
    }
}

/// Validate a candidate record against an index at the given threshold.
pub fn validate(
    candidate: &CandidateRecord,
    index: &EvidenceIndex,
    threshold: f64,
) -> ValidatedRecord {
    GroundingValidator::new(threshold).validate(candidate, index)
}
