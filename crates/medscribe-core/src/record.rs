//! Candidate and validated records.
//!
//! A candidate record is whatever the model claimed, shaped into typed
//! claims but not yet checked against the note. A validated record keeps
//! only the claims that passed grounding, each annotated with its support
//! score, and carries the evidence index the claims were checked against.
//!
//! Shaping from a parsed JSON value never fails: missing or mistyped fields
//! fall back to empty defaults so partial model output still yields a record.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::segment::{EvidenceId, EvidenceIndex};

/// Evidence ids cited by a claim. Duplicates collapse; order is ascending.
pub type Citations = BTreeSet<EvidenceId>;

/// Common view over the two kinds of model claims.
pub trait Claim {
    /// The text whose tokens must overlap with the cited evidence.
    fn claim_text(&self) -> String;

    /// Evidence ids the claim cites, valid or not.
    fn citations(&self) -> &Citations;
}

/// Kind of suggested order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderCategory {
    Lab,
    Imaging,
    Medication,
    Consult,
    #[default]
    Other,
}

impl OrderCategory {
    /// Case-insensitive match; anything unrecognized is `Other`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "lab" => Self::Lab,
            "imaging" => Self::Imaging,
            "medication" => Self::Medication,
            "consult" => Self::Consult,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lab => "lab",
            Self::Imaging => "imaging",
            Self::Medication => "medication",
            Self::Consult => "consult",
            Self::Other => "other",
        }
    }
}

/// A literature reference attached to a recommendation. Passed through unchecked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCitation {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// A summary bullet as the model produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryPoint {
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub citations: Citations,
}

/// A suggested order as the model produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type", default)]
    pub category: OrderCategory,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub citations: Citations,

    /// Raw confidence; range checking happens during validation.
    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_citations: Option<Vec<ExternalCitation>>,
}

/// Unverified model output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(default)]
    pub summary_bullets: Vec<SummaryPoint>,

    #[serde(default)]
    pub suggested_orders: Vec<Recommendation>,
}

impl Claim for SummaryPoint {
    fn claim_text(&self) -> String {
        self.text.clone()
    }

    fn citations(&self) -> &Citations {
        &self.citations
    }
}

impl Claim for Recommendation {
    fn claim_text(&self) -> String {
        format!("{} {}", self.name, self.reason).trim().to_string()
    }

    fn citations(&self) -> &Citations {
        &self.citations
    }
}

impl CandidateRecord {
    /// Shape a parsed JSON object into a candidate record.
    ///
    /// Non-array claim lists become empty and non-object entries are skipped.
    /// Any `model_info` key the model emitted is ignored.
    pub fn from_value(value: &Value) -> Self {
        Self {
            summary_bullets: objects(value, "summary_bullets")
                .map(SummaryPoint::from_object)
                .collect(),
            suggested_orders: objects(value, "suggested_orders")
                .map(Recommendation::from_object)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.summary_bullets.is_empty() && self.suggested_orders.is_empty()
    }
}

impl SummaryPoint {
    fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            text: string_field(obj, "text"),
            citations: citations_field(obj),
        }
    }
}

impl Recommendation {
    fn from_object(obj: &Map<String, Value>) -> Self {
        let external_citations: Vec<ExternalCitation> = obj
            .get("external_citations")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
            .map(ExternalCitation::from_object)
            .collect();

        Self {
            category: obj
                .get("type")
                .and_then(Value::as_str)
                .map(OrderCategory::parse)
                .unwrap_or_default(),
            name: string_field(obj, "name"),
            reason: string_field(obj, "reason"),
            citations: citations_field(obj),
            confidence: obj.get("confidence").and_then(number_like),
            external_citations: (!external_citations.is_empty()).then_some(external_citations),
        }
    }
}

impl ExternalCitation {
    fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            title: string_field(obj, "title"),
            url: string_field(obj, "url"),
            year: obj
                .get("year")
                .and_then(number_like)
                .filter(|y| y.fract() == 0.0 && *y >= i32::MIN as f64 && *y <= i32::MAX as f64)
                .map(|y| y as i32),
            snippet: obj.get("snippet").and_then(Value::as_str).map(str::to_string),
        }
    }
}

/// A summary bullet that passed grounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedSummaryPoint {
    pub text: String,
    pub citations: Citations,
    pub support_score: f64,
}

/// A suggested order that passed grounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRecommendation {
    #[serde(rename = "type")]
    pub category: OrderCategory,
    pub name: String,
    pub reason: String,
    pub citations: Citations,
    pub support_score: f64,
    pub confidence: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_citations: Option<Vec<ExternalCitation>>,
}

/// Grounded output: surviving claims, the evidence they were checked
/// against, and caller-supplied model metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRecord {
    pub summary_bullets: Vec<ValidatedSummaryPoint>,
    pub suggested_orders: Vec<ValidatedRecommendation>,

    #[serde(rename = "id_to_sentence")]
    pub evidence: EvidenceIndex,

    /// Opaque pass-through; `{}` when the caller supplies nothing.
    pub model_info: Value,
}

impl ValidatedRecord {
    /// Attach model metadata. `null` is normalized to an empty object.
    pub fn with_model_info(mut self, model_info: Value) -> Self {
        self.model_info = match model_info {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        self
    }

    /// Total number of retained claims.
    pub fn claim_count(&self) -> usize {
        self.summary_bullets.len() + self.suggested_orders.len()
    }
}

fn objects<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Map<String, Value>> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn string_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Numbers, or strings that parse as numbers.
fn number_like(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn citations_field(obj: &Map<String, Value>) -> Citations {
    match obj.get("citations") {
        Some(Value::Array(items)) => items.iter().filter_map(citation_id).collect(),
        // A bare scalar is read as a single citation.
        Some(other) => citation_id(other).into_iter().collect(),
        None => Citations::new(),
    }
}

fn citation_id(value: &Value) -> Option<EvidenceId> {
    let id = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u32::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    EvidenceId::try_from(id).ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_fields_default() {
        let record = CandidateRecord::from_value(&json!({}));
        assert!(record.is_empty());

        let record = CandidateRecord::from_value(&json!({
            "summary_bullets": [{"citations": [1]}],
            "suggested_orders": [{"name": "CBC"}]
        }));
        assert_eq!(record.summary_bullets[0].text, "");
        let order = &record.suggested_orders[0];
        assert_eq!(order.category, OrderCategory::Other);
        assert_eq!(order.reason, "");
        assert!(order.citations.is_empty());
        assert_eq!(order.confidence, None);
        assert_eq!(order.external_citations, None);
    }

    #[test]
    fn test_wrong_shapes_are_tolerated() {
        let record = CandidateRecord::from_value(&json!({
            "summary_bullets": "not a list",
            "suggested_orders": [null, 3, {"name": "Troponin", "text": 5}]
        }));
        assert!(record.summary_bullets.is_empty());
        assert_eq!(record.suggested_orders.len(), 1);
        assert_eq!(record.suggested_orders[0].name, "Troponin");
    }

    #[test]
    fn test_citation_coercion() {
        let record = CandidateRecord::from_value(&json!({
            "summary_bullets": [
                {"text": "a", "citations": [1, "2", 3.0, 2, -1, 0, 2.5, "x", null, [4]]},
                {"text": "b", "citations": 7},
                {"text": "c", "citations": "8"}
            ]
        }));
        let ids = |i: usize| {
            record.summary_bullets[i]
                .citations
                .iter()
                .copied()
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(0), vec![1, 2, 3]);
        assert_eq!(ids(1), vec![7]);
        assert_eq!(ids(2), vec![8]);
    }

    #[test]
    fn test_recommendation_fields() {
        let record = CandidateRecord::from_value(&json!({
            "suggested_orders": [{
                "type": "Lab",
                "name": "Troponin I",
                "reason": "Assess for myocardial injury",
                "citations": [2],
                "confidence": "0.8",
                "external_citations": [
                    {"title": "ACS guideline", "url": "https://example.org/acs", "year": "2021"},
                    "not an object"
                ]
            }]
        }));
        let order = &record.suggested_orders[0];
        assert_eq!(order.category, OrderCategory::Lab);
        assert_eq!(order.confidence, Some(0.8));
        let ext = order.external_citations.as_ref().unwrap();
        assert_eq!(ext.len(), 1);
        assert_eq!(ext[0].year, Some(2021));
        assert_eq!(ext[0].snippet, None);
        assert_eq!(order.claim_text(), "Troponin I Assess for myocardial injury");
    }

    #[test]
    fn test_empty_external_citations_are_absent() {
        let record = CandidateRecord::from_value(&json!({
            "suggested_orders": [{"name": "CBC", "external_citations": []}]
        }));
        assert_eq!(record.suggested_orders[0].external_citations, None);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(OrderCategory::parse(" IMAGING "), OrderCategory::Imaging);
        assert_eq!(OrderCategory::parse("medication"), OrderCategory::Medication);
        assert_eq!(OrderCategory::parse("consult"), OrderCategory::Consult);
        assert_eq!(OrderCategory::parse("procedure"), OrderCategory::Other);
        assert_eq!(OrderCategory::Lab.as_str(), "lab");
    }

    #[test]
    fn test_claim_text_trims_empty_reason() {
        let order = Recommendation {
            name: "EKG".to_string(),
            ..Default::default()
        };
        assert_eq!(order.claim_text(), "EKG");
    }

    #[test]
    fn test_serialized_candidate_shape() {
        let record = CandidateRecord::from_value(&json!({
            "suggested_orders": [{"type": "consult", "name": "Cardiology", "citations": [3, 1]}]
        }));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "summary_bullets": [],
                "suggested_orders": [{
                    "type": "consult",
                    "name": "Cardiology",
                    "reason": "",
                    "citations": [1, 3],
                    "confidence": null
                }]
            })
        );
    }

    #[test]
    fn test_model_info_null_becomes_object() {
        let record = ValidatedRecord {
            summary_bullets: vec![],
            suggested_orders: vec![],
            evidence: EvidenceIndex::default(),
            model_info: Value::Null,
        }
        .with_model_info(Value::Null);
        assert_eq!(record.model_info, json!({}));
        assert_eq!(record.claim_count(), 0);
    }
}
