//! # medscribe-core
//!
//! Extract → recover → verify for model summaries of clinical notes.
//!
//! This crate answers one question: which of the model's claims are
//! actually backed by the note?
//! - **Segment** the note into numbered evidence units the model can cite
//! - **Recover** a structured record from noisy, possibly truncated model output
//! - **Validate** every claim against the units it cites, dropping the unsupported
//!
//! ## Key Guarantees
//!
//! 1. **Pure**: no I/O, no shared state; calls may run concurrently
//! 2. **Deterministic**: same note and output always give the same record
//! 3. **Never panics on model output**: recovery returns a record or a [`RecoveryError`]
//! 4. **Grounded**: every retained claim cites existing units and meets the threshold
//!
//! ## Example
//!
//! ```rust
//! use medscribe_core::{analyze, PipelineConfig};
//!
//! let note = "Patient has fever. No cough noted.";
//! let raw = "```json\n{\"summary_bullets\":[
//!     {\"text\":\"has fever\",\"citations\":[1]},
//!     {\"text\":\"fever present\",\"citations\":[1]}
//! ],}\n```";
//!
//! // "fever present" shares one token of four with sentence 1 (0.25 < 0.30)
//! let record = analyze(note, raw, serde_json::Value::Null, &PipelineConfig::default())?;
//! assert_eq!(record.summary_bullets.len(), 1);
//! assert_eq!(record.summary_bullets[0].text, "has fever");
//! assert_eq!(record.evidence.len(), 2);
//! # Ok::<(), medscribe_core::RecoveryError>(())
//! ```

pub mod config;
pub mod grounding;
pub mod record;
pub mod recovery;
pub mod schema;
pub mod segment;

// Re-export main types at crate root
pub use config::{ConfigError, GroundingConfig, PipelineConfig, RecoveryConfig};
pub use grounding::{jaccard_similarity, support_score, tokenize, validate, GroundingValidator};
pub use record::{
    CandidateRecord, Citations, Claim, ExternalCitation, OrderCategory, Recommendation,
    SummaryPoint, ValidatedRecommendation, ValidatedRecord, ValidatedSummaryPoint,
};
pub use recovery::{recover, Recoverer, RecoveryError, RecoveryFailure};
pub use schema::validate_record_schema;
pub use segment::{index, segment, EvidenceId, EvidenceIndex, EvidenceUnit};

/// Run the whole pipeline for one note and one model output.
///
/// The note is segmented and indexed, the model output recovered into a
/// candidate record, and the candidate grounded against the index.
/// `model_info` is attached to the result unchanged (`null` becomes `{}`).
///
/// # Errors
///
/// Only structural unrecoverability of `raw_output` is an error. Claims
/// that fail grounding are dropped from the result instead.
pub fn analyze(
    note: &str,
    raw_output: &str,
    model_info: serde_json::Value,
    config: &PipelineConfig,
) -> Result<ValidatedRecord, RecoveryError> {
    let units = segment(note);
    let evidence = index(&units);
    tracing::debug!(units = units.len(), "Indexed note");

    let candidate = Recoverer::new(&config.recovery).recover(raw_output)?;

    let record = GroundingValidator::from_config(&config.grounding)
        .validate(&candidate, &evidence)
        .with_model_info(model_info);

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOTE: &str = "55-year-old with hypertension presents with intermittent chest pain for 2 days.
Denies fever.
Plan: obtain EKG and troponins. Start aspirin if no contraindication.";

    #[test]
    fn test_end_to_end() {
        let raw = r#"Sure, here is the JSON:
```json
{
  "summary_bullets": [
    {"text": "Intermittent chest pain for 2 days", "citations": [1]},
    {"text": "Patient reports severe headache", "citations": [2]},
    {"text": "Denies fever", "citations": []}
  ],
  "suggested_orders": [
    {"type": "lab", "name": "Troponin", "reason": "obtain troponins", "citations": [3, 12], "confidence": 0.92},
    {"type": "imaging", "name": "Chest CT", "reason": "rule out dissection", "citations": [1], "confidence": 0.4},
  ],
  "model_info": {"model": "spoofed"}
}
```"#;
        let model_info =
            json!({"provider": "ibm_watsonx.ai", "model": "granite", "mode": "offline"});
        let record = analyze(NOTE, raw, model_info.clone(), &PipelineConfig::default()).unwrap();

        let bullets: Vec<&str> = record.summary_bullets.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(bullets, vec!["Intermittent chest pain for 2 days"]);

        assert_eq!(record.suggested_orders.len(), 1);
        let order = &record.suggested_orders[0];
        assert_eq!(order.name, "Troponin");
        assert_eq!(order.citations.iter().copied().collect::<Vec<_>>(), vec![3]);
        assert_eq!(order.confidence, 0.92);

        assert_eq!(record.evidence.len(), 4);
        assert_eq!(record.model_info, model_info);

        let value = serde_json::to_value(&record).unwrap();
        assert!(validate_record_schema(&value).is_ok());
    }

    #[test]
    fn test_unrecoverable_output() {
        let err = analyze(NOTE, "The model timed out.", json!({}), &PipelineConfig::default())
            .unwrap_err();
        assert_eq!(err.reason, RecoveryFailure::NoObject);
    }

    #[test]
    fn test_threshold_from_config() {
        let raw = r#"{"summary_bullets": [{"text": "Intermittent chest pain for 2 days", "citations": [1]}]}"#;
        let strict = PipelineConfig::default().with_threshold(1.0);
        let record = analyze(NOTE, raw, json!(null), &strict).unwrap();
        assert!(record.summary_bullets.is_empty());
        assert_eq!(record.model_info, json!({}));
    }

    #[test]
    fn test_empty_note_rejects_everything() {
        let raw = r#"{"summary_bullets": [{"text": "fever", "citations": [1]}]}"#;
        let record = analyze("", raw, json!({}), &PipelineConfig::default()).unwrap();
        assert!(record.evidence.is_empty());
        assert_eq!(record.claim_count(), 0);
    }
}
