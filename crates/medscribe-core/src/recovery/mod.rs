//! Recovery of structured records from raw model output.
//!
//! Model output is not a reliable JSON source: the object may be wrapped in
//! prose or a fenced block, carry trailing commas, or stop mid-object.
//! Recovery tries, in order, stopping at the first parse that yields an
//! object:
//!
//! 1. strip a surrounding fence and its language tag
//! 2. parse the text directly
//! 3. parse the first brace-balanced span (quote-aware)
//! 4. otherwise take the first `{` through the last `}`
//! 5. repair the span from 3 or 4 (trailing commas, missing closers)
//!
//! Only when every step fails is a [`RecoveryError`] returned.

mod repair;
mod scanner;

use serde_json::Value;
use thiserror::Error;

use crate::config::RecoveryConfig;
use crate::record::CandidateRecord;

/// Why recovery gave up.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryFailure {
    #[error("no JSON object found in model output")]
    NoObject,

    #[error("JSON object could not be repaired into valid syntax")]
    Unrepairable,
}

/// Recovery failed for this input. Retrying with the same text is pointless.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to recover structured record: {reason}")]
pub struct RecoveryError {
    pub reason: RecoveryFailure,

    /// Leading characters of the raw input, for diagnostics.
    pub preview: String,
}

/// Recovers candidate records from raw model output.
#[derive(Debug, Clone)]
pub struct Recoverer {
    preview_chars: usize,
}

impl Recoverer {
    pub fn new(config: &RecoveryConfig) -> Self {
        Self {
            preview_chars: config.preview_chars,
        }
    }

    /// Recover and shape a candidate record.
    pub fn recover(&self, raw: &str) -> Result<CandidateRecord, RecoveryError> {
        self.recover_value(raw)
            .map(|value| CandidateRecord::from_value(&value))
    }

    /// Recover the raw JSON object without shaping it.
    pub fn recover_value(&self, raw: &str) -> Result<Value, RecoveryError> {
        let text = scanner::strip_fence(raw);

        if let Some(value) = parse_object(text) {
            tracing::debug!(step = "direct", "Recovered structured record");
            return Ok(value);
        }

        let span = match scanner::balanced_span(text) {
            Some(span) => {
                if let Some(value) = parse_object(span) {
                    tracing::debug!(step = "balanced_span", "Recovered structured record");
                    return Ok(value);
                }
                span
            }
            None => {
                let Some(span) = scanner::outer_span(text) else {
                    return Err(self.failure(RecoveryFailure::NoObject, raw));
                };
                if let Some(value) = parse_object(span) {
                    tracing::debug!(step = "outer_span", "Recovered structured record");
                    return Ok(value);
                }
                span
            }
        };

        match repair::repair(span) {
            Some(value) => {
                tracing::debug!(step = "repair", "Recovered structured record");
                Ok(value)
            }
            None => Err(self.failure(RecoveryFailure::Unrepairable, raw)),
        }
    }

    fn failure(&self, reason: RecoveryFailure, raw: &str) -> RecoveryError {
        let preview: String = raw.chars().take(self.preview_chars).collect();
        tracing::warn!(reason = %reason, input_len = raw.len(), "Structure recovery failed");
        RecoveryError { reason, preview }
    }
}

impl Default for Recoverer {
    fn default() -> Self {
        Self::new(&RecoveryConfig::default())
    }
}

/// Recover a candidate record using default settings.
pub fn recover(raw: &str) -> Result<CandidateRecord, RecoveryError> {
    Recoverer::default().recover(raw)
}

/// Parse `text` as JSON, accepting only objects.
pub(crate) fn parse_object(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}
