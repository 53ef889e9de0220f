//! Sentence indexing for clinical notes.
//!
//! A note is split into evidence units that the model cites by number.
//! Splitting is a heuristic: a unit ends at a newline run, or at whitespace
//! that follows `.`, `!` or `?`. Abbreviations such as "Dr. Smith" are split
//! like any other sentence end. Citation ids handed to the model depend on
//! this exact behavior, so it must stay stable.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// Either a terminal punctuation mark followed by whitespace, or a run of newlines.
    static ref BOUNDARY_PATTERN: Regex = Regex::new(r"[.!?]\s+|\n+").unwrap();
}

/// Identifier of an evidence unit: its 1-based position in the note.
pub type EvidenceId = u32;

/// One independently citable fragment of the note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceUnit {
    pub id: EvidenceId,
    pub text: String,
}

/// Read-only map from evidence id to unit text, built from one note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceIndex(BTreeMap<EvidenceId, String>);

impl EvidenceIndex {
    /// Segment a note and index the result in one step.
    pub fn from_note(text: &str) -> Self {
        index(&segment(text))
    }

    pub fn get(&self, id: EvidenceId) -> Option<&str> {
        self.0.get(&id).map(String::as_str)
    }

    pub fn contains(&self, id: EvidenceId) -> bool {
        self.0.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate units in id order.
    pub fn iter(&self) -> impl Iterator<Item = (EvidenceId, &str)> {
        self.0.iter().map(|(id, text)| (*id, text.as_str()))
    }
}

/// Split note text into evidence units with ids `1..=n` in split order.
///
/// Fragments are trimmed and empty ones discarded before numbering, so an
/// empty or whitespace-only note yields no units.
pub fn segment(text: &str) -> Vec<EvidenceUnit> {
    let mut fragments = Vec::new();
    let mut start = 0;

    for boundary in BOUNDARY_PATTERN.find_iter(text) {
        // Terminal punctuation stays with the sentence it closes.
        let end = if boundary.as_str().starts_with('\n') {
            boundary.start()
        } else {
            boundary.start() + 1
        };
        fragments.push(&text[start..end]);
        start = boundary.end();
    }
    fragments.push(&text[start..]);

    fragments
        .into_iter()
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .zip(1..)
        .map(|(fragment, id)| EvidenceUnit {
            id,
            text: fragment.to_string(),
        })
        .collect()
}

/// Project units into an id-to-text lookup.
pub fn index(units: &[EvidenceUnit]) -> EvidenceIndex {
    EvidenceIndex(
        units
            .iter()
            .map(|unit| (unit.id, unit.text.clone()))
            .collect(),
    )
}
