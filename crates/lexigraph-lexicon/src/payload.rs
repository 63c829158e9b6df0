//! Similarity payload returned by the lexicon service.
//!
//! Only the logical shape of the upstream JSON is modelled:
//!
//! ```text
//! {
//!   "semanticallySimilarWordFilaments": [
//!     { "labels": [{"type": "LEFT", "label": "..."}],
//!       "words":  [{"word": "...", "strength": 0.9}] }
//!   ],
//!   "wordInformation": { "frequency": 1, "documentFrequency": 1,
//!                        "absoluteRank": 1, "relativeRank": 0.5 }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::LexiconError;

/// Which side of a filament a semantic label belongs to.
///
/// Any type other than `LEFT` (in any case) is read as `RIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LabelSide {
    Left,
    Right,
}

impl<'de> Deserialize<'de> for LabelSide {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let side = String::deserialize(deserializer)?;
        if side.eq_ignore_ascii_case("left") {
            Ok(LabelSide::Left)
        } else {
            Ok(LabelSide::Right)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilamentLabel {
    #[serde(rename = "type")]
    pub side: LabelSide,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarWord {
    pub word: String,
    pub strength: f64,
}

/// One grouped unit of similarity data: semantic labels plus weighted words.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Filament {
    #[serde(default)]
    pub labels: Vec<FilamentLabel>,
    #[serde(default)]
    pub words: Vec<SimilarWord>,
}

impl Filament {
    /// Composite label used on every edge produced by this filament.
    ///
    /// LEFT labels and RIGHT labels are each joined with `" | "`, then
    /// combined as `"{left} * {right}"` and trimmed. No labels yields `""`.
    pub fn semantic_label(&self) -> String {
        if self.labels.is_empty() {
            return String::new();
        }

        let mut left = Vec::new();
        let mut right = Vec::new();
        for label in &self.labels {
            match label.side {
                LabelSide::Left => left.push(label.label.as_str()),
                LabelSide::Right => right.push(label.label.as_str()),
            }
        }

        format!("{} * {}", left.join(" | "), right.join(" | "))
            .trim()
            .to_string()
    }
}

/// Frequency and rank metadata for the looked-up term.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WordInformation {
    pub frequency: i64,
    pub document_frequency: i64,
    pub absolute_rank: i64,
    pub relative_rank: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityPayload {
    #[serde(rename = "semanticallySimilarWordFilaments")]
    pub filaments: Vec<Filament>,
    #[serde(default)]
    pub word_information: Option<WordInformation>,
}

impl SimilarityPayload {
    pub fn from_json(value: serde_json::Value) -> Result<Self, LexiconError> {
        serde_json::from_value(value).map_err(|e| LexiconError::InvalidPayload(e.to_string()))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, LexiconError> {
        serde_json::from_slice(bytes).map_err(|e| LexiconError::InvalidPayload(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.filaments.is_empty()
    }

    /// Every similar word across all filaments, in payload order (duplicates kept).
    pub fn similar_words(&self) -> impl Iterator<Item = &str> {
        self.filaments
            .iter()
            .flat_map(|f| f.words.iter().map(|w| w.word.as_str()))
    }

    pub fn word_count(&self) -> usize {
        self.filaments.iter().map(|f| f.words.len()).sum()
    }

    pub fn info(&self) -> WordInformation {
        self.word_information.unwrap_or_default()
    }
}
