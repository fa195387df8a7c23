//! Synonym and positive-indicator generation for boolean fields.
//!
//! Each toggle gets a set of alternative phrasings and a set of phrases that
//! count as evidence the toggle is selected. Both are used to brief the
//! oracle and, later, to verify its answers against the source text.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::types::{Field, Schema};

/// Indicators shared by every boolean field.
pub const BASE_INDICATORS: [&str; 5] = [
    "included",
    "standard",
    "included as standard",
    "yes",
    "selected",
];

/// Synonyms and positive indicators for one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Phrasings {
    pub synonyms: BTreeSet<String>,
    pub positive_indicators: BTreeSet<String>,
}

/// Derives phrasings from a field's key, its label and a domain dictionary.
#[derive(Debug, Clone, Default)]
pub struct SynonymGenerator {
    /// Term (key token or `snake_case` phrase) → alternate phrasings
    dictionary: BTreeMap<String, Vec<String>>,
    boolean_suffix: String,
}

impl SynonymGenerator {
    pub fn new(dictionary: BTreeMap<String, Vec<String>>, boolean_suffix: impl Into<String>) -> Self {
        Self {
            dictionary,
            boolean_suffix: boolean_suffix.into(),
        }
    }

    pub fn dictionary_len(&self) -> usize {
        self.dictionary.len()
    }

    /// Phrasings for a boolean field.
    pub fn generate(&self, field: &Field) -> Phrasings {
        let synonyms = self.synonyms(&field.key, &field.label);
        let positive_indicators = positive_indicators(&field.label, &synonyms);
        Phrasings {
            synonyms,
            positive_indicators,
        }
    }

    /// Attach phrasings to every boolean field. Text fields are left alone.
    pub fn annotate(&self, mut schema: Schema) -> Schema {
        let mut annotated = 0;
        for field in schema.fields_mut().filter(|f| f.is_boolean()) {
            let Phrasings {
                synonyms,
                positive_indicators,
            } = self.generate(field);
            field.synonyms = synonyms;
            field.positive_indicators = positive_indicators;
            annotated += 1;
        }
        debug!(annotated, "Generated synonyms for boolean fields");
        schema
    }

    /// Like [`annotate`](Self::annotate), but only for Boolean fields that
    /// carry neither synonyms nor indicators. Hand-edited phrasings survive.
    pub fn annotate_missing(&self, mut schema: Schema) -> Schema {
        let mut annotated = 0;
        for field in schema
            .fields_mut()
            .filter(|f| f.is_boolean() && f.synonyms.is_empty() && f.positive_indicators.is_empty())
        {
            let phrasings = self.generate(field);
            field.synonyms = phrasings.synonyms;
            field.positive_indicators = phrasings.positive_indicators;
            annotated += 1;
        }
        if annotated > 0 {
            info!(annotated, "Generated missing phrasings for boolean fields");
        }
        schema
    }

    fn synonyms(&self, key: &str, label: &str) -> BTreeSet<String> {
        let stem = key.strip_suffix(self.boolean_suffix.as_str()).unwrap_or(key);
        let mut candidates: Vec<String> = vec![key.to_string(), stem.replace('_', " ")];

        let label_lower = label.trim().to_lowercase();
        if !label_lower.is_empty() {
            candidates.push(label_lower.clone());
            candidates.push(strip_punctuation(&label_lower));
            candidates.push(label_lower.chars().filter(|c| c.is_alphanumeric()).collect());
        }

        let stem_lower = stem.to_lowercase();
        let tokens: BTreeSet<&str> = stem_lower.split('_').filter(|t| !t.is_empty()).collect();

        for (term, phrasings) in &self.dictionary {
            let spaced = term.replace('_', " ");
            let in_key = tokens.contains(term.as_str())
                || (term.contains('_') && stem_lower.contains(term.as_str()));
            let in_label = !label_lower.is_empty()
                && (label_lower.contains(term.as_str()) || label_lower.contains(&spaced));
            if in_key || in_label {
                candidates.extend(phrasings.iter().cloned());
            }
        }

        candidates
            .into_iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Remove punctuation except `.` and `&`, collapse whitespace.
fn strip_punctuation(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '.' || *c == '&' || *c == '_')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Base indicators, the four templates over each synonym, and the label.
pub fn positive_indicators(label: &str, synonyms: &BTreeSet<String>) -> BTreeSet<String> {
    let mut indicators: BTreeSet<String> = BASE_INDICATORS.iter().map(|s| s.to_string()).collect();

    for s in synonyms {
        indicators.insert(format!("with {}", s));
        indicators.insert(format!("includes {}", s));
        indicators.insert(format!("{} included", s));
        indicators.insert(format!("{} is selected", s));
    }

    let label = label.trim();
    if !label.is_empty() {
        indicators.insert(label.to_string());
        indicators.insert(format!("with {}", label));
        indicators.insert(format!("includes {}", label));
    }

    indicators
}
