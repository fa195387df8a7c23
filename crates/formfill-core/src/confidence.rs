//! Per-field confidence in the finalized values.
//!
//! Scores come from how much of the evidence backs each value. Fields scoring
//! below [`CONFIDENCE_MEDIUM`] are listed for human review.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::evidence::Evidence;
use crate::rules::Correction;
use crate::types::{Field, Schema, Value, ValueMap};

pub const CONFIDENCE_HIGH: f64 = 0.8;
pub const CONFIDENCE_MEDIUM: f64 = 0.5;
pub const CONFIDENCE_LOW: f64 = 0.3;

/// Text answers that mean the oracle did not know.
const NON_ANSWERS: [&str; 11] = [
    "n/a",
    "not applicable",
    "not specified",
    "not selected",
    "none selected",
    "to be determined",
    "tbd",
    "pending",
    "not available",
    "unknown",
    "not provided",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= CONFIDENCE_HIGH {
            ConfidenceLevel::High
        } else if score >= CONFIDENCE_MEDIUM {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Where a final value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// Taken from the proposal unchanged
    Oracle,
    /// Last written by a rule or the evidence check
    Corrected,
    /// Never proposed; the schema default
    Defaulted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfidence {
    pub score: f64,
    pub level: ConfidenceLevel,
    pub source: ValueSource,
}

impl FieldConfidence {
    fn new(score: f64, source: ValueSource) -> Self {
        Self {
            score,
            level: ConfidenceLevel::from_score(score),
            source,
        }
    }
}

/// Scores for every schema key plus the keys that need review.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Estimate {
    pub fields: BTreeMap<String, FieldConfidence>,
    /// Low-scoring keys in schema order
    pub needs_review: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ConfidenceEstimator {
    boolean_suffix: String,
}

impl Default for ConfidenceEstimator {
    fn default() -> Self {
        Self::new("_check")
    }
}

impl ConfidenceEstimator {
    pub fn new(boolean_suffix: impl Into<String>) -> Self {
        Self {
            boolean_suffix: boolean_suffix.into(),
        }
    }

    /// Score the final `values` against the evidence.
    ///
    /// `proposed` is the oracle's answer before any rule ran; `corrections`
    /// tells which keys were rewritten after it.
    pub fn estimate(
        &self,
        values: &ValueMap,
        proposed: &ValueMap,
        corrections: &[Correction],
        schema: &Schema,
        evidence: &Evidence,
    ) -> Estimate {
        let haystack = evidence.haystack();
        let corrected: BTreeSet<&str> = corrections.iter().map(|c| c.key.as_str()).collect();
        let mut estimate = Estimate::default();

        for field in schema {
            let Some(value) = values.get(&field.key) else {
                continue;
            };
            let source = if corrected.contains(field.key.as_str()) {
                ValueSource::Corrected
            } else if proposed.contains_key(&field.key) {
                ValueSource::Oracle
            } else {
                ValueSource::Defaulted
            };

            let score = match source {
                ValueSource::Defaulted => CONFIDENCE_LOW,
                _ if field.is_boolean() => self.score_flag(field, value, &haystack),
                _ => {
                    let score = score_text(value, &haystack);
                    // A reformatted answer is as good as the proposal it came from
                    match proposed.get(&field.key) {
                        Some(before) if source == ValueSource::Corrected && score < CONFIDENCE_HIGH => {
                            score.max(score_text(before, &haystack))
                        }
                        _ => score,
                    }
                }
            };

            let confidence = FieldConfidence::new(score, source);
            if confidence.level == ConfidenceLevel::Low {
                estimate.needs_review.push(field.key.clone());
            }
            estimate.fields.insert(field.key.clone(), confidence);
        }

        let count = |level: ConfidenceLevel| estimate.fields.values().filter(|c| c.level == level).count();
        info!(
            high = count(ConfidenceLevel::High),
            medium = count(ConfidenceLevel::Medium),
            low = count(ConfidenceLevel::Low),
            "Estimated confidence"
        );
        estimate
    }

    fn score_flag(&self, field: &Field, value: &Value, haystack: &str) -> f64 {
        if !value.is_true() {
            return 0.75;
        }

        let mut terms: BTreeSet<String> = field
            .positive_indicators
            .iter()
            .chain(&field.synonyms)
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        let stem = field.key.strip_suffix(self.boolean_suffix.as_str()).unwrap_or(field.key.as_str());
        terms.extend(
            stem.split('_')
                .filter(|part| part.chars().count() > 2)
                .map(str::to_lowercase),
        );

        match terms.iter().filter(|t| haystack.contains(t.as_str())).count() {
            0 => 0.4,
            1 => 0.7,
            2 => 0.85,
            _ => 0.95,
        }
    }
}

fn score_text(value: &Value, haystack: &str) -> f64 {
    let text = match value {
        Value::Text(s) => s.trim().to_lowercase(),
        other => other.render().to_lowercase(),
    };
    if text.is_empty() {
        return CONFIDENCE_LOW;
    }
    if NON_ANSWERS.iter().any(|p| text.contains(p)) {
        return 0.2;
    }
    if haystack.contains(&text) {
        return 0.9;
    }
    if text
        .split_whitespace()
        .any(|word| word.chars().count() > 3 && haystack.contains(word))
    {
        return 0.7;
    }
    CONFIDENCE_MEDIUM
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldKind;

    fn capper() -> Field {
        let mut field = Field::new("servo_capper_check", FieldKind::Boolean).with_label("Servo capper");
        field.positive_indicators = ["servo capper", "servo"].iter().map(|s| s.to_string()).collect();
        field
    }

    fn estimate(field: Field, proposed: Value, final_value: Value, evidence: &Evidence) -> FieldConfidence {
        let key = field.key.clone();
        let schema: Schema = vec![field].into();
        let proposed: ValueMap = [(key.clone(), proposed.clone())].into_iter().collect();
        let values: ValueMap = [(key.clone(), final_value.clone())].into_iter().collect();
        let corrections = if proposed[&key] == final_value {
            Vec::new()
        } else {
            vec![Correction {
                rule: "fmt".to_string(),
                key: key.clone(),
                before: Some(proposed[&key].clone()),
                after: final_value,
            }]
        };
        let mut out = ConfidenceEstimator::default().estimate(&values, &proposed, &corrections, &schema, evidence);
        out.fields.remove(&key).unwrap()
    }

    #[test]
    fn test_level_thresholds() {
        assert_eq!(ConfidenceLevel::from_score(0.95), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(CONFIDENCE_HIGH), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.79), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(CONFIDENCE_MEDIUM), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.49), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(CONFIDENCE_LOW), ConfidenceLevel::Low);
    }

    #[test]
    fn test_selection_scored_by_supporting_terms() {
        let strong = Evidence::text("Servo capper with servo drive for capping");
        let c = estimate(capper(), Value::Flag(true), Value::Flag(true), &strong);
        assert_eq!(c.score, 0.95);
        assert_eq!(c.level, ConfidenceLevel::High);
        assert_eq!(c.source, ValueSource::Oracle);

        let one = Evidence::text("a capper is needed");
        assert_eq!(estimate(capper(), Value::Flag(true), Value::Flag(true), &one).score, 0.7);

        let none = Evidence::text("labeler only");
        let c = estimate(capper(), Value::Flag(true), Value::Flag(true), &none);
        assert_eq!(c.score, 0.4);
        assert_eq!(c.level, ConfidenceLevel::Low);
    }

    #[test]
    fn test_unselected_flag_is_medium() {
        let c = estimate(capper(), Value::Flag(false), Value::Flag(false), &Evidence::default());
        assert_eq!(c.score, 0.75);
        assert_eq!(c.level, ConfidenceLevel::Medium);
    }

    #[test]
    fn test_text_scores() {
        let evidence = Evidence::text("Supply 480V three phase, Allen Bradley PLC");
        let field = || Field::new("voltage", FieldKind::Text);

        assert_eq!(estimate(field(), Value::text("480V"), Value::text("480V"), &evidence).score, 0.9);
        assert_eq!(estimate(field(), Value::text(""), Value::text(""), &evidence).score, CONFIDENCE_LOW);
        assert_eq!(estimate(field(), Value::text("TBD"), Value::text("TBD"), &evidence).score, 0.2);
        assert_eq!(estimate(field(), Value::text("three wire"), Value::text("three wire"), &evidence).score, 0.7);
        assert_eq!(estimate(field(), Value::text("1 x"), Value::text("1 x"), &evidence).score, CONFIDENCE_MEDIUM);
    }

    #[test]
    fn test_reformatted_text_keeps_proposal_support() {
        let evidence = Evidence::text("voltage 480 at the panel");
        let c = estimate(
            Field::new("voltage", FieldKind::Text),
            Value::text("480"),
            Value::text("460-480V"),
            &evidence,
        );
        assert_eq!(c.source, ValueSource::Corrected);
        assert_eq!(c.score, 0.9);
    }

    #[test]
    fn test_defaulted_fields_need_review_in_schema_order() {
        let schema: Schema = vec![
            Field::new("voltage", FieldKind::Text),
            Field::new("hz", FieldKind::Text),
            capper(),
        ]
        .into();
        let proposed: ValueMap = [("voltage".to_string(), Value::text("480V"))].into_iter().collect();
        let mut values = schema.default_values();
        values.insert("voltage".to_string(), Value::text("480V"));

        let out = ConfidenceEstimator::default().estimate(
            &values,
            &proposed,
            &[],
            &schema,
            &Evidence::text("480V"),
        );

        assert_eq!(out.fields.len(), 3);
        assert_eq!(out.fields["hz"].source, ValueSource::Defaulted);
        assert_eq!(out.fields["hz"].score, CONFIDENCE_LOW);
        assert_eq!(out.needs_review, vec!["hz".to_string(), "servo_capper_check".to_string()]);
        assert_eq!(out.fields["voltage"].level, ConfidenceLevel::High);
    }
}
