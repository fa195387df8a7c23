//! The seam to whatever proposes values (a language model, a rules service,
//! a human). Nothing here calls out; callers supply the implementation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::confidence::FieldConfidence;
use crate::evidence::Evidence;
use crate::rules::Correction;
use crate::types::{RawValueMap, Schema, ValueMap};
use crate::validation::{Advisory, ResponseIssue};

/// Errors an oracle may report.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Oracle returned an unusable response: {0}")]
    InvalidResponse(String),
}

/// Proposes a raw value for every schema key from the evidence.
///
/// The response is untrusted: it may miss keys, add keys, or use any JSON
/// shape. Everything downstream tolerates that.
pub trait Oracle {
    fn propose(&self, schema: &Schema, evidence: &Evidence) -> Result<RawValueMap, OracleError>;
}

impl<F> Oracle for F
where
    F: Fn(&Schema, &Evidence) -> Result<RawValueMap, OracleError>,
{
    fn propose(&self, schema: &Schema, evidence: &Evidence) -> Result<RawValueMap, OracleError> {
        self(schema, evidence)
    }
}

/// Replays a fixed response, e.g. one saved from an earlier run.
#[derive(Debug, Clone, Default)]
pub struct RecordedOracle {
    response: RawValueMap,
}

impl RecordedOracle {
    pub fn new(response: RawValueMap) -> Self {
        Self { response }
    }

    pub fn from_json(json: &str) -> Result<Self, OracleError> {
        match serde_json::from_str(json) {
            Ok(serde_json::Value::Object(response)) => Ok(Self { response }),
            Ok(other) => Err(OracleError::InvalidResponse(format!(
                "expected a JSON object, got {}",
                other
            ))),
            Err(e) => Err(OracleError::InvalidResponse(e.to_string())),
        }
    }
}

impl Oracle for RecordedOracle {
    fn propose(&self, _schema: &Schema, _evidence: &Evidence) -> Result<RawValueMap, OracleError> {
        Ok(self.response.clone())
    }
}

/// Outcome of one fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillReport {
    /// Final values, one per schema key
    pub values: ValueMap,

    /// Every change made after the proposal, in order
    pub corrections: Vec<Correction>,

    /// Problems found in the raw proposal
    pub issues: Vec<ResponseIssue>,

    pub advisories: Vec<Advisory>,

    /// Evidence support for each final value
    #[serde(default)]
    pub confidence: BTreeMap<String, FieldConfidence>,

    /// Low-confidence keys in schema order
    #[serde(default)]
    pub needs_review: Vec<String>,

    pub completed_at: DateTime<Utc>,
}

impl FillReport {
    /// Values as handed to the renderer: flags as `YES`/`NO`.
    pub fn rendered(&self) -> BTreeMap<String, String> {
        self.values.iter().map(|(k, v)| (k.clone(), v.render())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, FieldKind};

    #[test]
    fn test_closure_is_an_oracle() {
        let oracle = |schema: &Schema, _: &Evidence| -> Result<RawValueMap, OracleError> {
            Ok(schema
                .keys()
                .map(|k| (k.to_string(), serde_json::Value::Bool(true)))
                .collect())
        };
        let schema: Schema = vec![Field::new("a_check", FieldKind::Boolean)].into();
        let proposal = oracle.propose(&schema, &Evidence::default()).unwrap();
        assert_eq!(proposal["a_check"], serde_json::Value::Bool(true));
    }

    #[test]
    fn test_recorded_oracle_parses_object() {
        let oracle = RecordedOracle::from_json(r#"{"voltage": "480"}"#).unwrap();
        let proposal = oracle.propose(&Schema::new(), &Evidence::default()).unwrap();
        assert_eq!(proposal["voltage"], serde_json::json!("480"));
    }

    #[test]
    fn test_recorded_oracle_rejects_non_object() {
        assert!(matches!(
            RecordedOracle::from_json("[1, 2]"),
            Err(OracleError::InvalidResponse(_))
        ));
        assert!(RecordedOracle::from_json("not json").is_err());
    }
}
