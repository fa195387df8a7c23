//! Diagnostics over oracle output.
//!
//! `validate_response` reports structural problems in a raw proposal before
//! canonicalization hides them. `advise` looks at final values for utility
//! combinations that are legal but probably wrong. Neither changes values.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rules::TokenSet;
use crate::types::{FieldKind, RawValueMap, Schema, ValueMap};

/// What is wrong with one key of a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum IssueKind {
    /// Schema key the oracle did not answer
    Missing,
    /// Boolean field answered with something other than a known token
    InvalidBoolean { got: String },
    /// Text field answered with a non-string JSON value
    NotText { got: String },
    /// Key the schema does not define
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseIssue {
    pub key: String,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl fmt::Display for ResponseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IssueKind::Missing => write!(f, "Missing field: {}", self.key),
            IssueKind::InvalidBoolean { got } => {
                write!(f, "Invalid boolean value for {}: {}", self.key, got)
            }
            IssueKind::NotText { got } => write!(f, "Expected text for {}, got {}", self.key, got),
            IssueKind::Unexpected => write!(f, "Unexpected field: {}", self.key),
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Check a raw proposal against the schema.
///
/// Issues come in schema order, followed by unexpected keys in key order.
pub fn validate_response(raw: &RawValueMap, schema: &Schema, tokens: &TokenSet) -> Vec<ResponseIssue> {
    let mut issues = Vec::new();

    for field in schema {
        let Some(value) = raw.get(&field.key) else {
            issues.push(ResponseIssue {
                key: field.key.clone(),
                kind: IssueKind::Missing,
            });
            continue;
        };

        let kind = match (field.kind, value) {
            (FieldKind::Boolean, serde_json::Value::Bool(_)) => None,
            (FieldKind::Boolean, serde_json::Value::String(s)) if tokens.classify(s).is_some() => None,
            (FieldKind::Boolean, other) => Some(IssueKind::InvalidBoolean {
                got: match other {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            }),
            (FieldKind::Text, serde_json::Value::String(_)) => None,
            (FieldKind::Text, other) => Some(IssueKind::NotText {
                got: json_type_name(other).to_string(),
            }),
        };
        if let Some(kind) = kind {
            issues.push(ResponseIssue {
                key: field.key.clone(),
                kind,
            });
        }
    }

    let mut unexpected: Vec<&String> = raw.keys().filter(|k| !schema.contains_key(k)).collect();
    unexpected.sort();
    issues.extend(unexpected.into_iter().map(|key| ResponseIssue {
        key: key.clone(),
        kind: IssueKind::Unexpected,
    }));

    issues
}

/// Keys and voltage lists driving the utility advisories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    pub voltage_key: String,
    pub frequency_key: String,
    pub pressure_key: String,
    pub flow_key: String,

    /// Voltages that suggest 60 Hz when no frequency is given
    pub sixty_hz_voltages: Vec<String>,

    /// Voltages that suggest 50 Hz when no frequency is given
    pub fifty_hz_voltages: Vec<String>,

    /// Voltages that are unusual on a 60 Hz supply
    pub conflicts_with_sixty_hz: Vec<String>,

    /// Voltages that are unusual on a 50 Hz supply
    pub conflicts_with_fifty_hz: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            voltage_key: "voltage".to_string(),
            frequency_key: "hz".to_string(),
            pressure_key: "psi".to_string(),
            flow_key: "cfm".to_string(),
            sixty_hz_voltages: strings(&["480", "460", "440", "120", "110", "115"]),
            fifty_hz_voltages: strings(&["400", "380", "415", "230", "220", "240"]),
            conflicts_with_sixty_hz: strings(&["400", "380", "415"]),
            conflicts_with_fifty_hz: strings(&["480", "460", "440"]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryLevel {
    Suggestion,
    Warning,
    Info,
}

/// A cross-field observation for a human reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub level: AdvisoryLevel,
    pub field: String,
    pub current: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested: Option<String>,
    pub reason: String,
}

fn text_of<'a>(values: &'a ValueMap, key: &str) -> &'a str {
    values.get(key).and_then(|v| v.as_text()).map(str::trim).unwrap_or("")
}

fn mentions_any(value: &str, candidates: &[String]) -> bool {
    candidates.iter().any(|c| !c.is_empty() && value.contains(c.as_str()))
}

/// Utility advisories over final values.
pub fn advise(values: &ValueMap, config: &AdvisoryConfig) -> Vec<Advisory> {
    let mut advisories = Vec::new();
    let voltage = text_of(values, &config.voltage_key);
    let frequency = text_of(values, &config.frequency_key);
    let hz = frequency.to_lowercase().replace("hz", "");
    let hz = hz.trim();

    if !voltage.is_empty() && hz.is_empty() {
        let suggested = if mentions_any(voltage, &config.sixty_hz_voltages) {
            Some("60")
        } else if mentions_any(voltage, &config.fifty_hz_voltages) {
            Some("50")
        } else {
            None
        };
        if let Some(hz) = suggested {
            advisories.push(Advisory {
                level: AdvisoryLevel::Suggestion,
                field: config.frequency_key.clone(),
                current: String::new(),
                suggested: Some(hz.to_string()),
                reason: format!("{} Hz is typical for {}", hz, voltage),
            });
        }
    }

    if !voltage.is_empty() {
        let mismatch = match hz {
            "60" => mentions_any(voltage, &config.conflicts_with_sixty_hz),
            "50" => mentions_any(voltage, &config.conflicts_with_fifty_hz),
            _ => false,
        };
        if mismatch {
            advisories.push(Advisory {
                level: AdvisoryLevel::Warning,
                field: config.frequency_key.clone(),
                current: frequency.to_string(),
                suggested: None,
                reason: format!("{} Hz is unusual for {}", hz, voltage),
            });
        }
    }

    let pressure = text_of(values, &config.pressure_key);
    if !pressure.is_empty() && text_of(values, &config.flow_key).is_empty() {
        advisories.push(Advisory {
            level: AdvisoryLevel::Info,
            field: config.flow_key.clone(),
            current: String::new(),
            suggested: None,
            reason: format!("Air pressure {} given without air flow", pressure),
        });
    }

    advisories
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, Value};
    use serde_json::json;

    fn schema() -> Schema {
        vec![
            Field::new("hmi_15_check", FieldKind::Boolean),
            Field::new("plc_ab_check", FieldKind::Boolean),
            Field::new("voltage", FieldKind::Text),
            Field::new("hz", FieldKind::Text),
        ]
        .into()
    }

    fn raw(value: serde_json::Value) -> RawValueMap {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_clean_response_has_no_issues() {
        let raw = raw(json!({
            "hmi_15_check": true,
            "plc_ab_check": "No",
            "voltage": "480",
            "hz": ""
        }));
        assert!(validate_response(&raw, &schema(), &TokenSet::default()).is_empty());
    }

    #[test]
    fn test_reports_each_problem() {
        let raw = raw(json!({
            "hmi_15_check": "maybe",
            "voltage": 480,
            "hz": "60",
            "zzz_extra": "?",
            "aaa_extra": true
        }));
        let issues = validate_response(&raw, &schema(), &TokenSet::default());
        assert_eq!(
            issues,
            vec![
                ResponseIssue {
                    key: "hmi_15_check".to_string(),
                    kind: IssueKind::InvalidBoolean { got: "maybe".to_string() }
                },
                ResponseIssue {
                    key: "plc_ab_check".to_string(),
                    kind: IssueKind::Missing
                },
                ResponseIssue {
                    key: "voltage".to_string(),
                    kind: IssueKind::NotText { got: "number".to_string() }
                },
                ResponseIssue {
                    key: "aaa_extra".to_string(),
                    kind: IssueKind::Unexpected
                },
                ResponseIssue {
                    key: "zzz_extra".to_string(),
                    kind: IssueKind::Unexpected
                },
            ]
        );
        assert_eq!(issues[1].to_string(), "Missing field: plc_ab_check");
    }

    fn values(pairs: &[(&str, &str)]) -> ValueMap {
        pairs.iter().map(|(k, v)| (k.to_string(), Value::text(*v))).collect()
    }

    #[test]
    fn test_suggests_frequency_from_voltage() {
        let advisories = advise(&values(&[("voltage", "460-480V")]), &AdvisoryConfig::default());
        assert_eq!(advisories.len(), 1);
        assert_eq!(advisories[0].level, AdvisoryLevel::Suggestion);
        assert_eq!(advisories[0].suggested.as_deref(), Some("60"));

        let advisories = advise(&values(&[("voltage", "380-400V"), ("hz", "")]), &AdvisoryConfig::default());
        assert_eq!(advisories[0].suggested.as_deref(), Some("50"));
    }

    #[test]
    fn test_warns_on_mismatch() {
        let advisories = advise(&values(&[("voltage", "400V"), ("hz", "60 Hz")]), &AdvisoryConfig::default());
        assert_eq!(advisories.len(), 1);
        assert_eq!(advisories[0].level, AdvisoryLevel::Warning);

        let fine = advise(&values(&[("voltage", "480V"), ("hz", "60 Hz")]), &AdvisoryConfig::default());
        assert!(fine.is_empty());
    }

    #[test]
    fn test_pressure_without_flow() {
        let advisories = advise(&values(&[("psi", "80 PSI")]), &AdvisoryConfig::default());
        assert_eq!(advisories.len(), 1);
        assert_eq!(advisories[0].level, AdvisoryLevel::Info);
        assert_eq!(advisories[0].field, "cfm");

        let advisories = advise(&values(&[("psi", "80 PSI"), ("cfm", "10")]), &AdvisoryConfig::default());
        assert!(advisories.is_empty());
    }
}
