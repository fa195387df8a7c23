//! Declarative rule table as it appears in domain configuration.
//!
//! Every rule is a tagged variant:
//!
//! ```yaml
//! rules:
//!   - type: mutual_exclusion
//!     name: hmi_screen_size
//!     members: { pattern: "(?i)hmi.*(15|10|5_7)" }
//!     priority: ["15", "10", "5_7"]
//!   - type: unit_format
//!     name: frequency
//!     keys: [hz]
//!     unit: " Hz"
//!   - type: implication
//!     name: explosion_proof_pneumatics
//!     when: { type: is_true, key: explosion_proof_check }
//!     then:
//!       - set: { pattern: "(?i)pneumatic" }
//!         to: true
//! ```

use serde::{Deserialize, Serialize};

/// Which Boolean keys a rule touches.
///
/// Explicit `keys` come first in declared order, then schema Boolean keys
/// matching `pattern` in schema order; keys matching `exclude` are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
}

impl SelectorSpec {
    pub fn keys(keys: &[&str]) -> Self {
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn pattern(pattern: &str) -> Self {
        Self {
            pattern: Some(pattern.to_string()),
            ..Self::default()
        }
    }
}

/// Condition guarding an implication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionSpec {
    /// A single key is true
    IsTrue { key: String },
    /// At least one selected key is true
    AnyTrue { of: SelectorSpec },
    /// No selected key is true
    NoneTrue { of: SelectorSpec },
    /// At least `count` selected keys are true
    AtLeast { of: SelectorSpec, count: usize },
    All { conditions: Vec<ConditionSpec> },
    Any { conditions: Vec<ConditionSpec> },
}

/// Force every selected key to a Boolean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectSpec {
    pub set: SelectorSpec,
    pub to: bool,
}

/// A numeric range replaced by a canonical label. Bounds are exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub max: f64,
    pub label: String,
}

/// Unit used instead of the default when some schema key contains
/// `key_contains` (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextualUnit {
    pub key_contains: String,
    pub unit: String,
}

impl Band {
    pub fn contains(&self, value: f64) -> bool {
        value > self.min && value < self.max
    }
}

/// One entry of the rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleSpec {
    /// Coerce values to their kind's accepted form
    Canonicalize,

    /// At most one member true; priority patterns pick the survivor
    MutualExclusion {
        name: String,
        members: SelectorSpec,
        #[serde(default)]
        priority: Vec<String>,
    },

    /// Append a unit to bare numbers, or replace them by a band label
    UnitFormat {
        name: String,
        keys: Vec<String>,
        unit: String,
        #[serde(default)]
        bands: Vec<Band>,
        /// First entry matching the schema replaces `unit`
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        contextual_units: Vec<ContextualUnit>,
    },

    /// If `when` holds, apply every effect in `then`
    Implication {
        name: String,
        when: ConditionSpec,
        then: Vec<EffectSpec>,
    },

    /// At most one member true; the first true in declared order survives
    ExactlyOne { name: String, members: SelectorSpec },
}

impl RuleSpec {
    pub fn name(&self) -> &str {
        match self {
            RuleSpec::Canonicalize => "canonicalize",
            RuleSpec::MutualExclusion { name, .. }
            | RuleSpec::UnitFormat { name, .. }
            | RuleSpec::Implication { name, .. }
            | RuleSpec::ExactlyOne { name, .. } => name,
        }
    }
}

/// Raw tokens accepted as affirmative or negative for Boolean fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub affirmative: Vec<String>,
    pub negative: Vec<String>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            affirmative: ["yes", "y", "true", "1", "x", "checked", "selected", "on"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            negative: ["no", "n", "false", "0", "", "unchecked", "none", "off"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule_table_yaml() {
        let yaml = r#"
- type: canonicalize
- type: mutual_exclusion
  name: hmi
  members: { pattern: "hmi" }
  priority: ["15", "10"]
- type: unit_format
  name: voltage
  keys: [voltage]
  unit: V
  bands:
    - { min: 200, max: 250, label: "208-240V" }
- type: implication
  name: beacon
  when:
    type: any
    conditions:
      - { type: at_least, of: { keys: [a_check, b_check] }, count: 2 }
      - { type: is_true, key: multi_check }
  then:
    - set: { keys: [a_check, b_check] }
      to: true
- type: exactly_one
  name: config
  members: { keys: [x_check, y_check] }
"#;
        let rules: Vec<RuleSpec> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rules.len(), 5);
        assert_eq!(rules[0], RuleSpec::Canonicalize);
        assert_eq!(rules[1].name(), "hmi");
        match &rules[3] {
            RuleSpec::Implication { when: ConditionSpec::Any { conditions }, then, .. } => {
                assert_eq!(conditions.len(), 2);
                assert!(matches!(conditions[0], ConditionSpec::AtLeast { count: 2, .. }));
                assert!(then[0].to);
            }
            other => panic!("unexpected rule: {:?}", other),
        }
    }

    #[test]
    fn test_band_bounds_are_exclusive() {
        let band = Band {
            min: 200.0,
            max: 250.0,
            label: "208-240V".to_string(),
        };
        assert!(band.contains(220.0));
        assert!(!band.contains(200.0));
        assert!(!band.contains(250.0));
    }
}
