//! Compiled rules: the table with regexes built and ready to evaluate.

use regex::Regex;

use crate::config::ConfigError;
use crate::types::{FieldKind, Schema, ValueMap};

use super::table::{Band, ConditionSpec, ContextualUnit, EffectSpec, RuleSpec, SelectorSpec};

/// Execution class. Rules always run in this order; within a class they keep
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleClass {
    Canonicalize,
    MutualExclusion,
    UnitFormat,
    Implication,
    ExactlyOne,
}

fn compile_regex(rule: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        rule: rule.to_string(),
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Resolves a set of Boolean keys against a schema.
#[derive(Debug, Clone)]
pub struct Selector {
    keys: Vec<String>,
    pattern: Option<Regex>,
    exclude: Option<Regex>,
}

impl Selector {
    pub fn compile(rule: &str, spec: &SelectorSpec) -> Result<Self, ConfigError> {
        Ok(Self {
            keys: spec.keys.clone(),
            pattern: spec.pattern.as_deref().map(|p| compile_regex(rule, p)).transpose()?,
            exclude: spec.exclude.as_deref().map(|p| compile_regex(rule, p)).transpose()?,
        })
    }

    /// Selected Boolean keys present in the schema, without duplicates.
    pub fn resolve(&self, schema: &Schema) -> Vec<String> {
        let mut selected: Vec<String> = Vec::new();
        let excluded = |key: &str| self.exclude.as_ref().is_some_and(|re| re.is_match(key));

        for key in &self.keys {
            if schema.kind_of(key) == Some(FieldKind::Boolean) && !excluded(key.as_str()) && !selected.contains(key) {
                selected.push(key.clone());
            }
        }
        if let Some(pattern) = &self.pattern {
            for field in schema.boolean_fields() {
                if pattern.is_match(&field.key) && !excluded(field.key.as_str()) && !selected.contains(&field.key) {
                    selected.push(field.key.clone());
                }
            }
        }
        selected
    }
}

/// Compiled implication guard.
#[derive(Debug, Clone)]
pub enum Condition {
    IsTrue(String),
    AnyTrue(Selector),
    NoneTrue(Selector),
    AtLeast(Selector, usize),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    pub fn compile(rule: &str, spec: &ConditionSpec) -> Result<Self, ConfigError> {
        Ok(match spec {
            ConditionSpec::IsTrue { key } => Condition::IsTrue(key.clone()),
            ConditionSpec::AnyTrue { of } => Condition::AnyTrue(Selector::compile(rule, of)?),
            ConditionSpec::NoneTrue { of } => Condition::NoneTrue(Selector::compile(rule, of)?),
            ConditionSpec::AtLeast { of, count } => Condition::AtLeast(Selector::compile(rule, of)?, *count),
            ConditionSpec::All { conditions } => Condition::All(
                conditions
                    .iter()
                    .map(|c| Condition::compile(rule, c))
                    .collect::<Result<_, _>>()?,
            ),
            ConditionSpec::Any { conditions } => Condition::Any(
                conditions
                    .iter()
                    .map(|c| Condition::compile(rule, c))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    pub fn holds(&self, values: &ValueMap, schema: &Schema) -> bool {
        let is_true = |key: &String| values.get(key).is_some_and(|v| v.is_true());
        match self {
            Condition::IsTrue(key) => is_true(key),
            Condition::AnyTrue(sel) => sel.resolve(schema).iter().any(is_true),
            Condition::NoneTrue(sel) => !sel.resolve(schema).iter().any(is_true),
            Condition::AtLeast(sel, count) => sel.resolve(schema).iter().filter(|k| is_true(*k)).count() >= *count,
            Condition::All(conditions) => conditions.iter().all(|c| c.holds(values, schema)),
            Condition::Any(conditions) => conditions.iter().any(|c| c.holds(values, schema)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Effect {
    pub set: Selector,
    pub to: bool,
}

impl Effect {
    fn compile(rule: &str, spec: &EffectSpec) -> Result<Self, ConfigError> {
        Ok(Self {
            set: Selector::compile(rule, &spec.set)?,
            to: spec.to,
        })
    }
}

/// One executable rule.
#[derive(Debug, Clone)]
pub enum Rule {
    Canonicalize,
    MutualExclusion {
        name: String,
        members: Selector,
        priority: Vec<Regex>,
    },
    UnitFormat {
        name: String,
        keys: Vec<String>,
        unit: String,
        bands: Vec<Band>,
        contextual_units: Vec<ContextualUnit>,
    },
    Implication {
        name: String,
        when: Condition,
        then: Vec<Effect>,
    },
    ExactlyOne {
        name: String,
        members: Selector,
    },
}

impl Rule {
    pub fn compile(spec: &RuleSpec) -> Result<Self, ConfigError> {
        let name = spec.name();
        Ok(match spec {
            RuleSpec::Canonicalize => Rule::Canonicalize,
            RuleSpec::MutualExclusion { members, priority, .. } => Rule::MutualExclusion {
                name: name.to_string(),
                members: Selector::compile(name, members)?,
                priority: priority
                    .iter()
                    .map(|p| compile_regex(name, p))
                    .collect::<Result<_, _>>()?,
            },
            RuleSpec::UnitFormat {
                keys,
                unit,
                bands,
                contextual_units,
                ..
            } => Rule::UnitFormat {
                name: name.to_string(),
                keys: keys.clone(),
                unit: unit.clone(),
                bands: bands.clone(),
                contextual_units: contextual_units.clone(),
            },
            RuleSpec::Implication { when, then, .. } => Rule::Implication {
                name: name.to_string(),
                when: Condition::compile(name, when)?,
                then: then
                    .iter()
                    .map(|e| Effect::compile(name, e))
                    .collect::<Result<_, _>>()?,
            },
            RuleSpec::ExactlyOne { members, .. } => Rule::ExactlyOne {
                name: name.to_string(),
                members: Selector::compile(name, members)?,
            },
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Rule::Canonicalize => "canonicalize",
            Rule::MutualExclusion { name, .. }
            | Rule::UnitFormat { name, .. }
            | Rule::Implication { name, .. }
            | Rule::ExactlyOne { name, .. } => name,
        }
    }

    pub fn class(&self) -> RuleClass {
        match self {
            Rule::Canonicalize => RuleClass::Canonicalize,
            Rule::MutualExclusion { .. } => RuleClass::MutualExclusion,
            Rule::UnitFormat { .. } => RuleClass::UnitFormat,
            Rule::Implication { .. } => RuleClass::Implication,
            Rule::ExactlyOne { .. } => RuleClass::ExactlyOne,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, Value};

    fn schema() -> Schema {
        ["plc_ab_check", "plc_siemens_check", "plc_remote_check", "voltage", "hmi_10_check"]
            .iter()
            .map(|k| Field::new(*k, FieldKind::from_key(k, "_check")))
            .collect()
    }

    #[test]
    fn test_selector_keys_then_pattern() {
        let sel = Selector::compile(
            "t",
            &SelectorSpec {
                keys: vec!["hmi_10_check".to_string(), "missing_check".to_string(), "voltage".to_string()],
                pattern: Some("^plc_".to_string()),
                exclude: Some("remote".to_string()),
            },
        )
        .unwrap();
        assert_eq!(
            sel.resolve(&schema()),
            vec!["hmi_10_check", "plc_ab_check", "plc_siemens_check"]
        );
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let result = Selector::compile("broken", &SelectorSpec::pattern("(unclosed"));
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn test_conditions() {
        let schema = schema();
        let mut values = ValueMap::new();
        values.insert("plc_ab_check".to_string(), Value::Flag(true));
        values.insert("plc_siemens_check".to_string(), Value::Flag(true));
        values.insert("hmi_10_check".to_string(), Value::Flag(false));

        let at_least_two = Condition::compile(
            "t",
            &ConditionSpec::AtLeast {
                of: SelectorSpec::pattern("^plc_"),
                count: 2,
            },
        )
        .unwrap();
        assert!(at_least_two.holds(&values, &schema));

        let none_hmi = Condition::compile("t", &ConditionSpec::NoneTrue { of: SelectorSpec::keys(&["hmi_10_check"]) }).unwrap();
        assert!(none_hmi.holds(&values, &schema));

        let all = Condition::All(vec![at_least_two, Condition::IsTrue("hmi_10_check".to_string())]);
        assert!(!all.holds(&values, &schema));
    }

    #[test]
    fn test_rule_classes_order() {
        assert!(RuleClass::Canonicalize < RuleClass::MutualExclusion);
        assert!(RuleClass::UnitFormat < RuleClass::Implication);
        assert!(RuleClass::Implication < RuleClass::ExactlyOne);
    }
}
