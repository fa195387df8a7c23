//! Rule interpreter.
//!
//! Runs the compiled rule table over a proposed value map in fixed class
//! order, repeating whole passes until one makes no change. The result is a
//! fixed point: applying the engine to its own output changes nothing.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::patterns::is_numeric;
use crate::types::{FieldKind, Schema, Value, ValueMap};

use super::rule::{Rule, RuleClass};
use super::table::{Band, ContextualUnit, RuleSpec, TokenConfig};

/// Upper bound on passes before giving up on convergence.
pub const MAX_PASSES: usize = 8;

/// Recognized affirmative and negative Boolean tokens.
#[derive(Debug, Clone)]
pub struct TokenSet {
    affirmative: HashSet<String>,
    negative: HashSet<String>,
}

impl TokenSet {
    pub fn from_config(config: &TokenConfig) -> Self {
        Self {
            affirmative: normalize_tokens(&config.affirmative),
            negative: normalize_tokens(&config.negative),
        }
    }

    /// `Some(true)` / `Some(false)` for a recognized token, `None` otherwise.
    pub fn classify(&self, raw: &str) -> Option<bool> {
        let token = raw.trim().to_lowercase();
        if self.affirmative.contains(&token) {
            Some(true)
        } else if self.negative.contains(&token) {
            Some(false)
        } else {
            None
        }
    }
}

fn normalize_tokens(tokens: &[String]) -> HashSet<String> {
    tokens.iter().map(|t| t.trim().to_lowercase()).collect()
}

impl Default for TokenSet {
    fn default() -> Self {
        Self::from_config(&TokenConfig::default())
    }
}

/// One value change made by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub rule: String,
    pub key: String,
    /// None when the key was absent from the proposal
    pub before: Option<Value>,
    pub after: Value,
}

/// Result of `apply_with_trace`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub values: ValueMap,
    pub corrections: Vec<Correction>,
    pub passes: usize,
    pub converged: bool,
}

/// Mutable state of one run.
struct Run<'a> {
    values: ValueMap,
    corrections: &'a mut Vec<Correction>,
}

impl Run<'_> {
    fn set(&mut self, rule: &str, key: &str, after: Value) -> bool {
        let before = self.values.get(key);
        if before == Some(&after) {
            return false;
        }
        debug!(rule, key, ?before, after = %after, "Correction");
        self.corrections.push(Correction {
            rule: rule.to_string(),
            key: key.to_string(),
            before: before.cloned(),
            after: after.clone(),
        });
        self.values.insert(key.to_string(), after);
        true
    }

    fn is_true(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(Value::is_true)
    }
}

/// Validates and repairs proposed values against the domain rule table.
#[derive(Debug, Clone)]
pub struct ConsistencyEngine {
    rules: Vec<Rule>,
    tokens: TokenSet,
}

impl ConsistencyEngine {
    /// Order rules by class, keeping declaration order within a class.
    /// Canonicalization is added when not declared.
    pub fn new(mut rules: Vec<Rule>, tokens: TokenSet) -> Self {
        if !rules.iter().any(|r| r.class() == RuleClass::Canonicalize) {
            rules.insert(0, Rule::Canonicalize);
        }
        rules.sort_by_key(Rule::class);
        Self { rules, tokens }
    }

    /// Compile a declarative rule table.
    pub fn from_specs(specs: &[RuleSpec], tokens: &TokenConfig) -> Result<Self, ConfigError> {
        let rules = specs.iter().map(Rule::compile).collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules, TokenSet::from_config(tokens)))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    /// Corrected, internally consistent values covering every schema key.
    pub fn apply(&self, values: &ValueMap, schema: &Schema) -> ValueMap {
        self.apply_with_trace(values, schema).values
    }

    /// Like `apply`, also returning every correction made.
    pub fn apply_with_trace(&self, values: &ValueMap, schema: &Schema) -> Trace {
        let mut corrections = Vec::new();
        let mut run = Run {
            values: values.clone(),
            corrections: &mut corrections,
        };

        let mut passes = 0;
        let mut converged = false;
        while passes < MAX_PASSES {
            passes += 1;
            if !self.pass(&mut run, schema) {
                converged = true;
                break;
            }
        }
        if !converged {
            warn!(passes, "Rule table did not reach a fixed point");
        }

        let values = run.values;
        if !corrections.is_empty() {
            info!(corrections = corrections.len(), passes, "Applied consistency rules");
        }
        Trace {
            values,
            corrections,
            passes,
            converged,
        }
    }

    /// One ordered pass over every rule. Returns whether anything changed.
    fn pass(&self, run: &mut Run<'_>, schema: &Schema) -> bool {
        let mut changed = false;
        for rule in &self.rules {
            changed |= match rule {
                Rule::Canonicalize => self.canonicalize(run, schema),
                Rule::MutualExclusion {
                    name,
                    members,
                    priority,
                } => {
                    let members = members.resolve(schema);
                    let on: Vec<&String> = members.iter().filter(|k| run.is_true(k)).collect();
                    if on.len() > 1 {
                        let winner = priority
                            .iter()
                            .find_map(|re| on.iter().find(|k| re.is_match(k)))
                            .or_else(|| on.first())
                            .map(|k| k.to_string());
                        debug!(group = %name, ?winner, "Resolving mutual exclusion");
                        keep_only(run, name, &members, winner.as_deref())
                    } else {
                        false
                    }
                }
                Rule::UnitFormat {
                    name,
                    keys,
                    unit,
                    bands,
                    contextual_units,
                } => {
                    let unit = contextual_unit(contextual_units, schema).unwrap_or(unit);
                    let mut any = false;
                    for key in keys {
                        let formatted = match run.values.get(key) {
                            Some(Value::Text(raw)) if is_numeric(raw) => format_number(raw, unit, bands),
                            _ => continue,
                        };
                        any |= run.set(name, key, Value::Text(formatted));
                    }
                    any
                }
                Rule::Implication { name, when, then } => {
                    if when.holds(&run.values, schema) {
                        let mut any = false;
                        for effect in then {
                            for key in effect.set.resolve(schema) {
                                any |= run.set(name, &key, Value::Flag(effect.to));
                            }
                        }
                        any
                    } else {
                        false
                    }
                }
                Rule::ExactlyOne { name, members } => {
                    let members = members.resolve(schema);
                    let on: Vec<&String> = members.iter().filter(|k| run.is_true(k)).collect();
                    if on.len() > 1 {
                        let kept = on[0].clone();
                        warn!(
                            group = %name,
                            kept = %kept,
                            candidates = on.len(),
                            "Several candidates selected; keeping the first in declared order"
                        );
                        keep_only(run, name, &members, Some(kept.as_str()))
                    } else {
                        false
                    }
                }
            };
        }
        changed
    }

    /// Coerce every schema value to its kind's accepted form and fill absent
    /// keys with defaults. Unrecognized Boolean tokens become false.
    fn canonicalize(&self, run: &mut Run<'_>, schema: &Schema) -> bool {
        let mut changed = false;
        for field in schema.iter() {
            let replacement = match (field.kind, run.values.get(&field.key)) {
                (kind, None) => kind.default_value(),
                (FieldKind::Boolean, Some(Value::Text(raw))) => match self.tokens.classify(raw) {
                    Some(flag) => Value::Flag(flag),
                    None => {
                        debug!(key = %field.key, raw = %raw, "Unrecognized boolean token; defaulting to false");
                        Value::Flag(false)
                    }
                },
                (FieldKind::Text, Some(Value::Flag(flag))) => Value::Text(Value::Flag(*flag).render()),
                _ => continue,
            };
            changed |= run.set("canonicalize", &field.key, replacement);
        }
        changed
    }
}

impl Default for ConsistencyEngine {
    fn default() -> Self {
        Self::new(Vec::new(), TokenSet::default())
    }
}

/// Set every member false except `winner`.
fn keep_only(run: &mut Run<'_>, rule: &str, members: &[String], winner: Option<&str>) -> bool {
    let mut changed = false;
    for key in members {
        if Some(key.as_str()) != winner && run.is_true(key) {
            changed |= run.set(rule, key, Value::Flag(false));
        }
    }
    changed
}

/// Unit of the first contextual entry whose fragment appears in a schema key.
fn contextual_unit<'a>(units: &'a [ContextualUnit], schema: &Schema) -> Option<&'a String> {
    units
        .iter()
        .find(|u| {
            let fragment = u.key_contains.to_lowercase();
            schema.keys().any(|k| k.to_lowercase().contains(&fragment))
        })
        .map(|u| &u.unit)
}

/// Band label for a number inside a band, else the number with its unit.
fn format_number(raw: &str, unit: &str, bands: &[Band]) -> String {
    let trimmed = raw.trim();
    if let Ok(number) = trimmed.parse::<f64>() {
        if let Some(band) = bands.iter().find(|b| b.contains(number)) {
            return band.label.clone();
        }
    }
    format!("{}{}", trimmed, unit)
}
