//! Evidence the oracle read, and the check that Boolean answers are grounded
//! in it.
//!
//! A field the oracle marked true is kept only when at least one of its
//! positive indicators appears in the evidence text or in the selected items.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::rules::Correction;
use crate::types::{Schema, Value, ValueMap};

/// Rule name recorded on corrections made by the verifier.
pub const EVIDENCE_RULE: &str = "evidence";

/// Source material the oracle answered from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Free text, such as the extracted quote body
    pub text: String,

    /// Explicitly selected line items
    #[serde(default)]
    pub items: Vec<String>,
}

impl Evidence {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            items: Vec::new(),
        }
    }

    pub fn with_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items.extend(items.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.items.iter().all(|i| i.trim().is_empty())
    }

    /// Lowercased text and items, newline separated.
    pub(crate) fn haystack(&self) -> String {
        let mut haystack = self.text.to_lowercase();
        for item in &self.items {
            haystack.push('\n');
            haystack.push_str(&item.to_lowercase());
        }
        haystack
    }
}

/// Flips true Boolean answers that no indicator supports.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvidenceVerifier {
    strict: bool,
}

impl EvidenceVerifier {
    pub fn new() -> Self {
        Self { strict: false }
    }

    /// In strict mode a true field with no indicators is cleared too.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Returns the verified map and the flips made.
    ///
    /// Unless strict, fields without positive indicators are left as proposed.
    pub fn verify(&self, values: &ValueMap, schema: &Schema, evidence: &Evidence) -> (ValueMap, Vec<Correction>) {
        let haystack = evidence.haystack();
        let mut verified = values.clone();
        let mut corrections = Vec::new();

        for field in schema.boolean_fields() {
            if field.positive_indicators.is_empty() && !self.strict {
                continue;
            }
            let Some(value) = values.get(&field.key).filter(|v| v.is_true()) else {
                continue;
            };

            let supported = field
                .positive_indicators
                .iter()
                .map(|i| i.trim().to_lowercase())
                .filter(|i| !i.is_empty())
                .find(|i| haystack.contains(i.as_str()));

            match supported {
                Some(indicator) => debug!(key = %field.key, %indicator, "Evidence supports field"),
                None => {
                    debug!(key = %field.key, "No indicator in evidence; clearing");
                    corrections.push(Correction {
                        rule: EVIDENCE_RULE.to_string(),
                        key: field.key.clone(),
                        before: Some(value.clone()),
                        after: Value::Flag(false),
                    });
                    verified.insert(field.key.clone(), Value::Flag(false));
                }
            }
        }

        info!(cleared = corrections.len(), "Verified Boolean answers against evidence");
        (verified, corrections)
    }
}
