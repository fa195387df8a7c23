//! Oracle briefing: the enriched schema shaped for a prompt.
//!
//! Fields are grouped by section and subsection in first-seen order. Large
//! forms are split into batches by configured field groups so each oracle
//! call sees a manageable slice.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::types::{Field, FieldKind, Schema};

/// Name of the batch collecting fields no group claims.
pub const OTHER_BATCH: &str = "Other";

/// A named set of keys, by prefix or exact key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldGroup {
    pub name: String,

    #[serde(default)]
    pub prefixes: Vec<String>,

    #[serde(default)]
    pub keys: Vec<String>,
}

impl FieldGroup {
    pub fn claims(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key) || self.prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }
}

/// What the oracle is told about one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefField {
    pub key: String,
    pub kind: FieldKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positive_indicators: Vec<String>,
}

impl From<&Field> for BriefField {
    fn from(field: &Field) -> Self {
        Self {
            key: field.key.clone(),
            kind: field.kind,
            description: field.description(),
            synonyms: field.synonyms.iter().cloned().collect(),
            positive_indicators: field.positive_indicators.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefSubsection {
    /// Empty for fields directly under the section
    pub name: String,
    pub fields: Vec<BriefField>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefSection {
    pub name: String,
    pub subsections: Vec<BriefSubsection>,
}

/// Keys to request in one oracle call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub name: String,
    pub keys: Vec<String>,
}

/// Sectioned view of a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleBrief {
    pub sections: Vec<BriefSection>,
}

impl OracleBrief {
    pub fn from_schema(schema: &Schema) -> Self {
        let mut sections: Vec<BriefSection> = Vec::new();

        for field in schema {
            let section = match sections.iter().position(|s| s.name == field.section) {
                Some(i) => &mut sections[i],
                None => {
                    sections.push(BriefSection {
                        name: field.section.clone(),
                        subsections: Vec::new(),
                    });
                    let last = sections.len() - 1;
                    &mut sections[last]
                }
            };
            let subsection = match section.subsections.iter().position(|s| s.name == field.subsection) {
                Some(i) => &mut section.subsections[i],
                None => {
                    section.subsections.push(BriefSubsection {
                        name: field.subsection.clone(),
                        fields: Vec::new(),
                    });
                    let last = section.subsections.len() - 1;
                    &mut section.subsections[last]
                }
            };
            subsection.fields.push(BriefField::from(field));
        }

        Self { sections }
    }

    pub fn field_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| &s.subsections)
            .map(|ss| ss.fields.len())
            .sum()
    }

    /// Plain-text rendering for prompts and terminals.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            let _ = writeln!(out, "## {}", section.name);
            for subsection in &section.subsections {
                let indent = if subsection.name.is_empty() {
                    ""
                } else {
                    let _ = writeln!(out, "### {}", subsection.name);
                    "  "
                };
                for field in &subsection.fields {
                    let _ = writeln!(out, "{}- {} ({}): {}", indent, field.key, field.kind, field.description);
                    if !field.synonyms.is_empty() {
                        let _ = writeln!(out, "{}    synonyms: {}", indent, field.synonyms.join(", "));
                    }
                    if !field.positive_indicators.is_empty() {
                        let _ = writeln!(out, "{}    look for: {}", indent, field.positive_indicators.join(", "));
                    }
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Split schema keys into batches, one per group that claims any key.
///
/// A key goes to the first group claiming it; unclaimed keys go to the
/// `Other` batch, which comes last. Keys keep schema order within a batch.
pub fn batches(schema: &Schema, groups: &[FieldGroup]) -> Vec<Batch> {
    let mut claimed: Vec<Vec<String>> = vec![Vec::new(); groups.len()];
    let mut other = Vec::new();

    for key in schema.keys() {
        match groups.iter().position(|g| g.claims(key)) {
            Some(i) => claimed[i].push(key.to_string()),
            None => other.push(key.to_string()),
        }
    }

    let mut batches: Vec<Batch> = groups
        .iter()
        .zip(claimed)
        .filter(|(_, keys)| !keys.is_empty())
        .map(|(group, keys)| Batch {
            name: group.name.clone(),
            keys,
        })
        .collect();
    if !other.is_empty() {
        batches.push(Batch {
            name: OTHER_BATCH.to_string(),
            keys: other,
        });
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        vec![
            Field::new("voltage", FieldKind::Text).with_path("Utility", ""),
            Field::new("plc_ab_check", FieldKind::Boolean)
                .with_label("Allen Bradley")
                .with_path("Control", "PLC"),
            Field::new("hz", FieldKind::Text).with_path("Utility", ""),
            Field::new("hmi_15_check", FieldKind::Boolean).with_path("Control", "HMI"),
            Field::new("plc_br_check", FieldKind::Boolean).with_path("Control", "PLC"),
            Field::new("mystery", FieldKind::Text).with_path("Misc", ""),
        ]
        .into()
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let brief = OracleBrief::from_schema(&schema());
        let names: Vec<&str> = brief.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Utility", "Control", "Misc"]);

        let control = &brief.sections[1];
        assert_eq!(control.subsections[0].name, "PLC");
        assert_eq!(control.subsections[0].fields.len(), 2);
        assert_eq!(control.subsections[1].name, "HMI");
        assert_eq!(brief.field_count(), 6);
    }

    #[test]
    fn test_text_rendering_mentions_every_key() {
        let text = OracleBrief::from_schema(&schema()).to_text();
        assert!(text.contains("## Control"));
        assert!(text.contains("### PLC"));
        assert!(text.contains("plc_ab_check (boolean): Allen Bradley"));
        assert!(text.contains("- voltage (text)"));
    }

    #[test]
    fn test_batches_by_prefix_and_key() {
        let groups = vec![
            FieldGroup {
                name: "Utility".to_string(),
                prefixes: vec![],
                keys: vec!["voltage".to_string(), "hz".to_string()],
            },
            FieldGroup {
                name: "Controls".to_string(),
                prefixes: vec!["plc_".to_string(), "hmi_".to_string()],
                keys: vec![],
            },
            FieldGroup {
                name: "Empty".to_string(),
                prefixes: vec!["nothing_".to_string()],
                keys: vec![],
            },
        ];
        let batches = batches(&schema(), &groups);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].keys, vec!["voltage", "hz"]);
        assert_eq!(batches[1].keys, vec!["plc_ab_check", "hmi_15_check", "plc_br_check"]);
        assert_eq!(batches[2].name, OTHER_BATCH);
        assert_eq!(batches[2].keys, vec!["mystery"]);
    }
}
