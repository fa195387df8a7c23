//! Canonical outline parsing.
//!
//! The outline is a line-oriented, indentation-based document:
//!
//! ```text
//! # Machine Order Form            <- title, ignored
//! ## Control                      <- section
//! - PLC                           <- subsection
//!   - Allen Bradley (checkbox)    <- boolean field hint
//!   - Model (text)                <- text field hint
//! - HMI
//!   - Size                        <- group, prefixes its children
//!     - 10" (checkbox)            <- hint named `Size - 10"`
//! - Explosion Proof (checkbox)    <- hint directly under the section
//! ```
//!
//! Parsing never fails; lines that fit none of these shapes are skipped.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::patterns::{ANNOTATION_PATTERN, TRAILING_PAREN_PATTERN};

/// Type annotation on an outline field hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintKind {
    Boolean,
    Text,
    Quantity,
}

/// A field the outline says should exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldHint {
    pub name: String,
    pub kind: HintKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineSubsection {
    pub name: String,
    pub fields: Vec<FieldHint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineSection {
    pub name: String,

    /// Hints listed directly under the section
    pub fields: Vec<FieldHint>,

    pub subsections: Vec<OutlineSubsection>,
}

/// Parsed outline tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    pub sections: Vec<OutlineSection>,
}

/// One matchable outline entry: a field hint or a subsection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub section: String,
    pub subsection: String,
    pub name: String,
    /// None for subsection entries
    pub kind: Option<HintKind>,
}

enum Annotation {
    Field(HintKind),
    Structural,
    None,
}

fn annotation(text: &str) -> Annotation {
    let Some(caps) = ANNOTATION_PATTERN.captures(text) else {
        return Annotation::None;
    };
    match caps.get(1).map(|m| m.as_str().to_lowercase()).as_deref() {
        Some("checkbox") => Annotation::Field(HintKind::Boolean),
        Some("text") => Annotation::Field(HintKind::Text),
        Some("qty") | Some("number") => Annotation::Field(HintKind::Quantity),
        _ => Annotation::Structural,
    }
}

fn clean_name(text: &str) -> String {
    TRAILING_PAREN_PATTERN.replace(text.trim(), "").trim().to_string()
}

fn indentation(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn bullet_content(trimmed: &str) -> Option<&str> {
    trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .map(str::trim)
}

impl Outline {
    /// Parse outline text.
    pub fn parse(content: &str) -> Self {
        let mut outline = Outline::default();
        // Open intermediate groups under the current subsection: (indent, name)
        let mut groups: Vec<(usize, String)> = Vec::new();
        let mut in_subsection = false;

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let indent = indentation(line);

            if let Some(title) = trimmed.strip_prefix("## ") {
                outline.open_section(clean_name(title));
                in_subsection = false;
                groups.clear();
                continue;
            }
            if let Some(title) = trimmed.strip_prefix("### ") {
                if let Some(section) = outline.sections.last_mut() {
                    section.subsections.push(OutlineSubsection {
                        name: clean_name(title),
                        fields: Vec::new(),
                    });
                    in_subsection = true;
                }
                groups.clear();
                continue;
            }
            if trimmed.starts_with('#') {
                continue;
            }

            let Some(content) = bullet_content(trimmed) else {
                if indent == 0 {
                    outline.open_section(clean_name(trimmed));
                    in_subsection = false;
                    groups.clear();
                }
                continue;
            };
            let name = clean_name(content);
            if name.is_empty() {
                continue;
            }
            let Some(section) = outline.sections.last_mut() else {
                continue;
            };

            if indent == 0 {
                groups.clear();
                match annotation(content) {
                    Annotation::Field(kind) => {
                        section.fields.push(FieldHint { name, kind });
                        in_subsection = false;
                    }
                    Annotation::Structural | Annotation::None => {
                        section.subsections.push(OutlineSubsection {
                            name,
                            fields: Vec::new(),
                        });
                        in_subsection = true;
                    }
                }
                continue;
            }

            while groups.last().is_some_and(|(i, _)| *i >= indent) {
                groups.pop();
            }
            match annotation(content) {
                Annotation::Field(kind) => {
                    let mut parts: Vec<&str> = groups.iter().map(|(_, g)| g.as_str()).collect();
                    parts.push(&name);
                    let hint = FieldHint {
                        name: parts.join(" - "),
                        kind,
                    };
                    match section.subsections.last_mut() {
                        Some(sub) if in_subsection => sub.fields.push(hint),
                        _ => section.fields.push(hint),
                    }
                }
                Annotation::Structural | Annotation::None => groups.push((indent, name)),
            }
        }

        outline
    }

    /// Read and parse an outline file.
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(Self::parse(&contents))
    }

    fn open_section(&mut self, name: String) {
        if name.is_empty() {
            return;
        }
        self.sections.push(OutlineSection {
            name,
            ..OutlineSection::default()
        });
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Every field hint and subsection, in document order.
    ///
    /// A subsection's entry precedes its hints.
    pub fn entries(&self) -> Vec<OutlineEntry> {
        let mut entries = Vec::new();
        for section in &self.sections {
            for hint in &section.fields {
                entries.push(OutlineEntry {
                    section: section.name.clone(),
                    subsection: String::new(),
                    name: hint.name.clone(),
                    kind: Some(hint.kind),
                });
            }
            for sub in &section.subsections {
                entries.push(OutlineEntry {
                    section: section.name.clone(),
                    subsection: sub.name.clone(),
                    name: sub.name.clone(),
                    kind: None,
                });
                for hint in &sub.fields {
                    entries.push(OutlineEntry {
                        section: section.name.clone(),
                        subsection: sub.name.clone(),
                        name: hint.name.clone(),
                        kind: Some(hint.kind),
                    });
                }
            }
        }
        entries
    }

    pub fn field_count(&self) -> usize {
        self.sections
            .iter()
            .map(|s| s.fields.len() + s.subsections.iter().map(|ss| ss.fields.len()).sum::<usize>())
            .sum()
    }
}
