//! Walks a template document and builds the field schema.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::document::{Grid, TemplateDocument};
use crate::patterns::{collapse_whitespace, contains_placeholder, find_placeholders, strip_placeholders};
use crate::types::{Field, FieldKind, Location, Schema, DEFAULT_SECTION};

use super::headers::{HeaderClassifier, HeuristicHeaders};

/// Grid first-column cells with at least this many words are not group labels.
const MAX_GROUP_LABEL_WORDS: usize = 4;

/// Section path in effect at some point of the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Context {
    section: String,
    subsection: String,
}

/// Infers a hierarchical field schema from a template document.
#[derive(Clone)]
pub struct SchemaExtractor {
    classifier: Arc<dyn HeaderClassifier>,
    boolean_suffix: String,
    default_section: String,
}

impl SchemaExtractor {
    pub fn new(boolean_suffix: impl Into<String>) -> Self {
        Self {
            classifier: Arc::new(HeuristicHeaders::new()),
            boolean_suffix: boolean_suffix.into(),
            default_section: DEFAULT_SECTION.to_string(),
        }
    }

    /// Replace the header heuristic.
    pub fn with_classifier(mut self, classifier: Arc<dyn HeaderClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_default_section(mut self, section: impl Into<String>) -> Self {
        self.default_section = section.into();
        self
    }

    pub fn boolean_suffix(&self) -> &str {
        &self.boolean_suffix
    }

    /// Extract every placeholder in the document as a field.
    ///
    /// Text blocks are scanned before grids, so a key seen in both keeps its
    /// text-block metadata. A document without placeholders yields an empty
    /// schema.
    pub fn extract(&self, doc: &TemplateDocument) -> Schema {
        let mut schema = Schema::new();
        let after_block = self.scan_blocks(doc, &mut schema);

        let last = after_block.last().cloned().unwrap_or_else(|| self.initial_context());
        for (grid_index, grid) in doc.grids.iter().enumerate() {
            let context = grid
                .anchor
                .and_then(|a| after_block.get(a))
                .unwrap_or(&last);
            self.scan_grid(grid_index, grid, context, &mut schema);
        }

        if schema.is_empty() {
            warn!("No placeholders found in template; nothing to process");
        } else {
            info!(
                fields = schema.len(),
                boolean = schema.boolean_fields().count(),
                "Extracted template schema"
            );
        }
        schema
    }

    fn initial_context(&self) -> Context {
        Context {
            section: self.default_section.clone(),
            subsection: String::new(),
        }
    }

    /// Scan text blocks, returning the context in effect after each block.
    fn scan_blocks(&self, doc: &TemplateDocument, schema: &mut Schema) -> Vec<Context> {
        let mut context = self.initial_context();
        let mut after_block = Vec::with_capacity(doc.blocks.len());

        for (index, block) in doc.blocks.iter().enumerate() {
            if self.classifier.is_section_header(block) {
                context.section = clean_label(&block.text);
                context.subsection.clear();
                debug!(section = %context.section, "Section header");
            } else if self.classifier.is_subsection_header(block) {
                context.subsection = clean_label(&block.text);
                debug!(subsection = %context.subsection, "Subsection header");
            } else {
                for line in block.text.lines() {
                    let mut previous_end = 0;
                    for found in find_placeholders(line) {
                        let label = block_label(line, previous_end, found.start, &found.key);
                        previous_end = found.end;
                        self.add_field(
                            schema,
                            &found.key,
                            label,
                            String::new(),
                            &context,
                            Location::Block { index },
                        );
                    }
                }
            }
            after_block.push(context.clone());
        }

        after_block
    }

    fn scan_grid(&self, grid_index: usize, grid: &Grid, context: &Context, schema: &mut Schema) {
        let mut group = String::new();

        for (row_index, row) in grid.rows.iter().enumerate() {
            if let Some(first) = row.first() {
                let first = first.trim();
                if is_group_label(first) {
                    let previous_first = row_index
                        .checked_sub(1)
                        .and_then(|r| grid.rows.get(r))
                        .and_then(|r| r.first())
                        .map(|c| c.trim());
                    if previous_first != Some(first) || group.is_empty() {
                        group = clean_label(first);
                    }
                }
            }

            for (column, cell) in row.iter().enumerate() {
                let cell = cell.trim();
                for found in find_placeholders(cell) {
                    let label = column
                        .checked_sub(1)
                        .and_then(|c| row.get(c))
                        .map(|c| c.trim())
                        .filter(|c| !contains_placeholder(c))
                        .map(clean_label)
                        .filter(|l| !l.is_empty())
                        .unwrap_or_else(|| {
                            let before = clean_label(&cell[..found.start]);
                            if before.is_empty() {
                                found.key.clone()
                            } else {
                                before
                            }
                        });
                    let table_group = if group == label {
                        String::new()
                    } else {
                        group.clone()
                    };
                    self.add_field(
                        schema,
                        &found.key,
                        label,
                        table_group,
                        context,
                        Location::Grid {
                            grid: grid_index,
                            row: row_index,
                            column,
                        },
                    );
                }
            }
        }
    }

    fn add_field(
        &self,
        schema: &mut Schema,
        key: &str,
        label: String,
        table_group: String,
        context: &Context,
        location: Location,
    ) {
        if schema.contains_key(key) {
            debug!(key, "Duplicate placeholder keeps first occurrence");
            return;
        }
        let mut field = Field::new(key, FieldKind::from_key(key, &self.boolean_suffix))
            .with_label(label)
            .with_path(context.section.clone(), context.subsection.clone());
        field.table_group = table_group;
        field.location = Some(location);
        debug!(key, section = %field.section, label = %field.label, "Discovered field");
        schema.insert(field);
    }
}

impl Default for SchemaExtractor {
    fn default() -> Self {
        Self::new("_check")
    }
}

impl std::fmt::Debug for SchemaExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaExtractor")
            .field("boolean_suffix", &self.boolean_suffix)
            .field("default_section", &self.default_section)
            .finish_non_exhaustive()
    }
}

/// Strip placeholders and colons, collapse whitespace.
fn clean_label(text: &str) -> String {
    collapse_whitespace(&strip_placeholders(text).replace(':', ""))
}

/// Label for a placeholder at `start` in `line`.
///
/// Prefers the text since the previous placeholder on the line, then the
/// whole preceding part of the line, then the key.
fn block_label(line: &str, previous_end: usize, start: usize, key: &str) -> String {
    let segment = clean_label(&line[previous_end..start]);
    if !segment.is_empty() {
        return segment;
    }
    let preceding = clean_label(&line[..start]);
    if !preceding.is_empty() {
        return preceding;
    }
    key.to_string()
}

fn is_group_label(cell: &str) -> bool {
    !cell.is_empty()
        && !contains_placeholder(cell)
        && cell.split_whitespace().count() < MAX_GROUP_LABEL_WORDS
}
