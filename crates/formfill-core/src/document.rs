//! Template document model.
//!
//! Binary formats are parsed elsewhere; this crate consumes the result as an
//! ordered list of styled text blocks plus zero or more text grids.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when loading a template document.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Failed to read template file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Grid {grid} anchors to block {anchor}, but the document has {blocks} blocks")]
    InvalidAnchor {
        grid: usize,
        anchor: usize,
        blocks: usize,
    },
}

/// Style attributes of a text block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStyle {
    #[serde(default)]
    pub bold: bool,

    /// Rendered in capitals regardless of the underlying text
    #[serde(default)]
    pub all_caps: bool,

    /// Uses a heading paragraph style
    #[serde(default)]
    pub heading: bool,
}

/// A styled run of text. May span several lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,

    #[serde(default)]
    pub style: BlockStyle,
}

impl TextBlock {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: BlockStyle::default(),
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: BlockStyle {
                bold: true,
                ..BlockStyle::default()
            },
        }
    }

    pub fn heading(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: BlockStyle {
                heading: true,
                ..BlockStyle::default()
            },
        }
    }
}

/// A 2-D region of text cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub rows: Vec<Vec<String>>,

    /// Index of the text block this grid follows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<usize>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<&str>>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(String::from).collect())
                .collect(),
            anchor: None,
        }
    }

    pub fn anchored(mut self, block: usize) -> Self {
        self.anchor = Some(block);
        self
    }
}

/// A template: text blocks in document order plus grids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDocument {
    #[serde(default)]
    pub blocks: Vec<TextBlock>,

    #[serde(default)]
    pub grids: Vec<Grid>,
}

impl TemplateDocument {
    pub fn new(blocks: Vec<TextBlock>, grids: Vec<Grid>) -> Self {
        Self { blocks, grids }
    }

    /// Parse a document model from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, DocumentError> {
        let doc: TemplateDocument = serde_yaml::from_str(yaml)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Parse a document model from JSON string.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let doc: TemplateDocument = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Load a document model, choosing the format from the file extension
    /// (`.yaml`/`.yml` is YAML, anything else JSON).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&contents),
            _ => Self::from_json(&contents),
        }
    }

    fn validate(&self) -> Result<(), DocumentError> {
        for (i, grid) in self.grids.iter().enumerate() {
            if let Some(anchor) = grid.anchor {
                if anchor >= self.blocks.len() {
                    return Err(DocumentError::InvalidAnchor {
                        grid: i,
                        anchor,
                        blocks: self.blocks.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_document() {
        let yaml = r#"
blocks:
  - text: "CONTROL"
    style: { bold: true }
  - text: "Voltage: {{voltage}}"
grids:
  - anchor: 0
    rows:
      - ["HMI", "10\"", "{{hmi_10_check}}"]
"#;
        let doc = TemplateDocument::from_yaml(yaml).unwrap();
        assert_eq!(doc.blocks.len(), 2);
        assert!(doc.blocks[0].style.bold);
        assert!(!doc.blocks[1].style.bold);
        assert_eq!(doc.grids[0].anchor, Some(0));
        assert_eq!(doc.grids[0].rows[0][2], "{{hmi_10_check}}");
    }

    #[test]
    fn test_anchor_out_of_range() {
        let json = r#"{"blocks": [], "grids": [{"rows": [], "anchor": 3}]}"#;
        let result = TemplateDocument::from_json(json);
        assert!(matches!(result, Err(DocumentError::InvalidAnchor { .. })));
    }

    #[test]
    fn test_empty_document_is_valid() {
        let doc = TemplateDocument::from_json("{}").unwrap();
        assert!(doc.blocks.is_empty());
        assert!(doc.grids.is_empty());
    }
}
