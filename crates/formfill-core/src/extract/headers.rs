//! Header classification for text blocks.
//!
//! Extraction only asks two questions of a block: does it open a new section,
//! and does it open a new subsection. Both live behind `HeaderClassifier` so
//! explicit markup or a trained classifier can replace the heuristic without
//! touching the extraction walk.

use crate::document::TextBlock;
use crate::patterns::contains_placeholder;

/// Decides whether a text block is a structural header.
pub trait HeaderClassifier: Send + Sync {
    fn is_section_header(&self, block: &TextBlock) -> bool;

    fn is_subsection_header(&self, block: &TextBlock) -> bool;
}

/// Style-and-shape heuristic.
///
/// Section: fewer than 7 words and either upper-case text, all-caps style,
/// bold with fewer than half lowercase characters, or heading style.
/// Subsection: bold, fewer than 5 words, not upper-case, ends with a colon.
/// A block carrying a placeholder is never a header.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicHeaders {
    pub max_section_words: usize,
    pub max_subsection_words: usize,
}

impl HeuristicHeaders {
    pub fn new() -> Self {
        Self {
            max_section_words: 7,
            max_subsection_words: 5,
        }
    }

    /// Trimmed single-line text, or None if the block cannot be a header.
    fn candidate_text<'a>(&self, block: &'a TextBlock) -> Option<&'a str> {
        let text = block.text.trim();
        if text.is_empty() || text.contains('\n') || contains_placeholder(text) {
            return None;
        }
        Some(text)
    }
}

impl Default for HeuristicHeaders {
    fn default() -> Self {
        Self::new()
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Has at least one cased letter and no lowercase ones.
fn is_upper(text: &str) -> bool {
    text.chars().any(|c| c.is_alphabetic()) && !text.chars().any(|c| c.is_lowercase())
}

impl HeaderClassifier for HeuristicHeaders {
    fn is_section_header(&self, block: &TextBlock) -> bool {
        let Some(text) = self.candidate_text(block) else {
            return false;
        };
        if word_count(text) >= self.max_section_words {
            return false;
        }

        if is_upper(text) || block.style.all_caps || block.style.heading {
            return true;
        }

        if block.style.bold {
            let lowercase = text.chars().filter(|c| c.is_lowercase()).count();
            let total = text.chars().count();
            return lowercase * 2 < total;
        }

        false
    }

    fn is_subsection_header(&self, block: &TextBlock) -> bool {
        let Some(text) = self.candidate_text(block) else {
            return false;
        };
        block.style.bold
            && word_count(text) < self.max_subsection_words
            && !is_upper(text)
            && text.ends_with(':')
    }
}
