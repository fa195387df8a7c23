//! Template schema extraction.
//!
//! Turns a template document into a typed, hierarchical field schema:
//! section → subsection → field, each field a toggle or free text.

mod extractor;
mod headers;

pub use extractor::SchemaExtractor;
pub use headers::{HeaderClassifier, HeuristicHeaders};
