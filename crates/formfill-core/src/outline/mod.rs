//! Canonical outline parsing and schema reconciliation.

mod matcher;
mod parser;

pub use matcher::{
    slug, MatchReport, OutlineMatcher, OutlineOverride, OverrideTarget, DEFAULT_FUZZY_THRESHOLD,
};
pub use parser::{FieldHint, HintKind, Outline, OutlineEntry, OutlineSection, OutlineSubsection};
