//! Domain configuration parsing and validation.
//!
//! Everything specific to one family of forms (synonyms, outline overrides,
//! consistency rules, batching groups) is data validated against JSON Schema.
//! This module parses YAML/JSON configuration and checks it.

mod parser;
mod schema;

pub use parser::{ConfigError, DomainConfig};
pub use schema::validate_config_schema;
