//! Domain configuration parsing from YAML/JSON.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::brief::FieldGroup;
use crate::outline::OutlineOverride;
use crate::rules::{Rule, RuleSpec, TokenConfig};
use crate::types::DEFAULT_SECTION;
use crate::validation::AdvisoryConfig;

use super::schema::validate_config_schema;

/// Configuration shipped with the crate.
const BUILTIN_CONFIG: &str = include_str!("../../../../config/domain.yaml");

/// Errors that can occur when loading domain configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration does not match schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Invalid pattern {pattern:?} in {rule}: {reason}")]
    InvalidPattern {
        rule: String,
        pattern: String,
        reason: String,
    },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

fn default_boolean_suffix() -> String {
    "_check".to_string()
}

fn default_section() -> String {
    DEFAULT_SECTION.to_string()
}

/// Everything domain-specific: vocabulary, overrides, rules and batching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Version of this configuration
    pub version: String,

    /// Key suffix marking Boolean fields
    #[serde(default = "default_boolean_suffix")]
    pub boolean_suffix: String,

    /// Section for fields seen before any header
    #[serde(default = "default_section")]
    pub default_section: String,

    #[serde(default)]
    pub tokens: TokenConfig,

    /// Domain term to alternative phrasings
    #[serde(default)]
    pub synonyms: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub outline_overrides: Vec<OutlineOverride>,

    #[serde(default)]
    pub rules: Vec<RuleSpec>,

    /// Oracle batching groups, first match wins
    #[serde(default)]
    pub field_groups: Vec<FieldGroup>,

    #[serde(default)]
    pub advisories: AdvisoryConfig,

    /// Clear true Boolean answers even for fields with no indicators
    #[serde(default)]
    pub strict_evidence: bool,
}

impl DomainConfig {
    /// The configuration embedded at build time.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(BUILTIN_CONFIG)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a file, choosing the format by extension (`.json` or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_file(path),
            _ => Self::from_yaml_file(path),
        }
    }

    fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        validate_config_schema(&value).map_err(ConfigError::SchemaViolation)?;
        let config: DomainConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Semantic checks the schema cannot express.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.boolean_suffix.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "boolean_suffix must not be empty".to_string(),
            ));
        }

        self.validate_unique_names()?;
        self.validate_tokens()?;

        for rule in &self.rules {
            Rule::compile(rule)?;
            if let RuleSpec::UnitFormat { name, bands, .. } = rule {
                if let Some(band) = bands.iter().find(|b| b.min >= b.max) {
                    return Err(ConfigError::ValidationError(format!(
                        "Band {:?} in {} has min >= max",
                        band.label, name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Rule, override and field group names are unique within their lists.
    fn validate_unique_names(&self) -> Result<(), ConfigError> {
        fn first_duplicate<'a>(names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
            let mut seen = HashSet::new();
            names.into_iter().find(|n| !seen.insert(*n))
        }

        let rule_names = self
            .rules
            .iter()
            .filter(|r| !matches!(r, RuleSpec::Canonicalize))
            .map(RuleSpec::name);
        if let Some(name) = first_duplicate(rule_names) {
            return Err(ConfigError::ValidationError(format!("Duplicate rule name: {}", name)));
        }

        if let Some(name) = first_duplicate(self.outline_overrides.iter().map(|o| o.name.as_str())) {
            return Err(ConfigError::ValidationError(format!(
                "Duplicate outline override name: {}",
                name
            )));
        }

        if let Some(name) = first_duplicate(self.field_groups.iter().map(|g| g.name.as_str())) {
            return Err(ConfigError::ValidationError(format!(
                "Duplicate field group name: {}",
                name
            )));
        }

        Ok(())
    }

    /// No token may be both affirmative and negative.
    fn validate_tokens(&self) -> Result<(), ConfigError> {
        let affirmative: HashSet<String> = self
            .tokens
            .affirmative
            .iter()
            .map(|t| t.trim().to_lowercase())
            .collect();
        if let Some(token) = self
            .tokens
            .negative
            .iter()
            .find(|t| affirmative.contains(&t.trim().to_lowercase()))
        {
            return Err(ConfigError::ValidationError(format!(
                "Token {:?} is both affirmative and negative",
                token
            )));
        }
        Ok(())
    }
}
