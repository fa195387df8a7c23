//! Core types for schema extraction and value finalization.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Section assigned to fields found before any section header.
pub const DEFAULT_SECTION: &str = "General";

/// Whether a field is a toggle or free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Selected / not selected, identified by the reserved key suffix
    Boolean,
    /// Arbitrary text, possibly empty
    Text,
}

impl FieldKind {
    /// Derive the kind from a key and the reserved boolean suffix.
    pub fn from_key(key: &str, boolean_suffix: &str) -> Self {
        if !boolean_suffix.is_empty() && key.ends_with(boolean_suffix) {
            FieldKind::Boolean
        } else {
            FieldKind::Text
        }
    }

    /// Default value for a field of this kind.
    pub fn default_value(&self) -> Value {
        match self {
            FieldKind::Boolean => Value::Flag(false),
            FieldKind::Text => Value::Text(String::new()),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Boolean => write!(f, "boolean"),
            FieldKind::Text => write!(f, "text"),
        }
    }
}

/// Where in the template a field was first discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Location {
    Block { index: usize },
    Grid { grid: usize, row: usize, column: usize },
}

/// Which rule last set a field's section path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSource {
    #[default]
    Template,
    OutlineExact,
    OutlineNormalized,
    DomainOverride,
    OutlineFuzzy,
}

/// One placeholder in the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Unique, case-sensitive key
    pub key: String,

    pub kind: FieldKind,

    pub section: String,

    #[serde(default)]
    pub subsection: String,

    /// Informal grouping label from a grid's first column
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub table_group: String,

    /// Short human-readable description (falls back to the key)
    pub label: String,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub synonyms: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub positive_indicators: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    #[serde(default)]
    pub path_source: PathSource,
}

impl Field {
    /// Create a field whose context is only its own key.
    pub fn new(key: impl Into<String>, kind: FieldKind) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            kind,
            section: DEFAULT_SECTION.to_string(),
            subsection: String::new(),
            table_group: String::new(),
            synonyms: BTreeSet::new(),
            positive_indicators: BTreeSet::new(),
            location: None,
            path_source: PathSource::Template,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_path(mut self, section: impl Into<String>, subsection: impl Into<String>) -> Self {
        self.section = section.into();
        self.subsection = subsection.into();
        self
    }

    pub fn is_boolean(&self) -> bool {
        self.kind == FieldKind::Boolean
    }

    /// Label joined with the table group, e.g. `10" - HMI`.
    pub fn description(&self) -> String {
        if self.table_group.is_empty() || self.table_group == self.label {
            self.label.clone()
        } else {
            format!("{} - {}", self.label, self.table_group)
        }
    }

    /// `Section - Subsection` path, skipping an empty subsection.
    pub fn path(&self) -> String {
        if self.subsection.is_empty() {
            self.section.clone()
        } else {
            format!("{} - {}", self.section, self.subsection)
        }
    }
}

/// Ordered mapping from key to field.
///
/// Keeps first-discovery order and never overwrites an existing key.
/// Serializes as a JSON array of fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Field>", into = "Vec<Field>")]
pub struct Schema {
    fields: Vec<Field>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field. Returns false (and leaves the schema untouched) if the
    /// key is already present.
    pub fn insert(&mut self, field: Field) -> bool {
        if self.index.contains_key(&field.key) {
            return false;
        }
        self.index.insert(field.key.clone(), self.fields.len());
        self.fields.push(field);
        true
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.index.get(key).map(|&i| &self.fields[i])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }

    /// Boolean fields in discovery order.
    pub fn boolean_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_boolean())
    }

    pub fn kind_of(&self, key: &str) -> Option<FieldKind> {
        self.get(key).map(|f| f.kind)
    }

    /// Mutable access for in-crate enrichment. Keys must not be changed.
    pub(crate) fn fields_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.fields.iter_mut()
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    /// Value map with every key set to its kind's default.
    pub fn default_values(&self) -> ValueMap {
        self.fields
            .iter()
            .map(|f| (f.key.clone(), f.kind.default_value()))
            .collect()
    }
}

impl From<Vec<Field>> for Schema {
    fn from(fields: Vec<Field>) -> Self {
        fields.into_iter().collect()
    }
}

impl From<Schema> for Vec<Field> {
    fn from(schema: Schema) -> Self {
        schema.fields
    }
}

impl FromIterator<Field> for Schema {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let mut schema = Schema::new();
        for field in iter {
            schema.insert(field);
        }
        schema
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// A proposed or final field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Flag(bool),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Convert a raw oracle JSON value.
    ///
    /// Booleans become flags; strings stay text; numbers keep their textual
    /// form; null becomes empty text. Arrays and objects are kept as their
    /// JSON text so nothing is lost.
    pub fn from_json(raw: &serde_json::Value) -> Self {
        match raw {
            serde_json::Value::Bool(b) => Value::Flag(*b),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Number(n) => Value::Text(n.to_string()),
            serde_json::Value::Null => Value::Text(String::new()),
            other => Value::Text(other.to_string()),
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Value::Flag(b) => Some(*b),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Flag(_) => None,
        }
    }

    /// True only for `Flag(true)`.
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Flag(true))
    }

    /// Form handed to the rendering collaborator: flags as `YES`/`NO`.
    pub fn render(&self) -> String {
        match self {
            Value::Flag(true) => "YES".to_string(),
            Value::Flag(false) => "NO".to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Flag(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// Mapping from key to value, ordered by key.
pub type ValueMap = BTreeMap<String, Value>;

/// Raw oracle response before conversion.
pub type RawValueMap = serde_json::Map<String, serde_json::Value>;
