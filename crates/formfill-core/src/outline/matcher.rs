//! Cross-references a schema against the canonical outline.
//!
//! Outline and template are authored independently, so names rarely line up
//! exactly. Each field is tried against four rules in order and the first hit
//! wins: exact alias, normalized alias, configured override, fuzzy token
//! overlap. Fuzzy matching runs last so it never masks a better match.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::types::{Field, PathSource, Schema};

use super::parser::{HintKind, Outline, OutlineEntry};

/// Fuzzy matches must score strictly above this.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.5;

/// Shortest token that may match a longer one by prefix.
const MIN_PREFIX_LEN: usize = 3;

/// Where an override sends a matching field, resolved against the outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideTarget {
    pub section: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsection: Option<String>,

    /// Field hint that must exist under the target for the override to apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Hand-authored mapping for a known ambiguous abbreviation.
///
/// Applies to a key when every `all_of` pattern and at least one `any_of`
/// pattern (if any are given) match the key's tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineOverride {
    pub name: String,

    #[serde(default)]
    pub all_of: Vec<String>,

    #[serde(default)]
    pub any_of: Vec<String>,

    pub target: OverrideTarget,
}

impl OutlineOverride {
    /// Whether this override applies to a key stem.
    pub fn matches(&self, stem: &str) -> bool {
        let joined = stem.to_lowercase();
        let tokens = tokenize(&joined);
        if self.all_of.is_empty() && self.any_of.is_empty() {
            return false;
        }
        self.all_of.iter().all(|p| pattern_matches(p, &tokens, &joined))
            && (self.any_of.is_empty()
                || self.any_of.iter().any(|p| pattern_matches(p, &tokens, &joined)))
    }
}

/// A plain pattern matches a token equal to it or starting with it. A pattern
/// with digits also matches a token that is letters followed by it (`10`
/// matches `hmi10`). A pattern with `_` is matched against the whole stem.
fn pattern_matches(pattern: &str, tokens: &BTreeSet<String>, joined: &str) -> bool {
    let pattern = pattern.to_lowercase();
    if pattern.contains('_') {
        return joined.contains(&pattern);
    }
    let has_digit = pattern.chars().any(|c| c.is_ascii_digit());
    tokens.iter().any(|t| {
        if t.starts_with(&pattern) {
            return true;
        }
        has_digit
            && t.len() > pattern.len()
            && t.ends_with(&pattern)
            && t[..t.len() - pattern.len()].chars().all(|c| c.is_alphabetic())
    })
}

/// Per-rule counts from one reconcile run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    pub exact: usize,
    pub normalized: usize,
    pub overrides: usize,
    pub fuzzy: usize,
    pub unmatched: usize,
}

impl MatchReport {
    pub fn enhanced(&self) -> usize {
        self.exact + self.normalized + self.overrides + self.fuzzy
    }

    pub fn total(&self) -> usize {
        self.enhanced() + self.unmatched
    }

    fn record(&mut self, source: Option<PathSource>) {
        match source {
            Some(PathSource::OutlineExact) => self.exact += 1,
            Some(PathSource::OutlineNormalized) => self.normalized += 1,
            Some(PathSource::DomainOverride) => self.overrides += 1,
            Some(PathSource::OutlineFuzzy) => self.fuzzy += 1,
            Some(PathSource::Template) | None => self.unmatched += 1,
        }
    }
}

/// Upgrades field section paths from the outline.
#[derive(Debug, Clone)]
pub struct OutlineMatcher {
    boolean_suffix: String,
    overrides: Vec<OutlineOverride>,
    threshold: f64,
}

/// Lookup tables built once per reconcile run.
struct OutlineIndex<'a> {
    entries: Vec<OutlineEntry>,
    exact: HashMap<String, usize>,
    normalized: HashMap<String, usize>,
    tokens: Vec<BTreeSet<String>>,
    overrides: Vec<(&'a OutlineOverride, (String, String))>,
}

impl OutlineMatcher {
    pub fn new(boolean_suffix: impl Into<String>, overrides: Vec<OutlineOverride>) -> Self {
        Self {
            boolean_suffix: boolean_suffix.into(),
            overrides,
            threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn overrides(&self) -> &[OutlineOverride] {
        &self.overrides
    }

    /// Reconcile and discard the report.
    pub fn reconcile(&self, schema: Schema, outline: &Outline) -> Schema {
        self.reconcile_with_report(schema, outline).0
    }

    /// Upgrade each field's section path. Never adds or removes a field and
    /// never changes a kind; unmatched fields keep their extracted path.
    pub fn reconcile_with_report(&self, mut schema: Schema, outline: &Outline) -> (Schema, MatchReport) {
        let mut report = MatchReport::default();

        if outline.is_empty() {
            warn!("Outline has no sections; keeping extracted paths");
            report.unmatched = schema.len();
            return (schema, report);
        }

        let index = self.build_index(outline);
        for field in schema.fields_mut() {
            let found = self.match_field(field, &index);
            report.record(found.as_ref().map(|(source, _)| *source));
            if let Some((source, (section, subsection))) = found {
                debug!(
                    key = %field.key,
                    from = %field.path(),
                    section = %section,
                    subsection = %subsection,
                    ?source,
                    "Outline match"
                );
                field.section = section;
                field.subsection = subsection;
                field.path_source = source;
            }
        }

        info!(
            exact = report.exact,
            normalized = report.normalized,
            overrides = report.overrides,
            fuzzy = report.fuzzy,
            unmatched = report.unmatched,
            "Reconciled schema with outline"
        );
        (schema, report)
    }

    fn stem<'k>(&self, key: &'k str) -> &'k str {
        if self.boolean_suffix.is_empty() {
            return key;
        }
        key.strip_suffix(self.boolean_suffix.as_str()).unwrap_or(key)
    }

    fn normalize(&self, key: &str) -> String {
        let lower = key.to_lowercase();
        let suffix = self.boolean_suffix.to_lowercase();
        let stem = if suffix.is_empty() {
            lower.as_str()
        } else {
            lower.strip_suffix(suffix.as_str()).unwrap_or(&lower)
        };
        stem.chars().filter(|c| c.is_alphanumeric()).collect()
    }

    fn build_index<'a>(&'a self, outline: &Outline) -> OutlineIndex<'a> {
        let entries = outline.entries();
        let mut exact = HashMap::new();
        let mut normalized = HashMap::new();
        let mut tokens = Vec::with_capacity(entries.len());

        for (i, entry) in entries.iter().enumerate() {
            for alias in self.aliases(entry) {
                normalized.entry(self.normalize(&alias)).or_insert(i);
                exact.entry(alias).or_insert(i);
            }
            tokens.push(tokenize(&format!("{} {}", entry.subsection, entry.name)));
        }

        let overrides = self
            .overrides
            .iter()
            .filter_map(|o| match resolve_target(&o.target, outline) {
                Some(path) => Some((o, path)),
                None => {
                    debug!(name = %o.name, "Override target not in outline; skipped");
                    None
                }
            })
            .collect();

        OutlineIndex {
            entries,
            exact,
            normalized,
            tokens,
            overrides,
        }
    }

    /// Slug of the name and of `subsection name`, plus suffixed forms for
    /// boolean hints.
    fn aliases(&self, entry: &OutlineEntry) -> Vec<String> {
        let mut aliases = vec![slug(&entry.name)];
        if !entry.subsection.is_empty() && entry.subsection != entry.name {
            aliases.push(slug(&format!("{} {}", entry.subsection, entry.name)));
        }
        if entry.kind == Some(HintKind::Boolean) {
            let suffixed: Vec<String> = aliases
                .iter()
                .map(|a| format!("{}{}", a, self.boolean_suffix))
                .collect();
            aliases.extend(suffixed);
        }
        aliases.retain(|a| !a.is_empty());
        aliases
    }

    fn match_field(&self, field: &Field, index: &OutlineIndex<'_>) -> Option<(PathSource, (String, String))> {
        let path_of = |i: usize| {
            let e = &index.entries[i];
            (e.section.clone(), e.subsection.clone())
        };

        if let Some(&i) = index.exact.get(field.key.as_str()) {
            return Some((PathSource::OutlineExact, path_of(i)));
        }

        let normalized = self.normalize(&field.key);
        if !normalized.is_empty() {
            if let Some(&i) = index.normalized.get(&normalized) {
                return Some((PathSource::OutlineNormalized, path_of(i)));
            }
        }

        let stem = self.stem(&field.key);
        if let Some((_, path)) = index.overrides.iter().find(|(o, _)| o.matches(stem)) {
            return Some((PathSource::DomainOverride, path.clone()));
        }

        let key_tokens = tokenize(&stem.to_lowercase());
        let mut best: Option<(f64, usize)> = None;
        for (i, entry_tokens) in index.tokens.iter().enumerate() {
            let score = overlap_ratio(&key_tokens, entry_tokens);
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, i));
            }
        }
        match best {
            Some((score, i)) if score > self.threshold => Some((PathSource::OutlineFuzzy, path_of(i))),
            _ => None,
        }
    }
}

impl Default for OutlineMatcher {
    fn default() -> Self {
        Self::new("_check", Vec::new())
    }
}

/// Lower-case, `&` → `and`, quotes dropped, other punctuation and whitespace
/// → `_`, runs of `_` collapsed.
pub fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.to_lowercase().replace('&', "and").chars() {
        if c == '"' || c == '\'' {
            continue;
        }
        if c.is_alphanumeric() || c == '.' {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// Lower-cased alphanumeric runs.
fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn tokens_equivalent(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.len() >= MIN_PREFIX_LEN && long.starts_with(short)
}

/// `|intersection| / max(|a|, |b|)` under prefix equivalence.
fn overlap_ratio(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let denominator = a.len().max(b.len());
    if denominator == 0 {
        return 0.0;
    }
    let shared = a
        .iter()
        .filter(|ta| b.iter().any(|tb| tokens_equivalent(ta, tb)))
        .count();
    shared as f64 / denominator as f64
}

fn squash(text: &str) -> String {
    text.to_lowercase().chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Outline name equal to the wanted name, else the first containing it.
fn find_named<'o, T>(items: &'o [T], name_of: impl Fn(&T) -> &str, wanted: &str) -> Option<&'o T> {
    let wanted = squash(wanted);
    if wanted.is_empty() {
        return None;
    }
    items
        .iter()
        .find(|item| squash(name_of(item)) == wanted)
        .or_else(|| items.iter().find(|item| squash(name_of(item)).contains(&wanted)))
}

/// Resolve an override target to an outline `(section, subsection)` path.
fn resolve_target(target: &OverrideTarget, outline: &Outline) -> Option<(String, String)> {
    let section = find_named(&outline.sections, |s| s.name.as_str(), &target.section)?;

    match &target.subsection {
        Some(wanted) => {
            let sub = find_named(&section.subsections, |s| s.name.as_str(), wanted)?;
            if let Some(field) = &target.field {
                find_named(&sub.fields, |f| f.name.as_str(), field)?;
            }
            Some((section.name.clone(), sub.name.clone()))
        }
        None => {
            if let Some(field) = &target.field {
                find_named(&section.fields, |f| f.name.as_str(), field)?;
            }
            Some((section.name.clone(), String::new()))
        }
    }
}
