//! # formfill-core
//!
//! Turns a placeholder template into a typed schema, places each field in the
//! canonical outline of the form, and repairs an oracle's proposed answers
//! against a declarative domain rule table.
//!
//! ## Pipeline
//!
//! 1. **Extract**: every `{{ key }}` in the template becomes a [`Field`] with
//!    a kind, a section path and a label.
//! 2. **Reconcile**: fields are moved to their outline location when one can
//!    be found; unmatched fields keep the extracted path.
//! 3. **Annotate**: Boolean fields get synonyms and positive indicators.
//! 4. **Propose**: an external [`Oracle`] answers from the evidence.
//! 5. **Finalize**: the [`ConsistencyEngine`] canonicalizes and corrects the
//!    answers, the [`EvidenceVerifier`] clears unsupported selections, and
//!    the engine runs once more so the result is a fixed point. Each final
//!    value is then scored for confidence.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same template, outline and answers give the same
//!    output
//! 2. **Covering**: the final map has exactly one value per schema key
//! 3. **Never fails on messy input**: only configuration files, template
//!    files and the oracle can produce errors
//!
//! ## Example
//!
//! ```rust,ignore
//! use formfill_core::{Domain, Evidence, Outline, TemplateDocument};
//!
//! let domain = Domain::builtin()?;
//! let template = TemplateDocument::from_file("order_form.yaml")?;
//! let outline = Outline::from_file("outline.md")?;
//! let (schema, _report) = domain.build_schema(&template, Some(&outline));
//!
//! let evidence = Evidence::text(quote_text);
//! let report = domain.fill(&my_oracle, &schema, &evidence)?;
//! for (key, value) in report.rendered() {
//!     println!("{key} = {value}");
//! }
//! ```

pub mod brief;
pub mod confidence;
pub mod config;
pub mod document;
pub mod evidence;
pub mod extract;
pub mod oracle;
pub mod outline;
pub mod patterns;
pub mod rules;
pub mod synonyms;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use brief::{batches, Batch, FieldGroup, OracleBrief};
pub use confidence::{ConfidenceEstimator, ConfidenceLevel, FieldConfidence, ValueSource};
pub use config::{ConfigError, DomainConfig};
pub use document::{DocumentError, Grid, TemplateDocument, TextBlock};
pub use evidence::{Evidence, EvidenceVerifier};
pub use extract::{HeaderClassifier, HeuristicHeaders, SchemaExtractor};
pub use oracle::{FillReport, Oracle, OracleError, RecordedOracle};
pub use outline::{MatchReport, Outline, OutlineMatcher, OutlineOverride};
pub use rules::{ConsistencyEngine, Correction, RuleSpec, TokenSet, Trace};
pub use synonyms::SynonymGenerator;
pub use types::{Field, FieldKind, PathSource, RawValueMap, Schema, Value, ValueMap};
pub use validation::{advise, validate_response, Advisory, AdvisoryLevel, ResponseIssue};

use chrono::Utc;
use thiserror::Error;
use tracing::info;

/// Errors that can occur while filling a form.
#[derive(Error, Debug)]
pub enum FillError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template error: {0}")]
    Document(#[from] DocumentError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
}

/// A compiled domain configuration: every stage ready to run.
#[derive(Debug)]
pub struct Domain {
    config: DomainConfig,
    extractor: SchemaExtractor,
    synonyms: SynonymGenerator,
    matcher: OutlineMatcher,
    engine: ConsistencyEngine,
    verifier: EvidenceVerifier,
    confidence: ConfidenceEstimator,
}

impl Domain {
    /// Compile a validated configuration.
    pub fn new(config: DomainConfig) -> Result<Self, ConfigError> {
        let engine = ConsistencyEngine::from_specs(&config.rules, &config.tokens)?;
        let extractor = SchemaExtractor::new(config.boolean_suffix.clone())
            .with_default_section(config.default_section.clone());
        let synonyms = SynonymGenerator::new(config.synonyms.clone(), config.boolean_suffix.clone());
        let matcher = OutlineMatcher::new(config.boolean_suffix.clone(), config.outline_overrides.clone());
        let verifier = EvidenceVerifier::new().with_strict(config.strict_evidence);
        let confidence = ConfidenceEstimator::new(config.boolean_suffix.clone());

        Ok(Self {
            config,
            extractor,
            synonyms,
            matcher,
            engine,
            verifier,
            confidence,
        })
    }

    /// The domain built from the embedded default configuration.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::new(DomainConfig::builtin()?)
    }

    pub fn config(&self) -> &DomainConfig {
        &self.config
    }

    pub fn extractor(&self) -> &SchemaExtractor {
        &self.extractor
    }

    pub fn matcher(&self) -> &OutlineMatcher {
        &self.matcher
    }

    pub fn engine(&self) -> &ConsistencyEngine {
        &self.engine
    }

    /// Extract, reconcile with the outline when one is given, and annotate.
    ///
    /// The report is `None` when no outline was supplied.
    pub fn build_schema(&self, template: &TemplateDocument, outline: Option<&Outline>) -> (Schema, Option<MatchReport>) {
        let schema = self.extractor.extract(template);
        let (schema, report) = match outline {
            Some(outline) => {
                let (schema, report) = self.matcher.reconcile_with_report(schema, outline);
                (schema, Some(report))
            }
            None => (schema, None),
        };
        (self.synonyms.annotate(schema), report)
    }

    /// Generate phrasings for Boolean fields of a stored schema that lack them.
    pub fn annotate_missing(&self, schema: Schema) -> Schema {
        self.synonyms.annotate_missing(schema)
    }

    /// Sectioned view of the schema for the oracle.
    pub fn brief(&self, schema: &Schema) -> OracleBrief {
        OracleBrief::from_schema(schema)
    }

    /// The schema split by the configured field groups.
    pub fn batches(&self, schema: &Schema) -> Vec<Batch> {
        batches(schema, &self.config.field_groups)
    }

    pub fn validate_response(&self, raw: &RawValueMap, schema: &Schema) -> Vec<ResponseIssue> {
        validate_response(raw, schema, self.engine.tokens())
    }

    /// Turn a raw proposal into final values.
    ///
    /// Keys outside the schema are reported and dropped. Evidence
    /// verification runs only when evidence is given.
    pub fn finalize(&self, raw: &RawValueMap, schema: &Schema, evidence: Option<&Evidence>) -> FillReport {
        let issues = self.validate_response(raw, schema);
        let proposed: ValueMap = raw
            .iter()
            .filter(|(key, _)| schema.contains_key(key))
            .map(|(key, value)| (key.clone(), Value::from_json(value)))
            .collect();

        let trace = self.engine.apply_with_trace(&proposed, schema);
        let mut corrections = trace.corrections;
        let mut values = trace.values;

        if let Some(evidence) = evidence {
            let (verified, cleared) = self.verifier.verify(&values, schema, evidence);
            if !cleared.is_empty() {
                corrections.extend(cleared);
                let trace = self.engine.apply_with_trace(&verified, schema);
                corrections.extend(trace.corrections);
                values = trace.values;
            }
        }

        let advisories = advise(&values, &self.config.advisories);
        let estimate = self.confidence.estimate(
            &values,
            &proposed,
            &corrections,
            schema,
            evidence.unwrap_or(&Evidence::default()),
        );
        info!(
            fields = values.len(),
            corrections = corrections.len(),
            issues = issues.len(),
            advisories = advisories.len(),
            needs_review = estimate.needs_review.len(),
            "Finalized values"
        );

        FillReport {
            values,
            corrections,
            issues,
            advisories,
            confidence: estimate.fields,
            needs_review: estimate.needs_review,
            completed_at: Utc::now(),
        }
    }

    /// Ask the oracle, then finalize its answer against the evidence.
    pub fn fill(&self, oracle: &dyn Oracle, schema: &Schema, evidence: &Evidence) -> Result<FillReport, FillError> {
        let raw = oracle.propose(schema, evidence)?;
        Ok(self.finalize(&raw, schema, Some(evidence)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TEMPLATE: &str = r#"
blocks:
  - text: "CONTROL SPECIFICATIONS"
    style: { bold: true }
  - text: "Explosion proof {{explosion_proof_check}}"
  - text: "Servo capper {{servo_capper_check}}  Pneumatic capper {{pneumatic_capper_check}}"
  - text: "UTILITIES"
    style: { bold: true }
grids:
  - rows:
      - ["Voltage", "{{voltage}}"]
      - ["Frequency", "{{hz}}"]
    anchor: 3
"#;

    fn raw(value: serde_json::Value) -> RawValueMap {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_build_schema_without_outline() {
        let domain = Domain::builtin().unwrap();
        let template = TemplateDocument::from_yaml(TEMPLATE).unwrap();
        let (schema, report) = domain.build_schema(&template, None);

        assert!(report.is_none());
        assert_eq!(schema.len(), 5);
        let explosion = schema.get("explosion_proof_check").unwrap();
        assert_eq!(explosion.section, "CONTROL SPECIFICATIONS");
        assert!(explosion.synonyms.contains("atex"));
        assert_eq!(schema.get("voltage").unwrap().section, "UTILITIES");
    }

    #[test]
    fn test_finalize_applies_rules_and_drops_unknown_keys() {
        let domain = Domain::builtin().unwrap();
        let template = TemplateDocument::from_yaml(TEMPLATE).unwrap();
        let (schema, _) = domain.build_schema(&template, None);

        let report = domain.finalize(
            &raw(json!({
                "explosion_proof_check": "yes",
                "servo_capper_check": true,
                "voltage": "480",
                "bogus": "x"
            })),
            &schema,
            None,
        );

        assert_eq!(report.values.len(), schema.len());
        assert!(!report.values.contains_key("bogus"));
        assert!(report.values["explosion_proof_check"].is_true());
        assert!(!report.values["servo_capper_check"].is_true());
        assert!(report.values["pneumatic_capper_check"].is_true());
        assert_eq!(report.values["voltage"], Value::text("460-480V"));
        assert_eq!(report.values["hz"], Value::text(""));
        assert!(report.issues.iter().any(|i| i.key == "bogus"));
        assert!(report.issues.iter().any(|i| i.key == "hz"));
        assert!(report
            .advisories
            .iter()
            .any(|a| a.level == AdvisoryLevel::Suggestion && a.suggested.as_deref() == Some("60")));
        assert_eq!(report.rendered()["explosion_proof_check"], "YES");
    }

    #[test]
    fn test_fill_clears_unsupported_selection() {
        let domain = Domain::builtin().unwrap();
        let template = TemplateDocument::from_yaml(TEMPLATE).unwrap();
        let (schema, _) = domain.build_schema(&template, None);

        let oracle = RecordedOracle::new(raw(json!({ "servo_capper_check": true })));
        let evidence = Evidence::text("Capper: pneumatic, 480V");
        let report = domain.fill(&oracle, &schema, &evidence).unwrap();

        assert!(!report.values["servo_capper_check"].is_true());
        assert!(report
            .corrections
            .iter()
            .any(|c| c.rule == crate::evidence::EVIDENCE_RULE && c.key == "servo_capper_check"));
        assert_eq!(domain.engine().apply(&report.values, &schema), report.values);

        assert_eq!(report.confidence.len(), schema.len());
        let servo = &report.confidence["servo_capper_check"];
        assert_eq!(servo.source, ValueSource::Corrected);
        assert_eq!(servo.level, ConfidenceLevel::Medium);
        assert_eq!(report.confidence["hz"].source, ValueSource::Defaulted);
        assert!(report.needs_review.contains(&"hz".to_string()));
        assert!(!report.needs_review.contains(&"servo_capper_check".to_string()));
    }

    #[test]
    fn test_strict_evidence_from_config() {
        let schema: Schema = vec![Field::new("bare_check", FieldKind::Boolean)].into();
        let proposal = raw(json!({ "bare_check": true }));
        let evidence = Evidence::text("Quote with no options listed");

        let lenient = Domain::builtin().unwrap();
        assert!(lenient.finalize(&proposal, &schema, Some(&evidence)).values["bare_check"].is_true());

        let mut config = DomainConfig::builtin().unwrap();
        config.strict_evidence = true;
        let strict = Domain::new(config).unwrap();
        let report = strict.finalize(&proposal, &schema, Some(&evidence));
        assert!(!report.values["bare_check"].is_true());
        assert_eq!(report.corrections.last().unwrap().rule, crate::evidence::EVIDENCE_RULE);
    }

    #[test]
    fn test_fill_propagates_oracle_error() {
        let domain = Domain::builtin().unwrap();
        let failing = |_: &Schema, _: &Evidence| -> Result<RawValueMap, OracleError> {
            Err(OracleError::Unavailable("timeout".to_string()))
        };
        let result = domain.fill(&failing, &Schema::new(), &Evidence::default());
        assert!(matches!(result, Err(FillError::Oracle(_))));
    }
}
