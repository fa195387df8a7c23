//! JSON Schema validation for domain configuration.
//!
//! Configuration files are checked against spec/domain.schema.json before
//! they are deserialized, so structural mistakes are reported with the path
//! of the offending value instead of a serde error.

use std::sync::OnceLock;

/// Embedded domain configuration schema.
const DOMAIN_SCHEMA_JSON: &str = include_str!("../../../../spec/domain.schema.json");

static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(DOMAIN_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        match jsonschema::options().build(&schema_value) {
            Ok(v) => Ok(v),
            Err(e) => Err(format!("Failed to compile schema: {}", e)),
        }
    });

    result.as_ref().map_err(Clone::clone)
}

/// Validate a configuration value against the embedded schema.
///
/// Returns every violation, each with the instance path it was found at.
pub fn validate_config_schema(config_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(config_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_passes() {
        let value = serde_json::json!({ "version": "1.0" });
        assert!(validate_config_schema(&value).is_ok());
    }

    #[test]
    fn test_missing_version_fails() {
        let value = serde_json::json!({ "boolean_suffix": "_check" });
        assert!(validate_config_schema(&value).is_err());
    }

    #[test]
    fn test_invalid_version_format_fails() {
        let value = serde_json::json!({ "version": "one" });
        assert!(validate_config_schema(&value).is_err());
    }

    #[test]
    fn test_unknown_top_level_key_fails() {
        let value = serde_json::json!({ "version": "1.0", "surprise": true });
        assert!(validate_config_schema(&value).is_err());
    }

    #[test]
    fn test_unknown_rule_type_fails() {
        let value = serde_json::json!({
            "version": "1.0",
            "rules": [{ "type": "teleport", "name": "x" }]
        });
        assert!(validate_config_schema(&value).is_err());
    }

    #[test]
    fn test_rule_missing_members_fails() {
        let value = serde_json::json!({
            "version": "1.0",
            "rules": [{ "type": "mutual_exclusion", "name": "hmi" }]
        });
        let errors = validate_config_schema(&value).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_full_rule_table_passes() {
        let value = serde_json::json!({
            "version": "1.0",
            "boolean_suffix": "_check",
            "tokens": { "affirmative": ["yes"], "negative": ["no", ""] },
            "synonyms": { "hmi": ["touch screen", "operator panel"] },
            "outline_overrides": [{
                "name": "plc_allen_bradley",
                "all_of": ["plc"],
                "any_of": ["allenb", "ab"],
                "target": { "section": "Control", "subsection": "PLC" }
            }],
            "rules": [
                { "type": "canonicalize" },
                {
                    "type": "mutual_exclusion",
                    "name": "hmi",
                    "members": { "pattern": "^hmi_" },
                    "priority": ["15"]
                },
                {
                    "type": "unit_format",
                    "name": "voltage",
                    "keys": ["voltage"],
                    "unit": "V",
                    "bands": [{ "min": 200, "max": 250, "label": "208-240V" }]
                },
                {
                    "type": "implication",
                    "name": "beacon",
                    "when": {
                        "type": "any",
                        "conditions": [
                            { "type": "at_least", "of": { "keys": ["a_check", "b_check"] }, "count": 2 },
                            { "type": "is_true", "key": "multi_check" }
                        ]
                    },
                    "then": [{ "set": { "keys": ["a_check"] }, "to": true }]
                },
                { "type": "exactly_one", "name": "config", "members": { "keys": ["x_check"] } }
            ],
            "field_groups": [{ "name": "Controls", "prefixes": ["plc_"], "keys": ["voltage"] }],
            "advisories": { "voltage_key": "voltage" }
        });
        assert_eq!(validate_config_schema(&value), Ok(()));
    }
}
