//! Property tests for extraction coverage, rule idempotence, mutual
//! exclusion, conservative Boolean defaults and outline reconciliation.

use std::collections::BTreeSet;

use formfill_core::{
    ConsistencyEngine, Domain, Field, FieldKind, Grid, Outline, Schema, TemplateDocument, TextBlock, TokenSet, Value,
    ValueMap,
};
use proptest::prelude::*;

const KEY_POOL: &[&str] = &[
    "hmi_10_check",
    "hmi_15_check",
    "hmi_5_7_check",
    "plc_ab_check",
    "plc_siemens_check",
    "plc_bandr_check",
    "explosion_proof_check",
    "servo_drive_check",
    "pneumatic_drive_check",
    "beacon_red_check",
    "beacon_green_check",
    "beacon_amber_check",
    "filling_system_check",
    "volumetric_check",
    "batch_yes15_check",
    "bs_984_check",
    "bs_1230_check",
    "voltage",
    "hz",
    "psi",
    "production_speed",
    "customer",
];

fn arb_key() -> impl Strategy<Value = String> {
    ("[a-z][a-z0-9]{0,5}(_[a-z0-9]{1,4}){0,2}", any::<bool>())
        .prop_map(|(stem, boolean)| if boolean { format!("{}_check", stem) } else { stem })
}

fn arb_filler() -> impl Strategy<Value = String> {
    "[A-Za-z ():.]{0,16}"
}

/// A line of text with placeholders, and the keys it uses.
fn arb_line() -> impl Strategy<Value = (String, Vec<String>)> {
    prop::collection::vec((arb_filler(), arb_key(), any::<bool>()), 0..4).prop_map(|parts| {
        let mut line = String::new();
        let mut keys = Vec::new();
        for (filler, key, spaced) in parts {
            line.push_str(&filler);
            if spaced {
                line.push_str(&format!("{{{{ {} }}}}", key));
            } else {
                line.push_str(&format!("{{{{{}}}}}", key));
            }
            keys.push(key);
        }
        (line, keys)
    })
}

fn arb_block() -> impl Strategy<Value = (TextBlock, Vec<String>)> {
    (prop::collection::vec(arb_line(), 1..3), any::<bool>(), any::<bool>()).prop_map(|(lines, bold, caps)| {
        let text = lines.iter().map(|(l, _)| l.as_str()).collect::<Vec<_>>().join("\n");
        let keys: Vec<String> = lines.into_iter().flat_map(|(_, k)| k).collect();
        let mut block = if bold { TextBlock::bold(text) } else { TextBlock::plain(text) };
        block.style.all_caps = caps;
        (block, keys)
    })
}

fn arb_grid() -> impl Strategy<Value = (Grid, Vec<String>)> {
    prop::collection::vec(prop::collection::vec(arb_line(), 1..4), 1..4).prop_map(|rows| {
        let mut keys = Vec::new();
        let cells: Vec<Vec<String>> = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(cell, cell_keys)| {
                        keys.extend(cell_keys);
                        cell
                    })
                    .collect::<Vec<String>>()
            })
            .collect();
        (
            Grid {
                rows: cells,
                anchor: None,
            },
            keys,
        )
    })
}

fn arb_template() -> impl Strategy<Value = (TemplateDocument, BTreeSet<String>)> {
    (
        prop::collection::vec(arb_block(), 0..6),
        prop::collection::vec(arb_grid(), 0..3),
    )
        .prop_map(|(blocks, grids)| {
            let mut keys = BTreeSet::new();
            let blocks: Vec<TextBlock> = blocks
                .into_iter()
                .map(|(block, k)| {
                    keys.extend(k);
                    block
                })
                .collect();
            let grids: Vec<Grid> = grids
                .into_iter()
                .map(|(grid, k)| {
                    keys.extend(k);
                    grid
                })
                .collect();
            (TemplateDocument::new(blocks, grids), keys)
        })
}

fn arb_raw_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Flag),
        prop::sample::select(vec!["yes", "No", "X", "maybe", "", "220", "480", "60", "80", "1.5", "n/a"])
            .prop_map(Value::text),
        "[ -~]{0,8}".prop_map(Value::Text),
    ]
}

fn arb_schema() -> impl Strategy<Value = Schema> {
    prop::sample::subsequence(KEY_POOL.to_vec(), 1..KEY_POOL.len()).prop_map(|keys| {
        keys.into_iter()
            .map(|k| Field::new(k, FieldKind::from_key(k, "_check")))
            .collect::<Schema>()
    })
}

/// A schema and a partial proposal over its keys.
fn arb_proposal() -> impl Strategy<Value = (Schema, ValueMap)> {
    arb_schema().prop_flat_map(|schema| {
        let keys: Vec<String> = schema.keys().map(str::to_string).collect();
        let n = keys.len();
        (
            Just(schema),
            prop::collection::vec((any::<bool>(), arb_raw_value()), n).prop_map(move |choices| {
                keys.iter()
                    .zip(choices)
                    .filter(|(_, (present, _))| *present)
                    .map(|(k, (_, v))| (k.clone(), v))
                    .collect::<ValueMap>()
            }),
        )
    })
}

const OUTLINE_LINES: &[&str] = &[
    "# Order Form",
    "## Control",
    "## Utility Specifications",
    "Reject",
    "- PLC",
    "- HMI",
    "- Beacon",
    "  - Allen Bradley (checkbox)",
    "  - B & R (checkbox)",
    "  - Size",
    "    - 10\" (checkbox)",
    "    - 15\" (checkbox)",
    "  - Model (text)",
    "- Explosion Proof (checkbox)",
    "- Voltage (text)",
    "\t- Quantity (qty)",
    "    stray indented text",
    "",
];

fn arb_outline() -> impl Strategy<Value = Outline> {
    prop::collection::vec(prop::sample::select(OUTLINE_LINES.to_vec()), 0..20)
        .prop_map(|lines| Outline::parse(&lines.join("\n")))
}

fn builtin() -> Domain {
    Domain::builtin().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every distinct placeholder key becomes exactly one field.
    #[test]
    fn prop_extraction_covers_every_placeholder((template, keys) in arb_template()) {
        let schema = builtin().extractor().extract(&template);
        let extracted: BTreeSet<String> = schema.keys().map(str::to_string).collect();
        prop_assert_eq!(schema.len(), extracted.len());
        prop_assert_eq!(extracted, keys);
    }

    /// Applying the rule table to its own output changes nothing.
    #[test]
    fn prop_apply_is_idempotent((schema, values) in arb_proposal()) {
        let engine = builtin().engine().clone();
        let once = engine.apply(&values, &schema);
        let twice = engine.apply(&once, &schema);
        prop_assert_eq!(once, twice);
    }

    /// Output covers the schema and every Boolean is a flag.
    #[test]
    fn prop_apply_covers_schema((schema, values) in arb_proposal()) {
        let out = builtin().engine().apply(&values, &schema);
        for field in &schema {
            let value = out.get(&field.key);
            prop_assert!(value.is_some(), "missing {}", field.key);
            if field.is_boolean() {
                prop_assert!(value.and_then(Value::as_flag).is_some(), "{} not a flag", field.key);
            }
        }
    }

    /// Declared exclusion groups end with at most one member true.
    #[test]
    fn prop_mutual_exclusion_holds((schema, values) in arb_proposal()) {
        let out = builtin().engine().apply(&values, &schema);
        let true_count = |keys: &[&str]| keys.iter().filter(|k| out.get(**k).is_some_and(Value::is_true)).count();

        prop_assert!(true_count(&["hmi_10_check", "hmi_15_check", "hmi_5_7_check"]) <= 1);
        prop_assert!(true_count(&["plc_ab_check", "plc_siemens_check", "plc_bandr_check"]) <= 1);
        prop_assert!(true_count(&["bs_984_check", "bs_1230_check"]) <= 1);
    }

    /// Anything that is not an affirmative token canonicalizes to false.
    #[test]
    fn prop_unknown_boolean_defaults_false(raw in "[ -~]{0,12}") {
        prop_assume!(TokenSet::default().classify(&raw) != Some(true));
        let schema: Schema = vec![Field::new("feature_check", FieldKind::Boolean)].into();
        let mut values = ValueMap::new();
        values.insert("feature_check".to_string(), Value::text(raw));

        let out = ConsistencyEngine::default().apply(&values, &schema);
        prop_assert_eq!(out.get("feature_check"), Some(&Value::Flag(false)));
    }

    /// Reconciling never adds, drops, reorders or retypes fields.
    #[test]
    fn prop_reconcile_is_non_destructive(schema in arb_schema(), outline in arb_outline()) {
        let before: Vec<(String, FieldKind)> = schema.iter().map(|f| (f.key.clone(), f.kind)).collect();
        let (reconciled, report) = builtin().matcher().reconcile_with_report(schema, &outline);
        let after: Vec<(String, FieldKind)> = reconciled.iter().map(|f| (f.key.clone(), f.kind)).collect();

        prop_assert_eq!(before.len(), report.total());
        prop_assert_eq!(before, after);
    }
}
