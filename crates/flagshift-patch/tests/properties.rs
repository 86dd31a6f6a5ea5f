//! Property tests for rule compilation and field exclusion

use flagshift_model::{FlagEnvironmentConfig, PatchOp, Rule};
use flagshift_patch::{FieldExclusionTable, PatchCompiler};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn arb_rule() -> impl Strategy<Value = Rule> {
    (
        proptest::collection::vec("[a-z]{1,8}", 0..4),
        0u64..4,
    )
        .prop_map(|(attributes, variation)| {
            let clauses: Vec<Value> = attributes
                .into_iter()
                .map(|a| json!({"attribute": a, "op": "in", "values": ["x"]}))
                .collect();
            let mut map = Map::new();
            map.insert("clauses".into(), Value::from(clauses));
            map.insert("variation".into(), Value::from(variation));
            Rule(map)
        })
}

fn arb_field_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("salt".to_string()),
        Just("sel".to_string()),
        Just("version".to_string()),
        Just("lastModified".to_string()),
        Just("access".to_string()),
        Just("_environmentName".to_string()),
        Just("_site".to_string()),
        Just("_summary".to_string()),
        Just("_debugEventsUntilDate".to_string()),
        "_[a-zA-Z]{1,10}",
        "-[a-zA-Z]{1,10}",
        "[a-zA-Z]{1,12}",
    ]
}

proptest! {
    #[test]
    fn prop_one_append_per_rule_in_order(
        rules in proptest::collection::vec(arb_rule(), 0..12),
        env in "[a-z]{1,10}",
    ) {
        let base = format!("/environments/{env}");
        let ops = PatchCompiler::new().compile_rules(&rules, Some(&base));

        prop_assert_eq!(ops.len(), rules.len());
        for (op, rule) in ops.iter().zip(&rules) {
            prop_assert_eq!(op.op, PatchOp::Add);
            prop_assert_eq!(&op.path, &format!("{base}/rules/-"));
            prop_assert_eq!(op.value.as_ref(), Some(&rule.clone().into_value()));
        }
    }

    #[test]
    fn prop_filtered_fields_never_contain_excluded_keys(
        names in proptest::collection::vec(arb_field_name(), 0..24),
    ) {
        let table = FieldExclusionTable::new();
        let map: Map<String, Value> = names.iter().map(|n| (n.clone(), json!(1))).collect();
        let filtered = table.filter(&FlagEnvironmentConfig::from(map.clone()));

        for key in filtered.keys() {
            prop_assert!(!key.starts_with('_'));
            prop_assert!(!key.starts_with('-'));
            prop_assert!(!table.names().contains(&key.as_str()));
        }
        // everything not excluded survives
        for key in map.keys().filter(|k| !table.is_excluded(k)) {
            prop_assert!(filtered.contains_key(key));
        }
    }

    #[test]
    fn prop_flag_environment_ops_target_only_that_environment(
        rules in proptest::collection::vec(arb_rule(), 0..6),
        on in any::<bool>(),
        env in "[a-z]{1,10}",
    ) {
        let compiler = PatchCompiler::new();
        let raw: FlagEnvironmentConfig = serde_json::from_value(json!({
            "on": on,
            "salt": "s",
            "version": 3,
            "rules": rules,
        })).unwrap();

        let ops = compiler
            .compile_flag_environment(&env, &compiler.filter_environment(&raw))
            .unwrap();

        let prefix = format!("/environments/{env}/");
        prop_assert_eq!(ops.len(), rules.len() + 1);
        prop_assert!(ops.iter().all(|op| op.path.starts_with(&prefix)));
        prop_assert_eq!(ops.iter().filter(|op| op.is_append()).count(), rules.len());
    }
}
