use isavm_spec_compiler::catalog::{Catalog, MemoryEffect, OperandKind, STANDARD_CATALOG};
use isavm_spec_compiler::{RecordRule, SpecError};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn compile(records: Value) -> Result<Catalog, SpecError> {
    Catalog::from_json(&records.to_string())
}

fn rule_of(result: Result<Catalog, SpecError>) -> RecordRule {
    match result {
        Err(SpecError::InvalidRecord { rule, .. }) => rule,
        other => panic!("expected an invalid record, got {other:?}"),
    }
}

#[test]
fn standard_catalog_lists_every_instruction_in_order() {
    let catalog = Catalog::from_json(STANDARD_CATALOG).expect("standard catalog is valid");
    let classes: Vec<&str> = catalog
        .iter()
        .map(|spec| spec.class_name.as_str())
        .collect();
    assert_eq!(
        classes,
        vec![
            "Label",
            "Noop",
            "Jump",
            "JumpIfZero",
            "JumpIfNotZero",
            "JumpIndirect",
            "Immediate",
            "LoadLabel",
            "Move",
            "Add",
            "AddImmediate",
            "Sub",
            "Mul",
            "Div",
            "Negate",
            "LessThan",
            "GreaterThan",
            "LessThanEqual",
            "GreaterThanEqual",
            "Equal",
            "NotEqual",
            "Not",
            "Load",
            "Store",
            "Print",
            "CallIndirect",
            "Call",
            "Halt",
        ]
    );
    assert_eq!(catalog.len(), 28);
}

#[test]
fn standard_records_keep_their_structure() {
    let catalog = Catalog::standard().expect("standard catalog is valid");

    let label = catalog.get(0).expect("Label is first");
    assert!(label.defines_label);
    assert_eq!(label.label_operand(), Some(0));
    assert_eq!(label.operands[0].kind, OperandKind::Text);

    let add = catalog.iter().find(|spec| spec.class_name == "Add").expect("Add");
    assert_eq!(add.short_mnemonic, "add");
    assert_eq!(add.stack.before, vec!["x".to_owned(), "y".to_owned()]);
    assert_eq!(add.stack.after.as_deref(), Some("x + y"));
    assert!(!add.defines_label);

    let load = catalog.iter().find(|spec| spec.class_name == "Load").expect("Load");
    assert_eq!(
        load.memory_effect,
        Some(MemoryEffect {
            before: vec!["address".to_owned()],
            after: Vec::new(),
        })
    );

    let call = catalog.iter().find(|spec| spec.class_name == "Call").expect("Call");
    assert_eq!(call.side_effects, vec!["RA = PC".to_owned(), "PC = label".to_owned()]);
    assert!(!call.defines_label, "only label markers define labels");
}

#[test]
fn label_marker_defaults_from_class_name() {
    let catalog = compile(json!([
        {
            "class": "Label",
            "short": "lbl",
            "operands": [{ "name": "label", "type": "str" }],
            "stack": { "before": [], "after": [] }
        },
        {
            "class": "Mark",
            "short": "mark",
            "operands": [{ "name": "label", "type": "str" }],
            "stack": { "before": [], "after": [] },
            "defines_label": true
        },
        {
            "class": "Goto",
            "short": "goto",
            "operands": [{ "name": "label", "type": "str" }],
            "stack": { "before": [], "after": [] },
            "side_effect": ["PC = label"]
        }
    ]))
    .expect("catalog is valid");
    let flags: Vec<bool> = catalog.iter().map(|spec| spec.defines_label).collect();
    assert_eq!(flags, vec![true, true, false]);
}

#[test]
fn unknown_keys_are_ignored_and_optional_keys_default() {
    let catalog = compile(json!([
        {
            "class": "Nop",
            "short": "nop",
            "stack": { "before": [], "after": [] },
            "doc": "does nothing",
            "cycles": 1
        }
    ]))
    .expect("catalog is valid");
    let nop = &catalog.instructions()[0];
    assert!(nop.operands.is_empty());
    assert!(nop.side_effects.is_empty());
    assert!(nop.memory_effect.is_none());
}

#[test]
fn long_and_short_may_coincide_within_one_record() {
    let catalog = compile(json!([
        { "class": "nop", "short": "nop", "stack": { "before": [], "after": [] } }
    ]))
    .expect("a record may reuse its own mnemonic");
    assert_eq!(catalog.len(), 1);
}

#[test]
fn mnemonics_share_one_namespace_across_records() {
    let result = compile(json!([
        { "class": "Add", "short": "add", "stack": { "before": ["x", "y"], "after": ["x + y"] } },
        { "class": "Plus", "short": "Add", "stack": { "before": ["x", "y"], "after": ["x + y"] } }
    ]));
    match result {
        Err(SpecError::DuplicateMnemonic {
            index,
            mnemonic,
            first,
            ..
        }) => {
            assert_eq!(index, 1);
            assert_eq!(mnemonic, "Add");
            assert_eq!(first, 0);
        }
        other => panic!("expected duplicate mnemonic, got {other:?}"),
    }

    let repeated_short = compile(json!([
        { "class": "Add", "short": "a", "stack": { "before": [], "after": [] } },
        { "class": "And", "short": "a", "stack": { "before": [], "after": [] } }
    ]));
    assert!(matches!(
        repeated_short,
        Err(SpecError::DuplicateMnemonic { index: 1, first: 0, .. })
    ));
}

#[test]
fn mnemonics_must_be_program_identifiers() {
    let rule = rule_of(compile(json!([
        { "class": "load-word", "short": "lw", "stack": { "before": [], "after": [] } }
    ])));
    assert_eq!(rule, RecordRule::InvalidMnemonic("load-word".to_owned()));

    let rule = rule_of(compile(json!([
        { "class": "Load", "short": "_lw", "stack": { "before": [], "after": [] } }
    ])));
    assert_eq!(rule, RecordRule::InvalidMnemonic("_lw".to_owned()));
}

#[test]
fn multiple_outputs_are_rejected() {
    let result = compile(json!([
        { "class": "DivMod", "short": "divmod", "stack": { "before": ["x", "y"], "after": ["x // y", "x % y"] } }
    ]));
    match result {
        Err(SpecError::InvalidRecord { index, class, rule }) => {
            assert_eq!(index, 0);
            assert_eq!(class, "DivMod");
            assert_eq!(rule, RecordRule::MultipleOutputs { count: 2 });
        }
        other => panic!("expected invalid record, got {other:?}"),
    }
}

#[test]
fn operand_types_are_limited_to_int_and_str() {
    let rule = rule_of(compile(json!([
        {
            "class": "FloatImm",
            "short": "fimm",
            "operands": [{ "name": "value", "type": "float" }],
            "stack": { "before": [], "after": ["value"] }
        }
    ])));
    assert_eq!(
        rule,
        RecordRule::UnsupportedOperandType {
            operand: "value".to_owned(),
            found: "float".to_owned(),
        }
    );
}

#[test]
fn reserved_field_names_are_rejected() {
    for (role, operand) in [
        ("PC", "value"),
        ("x", "dst"),
        ("x", "comment"),
        ("if", "value"),
        ("x", "memory"),
        ("label", "value"),
    ] {
        let rule = rule_of(compile(json!([
            {
                "class": "Thing",
                "short": "thing",
                "operands": [{ "name": operand, "type": "int" }],
                "stack": { "before": [role], "after": [] }
            }
        ])));
        let offender = if role == "x" { operand } else { role };
        assert_eq!(rule, RecordRule::ReservedFieldName(offender.to_owned()));
    }
}

#[test]
fn field_names_must_be_distinct_identifiers() {
    let rule = rule_of(compile(json!([
        {
            "class": "Thing",
            "short": "thing",
            "operands": [{ "name": "x", "type": "int" }],
            "stack": { "before": ["x"], "after": [] }
        }
    ])));
    assert_eq!(rule, RecordRule::DuplicateField("x".to_owned()));

    let rule = rule_of(compile(json!([
        { "class": "Thing", "short": "thing", "stack": { "before": ["a b"], "after": [] } }
    ])));
    assert_eq!(rule, RecordRule::InvalidFieldName("a b".to_owned()));
}

#[test]
fn label_operand_rules() {
    let rule = rule_of(compile(json!([
        {
            "class": "Goto",
            "short": "goto",
            "operands": [{ "name": "label", "type": "int" }],
            "stack": { "before": [], "after": [] }
        }
    ])));
    assert_eq!(rule, RecordRule::LabelOperandNotText);

    let rule = rule_of(compile(json!([
        { "class": "Label", "short": "lbl", "stack": { "before": [], "after": [] } }
    ])));
    assert_eq!(rule, RecordRule::MissingLabelOperand);
}

#[test]
fn empty_and_malformed_catalogs_fail() {
    assert!(matches!(Catalog::from_json("[]"), Err(SpecError::EmptyCatalog)));
    assert!(matches!(
        Catalog::from_json("[{\"class\": \"Add\"}]"),
        Err(SpecError::Json(_))
    ));
    assert!(matches!(Catalog::from_json("not json"), Err(SpecError::Json(_))));
}

#[test]
fn errors_name_the_record() {
    let error = compile(json!([
        { "class": "Ok", "short": "ok", "stack": { "before": [], "after": [] } },
        { "class": "Bad", "short": "bad", "stack": { "before": [], "after": ["1", "2"] } }
    ]))
    .expect_err("second record is invalid");
    assert_eq!(
        error.to_string(),
        "record 1 (Bad): stack effect declares 2 outputs; at most one is supported"
    );
}
