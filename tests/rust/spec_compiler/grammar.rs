use isavm_spec_compiler::grammar::GrammarItem;
use isavm_spec_compiler::{Catalog, Grammar, MnemonicForm, Symbol};
use pretty_assertions::assert_eq;

fn standard_grammar() -> Grammar {
    Grammar::synthesize(&Catalog::standard().expect("standard catalog is valid"))
}

fn item(field: &str, symbol: Symbol) -> GrammarItem {
    GrammarItem {
        field: field.to_owned(),
        symbol,
    }
}

#[test]
fn one_alternative_per_instruction() {
    let grammar = standard_grammar();
    assert_eq!(grammar.alternatives().len(), 28);
    for (opcode, alternative) in grammar.alternatives().iter().enumerate() {
        assert_eq!(alternative.opcode, opcode);
        assert_eq!(
            alternative.items.last(),
            Some(&item("comment", Symbol::Comment)),
            "{} ends with a comment",
            alternative.long
        );
    }
}

#[test]
fn items_follow_field_order() {
    let grammar = standard_grammar();
    let find = |long: &str| {
        grammar
            .alternatives()
            .iter()
            .find(|alternative| alternative.long == long)
            .expect("alternative exists")
            .items
            .clone()
    };

    assert_eq!(
        find("Add"),
        vec![
            item("dst", Symbol::Register),
            item("x", Symbol::Register),
            item("y", Symbol::Register),
            item("comment", Symbol::Comment),
        ]
    );
    assert_eq!(
        find("AddImmediate"),
        vec![
            item("dst", Symbol::Register),
            item("x", Symbol::Register),
            item("value", Symbol::Integer),
            item("comment", Symbol::Comment),
        ]
    );
    assert_eq!(
        find("JumpIfZero"),
        vec![
            item("v", Symbol::Register),
            item("label", Symbol::Text),
            item("comment", Symbol::Comment),
        ]
    );
    assert_eq!(find("Halt"), vec![item("comment", Symbol::Comment)]);
}

#[test]
fn keywords_cover_both_mnemonic_forms() {
    let grammar = standard_grammar();
    let keywords = grammar.keywords();
    assert_eq!(keywords.len(), 56);

    let add = grammar
        .alternatives()
        .iter()
        .position(|alternative| alternative.long == "Add")
        .expect("Add");
    assert_eq!(keywords.lookup("add"), Some((add, MnemonicForm::Short)));
    assert_eq!(keywords.lookup("Add"), Some((add, MnemonicForm::Long)));
    assert!(keywords.lookup("Add").expect("Add").1.is_long());
    assert!(keywords.contains("label"));
    assert!(!keywords.contains("ADD"));
    assert!(!keywords.contains("r0"));
}

#[test]
fn shared_mnemonic_counts_once() {
    let catalog = Catalog::from_json(
        r#"[{ "class": "nop", "short": "nop", "stack": { "before": [], "after": [] } }]"#,
    )
    .expect("catalog is valid");
    let keywords = Grammar::synthesize(&catalog).keywords();
    assert_eq!(keywords.len(), 1);
    assert_eq!(keywords.lookup("nop"), Some((0, MnemonicForm::Long)));
}

#[test]
fn renders_as_ebnf() {
    let text = standard_grammar().to_string();
    assert!(text.starts_with("start : {operation} EOF .\n\noperation :\n"));
    assert!(text.contains("     (\"Label\" | \"label\") text'label [\",\"] comment'comment\n"));
    assert!(text.contains(
        "   | (\"Add\" | \"add\") reg'dst [\",\"] reg'x [\",\"] reg'y [\",\"] comment'comment\n"
    ));
    assert!(text.contains("   | (\"Halt\" | \"halt\") comment'comment\n"));
    assert!(text.ends_with("reg : ID .\ninteger : INT .\ntext : STR .\ncomment : [text] .\n"));
}
