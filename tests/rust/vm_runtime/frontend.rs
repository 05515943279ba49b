use std::collections::BTreeSet;

use isavm_spec_compiler::MnemonicForm;
use isavm_vm_runtime::instruction::ShapeError;
use isavm_vm_runtime::lexer::{ScanError, TokenKind};
use isavm_vm_runtime::parser::ParseError;
use isavm_vm_runtime::{Instruction, LinkError, LoadError, OperandValue, Toolchain};
use pretty_assertions::assert_eq;

fn toolchain() -> Toolchain {
    Toolchain::standard().expect("standard catalog compiles")
}

fn kinds(source: &str) -> Vec<TokenKind> {
    toolchain()
        .scan(source)
        .expect("source scans")
        .into_iter()
        .map(|token| token.kind)
        .collect()
}

fn parse(source: &str) -> Vec<Instruction> {
    toolchain().parse(source).expect("source parses")
}

fn parse_error(source: &str) -> ParseError {
    match toolchain().parse(source) {
        Err(LoadError::Parse(error)) => error,
        other => panic!("expected a parse error, got {other:?}"),
    }
}

fn expected(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|item| (*item).to_owned()).collect()
}

fn register(name: &str) -> TokenKind {
    TokenKind::Register(name.to_owned())
}

#[test]
fn scans_mnemonics_registers_and_literals() {
    let toolchain = toolchain();
    let add = toolchain.instruction("Add").expect("Add").opcode();
    assert_eq!(
        kinds("add r2, r0, r1 // sum\nAdd x y z"),
        vec![
            TokenKind::Mnemonic {
                word: "add".to_owned(),
                opcode: add,
                form: MnemonicForm::Short,
            },
            register("r2"),
            TokenKind::Comma,
            register("r0"),
            TokenKind::Comma,
            register("r1"),
            TokenKind::Mnemonic {
                word: "Add".to_owned(),
                opcode: add,
                form: MnemonicForm::Long,
            },
            register("x"),
            register("y"),
            register("z"),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn text_literals_have_three_spellings() {
    assert_eq!(
        kinds(r#""double" 'single' <<angled text>> -42 0"#),
        vec![
            TokenKind::Text("double".to_owned()),
            TokenKind::Text("single".to_owned()),
            TokenKind::Text("angled text".to_owned()),
            TokenKind::Integer(-42),
            TokenKind::Integer(0),
            TokenKind::Eof,
        ]
    );
    assert_eq!(
        kinds(r#""it's" 'say "hi"' <<a > b>>"#),
        vec![
            TokenKind::Text("it's".to_owned()),
            TokenKind::Text("say \"hi\"".to_owned()),
            TokenKind::Text("a > b".to_owned()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn tokens_carry_line_numbers() {
    let tokens = toolchain()
        .scan("// header\n\nimm r0 1\n  // note\nhalt\n")
        .expect("source scans");
    let lines: Vec<usize> = tokens.iter().map(|token| token.line).collect();
    assert_eq!(lines, vec![3, 3, 3, 5, 6]);
    assert_eq!(tokens.last().map(|token| &token.kind), Some(&TokenKind::Eof));
}

#[test]
fn scan_errors_report_the_line() {
    let toolchain = toolchain();
    assert_eq!(
        toolchain.scan("halt\nhalt\nprint r0 \"oops\n"),
        Err(ScanError::UnterminatedText { line: 3 })
    );
    assert_eq!(
        toolchain.scan("halt <<never closed"),
        Err(ScanError::UnterminatedText { line: 1 })
    );
    assert_eq!(
        toolchain.scan("imm r0 5\nimm r1 $"),
        Err(ScanError::IllegalCharacter {
            character: '$',
            line: 2,
        })
    );
    assert_eq!(
        toolchain.scan("addi r0 r0 - 1"),
        Err(ScanError::DanglingMinus { line: 1 })
    );
    assert_eq!(
        toolchain.scan("imm r0 99999999999999999999"),
        Err(ScanError::IntegerOutOfRange {
            literal: "99999999999999999999".to_owned(),
            line: 1,
        })
    );
}

#[test]
fn commas_are_optional() {
    let plain = parse("add r2 r0 r1");
    assert_eq!(parse("add r2, r0, r1"), plain);
    assert_eq!(parse("Add r2,r0 ,r1"), plain);
    assert_eq!(plain[0].dst(), Some("r2"));
    assert_eq!(plain[0].registers(), &["r0".to_owned(), "r1".to_owned()]);
}

#[test]
fn fields_land_in_declared_slots() {
    let program = parse("addi acc acc -3\nj \"top\"\nlabel 'top'\nhalt");
    assert_eq!(program.len(), 4);

    assert_eq!(program[0].class_name(), "AddImmediate");
    assert_eq!(program[0].dst(), Some("acc"));
    assert_eq!(program[0].operand("value"), Some(&OperandValue::Integer(-3)));

    assert_eq!(program[1].class_name(), "Jump");
    assert_eq!(program[1].dst(), None);
    assert_eq!(program[1].label(), Some("top"));

    assert_eq!(program[2].class_name(), "Label");
    assert_eq!(program[3].class_name(), "Halt");
}

#[test]
fn trailing_text_becomes_the_comment() {
    let program = parse("print r0 'first'\nprint r0, \"second\"\nprint r0 <<third>>\nhalt");
    let comments: Vec<&str> = program.iter().map(Instruction::comment).collect();
    assert_eq!(comments, vec!["first", "second", "third", ""]);
}

#[test]
fn unexpected_tokens_list_the_alternatives() {
    match parse_error("add r0 r1") {
        ParseError::Unexpected { found, expected: set } => {
            assert_eq!(found.kind, TokenKind::Eof);
            assert_eq!(set, expected(&["register"]));
        }
        other => panic!("unexpected error {other:?}"),
    }

    match parse_error("imm r0 1\n\nimm r1 x") {
        ParseError::Unexpected { found, expected: set } => {
            assert_eq!(found.kind, register("x"));
            assert_eq!(found.line, 3);
            assert_eq!(set, expected(&["integer"]));
        }
        other => panic!("unexpected error {other:?}"),
    }

    match parse_error("r0 r1") {
        ParseError::Unexpected { found, expected: set } => {
            assert_eq!(found.kind, register("r0"));
            assert_eq!(set, expected(&["end of input", "mnemonic"]));
        }
        other => panic!("unexpected error {other:?}"),
    }

    match parse_error("halt 5") {
        ParseError::Unexpected { found, expected: set } => {
            assert_eq!(found.kind, TokenKind::Integer(5));
            assert_eq!(set, expected(&["end of input", "mnemonic", "text"]));
        }
        other => panic!("unexpected error {other:?}"),
    }

    match parse_error("j 12") {
        ParseError::Unexpected { expected: set, .. } => {
            assert_eq!(set, expected(&["text"]));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn parse_errors_render_readably() {
    let error = parse_error("halt\nadd r0 r1");
    assert_eq!(error.to_string(), "line 2: expected register, found end of input");

    let error = parse_error("halt 5");
    assert_eq!(
        error.to_string(),
        "line 1: expected one of end of input, mnemonic, text, found integer `5`"
    );
}

#[test]
fn instruction_shape_is_checked() {
    let toolchain = toolchain();
    let add = toolchain.instruction("Add").expect("Add").clone();
    let jump = toolchain.instruction("Jump").expect("Jump").clone();

    assert_eq!(
        Instruction::new(add.clone(), None, vec!["a".into(), "b".into()], Vec::new()),
        Err(ShapeError::MissingDestination {
            class: "Add".to_owned()
        })
    );
    assert_eq!(
        Instruction::new(add, Some("d".into()), vec!["a".into()], Vec::new()),
        Err(ShapeError::RegisterCount {
            class: "Add".to_owned(),
            expected: 2,
            found: 1,
        })
    );
    assert_eq!(
        Instruction::new(jump.clone(), None, Vec::new(), vec![OperandValue::Integer(3)]),
        Err(ShapeError::OperandKind {
            class: "Jump".to_owned(),
            operand: "label".to_owned(),
            expected: "str",
        })
    );
    assert!(Instruction::new(jump, None, Vec::new(), vec!["top".into()]).is_ok());
}

#[test]
fn register_names_must_scan_as_registers() {
    let toolchain = toolchain();
    let add = toolchain.instruction("Add").expect("Add").clone();
    let build = |dst: &str, lhs: &str| {
        Instruction::new(
            add.clone(),
            Some(dst.to_owned()),
            vec![lhs.to_owned(), "b".to_owned()],
            Vec::new(),
        )
    };

    for bad in ["", "2x", "r_1", "r 1", "x-y"] {
        assert_eq!(
            build(bad, "a"),
            Err(ShapeError::InvalidRegister {
                class: "Add".to_owned(),
                register: bad.to_owned(),
            })
        );
    }
    for keyword in ["add", "Halt", "label"] {
        assert_eq!(
            build("d", keyword),
            Err(ShapeError::KeywordRegister {
                class: "Add".to_owned(),
                register: keyword.to_owned(),
            })
        );
    }
    assert!(build("PC", "SP").is_ok());
}

#[test]
fn text_without_a_spelling_is_rejected() {
    let toolchain = toolchain();
    let jump = toolchain.instruction("Jump").expect("Jump").clone();
    let halt = toolchain.instruction("Halt").expect("Halt").clone();

    for text in ["two\nlines", "it's \"quoted\">>", "'\">"] {
        assert_eq!(
            Instruction::new(jump.clone(), None, Vec::new(), vec![text.into()]),
            Err(ShapeError::UnrepresentableText {
                class: "Jump".to_owned(),
                field: "label".to_owned(),
            })
        );
    }

    let stop = Instruction::new(halt, None, Vec::new(), Vec::new()).expect("halt");
    assert_eq!(
        stop.clone().with_comment("a'b\"c>"),
        Err(ShapeError::UnrepresentableText {
            class: "Halt".to_owned(),
            field: "comment".to_owned(),
        })
    );
    assert_eq!(
        stop.clone().with_comment("a'b\"c> d").map(|stop| stop.to_string()),
        Ok("halt <<a'b\"c> d>>".to_owned())
    );
    assert!(stop.with_comment("line\nbreak").is_err());
}

#[test]
fn linking_rejects_bad_labels() {
    let toolchain = toolchain();
    match toolchain.assemble("label 'a'\nhalt\nlabel 'a'") {
        Err(LoadError::Link(error)) => assert_eq!(
            error,
            LinkError::DuplicateLabel {
                label: "a".to_owned(),
                first: 0,
                second: 2,
            }
        ),
        other => panic!("expected a link error, got {other:?}"),
    }

    match toolchain.assemble("print r0\njz r0 'nowhere'\nhalt") {
        Err(LoadError::Link(error)) => assert_eq!(
            error,
            LinkError::UndefinedLabel {
                label: "nowhere".to_owned(),
                address: 1,
            }
        ),
        other => panic!("expected a link error, got {other:?}"),
    }
}

#[test]
fn empty_source_is_an_empty_program() {
    let program = toolchain().assemble("// nothing here\n\n").expect("assembles");
    assert!(program.is_empty());
    assert!(program.labels().is_empty());
}
