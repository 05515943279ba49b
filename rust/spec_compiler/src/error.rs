//! Errors raised while compiling an instruction catalog.
//!
//! Every failure here happens before a grammar or any executable semantics
//! exist, so nothing downstream ever observes a partially compiled catalog.

use thiserror::Error;

/// Fatal catalog compilation error.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to parse catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("catalog contains no instructions")]
    EmptyCatalog,
    #[error("record {index} ({class}): {rule}")]
    InvalidRecord {
        index: usize,
        class: String,
        rule: RecordRule,
    },
    #[error("record {index} ({class}): mnemonic '{mnemonic}' is already used by record {first}")]
    DuplicateMnemonic {
        index: usize,
        class: String,
        mnemonic: String,
        first: usize,
    },
    #[error("{class}: template `{template}`: {source}")]
    Template {
        class: String,
        template: String,
        #[source]
        source: TemplateError,
    },
}

/// Structural rule violated by a single catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordRule {
    #[error("mnemonic '{0}' is not a letter followed by letters or digits")]
    InvalidMnemonic(String),
    #[error("field name '{0}' is not an identifier")]
    InvalidFieldName(String),
    #[error("field name '{0}' is reserved")]
    ReservedFieldName(String),
    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),
    #[error("operand '{operand}' has unsupported type '{found}' (expected int or str)")]
    UnsupportedOperandType { operand: String, found: String },
    #[error("stack effect declares {count} outputs; at most one is supported")]
    MultipleOutputs { count: usize },
    #[error("the label operand must have type str")]
    LabelOperandNotText,
    #[error("label-defining instruction has no label operand")]
    MissingLabelOperand,
}

/// Failure to parse or resolve one template string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unrecognised input `{0}`")]
    InvalidToken(String),
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
    },
    #[error("expected {expected}, found end of template")]
    UnexpectedEnd { expected: &'static str },
    #[error("unresolved identifier '{0}'")]
    UnresolvedIdentifier(String),
    #[error("text operand '{0}' cannot be used as a value")]
    TextOperand(String),
    #[error("'{0}' is not assignable")]
    NotAssignable(String),
    #[error("unknown intrinsic '{0}'")]
    UnknownIntrinsic(String),
    #[error("intrinsic '{name}' expects {expected} arguments, found {found}")]
    IntrinsicArity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("intrinsic '{name}' cannot be used {context}")]
    IntrinsicContext {
        name: String,
        context: &'static str,
    },
}
