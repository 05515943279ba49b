//! Instruction catalog compiler: grammar and semantics from one declarative source.

pub mod catalog;
pub mod error;
pub mod expand;
pub mod grammar;
pub mod intrinsics;
pub mod machine;
pub mod template;

pub use catalog::{Catalog, InstructionSpec, OperandKind, OperandSpec, STANDARD_CATALOG};
pub use error::{RecordRule, SpecError, TemplateError};
pub use expand::{Effect, Expr, FieldKind, FieldSpec, InstructionDef, InstructionSet, Place};
pub use grammar::{Grammar, Keywords, MnemonicForm, Symbol};
pub use machine::MachineRegister;
