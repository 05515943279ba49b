//! Declarative instruction catalog and its validation.
//!
//! A catalog is an ordered JSON array of instruction records. Each record names
//! a long mnemonic (`class`), a short mnemonic, typed operands, the register
//! roles it reads (`stack.before`), at most one value it writes
//! (`stack.after`), and free-form side-effect templates. Validation enforces
//! every structural rule up front; template bodies are checked later by the
//! expander.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RecordRule, SpecError};
use crate::machine::MachineRegister;
use crate::template;

/// Standard catalog shipped with the toolchain.
pub const STANDARD_CATALOG: &str = include_str!("../catalog/isa.json");

/// Field holding the register written by an instruction with an `after` effect.
pub const DESTINATION_FIELD: &str = "dst";
/// Trailing free-text field present on every instruction.
pub const COMMENT_FIELD: &str = "comment";
/// Operand name resolved through the label table.
pub const LABEL_OPERAND: &str = "label";

const LABEL_CLASS: &str = "Label";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOperand {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStackEffect {
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub after: Vec<String>,
}

/// One catalog record exactly as it appears in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInstruction {
    #[serde(rename = "class")]
    pub class_name: String,
    pub short: String,
    #[serde(default)]
    pub operands: Vec<RawOperand>,
    #[serde(default)]
    pub stack: RawStackEffect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<RawStackEffect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub side_effect: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defines_label: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandKind {
    Integer,
    Text,
}

impl OperandKind {
    pub fn from_catalog(name: &str) -> Option<Self> {
        match name {
            "int" => Some(OperandKind::Integer),
            "str" => Some(OperandKind::Text),
            _ => None,
        }
    }

    pub fn catalog_name(self) -> &'static str {
        match self {
            OperandKind::Integer => "int",
            OperandKind::Text => "str",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperandSpec {
    pub name: String,
    pub kind: OperandKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEffect {
    /// Register roles read by the instruction, in field order.
    pub before: Vec<String>,
    /// Expression template whose value lands in `dst`.
    pub after: Option<String>,
}

/// Declared memory footprint. Carried for tooling, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEffect {
    pub before: Vec<String>,
    pub after: Vec<String>,
}

/// Validated catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionSpec {
    pub class_name: String,
    pub short_mnemonic: String,
    pub operands: Vec<OperandSpec>,
    pub stack: StackEffect,
    pub side_effects: Vec<String>,
    pub memory_effect: Option<MemoryEffect>,
    pub defines_label: bool,
}

impl InstructionSpec {
    pub fn has_destination(&self) -> bool {
        self.stack.after.is_some()
    }

    /// Index of the operand named `label`, if declared.
    pub fn label_operand(&self) -> Option<usize> {
        self.operands
            .iter()
            .position(|operand| operand.name == LABEL_OPERAND)
    }

    pub fn mnemonic(&self, long: bool) -> &str {
        if long {
            &self.class_name
        } else {
            &self.short_mnemonic
        }
    }
}

/// Ordered, validated instruction catalog. Position is the opcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Catalog {
    instructions: Vec<InstructionSpec>,
}

impl Catalog {
    pub fn standard() -> Result<Self, SpecError> {
        Self::from_json(STANDARD_CATALOG)
    }

    pub fn from_json(json: &str) -> Result<Self, SpecError> {
        let records: Vec<RawInstruction> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    pub fn from_records(records: Vec<RawInstruction>) -> Result<Self, SpecError> {
        if records.is_empty() {
            return Err(SpecError::EmptyCatalog);
        }
        let mut mnemonics: HashMap<String, usize> = HashMap::new();
        let mut instructions = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            let spec = validate_record(index, record)?;
            claim_mnemonics(index, &spec, &mut mnemonics)?;
            instructions.push(spec);
        }
        debug!(instructions = instructions.len(), "validated instruction catalog");
        Ok(Self { instructions })
    }

    pub fn instructions(&self) -> &[InstructionSpec] {
        &self.instructions
    }

    pub fn get(&self, opcode: usize) -> Option<&InstructionSpec> {
        self.instructions.get(opcode)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstructionSpec> {
        self.instructions.iter()
    }
}

fn validate_record(index: usize, raw: RawInstruction) -> Result<InstructionSpec, SpecError> {
    let invalid = |rule: RecordRule| SpecError::InvalidRecord {
        index,
        class: raw.class_name.clone(),
        rule,
    };

    for mnemonic in [&raw.class_name, &raw.short] {
        if !is_mnemonic(mnemonic) {
            return Err(invalid(RecordRule::InvalidMnemonic(mnemonic.clone())));
        }
    }

    let after = match raw.stack.after.len() {
        0 => None,
        1 => raw.stack.after.first().cloned(),
        count => return Err(invalid(RecordRule::MultipleOutputs { count })),
    };

    let mut fields: HashSet<&str> = HashSet::new();
    for role in &raw.stack.before {
        check_field_name(role).map_err(&invalid)?;
        if role == LABEL_OPERAND {
            return Err(invalid(RecordRule::ReservedFieldName(role.clone())));
        }
        if !fields.insert(role) {
            return Err(invalid(RecordRule::DuplicateField(role.clone())));
        }
    }

    let mut operands = Vec::with_capacity(raw.operands.len());
    for operand in &raw.operands {
        check_field_name(&operand.name).map_err(&invalid)?;
        if !fields.insert(&operand.name) {
            return Err(invalid(RecordRule::DuplicateField(operand.name.clone())));
        }
        let kind = OperandKind::from_catalog(&operand.kind).ok_or_else(|| {
            invalid(RecordRule::UnsupportedOperandType {
                operand: operand.name.clone(),
                found: operand.kind.clone(),
            })
        })?;
        if operand.name == LABEL_OPERAND && kind != OperandKind::Text {
            return Err(invalid(RecordRule::LabelOperandNotText));
        }
        operands.push(OperandSpec {
            name: operand.name.clone(),
            kind,
        });
    }

    let defines_label = raw
        .defines_label
        .unwrap_or(raw.class_name == LABEL_CLASS);
    if defines_label && !operands.iter().any(|operand| operand.name == LABEL_OPERAND) {
        return Err(invalid(RecordRule::MissingLabelOperand));
    }

    Ok(InstructionSpec {
        class_name: raw.class_name.clone(),
        short_mnemonic: raw.short.clone(),
        operands,
        stack: StackEffect {
            before: raw.stack.before.clone(),
            after,
        },
        side_effects: raw.side_effect.clone(),
        memory_effect: raw.memory.as_ref().map(|memory| MemoryEffect {
            before: memory.before.clone(),
            after: memory.after.clone(),
        }),
        defines_label,
    })
}

fn claim_mnemonics(
    index: usize,
    spec: &InstructionSpec,
    claimed: &mut HashMap<String, usize>,
) -> Result<(), SpecError> {
    for mnemonic in [&spec.class_name, &spec.short_mnemonic] {
        match claimed.get(mnemonic.as_str()) {
            Some(&first) if first != index => {
                return Err(SpecError::DuplicateMnemonic {
                    index,
                    class: spec.class_name.clone(),
                    mnemonic: mnemonic.clone(),
                    first,
                });
            }
            Some(_) => {}
            None => {
                claimed.insert(mnemonic.clone(), index);
            }
        }
    }
    Ok(())
}

fn check_field_name(name: &str) -> Result<(), RecordRule> {
    if !is_field_name(name) {
        return Err(RecordRule::InvalidFieldName(name.to_owned()));
    }
    let reserved = name == DESTINATION_FIELD
        || name == COMMENT_FIELD
        || MachineRegister::from_name(name).is_some()
        || template::KEYWORDS.contains(&name);
    if reserved {
        return Err(RecordRule::ReservedFieldName(name.to_owned()));
    }
    Ok(())
}

/// Program-text identifier: ASCII letter, then ASCII letters or digits.
pub fn is_mnemonic(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}

fn is_field_name(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
