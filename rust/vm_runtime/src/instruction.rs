//! Instruction values and their executable semantics.
//!
//! An [`Instruction`] pairs a compiled [`InstructionDef`] (its variant tag,
//! shared by every instruction of the same kind) with the concrete fields
//! written in program text: the destination register, one register per role,
//! one typed value per operand, and a trailing comment. Construction checks the
//! fields against the definition, so evaluation never has to. It also checks
//! that every field has a spelling the scanner reads back, which is what lets
//! [`Instruction::disassemble`] promise re-parseable text.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use isavm_spec_compiler::catalog::{is_mnemonic, COMMENT_FIELD};
use isavm_spec_compiler::template::{BinaryOp, UnaryOp};
use isavm_spec_compiler::{Effect, Expr, InstructionDef, OperandKind, Place};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::{Memory, MemoryError};
use crate::program::LabelTable;
use crate::registers::RegisterFile;

/// Literal operand value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandValue {
    Integer(i64),
    Text(String),
}

impl OperandValue {
    pub fn kind(&self) -> OperandKind {
        match self {
            OperandValue::Integer(_) => OperandKind::Integer,
            OperandValue::Text(_) => OperandKind::Text,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            OperandValue::Integer(value) => Some(*value),
            OperandValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OperandValue::Text(text) => Some(text),
            OperandValue::Integer(_) => None,
        }
    }
}

impl From<i64> for OperandValue {
    fn from(value: i64) -> Self {
        OperandValue::Integer(value)
    }
}

impl From<&str> for OperandValue {
    fn from(text: &str) -> Self {
        OperandValue::Text(text.to_owned())
    }
}

/// Text values render through the first spelling that can carry them. Text no
/// spelling carries only exists outside an [`Instruction`] and falls back to
/// single quotes.
impl fmt::Display for OperandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandValue::Integer(value) => write!(f, "{value}"),
            OperandValue::Text(text) => match spell(text, &OPERAND_SPELLINGS) {
                Some(literal) => f.write_str(&literal),
                None => write!(f, "'{text}'"),
            },
        }
    }
}

/// Delimiters of a text literal in program text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Spelling {
    Single,
    Double,
    Angled,
}

const OPERAND_SPELLINGS: [Spelling; 3] = [Spelling::Single, Spelling::Double, Spelling::Angled];
const COMMENT_SPELLINGS: [Spelling; 3] = [Spelling::Angled, Spelling::Single, Spelling::Double];

impl Spelling {
    /// `<<…>>` closes at the first `>>`, so its content may neither contain
    /// one nor end in `>`.
    fn carries(self, text: &str) -> bool {
        match self {
            Spelling::Single => !text.contains('\''),
            Spelling::Double => !text.contains('"'),
            Spelling::Angled => !text.contains(">>") && !text.ends_with('>'),
        }
    }

    fn wrap(self, text: &str) -> String {
        match self {
            Spelling::Single => format!("'{text}'"),
            Spelling::Double => format!("\"{text}\""),
            Spelling::Angled => format!("<<{text}>>"),
        }
    }
}

/// First spelling in `order` the scanner reads back as exactly `text`.
fn spell(text: &str, order: &[Spelling]) -> Option<String> {
    if text.contains('\n') {
        return None;
    }
    order
        .iter()
        .find(|spelling| spelling.carries(text))
        .map(|spelling| spelling.wrap(text))
}

/// Fields that do not match the instruction's definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("{class}: destination register is required")]
    MissingDestination { class: String },
    #[error("{class}: destination register is not accepted")]
    UnexpectedDestination { class: String },
    #[error("{class}: expected {expected} role registers, found {found}")]
    RegisterCount {
        class: String,
        expected: usize,
        found: usize,
    },
    #[error("{class}: expected {expected} operands, found {found}")]
    OperandCount {
        class: String,
        expected: usize,
        found: usize,
    },
    #[error("{class}: operand '{operand}' must be {expected}")]
    OperandKind {
        class: String,
        operand: String,
        expected: &'static str,
    },
    #[error("{class}: '{register}' is not a register name")]
    InvalidRegister { class: String, register: String },
    #[error("{class}: register name '{register}' is a mnemonic")]
    KeywordRegister { class: String, register: String },
    #[error("{class}: {field} text has no literal spelling")]
    UnrepresentableText { class: String, field: String },
}

/// Failure while executing a single instruction.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in `{operation}`")]
    Overflow { operation: &'static str },
    #[error("undefined label '{0}'")]
    UndefinedLabel(String),
    #[error("operand '{0}' holds a value of the wrong kind")]
    OperandKind(String),
    #[error("failed to write program output: {0}")]
    Output(#[source] Arc<io::Error>),
}

/// Whether execution continues after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

/// Mutable machine state an instruction executes against.
pub struct Machine<'a> {
    pub registers: &'a mut RegisterFile,
    pub memory: &'a mut Memory,
    pub labels: &'a LabelTable,
    pub output: &'a mut dyn Write,
}

#[derive(Clone)]
pub struct Instruction {
    def: Arc<InstructionDef>,
    dst: Option<String>,
    registers: Vec<String>,
    operands: Vec<OperandValue>,
    comment: String,
}

impl Instruction {
    pub fn new(
        def: Arc<InstructionDef>,
        dst: Option<String>,
        registers: Vec<String>,
        operands: Vec<OperandValue>,
    ) -> Result<Self, ShapeError> {
        let class = || def.class_name().to_owned();
        match (&dst, def.has_destination()) {
            (None, true) => return Err(ShapeError::MissingDestination { class: class() }),
            (Some(_), false) => return Err(ShapeError::UnexpectedDestination { class: class() }),
            _ => {}
        }
        if registers.len() != def.roles().len() {
            return Err(ShapeError::RegisterCount {
                class: class(),
                expected: def.roles().len(),
                found: registers.len(),
            });
        }
        if operands.len() != def.operands().len() {
            return Err(ShapeError::OperandCount {
                class: class(),
                expected: def.operands().len(),
                found: operands.len(),
            });
        }
        for (spec, value) in def.operands().iter().zip(&operands) {
            if spec.kind != value.kind() {
                return Err(ShapeError::OperandKind {
                    class: class(),
                    operand: spec.name.clone(),
                    expected: spec.kind.catalog_name(),
                });
            }
            if let OperandValue::Text(text) = value {
                if spell(text, &OPERAND_SPELLINGS).is_none() {
                    return Err(ShapeError::UnrepresentableText {
                        class: class(),
                        field: spec.name.clone(),
                    });
                }
            }
        }
        for register in dst.iter().chain(&registers) {
            if !is_mnemonic(register) {
                return Err(ShapeError::InvalidRegister {
                    class: class(),
                    register: register.clone(),
                });
            }
            if def.is_keyword(register) {
                return Err(ShapeError::KeywordRegister {
                    class: class(),
                    register: register.clone(),
                });
            }
        }
        Ok(Self {
            def,
            dst,
            registers,
            operands,
            comment: String::new(),
        })
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Result<Self, ShapeError> {
        let comment = comment.into();
        if !comment.is_empty() && spell(&comment, &COMMENT_SPELLINGS).is_none() {
            return Err(ShapeError::UnrepresentableText {
                class: self.def.class_name().to_owned(),
                field: COMMENT_FIELD.to_owned(),
            });
        }
        self.comment = comment;
        Ok(self)
    }

    pub fn def(&self) -> &Arc<InstructionDef> {
        &self.def
    }

    pub fn opcode(&self) -> usize {
        self.def.opcode()
    }

    pub fn class_name(&self) -> &str {
        self.def.class_name()
    }

    pub fn dst(&self) -> Option<&str> {
        self.dst.as_deref()
    }

    pub fn registers(&self) -> &[String] {
        &self.registers
    }

    pub fn operands(&self) -> &[OperandValue] {
        &self.operands
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Value of the operand declared as `name`.
    pub fn operand(&self, name: &str) -> Option<&OperandValue> {
        self.def
            .operands()
            .iter()
            .position(|spec| spec.name == name)
            .and_then(|index| self.operands.get(index))
    }

    /// Text of the `label` operand, if this instruction has one.
    pub fn label(&self) -> Option<&str> {
        self.def
            .label_operand()
            .and_then(|index| self.operands.get(index))
            .and_then(OperandValue::as_text)
    }

    /// Apply this instruction's semantics: write the result to `dst`, then run
    /// side effects in order.
    pub fn execute(&self, machine: &mut Machine<'_>) -> Result<Flow, RuntimeError> {
        if let Some(result) = self.def.result() {
            let value = self.eval(result, machine)?;
            if let Some(dst) = &self.dst {
                machine.registers.set(dst, value);
            }
        }
        for effect in self.def.effects() {
            if self.apply(effect, machine)? == Flow::Halt {
                return Ok(Flow::Halt);
            }
        }
        Ok(Flow::Continue)
    }

    fn apply(&self, effect: &Effect, machine: &mut Machine<'_>) -> Result<Flow, RuntimeError> {
        match effect {
            Effect::Assign { place, value } => {
                let value = self.eval(value, machine)?;
                match place {
                    Place::Register(register) => machine.registers.set_machine(*register, value),
                    Place::Role(index) => machine.registers.set(&self.registers[*index], value),
                    Place::Memory(address) => {
                        let address = self.eval(address, machine)?;
                        machine.memory.store(address, value)?;
                    }
                }
                Ok(Flow::Continue)
            }
            Effect::Guarded { condition, effect } => {
                if self.eval(condition, machine)? != 0 {
                    self.apply(effect, machine)
                } else {
                    Ok(Flow::Continue)
                }
            }
            Effect::Print(value) => {
                let value = self.eval(value, machine)?;
                writeln!(machine.output, "{value}")
                    .map_err(|error| RuntimeError::Output(Arc::new(error)))?;
                Ok(Flow::Continue)
            }
            Effect::Halt => Ok(Flow::Halt),
        }
    }

    fn eval(&self, expr: &Expr, machine: &mut Machine<'_>) -> Result<i64, RuntimeError> {
        match expr {
            Expr::Literal(value) => Ok(*value),
            Expr::Register(register) => Ok(machine.registers.machine(*register)),
            Expr::Role(index) => Ok(machine.registers.get(&self.registers[*index])),
            Expr::Label(index) => {
                let name = self.operands[*index]
                    .as_text()
                    .ok_or_else(|| RuntimeError::OperandKind(self.operand_name(*index)))?;
                machine
                    .labels
                    .address(name)
                    .map(|address| address as i64)
                    .ok_or_else(|| RuntimeError::UndefinedLabel(name.to_owned()))
            }
            Expr::Operand(index) => self.operands[*index]
                .as_integer()
                .ok_or_else(|| RuntimeError::OperandKind(self.operand_name(*index))),
            Expr::Load(address) => {
                let address = self.eval(address, machine)?;
                Ok(machine.memory.load(address)?)
            }
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => self
                .eval(operand, machine)?
                .checked_neg()
                .ok_or(RuntimeError::Overflow { operation: "-" }),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs, machine)?;
                let rhs = self.eval(rhs, machine)?;
                binary(*op, lhs, rhs)
            }
            Expr::Call { intrinsic, args } => {
                let values = args
                    .iter()
                    .map(|arg| self.eval(arg, machine))
                    .collect::<Result<Vec<_>, _>>()?;
                intrinsic.apply(&values).ok_or(RuntimeError::Overflow {
                    operation: intrinsic.name(),
                })
            }
        }
    }

    fn operand_name(&self, index: usize) -> String {
        self.def.operands()[index].name.clone()
    }

    /// Render as program text that parses back to an equal instruction.
    pub fn disassemble(&self, long: bool) -> String {
        let mut text = self.def.mnemonic(long).to_owned();
        let fields: Vec<String> = self
            .dst
            .iter()
            .chain(&self.registers)
            .cloned()
            .chain(self.operands.iter().map(OperandValue::to_string))
            .collect();
        if !fields.is_empty() {
            text.push(' ');
            text.push_str(&fields.join(", "));
        }
        if self.comment.is_empty() {
            return text;
        }
        if let Some(comment) = spell(&self.comment, &COMMENT_SPELLINGS) {
            text.push(' ');
            text.push_str(&comment);
        }
        text
    }
}

impl PartialEq for Instruction {
    fn eq(&self, other: &Self) -> bool {
        self.def.opcode() == other.def.opcode()
            && self.def.class_name() == other.def.class_name()
            && self.dst == other.dst
            && self.registers == other.registers
            && self.operands == other.operands
            && self.comment == other.comment
    }
}

impl Eq for Instruction {}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("class", &self.def.class_name())
            .field("dst", &self.dst)
            .field("registers", &self.registers)
            .field("operands", &self.operands)
            .field("comment", &self.comment)
            .finish()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.disassemble(false))
    }
}

fn binary(op: BinaryOp, lhs: i64, rhs: i64) -> Result<i64, RuntimeError> {
    let overflow = RuntimeError::Overflow {
        operation: op.symbol(),
    };
    match op {
        BinaryOp::Add => lhs.checked_add(rhs).ok_or(overflow),
        BinaryOp::Sub => lhs.checked_sub(rhs).ok_or(overflow),
        BinaryOp::Mul => lhs.checked_mul(rhs).ok_or(overflow),
        BinaryOp::FloorDiv if rhs == 0 => Err(RuntimeError::DivisionByZero),
        BinaryOp::FloorDiv => floor_div(lhs, rhs).ok_or(overflow),
        BinaryOp::Mod if rhs == 0 => Err(RuntimeError::DivisionByZero),
        BinaryOp::Mod => Ok(floor_mod(lhs, rhs)),
        BinaryOp::Lt => Ok(i64::from(lhs < rhs)),
        BinaryOp::Gt => Ok(i64::from(lhs > rhs)),
        BinaryOp::Le => Ok(i64::from(lhs <= rhs)),
        BinaryOp::Ge => Ok(i64::from(lhs >= rhs)),
        BinaryOp::Eq => Ok(i64::from(lhs == rhs)),
        BinaryOp::Ne => Ok(i64::from(lhs != rhs)),
    }
}

/// Quotient rounded toward negative infinity.
fn floor_div(lhs: i64, rhs: i64) -> Option<i64> {
    let quotient = lhs.checked_div(rhs)?;
    if lhs % rhs != 0 && (lhs < 0) != (rhs < 0) {
        quotient.checked_sub(1)
    } else {
        Some(quotient)
    }
}

/// Remainder with the sign of the divisor.
fn floor_mod(lhs: i64, rhs: i64) -> i64 {
    let remainder = lhs.wrapping_rem(rhs);
    if remainder != 0 && (remainder < 0) != (rhs < 0) {
        remainder + rhs
    } else {
        remainder
    }
}
