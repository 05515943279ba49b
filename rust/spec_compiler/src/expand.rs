//! Template expansion: catalog records into executable instruction semantics.
//!
//! Each template is parsed once and every identifier in it is bound, in
//! priority order, to a machine register, one of the instruction's register
//! roles, the label table (for the operand named `label`), or another operand.
//! The result is a closed tree that the runtime evaluates without ever looking
//! at template text again.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::catalog::{
    Catalog, InstructionSpec, OperandKind, OperandSpec, COMMENT_FIELD, DESTINATION_FIELD,
    LABEL_OPERAND,
};
use crate::error::{SpecError, TemplateError};
use crate::intrinsics::{Intrinsics, StatementIntrinsic, ValueIntrinsic};
use crate::machine::MachineRegister;
use crate::template::{self, BinaryOp, RawExpr, RawPlace, RawStatement, UnaryOp};

/// Resolved value expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(i64),
    Register(MachineRegister),
    /// Register named by the instruction's n-th role field.
    Role(usize),
    /// Address of the label named by the operand at this index.
    Label(usize),
    /// Integer operand at this index.
    Operand(usize),
    Load(Box<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        intrinsic: ValueIntrinsic,
        args: Vec<Expr>,
    },
}

/// Assignment target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Place {
    Register(MachineRegister),
    Role(usize),
    Memory(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Assign { place: Place, value: Expr },
    /// Runs `effect` when `condition` is non-zero.
    Guarded {
        condition: Expr,
        effect: Box<Effect>,
    },
    Print(Expr),
    Halt,
}

impl Effect {
    /// Whether this effect may write the program counter.
    pub fn transfers_control(&self) -> bool {
        match self {
            Effect::Assign { place, .. } => *place == Place::Register(MachineRegister::Pc),
            Effect::Guarded { effect, .. } => effect.transfers_control(),
            Effect::Print(_) | Effect::Halt => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Destination,
    Role,
    Operand(OperandKind),
    Comment,
}

/// One positional field of an instruction value, in syntax order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

/// Compiled semantics for one catalog record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionDef {
    opcode: usize,
    spec: InstructionSpec,
    fields: Vec<FieldSpec>,
    result: Option<Expr>,
    effects: Vec<Effect>,
    /// Every mnemonic of the catalog this record was compiled from.
    keywords: Arc<BTreeSet<String>>,
}

impl InstructionDef {
    pub fn opcode(&self) -> usize {
        self.opcode
    }

    pub fn spec(&self) -> &InstructionSpec {
        &self.spec
    }

    pub fn class_name(&self) -> &str {
        &self.spec.class_name
    }

    pub fn mnemonic(&self, long: bool) -> &str {
        self.spec.mnemonic(long)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn roles(&self) -> &[String] {
        &self.spec.stack.before
    }

    pub fn operands(&self) -> &[OperandSpec] {
        &self.spec.operands
    }

    pub fn has_destination(&self) -> bool {
        self.result.is_some()
    }

    pub fn label_operand(&self) -> Option<usize> {
        self.spec.label_operand()
    }

    pub fn defines_label(&self) -> bool {
        self.spec.defines_label
    }

    /// Value written to `dst`, if any.
    pub fn result(&self) -> Option<&Expr> {
        self.result.as_ref()
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// `word` is a mnemonic of this definition's instruction set, so it cannot
    /// name a register in program text.
    pub fn is_keyword(&self, word: &str) -> bool {
        self.keywords.contains(word)
    }

    /// Executing this instruction changes nothing.
    pub fn is_inert(&self) -> bool {
        self.result.is_none() && self.effects.is_empty()
    }
}

/// Every instruction of a catalog, compiled and indexed by opcode.
#[derive(Debug, Clone)]
pub struct InstructionSet {
    defs: Vec<Arc<InstructionDef>>,
}

impl InstructionSet {
    pub fn compile(catalog: &Catalog) -> Result<Self, SpecError> {
        let intrinsics = Intrinsics::standard();
        let keywords: Arc<BTreeSet<String>> = Arc::new(
            catalog
                .iter()
                .flat_map(|spec| [spec.mnemonic(true), spec.mnemonic(false)])
                .map(str::to_owned)
                .collect(),
        );
        let defs = catalog
            .iter()
            .enumerate()
            .map(|(opcode, spec)| expand(opcode, spec, &intrinsics, &keywords).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(instructions = defs.len(), "compiled instruction set");
        Ok(Self { defs })
    }

    pub fn standard() -> Result<Self, SpecError> {
        Self::compile(&Catalog::standard()?)
    }

    pub fn get(&self, opcode: usize) -> Option<&Arc<InstructionDef>> {
        self.defs.get(opcode)
    }

    pub fn by_class(&self, class_name: &str) -> Option<&Arc<InstructionDef>> {
        self.defs.iter().find(|def| def.class_name() == class_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<InstructionDef>> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// Expand a single validated record.
pub fn expand(
    opcode: usize,
    spec: &InstructionSpec,
    intrinsics: &Intrinsics,
    keywords: &Arc<BTreeSet<String>>,
) -> Result<InstructionDef, SpecError> {
    let resolver = Resolver { spec, intrinsics };

    let result = match &spec.stack.after {
        Some(text) => {
            let raw = template::parse_expression(text).map_err(in_template(spec, text))?;
            Some(resolver.expr(&raw).map_err(in_template(spec, text))?)
        }
        None => None,
    };

    let mut effects = Vec::with_capacity(spec.side_effects.len());
    for text in &spec.side_effects {
        let raw = template::parse_statement(text).map_err(in_template(spec, text))?;
        effects.push(resolver.statement(&raw).map_err(in_template(spec, text))?);
    }

    debug!(
        class = %spec.class_name,
        opcode,
        effects = effects.len(),
        "expanded instruction templates"
    );
    Ok(InstructionDef {
        opcode,
        spec: spec.clone(),
        fields: field_layout(spec),
        result,
        effects,
        keywords: Arc::clone(keywords),
    })
}

fn in_template(spec: &InstructionSpec, text: &str) -> impl FnOnce(TemplateError) -> SpecError {
    let class = spec.class_name.clone();
    let template = text.to_owned();
    move |source| SpecError::Template {
        class,
        template,
        source,
    }
}

fn field_layout(spec: &InstructionSpec) -> Vec<FieldSpec> {
    let mut fields = Vec::new();
    if spec.has_destination() {
        fields.push(FieldSpec {
            name: DESTINATION_FIELD.to_owned(),
            kind: FieldKind::Destination,
        });
    }
    fields.extend(spec.stack.before.iter().map(|role| FieldSpec {
        name: role.clone(),
        kind: FieldKind::Role,
    }));
    fields.extend(spec.operands.iter().map(|operand| FieldSpec {
        name: operand.name.clone(),
        kind: FieldKind::Operand(operand.kind),
    }));
    fields.push(FieldSpec {
        name: COMMENT_FIELD.to_owned(),
        kind: FieldKind::Comment,
    });
    fields
}

struct Resolver<'a> {
    spec: &'a InstructionSpec,
    intrinsics: &'a Intrinsics,
}

impl Resolver<'_> {
    fn name(&self, name: &str) -> Result<Expr, TemplateError> {
        if let Some(register) = MachineRegister::from_name(name) {
            return Ok(Expr::Register(register));
        }
        if let Some(index) = self.role_index(name) {
            return Ok(Expr::Role(index));
        }
        if let Some(index) = self.operand_index(name) {
            if name == LABEL_OPERAND {
                return Ok(Expr::Label(index));
            }
            return match self.spec.operands[index].kind {
                OperandKind::Integer => Ok(Expr::Operand(index)),
                OperandKind::Text => Err(TemplateError::TextOperand(name.to_owned())),
            };
        }
        Err(TemplateError::UnresolvedIdentifier(name.to_owned()))
    }

    fn role_index(&self, name: &str) -> Option<usize> {
        self.spec.stack.before.iter().position(|role| role == name)
    }

    fn operand_index(&self, name: &str) -> Option<usize> {
        self.spec
            .operands
            .iter()
            .position(|operand| operand.name == name)
    }

    fn expr(&self, raw: &RawExpr) -> Result<Expr, TemplateError> {
        Ok(match raw {
            RawExpr::Integer(value) => Expr::Literal(*value),
            RawExpr::Name(name) => self.name(name)?,
            RawExpr::Memory(address) => Expr::Load(Box::new(self.expr(address)?)),
            RawExpr::Call { name, args } => {
                let intrinsic = self.intrinsics.resolve_value(name, args.len())?;
                let args = args
                    .iter()
                    .map(|arg| self.expr(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Expr::Call { intrinsic, args }
            }
            RawExpr::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: Box::new(self.expr(operand)?),
            },
            RawExpr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: Box::new(self.expr(lhs)?),
                rhs: Box::new(self.expr(rhs)?),
            },
        })
    }

    fn place(&self, raw: &RawPlace) -> Result<Place, TemplateError> {
        match raw {
            RawPlace::Memory(address) => Ok(Place::Memory(self.expr(address)?)),
            RawPlace::Name(name) => {
                if let Some(register) = MachineRegister::from_name(name) {
                    Ok(Place::Register(register))
                } else if let Some(index) = self.role_index(name) {
                    Ok(Place::Role(index))
                } else if self.operand_index(name).is_some() {
                    Err(TemplateError::NotAssignable(name.clone()))
                } else {
                    Err(TemplateError::UnresolvedIdentifier(name.clone()))
                }
            }
        }
    }

    fn statement(&self, raw: &RawStatement) -> Result<Effect, TemplateError> {
        match raw {
            RawStatement::Assign { place, value } => Ok(Effect::Assign {
                place: self.place(place)?,
                value: self.expr(value)?,
            }),
            RawStatement::If { condition, body } => Ok(Effect::Guarded {
                condition: self.expr(condition)?,
                effect: Box::new(self.statement(body)?),
            }),
            RawStatement::Call { name, args } => {
                match self.intrinsics.resolve_statement(name, args.len())? {
                    StatementIntrinsic::Print => match args.as_slice() {
                        [value] => Ok(Effect::Print(self.expr(value)?)),
                        _ => Err(TemplateError::IntrinsicArity {
                            name: name.clone(),
                            expected: 1,
                            found: args.len(),
                        }),
                    },
                    StatementIntrinsic::Halt => Ok(Effect::Halt),
                }
            }
        }
    }
}
