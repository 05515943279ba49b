//! Intrinsic functions callable from instruction templates.
//!
//! Value intrinsics compute an integer from already-evaluated integer
//! arguments; statement intrinsics perform an effect on the machine and
//! produce no value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

/// Intrinsic usable inside an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueIntrinsic {
    /// `int(e)`; identity on the integer domain.
    Int,
    Abs,
    Min,
    Max,
}

/// Intrinsic usable only as a whole statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementIntrinsic {
    Print,
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    Value(ValueIntrinsic),
    Statement(StatementIntrinsic),
}

impl Intrinsic {
    pub fn arity(self) -> usize {
        match self {
            Intrinsic::Value(ValueIntrinsic::Int | ValueIntrinsic::Abs) => 1,
            Intrinsic::Value(ValueIntrinsic::Min | ValueIntrinsic::Max) => 2,
            Intrinsic::Statement(StatementIntrinsic::Print) => 1,
            Intrinsic::Statement(StatementIntrinsic::Halt) => 0,
        }
    }
}

impl ValueIntrinsic {
    pub fn name(self) -> &'static str {
        match self {
            ValueIntrinsic::Int => "int",
            ValueIntrinsic::Abs => "abs",
            ValueIntrinsic::Min => "min",
            ValueIntrinsic::Max => "max",
        }
    }

    /// Apply to evaluated arguments. Returns `None` on overflow.
    ///
    /// Arity is checked at expansion time, so `args` always has the length
    /// reported by [`Intrinsic::arity`].
    pub fn apply(self, args: &[i64]) -> Option<i64> {
        match (self, args) {
            (ValueIntrinsic::Int, [value]) => Some(*value),
            (ValueIntrinsic::Abs, [value]) => value.checked_abs(),
            (ValueIntrinsic::Min, [lhs, rhs]) => Some(*lhs.min(rhs)),
            (ValueIntrinsic::Max, [lhs, rhs]) => Some(*lhs.max(rhs)),
            _ => None,
        }
    }
}

impl StatementIntrinsic {
    pub fn name(self) -> &'static str {
        match self {
            StatementIntrinsic::Print => "print",
            StatementIntrinsic::Halt => "halt",
        }
    }
}

/// Registry of intrinsics known to the template expander.
#[derive(Debug, Clone)]
pub struct Intrinsics {
    registry: HashMap<&'static str, Intrinsic>,
}

impl Default for Intrinsics {
    fn default() -> Self {
        Self::standard()
    }
}

impl Intrinsics {
    pub fn standard() -> Self {
        let mut registry = HashMap::new();
        for value in [
            ValueIntrinsic::Int,
            ValueIntrinsic::Abs,
            ValueIntrinsic::Min,
            ValueIntrinsic::Max,
        ] {
            registry.insert(value.name(), Intrinsic::Value(value));
        }
        for statement in [StatementIntrinsic::Print, StatementIntrinsic::Halt] {
            registry.insert(statement.name(), Intrinsic::Statement(statement));
        }
        Self { registry }
    }

    pub fn lookup(&self, name: &str) -> Option<Intrinsic> {
        self.registry.get(name).copied()
    }

    /// Resolve a call appearing in expression position.
    pub fn resolve_value(&self, name: &str, argc: usize) -> Result<ValueIntrinsic, TemplateError> {
        match self.checked(name, argc)? {
            Intrinsic::Value(value) => Ok(value),
            Intrinsic::Statement(_) => Err(TemplateError::IntrinsicContext {
                name: name.to_owned(),
                context: "as a value",
            }),
        }
    }

    /// Resolve a call appearing as a whole statement.
    pub fn resolve_statement(
        &self,
        name: &str,
        argc: usize,
    ) -> Result<StatementIntrinsic, TemplateError> {
        match self.checked(name, argc)? {
            Intrinsic::Statement(statement) => Ok(statement),
            Intrinsic::Value(_) => Err(TemplateError::IntrinsicContext {
                name: name.to_owned(),
                context: "as a statement",
            }),
        }
    }

    fn checked(&self, name: &str, argc: usize) -> Result<Intrinsic, TemplateError> {
        let intrinsic = self
            .lookup(name)
            .ok_or_else(|| TemplateError::UnknownIntrinsic(name.to_owned()))?;
        if intrinsic.arity() != argc {
            return Err(TemplateError::IntrinsicArity {
                name: name.to_owned(),
                expected: intrinsic.arity(),
                found: argc,
            });
        }
        Ok(intrinsic)
    }
}
