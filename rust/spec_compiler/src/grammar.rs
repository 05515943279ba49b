//! Grammar synthesis for the program text accepted by an instruction set.
//!
//! The grammar is derived from the same catalog as the semantics, so syntax
//! and behaviour cannot drift apart. Its [`Display`](std::fmt::Display) form is
//! an EBNF-style artifact; the program parser consumes the structured
//! [`Alternative`] list directly.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::catalog::{Catalog, OperandKind, COMMENT_FIELD, DESTINATION_FIELD};

/// Terminal class expected at one position of an alternative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Register,
    Integer,
    Text,
    /// Text literal, or nothing when a mnemonic or end of input follows.
    Comment,
}

impl Symbol {
    fn nonterminal(self) -> &'static str {
        match self {
            Symbol::Register => "reg",
            Symbol::Integer => "integer",
            Symbol::Text => "text",
            Symbol::Comment => "comment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarItem {
    pub field: String,
    pub symbol: Symbol,
}

/// `(long | short) item {[","] item}` for one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternative {
    pub opcode: usize,
    pub long: String,
    pub short: String,
    pub items: Vec<GrammarItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    alternatives: Vec<Alternative>,
}

impl Grammar {
    pub fn synthesize(catalog: &Catalog) -> Self {
        let alternatives: Vec<Alternative> = catalog
            .iter()
            .enumerate()
            .map(|(opcode, spec)| {
                let mut items = Vec::new();
                if spec.has_destination() {
                    items.push(GrammarItem {
                        field: DESTINATION_FIELD.to_owned(),
                        symbol: Symbol::Register,
                    });
                }
                for role in &spec.stack.before {
                    items.push(GrammarItem {
                        field: role.clone(),
                        symbol: Symbol::Register,
                    });
                }
                for operand in &spec.operands {
                    items.push(GrammarItem {
                        field: operand.name.clone(),
                        symbol: match operand.kind {
                            OperandKind::Integer => Symbol::Integer,
                            OperandKind::Text => Symbol::Text,
                        },
                    });
                }
                items.push(GrammarItem {
                    field: COMMENT_FIELD.to_owned(),
                    symbol: Symbol::Comment,
                });
                Alternative {
                    opcode,
                    long: spec.class_name.clone(),
                    short: spec.short_mnemonic.clone(),
                    items,
                }
            })
            .collect();
        debug!(alternatives = alternatives.len(), "synthesized grammar");
        Self { alternatives }
    }

    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    pub fn alternative(&self, opcode: usize) -> Option<&Alternative> {
        self.alternatives.get(opcode)
    }

    /// Keyword table for the scanner and parser.
    pub fn keywords(&self) -> Keywords {
        let mut table = HashMap::new();
        for alternative in &self.alternatives {
            table.insert(
                alternative.short.clone(),
                (alternative.opcode, MnemonicForm::Short),
            );
            table.insert(
                alternative.long.clone(),
                (alternative.opcode, MnemonicForm::Long),
            );
        }
        Keywords { table }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "start : {{operation}} EOF .")?;
        writeln!(f)?;
        writeln!(f, "operation :")?;
        for (index, alternative) in self.alternatives.iter().enumerate() {
            let lead = if index == 0 { "   " } else { " | " };
            write!(
                f,
                "  {lead}(\"{}\" | \"{}\")",
                alternative.long, alternative.short
            )?;
            for (position, item) in alternative.items.iter().enumerate() {
                if position > 0 {
                    write!(f, " [\",\"]")?;
                }
                write!(f, " {}'{}", item.symbol.nonterminal(), item.field)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "  .")?;
        writeln!(f)?;
        writeln!(f, "reg : ID .")?;
        writeln!(f, "integer : INT .")?;
        writeln!(f, "text : STR .")?;
        writeln!(f, "comment : [text] .")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MnemonicForm {
    Long,
    Short,
}

impl MnemonicForm {
    pub fn is_long(self) -> bool {
        self == MnemonicForm::Long
    }
}

/// Mnemonic lookup shared by the scanner and parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keywords {
    table: HashMap<String, (usize, MnemonicForm)>,
}

impl Keywords {
    pub fn lookup(&self, word: &str) -> Option<(usize, MnemonicForm)> {
        self.table.get(word).copied()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.table.contains_key(word)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
