//! Linked programs and their label tables.
//!
//! Linking runs two passes over the instruction sequence before anything
//! executes. The first records the address of every label-defining
//! instruction; the second checks that every `label` operand names one of
//! them. A program that links can never fail a label lookup at run time.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::instruction::Instruction;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("label '{label}' is defined at both {first} and {second}")]
    DuplicateLabel {
        label: String,
        first: usize,
        second: usize,
    },
    #[error("instruction at {address} refers to undefined label '{label}'")]
    UndefinedLabel { label: String, address: usize },
}

/// Label name to program address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    addresses: HashMap<String, usize>,
}

impl LabelTable {
    pub fn address(&self, label: &str) -> Option<usize> {
        self.addresses.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Instruction sequence whose labels all resolve. Index is address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: LabelTable,
}

impl Program {
    pub fn link(instructions: Vec<Instruction>) -> Result<Self, LinkError> {
        let mut addresses: HashMap<String, usize> = HashMap::new();
        for (address, instruction) in instructions.iter().enumerate() {
            if !instruction.def().defines_label() {
                continue;
            }
            let Some(label) = instruction.label() else {
                continue;
            };
            if let Some(&first) = addresses.get(label) {
                return Err(LinkError::DuplicateLabel {
                    label: label.to_owned(),
                    first,
                    second: address,
                });
            }
            addresses.insert(label.to_owned(), address);
        }

        for (address, instruction) in instructions.iter().enumerate() {
            if let Some(label) = instruction.label() {
                if !addresses.contains_key(label) {
                    return Err(LinkError::UndefinedLabel {
                        label: label.to_owned(),
                        address,
                    });
                }
            }
        }

        debug!(
            instructions = instructions.len(),
            labels = addresses.len(),
            "linked program"
        );
        Ok(Self {
            instructions,
            labels: LabelTable { addresses },
        })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn get(&self, address: usize) -> Option<&Instruction> {
        self.instructions.get(address)
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Address-prefixed disassembly, one instruction per line. Label
    /// definitions and instructions without effect sit flush left; everything
    /// else is indented.
    pub fn listing(&self) -> String {
        let mut listing = String::new();
        for (address, instruction) in self.instructions.iter().enumerate() {
            let def = instruction.def();
            let indent = if def.defines_label() || def.is_inert() {
                ""
            } else {
                "        "
            };
            listing.push_str(&format!(
                "[{address:5}] {indent}{}\n",
                instruction.disassemble(false)
            ));
        }
        listing
    }
}
