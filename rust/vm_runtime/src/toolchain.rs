//! Front-to-back driver: catalog to runnable program.
//!
//! A [`Toolchain`] compiles one catalog into its instruction set, grammar and
//! keyword table, then assembles program text against them. [`launch`] sets up
//! memory and registers following the calling convention used by the CLI.

use std::io::Write;
use std::sync::Arc;

use isavm_spec_compiler::{
    Catalog, Grammar, InstructionDef, InstructionSet, Keywords, MachineRegister, SpecError,
};
use thiserror::Error;
use tracing::debug;

use crate::instruction::Instruction;
use crate::interpreter::{Execution, ExecutionConfig};
use crate::lexer::{ScanError, Scanner, Token};
use crate::memory::Memory;
use crate::parser::{ParseError, Parser};
use crate::program::{LinkError, Program};
use crate::registers::RegisterFile;

/// Failure turning program text into a linked program.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("link error: {0}")]
    Link(#[from] LinkError),
}

#[derive(Debug, Clone)]
pub struct Toolchain {
    catalog: Catalog,
    instructions: InstructionSet,
    grammar: Grammar,
    keywords: Keywords,
}

impl Toolchain {
    pub fn standard() -> Result<Self, SpecError> {
        Self::from_catalog(Catalog::standard()?)
    }

    pub fn from_catalog_json(json: &str) -> Result<Self, SpecError> {
        Self::from_catalog(Catalog::from_json(json)?)
    }

    pub fn from_catalog(catalog: Catalog) -> Result<Self, SpecError> {
        let instructions = InstructionSet::compile(&catalog)?;
        let grammar = Grammar::synthesize(&catalog);
        let keywords = grammar.keywords();
        debug!(
            instructions = instructions.len(),
            keywords = keywords.len(),
            "toolchain ready"
        );
        Ok(Self {
            catalog,
            instructions,
            grammar,
            keywords,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn instructions(&self) -> &InstructionSet {
        &self.instructions
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn keywords(&self) -> &Keywords {
        &self.keywords
    }

    /// Compiled definition for a long mnemonic.
    pub fn instruction(&self, class_name: &str) -> Option<&Arc<InstructionDef>> {
        self.instructions.by_class(class_name)
    }

    pub fn scan(&self, source: &str) -> Result<Vec<Token>, ScanError> {
        Scanner::new(&self.keywords).scan(source)
    }

    /// Scan and parse without linking.
    pub fn parse(&self, source: &str) -> Result<Vec<Instruction>, LoadError> {
        let tokens = self.scan(source)?;
        Ok(Parser::new(&self.grammar, &self.instructions, tokens).parse()?)
    }

    pub fn assemble(&self, source: &str) -> Result<Program, LoadError> {
        Ok(Program::link(self.parse(source)?)?)
    }
}

/// Start an execution with `args` passed on the stack.
///
/// Memory holds the arguments in reverse order, one zero return slot, then
/// `config.memory_cells` zero cells. `SP` points just past the return slot and
/// is expected to be back there when the program halts.
pub fn launch<'p, W: Write>(
    program: &'p Program,
    args: &[i64],
    config: &ExecutionConfig,
    output: W,
) -> Execution<'p, W> {
    let mut cells: Vec<i64> = args.iter().rev().copied().collect();
    cells.push(0);
    let frame_top = cells.len();
    cells.resize(frame_top + config.memory_cells, 0);
    let sp = frame_top as i64;
    let registers = RegisterFile::with_values([(MachineRegister::Sp.name(), sp)]);
    Execution::with_limits(
        program,
        Memory::from_cells(cells),
        registers,
        output,
        config.sandbox_limits,
    )
    .record_steps(config.record_steps)
    .expect_stack_pointer(sp)
}
