//! Grammar-driven parser producing instruction values.
//!
//! The parser has no built-in knowledge of any instruction. It walks the
//! synthesized grammar alternative selected by each mnemonic, reading one
//! token per item with an optional `,` before every item except the first.

use std::collections::BTreeSet;

use isavm_spec_compiler::grammar::{Grammar, Symbol};
use isavm_spec_compiler::InstructionSet;
use thiserror::Error;

use crate::instruction::{Instruction, OperandValue, ShapeError};
use crate::lexer::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {}: expected {}, found {}", .found.line, describe_expected(.expected), .found.kind)]
    Unexpected {
        found: Token,
        expected: BTreeSet<String>,
    },
    #[error("line {line}: {source}")]
    Shape {
        line: usize,
        #[source]
        source: ShapeError,
    },
}

fn describe_expected(expected: &BTreeSet<String>) -> String {
    let items: Vec<&str> = expected.iter().map(String::as_str).collect();
    match items.as_slice() {
        [single] => (*single).to_owned(),
        _ => format!("one of {}", items.join(", ")),
    }
}

pub struct Parser<'a> {
    grammar: &'a Grammar,
    instructions: &'a InstructionSet,
    tokens: Vec<Token>,
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(
        grammar: &'a Grammar,
        instructions: &'a InstructionSet,
        mut tokens: Vec<Token>,
    ) -> Self {
        match tokens.last() {
            Some(Token {
                kind: TokenKind::Eof,
                ..
            }) => {}
            last => {
                let line = last.map_or(1, |token| token.line);
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                });
            }
        }
        Self {
            grammar,
            instructions,
            tokens,
            position: 0,
        }
    }

    /// `start = {operation} EOF`.
    pub fn parse(mut self) -> Result<Vec<Instruction>, ParseError> {
        let mut program = Vec::new();
        loop {
            match &self.peek().kind {
                TokenKind::Eof => return Ok(program),
                TokenKind::Mnemonic { opcode, .. } => {
                    let opcode = *opcode;
                    program.push(self.operation(opcode)?);
                }
                _ => return Err(self.unexpected(&["mnemonic", "end of input"])),
            }
        }
    }

    fn operation(&mut self, opcode: usize) -> Result<Instruction, ParseError> {
        let line = self.peek().line;
        let grammar = self.grammar;
        let instructions = self.instructions;
        let (Some(alternative), Some(def)) =
            (grammar.alternative(opcode), instructions.get(opcode))
        else {
            return Err(self.unexpected(&["mnemonic"]));
        };
        self.advance();

        let mut registers = Vec::new();
        let mut operands = Vec::new();
        let mut comment = String::new();
        for (position, item) in alternative.items.iter().enumerate() {
            if position > 0 && self.peek().kind == TokenKind::Comma {
                self.advance();
            }
            match item.symbol {
                Symbol::Register => match &self.peek().kind {
                    TokenKind::Register(name) => {
                        registers.push(name.clone());
                        self.advance();
                    }
                    _ => return Err(self.unexpected(&["register"])),
                },
                Symbol::Integer => match &self.peek().kind {
                    TokenKind::Integer(value) => {
                        operands.push(OperandValue::Integer(*value));
                        self.advance();
                    }
                    _ => return Err(self.unexpected(&["integer"])),
                },
                Symbol::Text => match &self.peek().kind {
                    TokenKind::Text(text) => {
                        operands.push(OperandValue::Text(text.clone()));
                        self.advance();
                    }
                    _ => return Err(self.unexpected(&["text"])),
                },
                Symbol::Comment => match &self.peek().kind {
                    TokenKind::Text(text) => {
                        comment = text.clone();
                        self.advance();
                    }
                    TokenKind::Mnemonic { .. } | TokenKind::Eof => {}
                    _ => return Err(self.unexpected(&["text", "mnemonic", "end of input"])),
                },
            }
        }

        let dst = if def.has_destination() && !registers.is_empty() {
            Some(registers.remove(0))
        } else {
            None
        };
        Instruction::new(def.clone(), dst, registers, operands)
            .and_then(|instruction| instruction.with_comment(comment))
            .map_err(|source| ParseError::Shape { line, source })
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.position.min(last)]
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn unexpected(&self, expected: &[&str]) -> ParseError {
        ParseError::Unexpected {
            found: self.peek().clone(),
            expected: expected.iter().map(|item| (*item).to_owned()).collect(),
        }
    }
}
