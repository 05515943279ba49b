//! Scanner for program text.
//!
//! Program text is line oriented. `//` starts a comment that runs to the end
//! of the line. Words are mnemonics when the keyword table knows them and
//! register names otherwise. Text literals come in three spellings (`"…"`,
//! `'…'` and `<<…>>`), have no escapes, and never span lines.

use std::fmt;

use isavm_spec_compiler::{Keywords, MnemonicForm};
use logos::Logos;
use thiserror::Error;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"//[^\n]*")]
enum Lexeme {
    #[token("\n")]
    Newline,
    #[token(",")]
    Comma,
    #[regex("[A-Za-z][A-Za-z0-9]*")]
    Word,
    #[regex("-?[0-9]+")]
    Integer,
    #[regex(r#""[^"\n]*""#)]
    DoubleQuoted,
    #[regex(r"'[^'\n]*'")]
    SingleQuoted,
    #[regex(r"<<([^>\n]|>[^>\n])*>>")]
    Angled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Mnemonic {
        word: String,
        opcode: usize,
        form: MnemonicForm,
    },
    Register(String),
    Integer(i64),
    Text(String),
    Comma,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Mnemonic { word, .. } => write!(f, "mnemonic `{word}`"),
            TokenKind::Register(name) => write!(f, "register `{name}`"),
            TokenKind::Integer(value) => write!(f, "integer `{value}`"),
            TokenKind::Text(text) => write!(f, "text {text:?}"),
            TokenKind::Comma => f.write_str("`,`"),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based source line.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("line {line}: unterminated text literal")]
    UnterminatedText { line: usize },
    #[error("line {line}: illegal character {character:?}")]
    IllegalCharacter { character: char, line: usize },
    #[error("line {line}: '-' must be followed by digits")]
    DanglingMinus { line: usize },
    #[error("line {line}: integer literal {literal} is out of range")]
    IntegerOutOfRange { literal: String, line: usize },
}

/// Splits program text into tokens using an instruction set's keyword table.
#[derive(Debug, Clone, Copy)]
pub struct Scanner<'k> {
    keywords: &'k Keywords,
}

impl<'k> Scanner<'k> {
    pub fn new(keywords: &'k Keywords) -> Self {
        Self { keywords }
    }

    /// Tokenize `source`. The result always ends with [`TokenKind::Eof`].
    pub fn scan(&self, source: &str) -> Result<Vec<Token>, ScanError> {
        let mut lexer = Lexeme::lexer(source);
        let mut tokens = Vec::new();
        let mut line = 1;
        while let Some(lexeme) = lexer.next() {
            let slice = lexer.slice();
            let kind = match lexeme {
                Ok(Lexeme::Newline) => {
                    line += 1;
                    continue;
                }
                Ok(Lexeme::Comma) => TokenKind::Comma,
                Ok(Lexeme::Word) => match self.keywords.lookup(slice) {
                    Some((opcode, form)) => TokenKind::Mnemonic {
                        word: slice.to_owned(),
                        opcode,
                        form,
                    },
                    None => TokenKind::Register(slice.to_owned()),
                },
                Ok(Lexeme::Integer) => {
                    let value = slice
                        .parse::<i64>()
                        .map_err(|_| ScanError::IntegerOutOfRange {
                            literal: slice.to_owned(),
                            line,
                        })?;
                    TokenKind::Integer(value)
                }
                Ok(Lexeme::DoubleQuoted | Lexeme::SingleQuoted) => {
                    TokenKind::Text(slice[1..slice.len() - 1].to_owned())
                }
                Ok(Lexeme::Angled) => TokenKind::Text(slice[2..slice.len() - 2].to_owned()),
                Err(()) => {
                    let rest = &source[lexer.span().start..];
                    return Err(classify_error(rest, line));
                }
            };
            tokens.push(Token { kind, line });
        }
        tokens.push(Token {
            kind: TokenKind::Eof,
            line,
        });
        Ok(tokens)
    }
}

fn classify_error(rest: &str, line: usize) -> ScanError {
    if rest.starts_with('"') || rest.starts_with('\'') || rest.starts_with("<<") {
        return ScanError::UnterminatedText { line };
    }
    match rest.chars().next() {
        Some('-') => ScanError::DanglingMinus { line },
        Some(character) => ScanError::IllegalCharacter { character, line },
        None => ScanError::IllegalCharacter {
            character: '\0',
            line,
        },
    }
}
