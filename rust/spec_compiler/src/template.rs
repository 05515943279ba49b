//! Tokenizer and parser for instruction templates.
//!
//! Catalog templates use a small infix notation:
//!
//! ```text
//! statement  := "if" expression ":" statement
//!             | place "=" expression
//!             | name "(" [expression {"," expression}] ")"
//! place      := name | "memory" "[" expression "]"
//! expression := additive [("<" | ">" | "<=" | ">=" | "==" | "!=") additive]
//! additive   := term {("+" | "-") term}
//! term       := unary {("*" | "//" | "%") unary}
//! unary      := "-" unary | primary
//! primary    := integer | name | name "(" args ")" | "memory" "[" expression "]"
//!             | "(" expression ")"
//! ```
//!
//! Parsing yields unresolved trees; binding names to registers, roles, and
//! operands is the expander's job.

use logos::Logos;

use crate::error::TemplateError;

/// Words with template meaning that catalog fields may not shadow.
pub const KEYWORDS: [&str; 2] = ["if", "memory"];

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
enum TemplateToken {
    #[token("if")]
    If,
    #[token("memory")]
    Memory,
    #[regex("[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Name(String),
    #[regex("[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("//")]
    FloorDiv,
    #[token("%")]
    Percent,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
}

impl TemplateToken {
    fn describe(&self) -> String {
        match self {
            TemplateToken::If => "`if`".to_owned(),
            TemplateToken::Memory => "`memory`".to_owned(),
            TemplateToken::Name(name) => format!("identifier `{name}`"),
            TemplateToken::Integer(value) => format!("integer `{value}`"),
            TemplateToken::LParen => "`(`".to_owned(),
            TemplateToken::RParen => "`)`".to_owned(),
            TemplateToken::LBracket => "`[`".to_owned(),
            TemplateToken::RBracket => "`]`".to_owned(),
            TemplateToken::Comma => "`,`".to_owned(),
            TemplateToken::Colon => "`:`".to_owned(),
            TemplateToken::Assign => "`=`".to_owned(),
            TemplateToken::Plus => "`+`".to_owned(),
            TemplateToken::Minus => "`-`".to_owned(),
            TemplateToken::Star => "`*`".to_owned(),
            TemplateToken::FloorDiv => "`//`".to_owned(),
            TemplateToken::Percent => "`%`".to_owned(),
            TemplateToken::Lt => "`<`".to_owned(),
            TemplateToken::Gt => "`>`".to_owned(),
            TemplateToken::Le => "`<=`".to_owned(),
            TemplateToken::Ge => "`>=`".to_owned(),
            TemplateToken::EqEq => "`==`".to_owned(),
            TemplateToken::NotEq => "`!=`".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
        }
    }
}

/// Expression with names still unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawExpr {
    Integer(i64),
    Name(String),
    Memory(Box<RawExpr>),
    Call { name: String, args: Vec<RawExpr> },
    Unary { op: UnaryOp, operand: Box<RawExpr> },
    Binary {
        op: BinaryOp,
        lhs: Box<RawExpr>,
        rhs: Box<RawExpr>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPlace {
    Name(String),
    Memory(RawExpr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawStatement {
    Assign { place: RawPlace, value: RawExpr },
    If {
        condition: RawExpr,
        body: Box<RawStatement>,
    },
    Call { name: String, args: Vec<RawExpr> },
}

/// Parse an `after` template.
pub fn parse_expression(source: &str) -> Result<RawExpr, TemplateError> {
    let mut parser = TemplateParser::new(source)?;
    let expr = parser.expression()?;
    parser.finish()?;
    Ok(expr)
}

/// Parse a `side_effect` template.
pub fn parse_statement(source: &str) -> Result<RawStatement, TemplateError> {
    let mut parser = TemplateParser::new(source)?;
    let statement = parser.statement()?;
    parser.finish()?;
    Ok(statement)
}

struct TemplateParser {
    tokens: Vec<TemplateToken>,
    position: usize,
}

impl TemplateParser {
    fn new(source: &str) -> Result<Self, TemplateError> {
        let mut lexer = TemplateToken::lexer(source);
        let mut tokens = Vec::new();
        while let Some(token) = lexer.next() {
            match token {
                Ok(token) => tokens.push(token),
                Err(()) => return Err(TemplateError::InvalidToken(lexer.slice().to_owned())),
            }
        }
        Ok(Self {
            tokens,
            position: 0,
        })
    }

    fn peek(&self) -> Option<&TemplateToken> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<TemplateToken> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, expected: &TemplateToken) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: TemplateToken, expected: &'static str) -> Result<(), TemplateError> {
        match self.advance() {
            Some(found) if found == token => Ok(()),
            Some(found) => Err(TemplateError::UnexpectedToken {
                found: found.describe(),
                expected,
            }),
            None => Err(TemplateError::UnexpectedEnd { expected }),
        }
    }

    fn finish(&self) -> Result<(), TemplateError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(TemplateError::UnexpectedToken {
                found: token.describe(),
                expected: "end of template",
            }),
        }
    }

    fn statement(&mut self) -> Result<RawStatement, TemplateError> {
        match self.advance() {
            Some(TemplateToken::If) => {
                let condition = self.expression()?;
                self.expect(TemplateToken::Colon, "`:`")?;
                let body = self.statement()?;
                Ok(RawStatement::If {
                    condition,
                    body: Box::new(body),
                })
            }
            Some(TemplateToken::Memory) => {
                let address = self.subscript()?;
                self.expect(TemplateToken::Assign, "`=`")?;
                let value = self.expression()?;
                Ok(RawStatement::Assign {
                    place: RawPlace::Memory(address),
                    value,
                })
            }
            Some(TemplateToken::Name(name)) => {
                if self.eat(&TemplateToken::LParen) {
                    let args = self.arguments()?;
                    return Ok(RawStatement::Call { name, args });
                }
                self.expect(TemplateToken::Assign, "`=`")?;
                let value = self.expression()?;
                Ok(RawStatement::Assign {
                    place: RawPlace::Name(name),
                    value,
                })
            }
            Some(token) => Err(TemplateError::UnexpectedToken {
                found: token.describe(),
                expected: "statement",
            }),
            None => Err(TemplateError::UnexpectedEnd {
                expected: "statement",
            }),
        }
    }

    fn expression(&mut self) -> Result<RawExpr, TemplateError> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(TemplateToken::Lt) => BinaryOp::Lt,
            Some(TemplateToken::Gt) => BinaryOp::Gt,
            Some(TemplateToken::Le) => BinaryOp::Le,
            Some(TemplateToken::Ge) => BinaryOp::Ge,
            Some(TemplateToken::EqEq) => BinaryOp::Eq,
            Some(TemplateToken::NotEq) => BinaryOp::Ne,
            _ => return Ok(lhs),
        };
        self.position += 1;
        let rhs = self.additive()?;
        Ok(binary(op, lhs, rhs))
    }

    fn additive(&mut self) -> Result<RawExpr, TemplateError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(TemplateToken::Plus) => BinaryOp::Add,
                Some(TemplateToken::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.position += 1;
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> Result<RawExpr, TemplateError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(TemplateToken::Star) => BinaryOp::Mul,
                Some(TemplateToken::FloorDiv) => BinaryOp::FloorDiv,
                Some(TemplateToken::Percent) => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.position += 1;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<RawExpr, TemplateError> {
        if self.eat(&TemplateToken::Minus) {
            let operand = self.unary()?;
            return Ok(RawExpr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<RawExpr, TemplateError> {
        match self.advance() {
            Some(TemplateToken::Integer(value)) => Ok(RawExpr::Integer(value)),
            Some(TemplateToken::Name(name)) => {
                if self.eat(&TemplateToken::LParen) {
                    let args = self.arguments()?;
                    Ok(RawExpr::Call { name, args })
                } else {
                    Ok(RawExpr::Name(name))
                }
            }
            Some(TemplateToken::Memory) => {
                let address = self.subscript()?;
                Ok(RawExpr::Memory(Box::new(address)))
            }
            Some(TemplateToken::LParen) => {
                let inner = self.expression()?;
                self.expect(TemplateToken::RParen, "`)`")?;
                Ok(inner)
            }
            Some(token) => Err(TemplateError::UnexpectedToken {
                found: token.describe(),
                expected: "expression",
            }),
            None => Err(TemplateError::UnexpectedEnd {
                expected: "expression",
            }),
        }
    }

    fn subscript(&mut self) -> Result<RawExpr, TemplateError> {
        self.expect(TemplateToken::LBracket, "`[`")?;
        let address = self.expression()?;
        self.expect(TemplateToken::RBracket, "`]`")?;
        Ok(address)
    }

    /// Arguments after an already-consumed `(`.
    fn arguments(&mut self) -> Result<Vec<RawExpr>, TemplateError> {
        let mut args = Vec::new();
        if self.eat(&TemplateToken::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if !self.eat(&TemplateToken::Comma) {
                self.expect(TemplateToken::RParen, "`)`")?;
                return Ok(args);
            }
        }
    }
}

fn binary(op: BinaryOp, lhs: RawExpr, rhs: RawExpr) -> RawExpr {
    RawExpr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
