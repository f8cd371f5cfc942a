//! A PromQL front end
//!
//! Parses queries into an expression tree that knows the value type of every
//! node and prints back in canonical form. Nothing is evaluated.
use std::error::Error as StdError;
use std::fmt;

pub use self::ast::*;

mod ast;
mod lexer;
mod parser;

/// Parses a PromQL expression.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    parser::Parser::new(input)?.parse()
}

/// A query could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    message: String,
    position: usize,
}

impl ParseError {
    pub fn new<T: Into<String>>(message: T, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Byte offset into the query
    pub fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at char {}: {}", self.position + 1, self.message)
    }
}

impl StdError for ParseError {}
