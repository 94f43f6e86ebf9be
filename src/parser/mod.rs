//! Parser module for Verve.

mod core;
mod declarations;
mod expressions;
mod precedence;
mod statements;
mod types;


pub use self::core::Parser;

use crate::ast::Program;
use crate::error::VerveError;
use crate::lexer::Scanner;

/// Scan and parse source text.
pub fn parse_source(source: &str) -> Result<Program, VerveError> {
    let tokens = Scanner::new(source).scan_tokens()?;
    Ok(Parser::new(tokens).parse()?)
}
