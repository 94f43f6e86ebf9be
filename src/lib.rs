//! Verve: a small functional language compiled to a word-addressed bytecode.
//!
//! This is the library root that exports all modules.
//!
//! # Pipeline
//!
//! Source text is scanned, parsed, resolved and lowered to a byte stream;
//! the stream can be executed by the [`Vm`](bytecode::Vm), listed by the
//! disassembler or written to disk and executed later.

#![allow(clippy::module_inception)]
#![allow(clippy::result_large_err)]
#![allow(clippy::new_without_default)]

pub mod ast;
pub mod bytecode;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod types;

use error::VerveError;

pub use bytecode::{Value, Vm};
pub use config::VmConfig;

/// Parse source code into an AST without executing.
pub fn parse(source: &str) -> Result<ast::Program, VerveError> {
    parser::parse_source(source)
}

/// Compile source code to a bytecode stream without executing.
pub fn compile_source(source: &str) -> Result<Vec<u8>, VerveError> {
    let program = parser::parse_source(source)?;
    let resolved = types::resolve(program)?;
    Ok(bytecode::generate(&resolved)?)
}

/// Compile and run source code, returning the value of its last expression.
pub fn run_source(source: &str, config: VmConfig) -> Result<Value, VerveError> {
    run_bytecode(compile_source(source)?, config)
}

/// Run a bytecode stream.
pub fn run_bytecode(bytes: Vec<u8>, config: VmConfig) -> Result<Value, VerveError> {
    let mut vm = Vm::load(bytes, config)?;
    Ok(vm.run()?)
}

/// Disassemble source code to a listing.
pub fn disassemble_source(source: &str) -> Result<String, VerveError> {
    let bytes = compile_source(source)?;
    Ok(bytecode::disassemble(&bytes)?)
}
