//! Bytecode back end for Verve.
//!
//! # Architecture
//!
//! - `instruction`: opcode definitions and operand counts
//! - `format`: word-level encoding of the serialized stream
//! - `nanvalue`: NaN-boxed `push` immediates
//! - `generator`: lowers a resolved program into a byte stream
//! - `vm`: stack-based virtual machine that executes a byte stream
//! - `heap`, `value`: runtime representation used by the VM
//! - `builtins`: native functions reachable by name
//! - `disassembler`: listing output for bytecode inspection

pub mod builtins;
pub mod disassembler;
pub mod format;
pub mod generator;
pub mod heap;
pub mod instruction;
pub mod nanvalue;
pub mod value;
pub mod vm;

pub use disassembler::{disassemble, print_disassembly};
pub use generator::generate;
pub use instruction::OpCode;
pub use value::Value;
pub use vm::{VMResult, Vm};
