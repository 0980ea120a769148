//! # Bytecode model
//!
//! The input side of the translator: code objects as produced by a Python
//! disassembler, serialized to JSON. A code object carries its constants
//! pool, names tables and a linear instruction stream with byte offsets;
//! nested functions and class bodies appear as code constants.
//!
//! The loader is purely a deserialization layer. It validates shape (and
//! folds `EXTENDED_ARG` prefixes into the following instruction) but leaves
//! all semantic checks to the translator.

pub mod code;
pub mod error;
pub mod loader;
pub mod opcode;

pub use code::{CodeObject, ConstValue, Instruction};
pub use error::{BytecodeError, BytecodeResult};
pub use opcode::Opcode;
