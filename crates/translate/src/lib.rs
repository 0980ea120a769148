//! # Bytecode-to-SSA translation
//!
//! A symbolic abstract interpreter over Python bytecode. It maintains a
//! compile-time operand stack, reifies control-flow join points as labeled
//! blocks with SSA parameters, synthesizes fresh temporaries and lowers the
//! stack-machine opcodes into a small typed instruction set over builtin
//! shims (`$builtins.python_call`, `$builtins.python_iter_next`, ...).
//!
//! ## Pipeline
//!
//! 1. **Input**: a [`pytir_bytecode::CodeObject`] from the loader
//! 2. **Lowering**: per-opcode rules consume and produce stack cells,
//!    emitting IR instructions into the open block
//! 3. **Blocks**: registered labels close and open blocks at instruction
//!    boundaries; live stack cells cross as SSA block parameters
//! 4. **Assembly**: a worklist drives every nested code object; procedures,
//!    globals, class records and builtin declarations form the module
//!
//! Translation either produces a complete [`pytir_textual::Module`] or fails
//! with a [`TranslateError`] naming the offending offset; it never emits
//! partial or silently wrong IR.

pub mod builtins;
pub mod env;
pub mod error;
pub mod labels;
mod lowering;
pub mod module;
mod proc;
pub mod stack;
pub mod symbols;

pub use error::{TranslateError, TranslateResult};
pub use module::to_module;
