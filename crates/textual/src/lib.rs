//! # Textual IR
//!
//! The typed, SSA, block-structured intermediate representation emitted by
//! the translator, together with its pretty-printer.
//!
//! A module is a flat list of declarations:
//! - `define`: procedures made of labeled blocks with SSA parameters
//! - `global`: module-level variables
//! - `type`: record types for user classes and runtime records
//! - `declare`: external builtin procedures
//!
//! The printer lives in [`printer`] as `Display` impls; `Module::to_string()`
//! yields the complete textual form.

pub mod module;
pub mod printer;
pub mod types;

pub use module::{
    Block, BuiltinDecl, Const, Exp, Global, Ident, Instr, Module, NodeCall, ProcDecl, StructDecl,
    Terminator,
};
pub use types::Typ;
