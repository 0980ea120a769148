//! Translation error types
//!
//! Every failure is fatal and carries the bytecode offset it was detected at;
//! no partial IR is ever returned.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("stack underflow at offset {offset} while lowering {opcode}")]
    StackUnderflow { offset: u32, opcode: String },

    #[error("unknown opcode {opname:?} at offset {offset}")]
    UnknownOpcode { opname: String, offset: u32 },

    #[error("unsupported construct at offset {offset}: {message}")]
    Unsupported { message: String, offset: u32 },

    #[error(
        "SSA arity mismatch at offset {offset}: block expects {expected} arguments, jump supplies {actual}"
    )]
    SsaArityMismatch {
        offset: u32,
        expected: usize,
        actual: usize,
    },

    #[error("malformed class build sequence at offset {offset}: {message}")]
    MalformedClassBuild { message: String, offset: u32 },

    #[error("code object {name:?} has no instructions")]
    EmptyCode { name: String },
}

pub type TranslateResult<T> = Result<T, TranslateError>;
