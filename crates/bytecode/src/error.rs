//! Loader error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BytecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed disassembly JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid disassembly: {0}")]
    Disassembly(String),
}

pub type BytecodeResult<T> = Result<T, BytecodeError>;
