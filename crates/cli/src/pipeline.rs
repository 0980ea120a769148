//! Pipeline for processing disassembly files.
//!
//! Two stages, each with its own failure mode:
//!
//! - **Load**: read and deserialize the disassembly JSON; I/O and shape
//!   errors surface here.
//! - **Translate**: run the bytecode-to-SSA translator; any malformed or
//!   unsupported bytecode fails the whole translation (no partial IR).
//!
//! Both stages exit with code 1 on failure; a successful `check` prints a
//! one-line summary instead of the module.

use pytir_bytecode::{loader, BytecodeError};
use pytir_translate::{to_module, TranslateError};
use std::fs;
use std::path::{Path, PathBuf};

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline error type
#[derive(Debug)]
pub enum PipelineError {
    /// File I/O error while writing output
    Io(std::io::Error),
    /// Loader error (I/O, JSON shape, disassembly validity)
    Load(BytecodeError),
    /// Translation error
    Translate(TranslateError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Io(e) => write!(f, "I/O error: {}", e),
            PipelineError::Load(e) => write!(f, "{}", e),
            PipelineError::Translate(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<std::io::Error> for PipelineError {
    fn from(error: std::io::Error) -> Self {
        PipelineError::Io(error)
    }
}

impl From<BytecodeError> for PipelineError {
    fn from(error: BytecodeError) -> Self {
        PipelineError::Load(error)
    }
}

impl From<TranslateError> for PipelineError {
    fn from(error: TranslateError) -> Self {
        PipelineError::Translate(error)
    }
}

/// Translate a disassembly file and print (or write) the Textual IR module.
pub fn translate_file(path: &Path, output: Option<&PathBuf>) -> PipelineResult<()> {
    let code = loader::load_path(path)?;
    let module = to_module(path, &code)?;
    let text = module.to_string();
    match output {
        Some(out) => fs::write(out, text)?,
        None => print!("{}", text),
    }
    Ok(())
}

/// Run the translation without printing the module.
pub fn check_file(path: &Path) -> PipelineResult<()> {
    let code = loader::load_path(path)?;
    let module = to_module(path, &code)?;
    println!(
        "{}: {} procedures, {} globals, {} types",
        path.display(),
        module.procs.len(),
        module.globals.len(),
        module.structs.len()
    );
    Ok(())
}
