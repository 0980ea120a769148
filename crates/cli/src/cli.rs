//! Command-line interface for pytir.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pytir - translate Python bytecode disassemblies to Textual IR
#[derive(Parser)]
#[command(name = "pytir")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// File to translate (when no subcommand is specified)
    pub file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate a disassembly JSON file and print the Textual IR module
    Translate {
        /// Path to the disassembly JSON file
        file: PathBuf,

        /// Write the module here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the translation and report success or errors without printing IR
    Check {
        /// Path to the disassembly JSON file
        file: PathBuf,
    },
}

impl Cli {
    /// Resolve the actual command to run
    pub fn resolve_command(&self) -> Option<ResolvedCommand> {
        match &self.command {
            Some(Commands::Translate { file, output }) => Some(ResolvedCommand::Translate {
                file: file.clone(),
                output: output.clone(),
            }),
            Some(Commands::Check { file }) => Some(ResolvedCommand::Check { file: file.clone() }),
            None => self.file.as_ref().map(|file| ResolvedCommand::Translate {
                // Direct invocation: pytir file.json
                file: file.clone(),
                output: None,
            }),
        }
    }
}

/// Resolved command after processing CLI arguments
pub enum ResolvedCommand {
    Translate {
        file: PathBuf,
        output: Option<PathBuf>,
    },
    Check {
        file: PathBuf,
    },
}
