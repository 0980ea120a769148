mod cli;
mod pipeline;

use clap::{CommandFactory, Parser};
use cli::{Cli, ResolvedCommand};
use owo_colors::OwoColorize;
use pipeline::{check_file, translate_file};
use std::process;

fn main() {
    let cli = Cli::parse();

    let result = match cli.resolve_command() {
        Some(ResolvedCommand::Translate { file, output }) => {
            translate_file(&file, output.as_ref())
        }
        Some(ResolvedCommand::Check { file }) => check_file(&file),
        None => {
            Cli::command().print_help().ok();
            return;
        }
    };

    if let Err(error) = result {
        eprintln!("{} {}", "error:".red().bold(), error);
        process::exit(1);
    }
}
