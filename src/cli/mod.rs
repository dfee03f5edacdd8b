//! CLI library modules for the benchvault binary.
//!
//! Parsing and command execution live here so they can be tested
//! independently of the binary entry point.

pub mod commands;
pub mod parser;

use clap::Parser;
use std::process::ExitCode;

/// Parse arguments and run the selected command.
///
/// Prints a human-readable error to stderr and returns a non-zero exit
/// code on failure; command output (JSON) goes to stdout.
pub fn run_cli() -> ExitCode {
    let cli = parser::Cli::parse();
    match commands::dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
