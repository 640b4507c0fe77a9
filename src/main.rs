//! Singlerun: run a named command at most once per machine.
//!
//! This is the main entry point for the `singlerun` CLI. It parses arguments,
//! sets up logging, dispatches to the appropriate command handler, and maps
//! errors to exit codes.

mod cli;
mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod exit_codes;
pub mod locks;
mod logging;
pub mod probe;
pub mod runner;
pub mod template;

#[cfg(test)]
mod test_support;

use cli::Cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);

    match commands::dispatch(cli) {
        Ok(code) => ExitCode::from(clamp_code(code)),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            // Return appropriate exit code
            ExitCode::from(clamp_code(err.exit_code()))
        }
    }
}

/// Exit statuses are one byte; Windows child codes can be wider.
fn clamp_code(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(exit_codes::FAILURE as u8)
}
