//! Command implementations for singlerun.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Each command returns the process exit code on success;
//! errors are mapped to exit codes by `main`.

mod clean;
mod kill;
mod list;
mod release;
mod restart;
mod run;
mod status;

use crate::cli::{Cli, Command};
use crate::context::RuntimeContext;
use crate::error::{Result, SinglerunError};
use crate::locks::{LockInfo, LockRecord, LockStore, Lookup};
use crate::template::EntryTemplate;
use globset::{Glob, GlobMatcher};

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. The runtime context
/// is resolved once from the global flags and shared by every command.
pub fn dispatch(cli: Cli) -> Result<i32> {
    let ctx = RuntimeContext::resolve(cli.dir, cli.config)?;

    match cli.command {
        Command::Run(args) => run::cmd_run(&ctx, args),
        Command::Status(args) => status::cmd_status(&ctx, args),
        Command::Release(args) => release::cmd_release(&ctx, args),
        Command::List(args) => list::cmd_list(&ctx, args),
        Command::Clean(args) => clean::cmd_clean(&ctx, args),
        Command::Kill(args) => kill::cmd_kill(&ctx, args),
        Command::Restart(args) => restart::cmd_restart(&ctx, args),
    }
}

/// Resolve a lock ID given on the command line.
///
/// Prints why when the ID matches no lock or several, and returns `None`.
fn resolve(store: &LockStore, id: &str) -> Result<Option<LockInfo>> {
    match store.find(id)? {
        Lookup::Found(lock) => Ok(Some(lock)),
        Lookup::Ambiguous(names) => {
            println!("{}: ambiguous, matches {}", id, names.join(", "));
            Ok(None)
        }
        Lookup::NoRecord => {
            println!("{}: not held (no record)", id);
            Ok(None)
        }
    }
}

fn parse_template(template: Option<&str>) -> Result<Option<EntryTemplate>> {
    template.map(EntryTemplate::parse).transpose()
}

/// Compile an optional name filter.
fn compile_filter(pattern: Option<&str>) -> Result<Option<GlobMatcher>> {
    pattern
        .map(|p| {
            Glob::new(p).map(|g| g.compile_matcher()).map_err(|e| {
                SinglerunError::UserError(format!("invalid pattern '{}': {}", p, e))
            })
        })
        .transpose()
}

/// Print the fields of a lock record, one per line.
fn print_record(record: &LockRecord, indent: &str) {
    println!("{}PID:        {}", indent, record.holder_pid);
    println!("{}Host:       {}", indent, record.host);
    println!(
        "{}Acquired:   {}",
        indent,
        record.acquired_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("{}Age:        {}", indent, record.age_string());
    println!("{}Command:    {}", indent, record.command);
}
