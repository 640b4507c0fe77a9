//! CLI argument parsing for singlerun.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Singlerun: run a named command at most once per machine.
///
/// Each guarded run holds an exclusive OS lock on a file in the runtime
/// directory:
/// - A second run of the same name exits 75 instead of starting
/// - A crashed holder never blocks the name; its lock is reclaimed
/// - The guarded command's own exit code is passed through
#[derive(Parser, Debug)]
#[command(name = "singlerun")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding lock files (overrides SINGLERUN_DIR and the config file).
    #[arg(long, global = true, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Config file (default: singlerun/config.yaml in the user config dir).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase diagnostic output on stderr (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for singlerun.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command while holding a named lock.
    ///
    /// Exits 75 if another instance holds the lock, 71 if the lock system
    /// fails, and otherwise with the command's own exit code.
    Run(RunArgs),

    /// Show who holds one or more locks.
    ///
    /// Exits 0 if every lock is held by a live process, 1 otherwise.
    Status(StatusArgs),

    /// Remove a lock regardless of its holder.
    ///
    /// The holder is not signalled. Requires --force.
    Release(ReleaseArgs),

    /// List locks in the runtime directory.
    List(ListArgs),

    /// Remove lock files that nobody holds.
    ///
    /// Removes released locks, locks abandoned by crashed holders, and
    /// locks whose recorded holder is dead. With IDs, only those locks are
    /// considered.
    Clean(CleanArgs),

    /// Stop the commands holding locks.
    ///
    /// Sends SIGTERM to each holder's process group.
    Kill(KillArgs),

    /// Stop the commands holding locks and run them again.
    ///
    /// Each recorded command runs in the foreground, one after another,
    /// once its old holder has let go of the lock.
    Restart(RestartArgs),
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Lock name (default: the command line itself).
    #[arg(short, long)]
    pub name: Option<String>,

    /// Wait until the lock is free instead of exiting.
    #[arg(short, long, conflicts_with = "timeout")]
    pub wait: bool,

    /// Wait at most this many seconds for the lock.
    #[arg(short, long, value_name = "SECS", value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Run the command in this directory.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Shell command to run afterwards, or when the lock is busy. Entry
    /// fields such as {name} and {pid} are filled in.
    #[arg(long, value_name = "TEMPLATE")]
    pub run_after: Option<String>,

    /// The command to run, after `--`.
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    pub command: Vec<String>,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Lock names, or unique parts of them.
    #[arg(required = true, value_name = "ID")]
    pub ids: Vec<String>,

    /// Print one line per lock from this template, e.g. '{pid}\t{name}'.
    #[arg(short, long, value_name = "TEMPLATE")]
    pub format: Option<String>,
}

/// Arguments for the `release` command.
#[derive(Parser, Debug)]
pub struct ReleaseArgs {
    /// Lock name to release.
    pub name: String,

    /// Force releasing the lock (required for safety).
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `list` command.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Only show locks whose name matches this glob.
    pub pattern: Option<String>,

    /// Print one line per lock from this template, e.g. '{pid}\t{name}'.
    #[arg(short, long, value_name = "TEMPLATE")]
    pub format: Option<String>,
}

/// Arguments for the `clean` command.
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Lock names, or unique parts of them (default: every lock).
    #[arg(value_name = "ID")]
    pub ids: Vec<String>,

    /// Print what would be removed without removing anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `kill` command.
#[derive(Parser, Debug)]
pub struct KillArgs {
    /// Lock names, or unique parts of them.
    #[arg(required = true, value_name = "ID")]
    pub ids: Vec<String>,

    /// Print what would be signalled without signalling anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Also remove the lock file once its holder has been signalled.
    #[arg(long)]
    pub remove: bool,
}

/// Arguments for the `restart` command.
#[derive(Parser, Debug)]
pub struct RestartArgs {
    /// Lock names, or unique parts of them.
    #[arg(required = true, value_name = "ID")]
    pub ids: Vec<String>,

    /// How many seconds to wait for a stopped holder to let go of its lock.
    #[arg(
        short,
        long,
        value_name = "SECS",
        default_value = "10",
        value_parser = parse_timeout
    )]
    pub timeout: Duration,
}

/// Parse a non-negative number of seconds, fractions allowed.
fn parse_timeout(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| format!("'{}' is not a valid timeout", value))
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
