//! Implementation of the `singlerun kill` command.
//!
//! Unlike `release --force`, which only clears bookkeeping, `kill` stops the
//! holder: SIGTERM goes to the holder's process group, reaching both the
//! singlerun wrapper and the guarded command. The wrapper releases the lock
//! itself once the command has exited.

use super::resolve;
use crate::cli::KillArgs;
use crate::context::RuntimeContext;
use crate::error::Result;
use crate::exit_codes;
use crate::locks::{LockInfo, LockState};
use crate::probe;

/// What happened to one holder.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Stop {
    Signalled,
    WouldSignal,
    /// The holder was already gone.
    NotRunning,
    Failed(String),
}

/// Signal the holder of `lock` unless it is gone or lives on another host.
pub(super) fn stop_holder(lock: &LockInfo, dry_run: bool) -> Stop {
    let record = &lock.record;
    if lock.state == LockState::Stale {
        return Stop::NotRunning;
    }
    if !record.is_local() {
        return Stop::Failed(format!("held on host '{}'", record.host));
    }
    if dry_run {
        return Stop::WouldSignal;
    }

    match probe::terminate(record.holder_pid) {
        Ok(true) => Stop::Signalled,
        Ok(false) => Stop::NotRunning,
        Err(e) => Stop::Failed(e.to_string()),
    }
}

/// Execute the `singlerun kill` command.
pub fn cmd_kill(ctx: &RuntimeContext, args: KillArgs) -> Result<i32> {
    let store = ctx.open_store();
    let mut failed = false;

    for id in &args.ids {
        let Some(lock) = resolve(&store, id)? else {
            failed = true;
            continue;
        };
        let (pid, name) = (lock.record.holder_pid, &lock.record.name);

        match stop_holder(&lock, args.dry_run) {
            Stop::Signalled => println!("Killed {} '{}'", pid, name),
            Stop::WouldSignal => println!("Would kill {} '{}'", pid, name),
            Stop::NotRunning => println!("Not running {} '{}'", pid, name),
            Stop::Failed(reason) => {
                println!("Failed to kill {} '{}': {}", pid, name, reason);
                failed = true;
            }
        }

        if args.remove && !args.dry_run && store.force_release(name)?.is_some() {
            println!("Removed lock: {}", name);
        }
    }

    Ok(if failed {
        exit_codes::FAILURE
    } else {
        exit_codes::SUCCESS
    })
}
