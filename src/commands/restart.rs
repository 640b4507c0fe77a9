//! Implementation of the `singlerun restart` command.
//!
//! Stops each holder like `kill`, then runs its recorded command again under
//! the same lock name. The new run waits (up to `--timeout`) for the old
//! wrapper to let go of the lock, so the old and new commands never
//! overlap. Commands run in the foreground, one ID after another, from the
//! current directory.

use super::kill::{Stop, stop_holder};
use super::resolve;
use super::run::report_outcome;
use crate::cli::RestartArgs;
use crate::context::RuntimeContext;
use crate::error::{Result, SinglerunError};
use crate::exit_codes;
use crate::locks::WaitPolicy;
use crate::runner::{GuardedCommand, run_guarded};

/// Execute the `singlerun restart` command.
///
/// Returns the exit code of the last restarted command that failed, or 0.
pub fn cmd_restart(ctx: &RuntimeContext, args: RestartArgs) -> Result<i32> {
    let store = ctx.open_store();
    let mut code = exit_codes::SUCCESS;

    for id in &args.ids {
        let Some(lock) = resolve(&store, id)? else {
            code = exit_codes::FAILURE;
            continue;
        };
        let record = lock.record.clone();
        let argv = shell_words::split(&record.command).map_err(|e| {
            SinglerunError::UserError(format!(
                "cannot restart '{}': recorded command '{}' does not parse: {}",
                record.name, record.command, e
            ))
        })?;

        match stop_holder(&lock, false) {
            Stop::Signalled => println!("Stopped {} '{}'", record.holder_pid, record.name),
            Stop::NotRunning | Stop::WouldSignal => {}
            Stop::Failed(reason) => {
                println!(
                    "Failed to stop {} '{}': {}",
                    record.holder_pid, record.name, reason
                );
                code = exit_codes::FAILURE;
                continue;
            }
        }

        println!("Restarting '{}': {}", record.name, record.command);
        let outcome = run_guarded(
            &store,
            &record.name,
            &GuardedCommand::new(&argv),
            WaitPolicy::Timeout(args.timeout),
        );
        let run_code = report_outcome(ctx, record.name, outcome)?;
        if run_code != exit_codes::SUCCESS {
            code = run_code;
        }
    }

    Ok(code)
}
