//! Implementation of the `singlerun release` command.

use super::print_record;
use crate::cli::ReleaseArgs;
use crate::context::RuntimeContext;
use crate::error::{Result, SinglerunError};
use crate::exit_codes;

/// Execute the `singlerun release` command.
///
/// Removes the lock file without signalling its holder. A holder that is
/// still running keeps its OS lock on the removed file, so a new run can
/// start alongside it.
pub fn cmd_release(ctx: &RuntimeContext, args: ReleaseArgs) -> Result<i32> {
    // Require --force flag
    if !args.force {
        return Err(SinglerunError::UserError(format!(
            "refusing to release lock without --force flag.\n\n\
             The holder is not stopped: if it is still running, a new run of the\n\
             same name can start alongside it.\n\n\
             To release the lock, run:\n  singlerun release {} --force",
            shell_words::quote(&args.name)
        )));
    }

    let store = ctx.open_store();
    match store.force_release(&args.name)? {
        Some(record) => {
            println!("Released lock: {}", args.name);
            println!();
            println!("Lock details:");
            print_record(&record, "  ");
        }
        None => println!("No lock held for '{}'; nothing to release.", args.name),
    }

    Ok(exit_codes::SUCCESS)
}
