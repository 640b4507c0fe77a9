//! Implementation of the `singlerun status` command.

use super::{parse_template, print_record, resolve};
use crate::cli::StatusArgs;
use crate::context::RuntimeContext;
use crate::error::Result;
use crate::exit_codes;
use crate::locks::{LockInfo, LockState};

/// Execute the `singlerun status` command.
///
/// Exits 0 only when every ID names a lock held by a live holder, so
/// scripts can test `singlerun status NAME` directly.
pub fn cmd_status(ctx: &RuntimeContext, args: StatusArgs) -> Result<i32> {
    let template = parse_template(args.format.as_deref())?;
    let store = ctx.open_store();
    let mut all_held = true;

    for id in &args.ids {
        let Some(lock) = resolve(&store, id)? else {
            all_held = false;
            continue;
        };
        if lock.state != LockState::Held {
            all_held = false;
        }

        match &template {
            Some(template) => println!("{}", template.render(&lock)),
            None => print_status(&lock),
        }
    }

    Ok(if all_held {
        exit_codes::SUCCESS
    } else {
        exit_codes::FAILURE
    })
}

fn print_status(lock: &LockInfo) {
    match lock.state {
        LockState::Held => println!("{}: held", lock.record.name),
        LockState::Stale => println!(
            "{}: stale (holder is no longer running)",
            lock.record.name
        ),
    }
    print_record(&lock.record, "  ");
}
