//! Implementation of the `singlerun list` command.

use super::{compile_filter, parse_template, print_record};
use crate::cli::ListArgs;
use crate::context::RuntimeContext;
use crate::error::Result;
use crate::exit_codes;
use crate::locks::LockState;

/// Execute the `singlerun list` command.
pub fn cmd_list(ctx: &RuntimeContext, args: ListArgs) -> Result<i32> {
    let filter = compile_filter(args.pattern.as_deref())?;
    let template = parse_template(args.format.as_deref())?;
    let store = ctx.open_store();
    let locks = store.list(filter.as_ref())?;

    if let Some(template) = template {
        for lock in &locks {
            println!("{}", template.render(lock));
        }
        return Ok(exit_codes::SUCCESS);
    }

    if locks.is_empty() {
        println!("No locks.");
        return Ok(exit_codes::SUCCESS);
    }

    println!("Locks in {} ({}):", store.dir().display(), locks.len());
    println!();

    for lock in &locks {
        println!("  {} [{}]:", lock.record.name, lock.state.as_str());
        print_record(&lock.record, "    ");
        println!("    Path:       {}", lock.path.display());
        println!();
    }

    // Summary
    let stale_count = locks
        .iter()
        .filter(|l| l.state == LockState::Stale)
        .count();
    if stale_count > 0 {
        println!(
            "Note: {} lock(s) are stale. Use `singlerun clean` to remove them.",
            stale_count
        );
    }

    Ok(exit_codes::SUCCESS)
}
