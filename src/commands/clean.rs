//! Implementation of the `singlerun clean` command.
//!
//! Removes lock files nobody holds:
//! - released locks (empty files left behind on purpose)
//! - locks abandoned by a holder that crashed
//! - locks whose OS lock survives but whose recorded holder is dead
//!
//! Locks held by live or unverifiable holders are never touched. With IDs,
//! only the locks they resolve to are considered, which excludes released
//! (nameless) files.

use super::resolve;
use crate::cli::CleanArgs;
use crate::context::RuntimeContext;
use crate::error::Result;
use crate::exit_codes;
use crate::locks::{CleanedLock, LockStore};

/// Execute the `singlerun clean` command.
pub fn cmd_clean(ctx: &RuntimeContext, args: CleanArgs) -> Result<i32> {
    let store = ctx.open_store();
    let (cleaned, all_resolved) = if args.ids.is_empty() {
        (store.clean(args.dry_run)?, true)
    } else {
        clean_ids(&store, &args.ids, args.dry_run)?
    };

    let code = if all_resolved {
        exit_codes::SUCCESS
    } else {
        exit_codes::FAILURE
    };

    if cleaned.is_empty() {
        println!("Nothing to clean.");
        return Ok(code);
    }

    let verb = if args.dry_run { "Would remove" } else { "Removed" };
    for lock in &cleaned {
        let label = match &lock.record {
            Some(record) => format!("{} (pid {})", record.name, record.holder_pid),
            None => lock.path.display().to_string(),
        };
        println!("{} {} [{}]", verb, label, lock.reason.as_str());
    }

    println!();
    if args.dry_run {
        println!(
            "{} lock file(s) would be removed. Run without --dry-run to remove them.",
            cleaned.len()
        );
    } else {
        println!("{} lock file(s) removed.", cleaned.len());
    }

    Ok(code)
}

fn clean_ids(store: &LockStore, ids: &[String], dry_run: bool) -> Result<(Vec<CleanedLock>, bool)> {
    let mut cleaned = Vec::new();
    let mut all_resolved = true;

    for id in ids {
        let Some(lock) = resolve(store, id)? else {
            all_resolved = false;
            continue;
        };
        match store.clean_lock(&lock.record.name, dry_run)? {
            Some(removed) => cleaned.push(removed),
            None => println!(
                "Kept {} (pid {}): still held",
                lock.record.name, lock.record.holder_pid
            ),
        }
    }

    Ok((cleaned, all_resolved))
}
