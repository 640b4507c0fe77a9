//! Implementation of the `singlerun run` command.
//!
//! Runs the given command under a named lock. The lock name defaults to the
//! shell-quoted command line, so two identical invocations exclude each
//! other without needing `--name`.

use super::parse_template;
use crate::cli::RunArgs;
use crate::context::RuntimeContext;
use crate::error::{LockError, Result, SinglerunError};
use crate::locks::WaitPolicy;
use crate::runner::{ExitOutcome, GuardedCommand, run_guarded};

/// Execute the `singlerun run` command.
pub fn cmd_run(ctx: &RuntimeContext, args: RunArgs) -> Result<i32> {
    let name = args
        .name
        .unwrap_or_else(|| shell_words::join(&args.command));
    let policy = wait_policy(args.wait, args.timeout);
    let after = parse_template(args.run_after.as_deref())?;

    if let Some(dir) = &args.cwd
        && !dir.is_dir()
    {
        return Err(SinglerunError::UserError(format!(
            "working directory '{}' does not exist",
            dir.display()
        )));
    }

    let command = GuardedCommand {
        argv: &args.command,
        cwd: args.cwd.as_deref(),
        after: after.as_ref(),
    };

    let store = ctx.open_store();
    let outcome = run_guarded(&store, &name, &command, policy);
    report_outcome(ctx, name, outcome)
}

/// Print what a guarded run needs to say and return its exit code.
pub(super) fn report_outcome(
    ctx: &RuntimeContext,
    name: String,
    outcome: ExitOutcome,
) -> Result<i32> {
    let code = outcome.exit_code(
        ctx.config.busy_exit_code,
        ctx.config.lock_failure_exit_code,
    );

    match outcome {
        ExitOutcome::Child(_) => {}
        ExitOutcome::AlreadyRunning(holder) => {
            eprintln!("singlerun: {}", LockError::Busy { name, holder });
        }
        ExitOutcome::LockFailure(e @ LockError::InvalidName(_)) => return Err(e.into()),
        ExitOutcome::LockFailure(e) => {
            eprintln!("singlerun: lock system failure: {}", e);
        }
    }

    Ok(code)
}

fn wait_policy(wait: bool, timeout: Option<std::time::Duration>) -> WaitPolicy {
    match (wait, timeout) {
        (_, Some(limit)) => WaitPolicy::Timeout(limit),
        (true, None) => WaitPolicy::Block,
        (false, None) => WaitPolicy::FailFast,
    }
}
