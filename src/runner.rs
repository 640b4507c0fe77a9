//! Guarded command execution.
//!
//! `run_guarded` holds a named lock for exactly as long as the guarded child
//! runs. The child inherits stdio; it does not inherit the lock file, which
//! Rust opens close-on-exec.
//!
//! # Signals
//!
//! On Unix, SIGTERM, SIGINT and SIGHUP sent to singlerun are relayed to the
//! child, and the lock stays held until the child has been reaped. Stopping
//! the wrapper therefore stops the guarded command too, and a new run of
//! the same name cannot start while the old command is still alive. SIGKILL
//! cannot be relayed: the lock is freed but the child keeps running.

use crate::error::LockError;
use crate::exit_codes;
use crate::locks::{LockInfo, LockRecord, LockState, LockStore, WaitPolicy};
use crate::probe::ProcessProbe;
use crate::template::EntryTemplate;
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};
use tracing::{debug, warn};

/// How a guarded run ended.
#[derive(Debug)]
pub enum ExitOutcome {
    /// The child ran (or failed to start) and produced this exit code.
    Child(i32),
    /// Another live instance holds the lock.
    AlreadyRunning(Option<LockRecord>),
    /// The lock system failed; the child was never started.
    LockFailure(LockError),
}

impl ExitOutcome {
    /// Process exit code for this outcome, keeping the classes disjoint.
    pub fn exit_code(&self, busy_code: i32, lock_failure_code: i32) -> i32 {
        match self {
            ExitOutcome::Child(code) => {
                let remapped = exit_codes::remap_child_code(*code, busy_code, lock_failure_code);
                if remapped != *code {
                    warn!(
                        child_code = *code,
                        reported = remapped,
                        "child exit code collides with a reserved code"
                    );
                }
                remapped
            }
            ExitOutcome::AlreadyRunning(_) => busy_code,
            ExitOutcome::LockFailure(_) => lock_failure_code,
        }
    }
}

/// A command to run under a lock.
#[derive(Debug, Clone, Copy)]
pub struct GuardedCommand<'a> {
    /// Program and arguments.
    pub argv: &'a [String],
    /// Working directory of the child; singlerun's own when `None`.
    pub cwd: Option<&'a Path>,
    /// Shell command run once the guarded command has finished, or when the
    /// lock turns out to be busy. Formatted with the lock entry.
    pub after: Option<&'a EntryTemplate>,
}

impl<'a> GuardedCommand<'a> {
    pub fn new(argv: &'a [String]) -> Self {
        Self {
            argv,
            cwd: None,
            after: None,
        }
    }
}

/// Run `command` while holding the lock `name`.
///
/// The lock is released once the child exits, whatever its status. Spawn
/// failures are child outcomes (127 or 126) and never lock failures.
pub fn run_guarded<P: ProcessProbe>(
    store: &LockStore<P>,
    name: &str,
    command: &GuardedCommand<'_>,
    policy: WaitPolicy,
) -> ExitOutcome {
    let Some((program, args)) = command.argv.split_first() else {
        eprintln!("singlerun: no command given");
        return ExitOutcome::Child(exit_codes::COMMAND_NOT_FOUND);
    };

    let line = shell_words::join(command.argv);
    let mut session = match store.acquire(name, &line, policy) {
        Ok(session) => session,
        Err(LockError::Busy { holder, .. }) => {
            if let (Some(after), Some(record)) = (command.after, &holder) {
                run_after(
                    after,
                    &LockInfo {
                        path: store.lock_path(name),
                        record: record.clone(),
                        state: LockState::Held,
                    },
                );
            }
            return ExitOutcome::AlreadyRunning(holder);
        }
        Err(e) => return ExitOutcome::LockFailure(e),
    };

    let mut child = Command::new(program);
    child.args(args);
    if let Some(dir) = command.cwd {
        child.current_dir(dir);
    }

    debug!(name = session.name(), command = %line, "spawning guarded command");
    let code = match run_child(&mut child) {
        Ok(status) => status_code(status),
        Err(e) => {
            eprintln!("singlerun: failed to run '{}': {}", program, e);
            spawn_failure_code(&e)
        }
    };
    debug!(name, code, "guarded command finished");

    if let Some(after) = command.after {
        run_after(
            after,
            &LockInfo {
                path: session.path().to_path_buf(),
                record: session.record().clone(),
                state: LockState::Held,
            },
        );
    }

    if let Err(e) = session.release() {
        warn!(name, error = %e, "failed to release lock after command finished");
    }

    ExitOutcome::Child(code)
}

/// Spawn the child and wait for it, relaying termination signals.
///
/// Only this loop reaps the child, so its pid cannot be reused while a
/// signal is being relayed. A Ctrl-C from the terminal reaches the child
/// directly as well, so it may see SIGINT twice.
#[cfg(unix)]
fn run_child(command: &mut Command) -> io::Result<ExitStatus> {
    use signal_hook::consts::{SIGCHLD, SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    // Registered before spawning so neither the child's exit nor an early
    // termination request can slip past the loop below.
    let mut signals = match Signals::new([SIGCHLD, SIGTERM, SIGINT, SIGHUP]) {
        Ok(signals) => signals,
        Err(e) => {
            warn!(error = %e, "cannot relay signals to the guarded command");
            return command.status();
        }
    };

    let mut child = command.spawn()?;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        for signal in signals.wait() {
            if signal != SIGCHLD {
                relay(child.id(), signal);
            }
        }
    }
}

#[cfg(not(unix))]
fn run_child(command: &mut Command) -> io::Result<ExitStatus> {
    command.status()
}

#[cfg(unix)]
fn relay(pid: u32, signal: libc::c_int) {
    debug!(pid, signal, "relaying signal to guarded command");
    // SAFETY: the child is not reaped yet, so `pid` still names it.
    if unsafe { libc::kill(pid as libc::pid_t, signal) } != 0 {
        debug!(pid, error = %io::Error::last_os_error(), "failed to relay signal");
    }
}

/// Run the `--run-after` command for `lock`. Its failure is reported but
/// never changes the outcome of the guarded run.
fn run_after(template: &EntryTemplate, lock: &LockInfo) {
    let line = template.render(lock);
    debug!(command = %line, "running after-command");
    match shell(&line).status() {
        Ok(status) if status.success() => {}
        Ok(status) => eprintln!(
            "singlerun: after-command '{}' exited with {}",
            line,
            status_code(status)
        ),
        Err(e) => eprintln!("singlerun: failed to run after-command '{}': {}", line, e),
    }
}

#[cfg(unix)]
fn shell(line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(line);
    command
}

#[cfg(not(unix))]
fn shell(line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(line);
    command
}

fn spawn_failure_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::NotFound => exit_codes::COMMAND_NOT_FOUND,
        _ => exit_codes::CANNOT_EXECUTE,
    }
}

#[cfg(unix)]
fn status_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => exit_codes::SIGNAL_BASE + signal,
        (None, None) => exit_codes::FAILURE,
    }
}

#[cfg(not(unix))]
fn status_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(exit_codes::FAILURE)
}
