//! Exit code constants for the singlerun CLI.
//!
//! A guarded run ends in one of four disjoint classes:
//! - 0: the guarded command succeeded
//! - any other child code: propagated unchanged (see `remap_child_code`)
//! - 75: another live instance already holds the lock
//! - 71: the lock system itself failed
//!
//! The reserved codes follow sysexits(3) (`EX_TEMPFAIL`, `EX_OSERR`) and can be
//! overridden in the config file.

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// Generic failure; also `status` for a lock that is not held.
pub const FAILURE: i32 = 1;

/// Bad arguments or invalid configuration (`EX_USAGE`).
pub const USER_ERROR: i32 = 64;

/// Lock-system failure: I/O, permission, or path errors in the lock engine.
pub const LOCK_FAILURE: i32 = 71;

/// Another live instance already holds the named lock.
pub const ALREADY_RUNNING: i32 = 75;

/// The guarded command was found but could not be executed.
pub const CANNOT_EXECUTE: i32 = 126;

/// The guarded command could not be found.
pub const COMMAND_NOT_FOUND: i32 = 127;

/// Base added to a signal number when the guarded command is killed by a signal.
pub const SIGNAL_BASE: i32 = 128;

/// Keep a child's exit code out of the reserved classes.
///
/// A child that itself exits with one of the reserved codes is reported as
/// `FAILURE`, so callers can always tell "already running" apart from the
/// child's own result.
pub fn remap_child_code(code: i32, busy: i32, lock_failure: i32) -> i32 {
    if code == busy || code == lock_failure {
        FAILURE
    } else {
        code
    }
}
