//! Error types for singlerun.
//!
//! `LockError` is what the lock engine reports; `SinglerunError` is the
//! CLI-level error that carries an exit code.

use crate::exit_codes;
use crate::locks::LockRecord;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the lock engine.
#[derive(Error, Debug)]
pub enum LockError {
    /// Another live instance holds the lock. Not a failure of the lock system.
    #[error("{}", busy_message(.name, .holder.as_ref()))]
    Busy {
        name: String,
        holder: Option<LockRecord>,
    },

    /// The lock name cannot be mapped to a lock file.
    #[error("invalid lock name {0:?}: names must contain a non-whitespace character")]
    InvalidName(String),

    /// The lock file holds something that is not a lock record.
    #[error("lock file '{}' is corrupt: {reason}", .path.display())]
    CorruptRecord { path: PathBuf, reason: String },

    /// The runtime directory gate stayed contended past its timeout.
    #[error("timed out waiting for the lock directory gate '{}'", .path.display())]
    GateTimeout { path: PathBuf },

    /// Permission, disk, or path failure unrelated to contention.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    /// Wrap an I/O error with a description of what was being attempted.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        LockError::Io {
            context: context.into(),
            source,
        }
    }
}

fn busy_message(name: &str, holder: Option<&LockRecord>) -> String {
    match holder {
        Some(record) => format!(
            "'{}' is already running (pid {}, started {} ago): {}",
            name,
            record.holder_pid,
            record.age_string(),
            record.command
        ),
        None => format!("'{}' is already running", name),
    }
}

/// Main error type for singlerun commands.
#[derive(Error, Debug)]
pub enum SinglerunError {
    /// User provided invalid arguments or configuration.
    #[error("{0}")]
    UserError(String),

    /// The lock engine failed.
    #[error("Lock system failure: {0}")]
    LockFailure(#[from] LockError),
}

impl SinglerunError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SinglerunError::UserError(_) => exit_codes::USER_ERROR,
            SinglerunError::LockFailure(LockError::InvalidName(_)) => exit_codes::USER_ERROR,
            SinglerunError::LockFailure(LockError::Busy { .. }) => exit_codes::ALREADY_RUNNING,
            SinglerunError::LockFailure(_) => exit_codes::LOCK_FAILURE,
        }
    }
}

/// Result type alias for singlerun commands.
pub type Result<T> = std::result::Result<T, SinglerunError>;
