//! RAII lock session.

use super::record::LockRecord;
use crate::error::LockError;
use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Exclusive hold on a named lock.
///
/// The open lock file carries the OS-level exclusive lock; it stays held
/// until `release` is called or the session is dropped. If the process dies
/// instead, the OS drops the lock with the file descriptor.
///
/// Releasing truncates the record first, so a released lock reads as "not
/// held" even while the releasing process keeps running. The file itself is
/// left in place.
#[derive(Debug)]
pub struct LockSession {
    name: String,
    path: PathBuf,
    record: LockRecord,
    /// `None` once released.
    file: Option<File>,
}

impl LockSession {
    pub(super) fn new(name: &str, path: PathBuf, file: File, record: LockRecord) -> Self {
        Self {
            name: name.to_string(),
            path,
            record,
            file: Some(file),
        }
    }

    /// The lock name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The record written at acquisition.
    pub fn record(&self) -> &LockRecord {
        &self.record
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock. Releasing an already released session is a no-op.
    pub fn release(&mut self) -> Result<(), LockError> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        let truncated = file.set_len(0);
        let unlocked = FileExt::unlock(&file);
        drop(file);

        tracing::debug!(name = %self.name, "released lock");

        truncated.and(unlocked).map_err(|e| {
            LockError::io(
                format!("failed to release lock '{}'", self.path.display()),
                e,
            )
        })
    }
}

impl Drop for LockSession {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(name = %self.name, error = %e, "lock release reported an error");
        }
    }
}
