//! Process liveness probing.
//!
//! A lock record names its holder by pid *and* start identity. The pid alone
//! is not enough: after a crash the OS may hand the same numeric id to an
//! unrelated process. The probe answers "is this exact incarnation still
//! running?" by re-reading the start identity of `pid` from the OS and
//! comparing it with the recorded one.
//!
//! # Platforms
//!
//! - Linux: `kill(pid, 0)` plus field 22 (`starttime`) of `/proc/<pid>/stat`
//! - other Unix: `kill(pid, 0)` plus `ps -o lstart=`
//! - Windows: `OpenProcess` + `GetExitCodeProcess` + `GetProcessTimes`
//!
//! `terminate` is the one operation that acts on a holder instead of
//! observing it; only `kill` and `restart` use it.

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// Opaque value unique to one incarnation of a process.
///
/// Only equality is meaningful; the unit differs per platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StartIdentity(pub u64);

impl fmt::Display for StartIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A process id paired with its start identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub pid: u32,
    pub start: StartIdentity,
}

/// Result of probing a recorded holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    /// A process with this pid exists and its start identity matches.
    Alive,
    /// No such process, or the pid now belongs to a different incarnation.
    Dead,
    /// The OS would not tell us. Callers must treat this as alive.
    Indeterminate(String),
}

impl Liveness {
    /// Conservative reading: only a conclusive `Dead` counts as not alive.
    pub fn is_alive(&self) -> bool {
        !matches!(self, Liveness::Dead)
    }
}

/// Platform abstraction over the process table.
pub trait ProcessProbe {
    /// Probe whether `pid` is still the incarnation identified by `start`.
    ///
    /// A nonexistent pid is `Dead`, never an error.
    fn probe(&self, pid: u32, start: StartIdentity) -> Liveness;

    /// Identity of the calling process.
    fn current(&self) -> io::Result<ProcessIdentity>;

    /// `true` unless the holder is conclusively dead.
    fn is_alive(&self, pid: u32, start: StartIdentity) -> bool {
        self.probe(pid, start).is_alive()
    }
}

/// The probe backed by the running operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    fn probe(&self, pid: u32, start: StartIdentity) -> Liveness {
        let liveness = probe_pid(pid, start);
        if let Liveness::Indeterminate(reason) = &liveness {
            tracing::warn!(pid, %reason, "could not verify lock holder; assuming it is alive");
        }
        liveness
    }

    fn current(&self) -> io::Result<ProcessIdentity> {
        let pid = std::process::id();
        let start = start_identity(pid)?.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "own process is missing from the process table",
            )
        })?;
        Ok(ProcessIdentity { pid, start })
    }
}

/// Ask the holder `pid` to stop.
///
/// On Unix this sends SIGTERM to the holder's whole process group, which
/// reaches the guarded command along with its wrapper. Returns `Ok(false)`
/// if the process no longer exists.
pub fn terminate(pid: u32) -> io::Result<bool> {
    platform_terminate(pid)
}

#[cfg(unix)]
use unix::{probe_pid, start_identity, terminate as platform_terminate};
#[cfg(windows)]
use windows::{probe_pid, start_identity, terminate as platform_terminate};

#[cfg(not(any(unix, windows)))]
fn probe_pid(_pid: u32, _start: StartIdentity) -> Liveness {
    Liveness::Indeterminate("process probing is not supported on this platform".to_string())
}

#[cfg(not(any(unix, windows)))]
fn platform_terminate(_pid: u32) -> io::Result<bool> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "terminating processes is not supported on this platform",
    ))
}

#[cfg(not(any(unix, windows)))]
fn start_identity(_pid: u32) -> io::Result<Option<StartIdentity>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process start identity is not available on this platform",
    ))
}
