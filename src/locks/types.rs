//! Lock type definitions and information structures.

use super::record::LockRecord;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// How `acquire` behaves when the lock is held by a live process.
///
/// Blocking policies poll: they sleep with a bounded backoff and re-attempt.
/// There is no queue, so waiters are not served in arrival order; whichever
/// waiter retries first after the holder exits wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Return `Busy` immediately.
    FailFast,
    /// Retry until the lock is free.
    Block,
    /// Retry until the duration elapses, then return `Busy`.
    Timeout(Duration),
}

/// Result of a `status` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    /// No record, or the last holder released the lock.
    NotHeld,
    /// The recorded holder is alive (or could not be ruled out).
    Held(LockRecord),
    /// The recorded holder is gone; the next acquirer will reclaim the lock.
    Stale(LockRecord),
}

/// Liveness of a listed lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Held,
    Stale,
}

impl LockState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockState::Held => "held",
            LockState::Stale => "stale",
        }
    }
}

/// Information about a lock file found in the runtime directory.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// The lock file path.
    pub path: PathBuf,

    /// The record stored in the lock file.
    pub record: LockRecord,

    /// Whether the recorded holder is still alive.
    pub state: LockState,
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (pid: {}, age: {}, command: {}{})",
            self.record.name,
            self.record.holder_pid,
            self.record.age_string(),
            self.record.command,
            if self.state == LockState::Stale {
                ", STALE"
            } else {
                ""
            }
        )
    }
}

/// What a user-supplied lock ID resolved to.
///
/// An ID names a lock exactly, or is a substring of exactly one recorded
/// lock name.
#[derive(Debug, Clone)]
pub enum Lookup {
    Found(LockInfo),
    /// No name equals the ID and several contain it.
    Ambiguous(Vec<String>),
    NoRecord,
}

/// Why `clean` removed a lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanReason {
    /// The lock was released; only the empty file was left.
    Released,
    /// Nobody held the OS lock, but the holder never released it (crash).
    Abandoned,
    /// The OS lock was still held, but the recorded holder is dead.
    Stale,
}

impl CleanReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanReason::Released => "released",
            CleanReason::Abandoned => "abandoned",
            CleanReason::Stale => "stale",
        }
    }
}

/// A lock file removed (or, in a dry run, removable) by `clean`.
#[derive(Debug, Clone)]
pub struct CleanedLock {
    pub path: PathBuf,
    pub record: Option<LockRecord>,
    pub reason: CleanReason,
}

/// Timing knobs for the lock store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// First sleep between attempts under a blocking policy.
    pub poll_interval: Duration,
    /// Upper bound for the doubling backoff.
    pub max_poll_interval: Duration,
    /// How long to wait for the runtime directory gate before counting the
    /// attempt as contended.
    pub gate_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_poll_interval: Duration::from_secs(1),
            gate_timeout: Duration::from_secs(2),
        }
    }
}

/// Doubling backoff, capped at `max`.
#[derive(Debug)]
pub(super) struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    pub(super) fn new(options: &StoreOptions) -> Self {
        Self {
            next: options.poll_interval,
            max: options.max_poll_interval.max(options.poll_interval),
        }
    }

    pub(super) fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }
}
