//! Single-instance lock engine.
//!
//! # Lock Files
//!
//! Each lock name maps to `<runtime dir>/<slug>_<hash>.lock`. Acquiring a
//! lock takes a non-blocking exclusive OS lock (`flock` on Unix,
//! `LockFileEx` on Windows) on that file. The OS lock, not the file's
//! existence, decides who holds the name; it disappears with the holder's
//! process, so a crash can never leave a name locked forever.
//!
//! # Lock Records
//!
//! While held, the file contains a JSON record:
//! - `name`: the lock name
//! - `holder_pid` / `start_identity`: the holder's process incarnation
//! - `host`: the holder's host name
//! - `command`: what the holder runs
//! - `acquired_at`: RFC3339 timestamp
//!
//! When the OS lock is held but the recorded incarnation is gone (for
//! example, a descriptor leaked into another process), the lock is stale and
//! the next acquirer reclaims it.
//!
//! # RAII Sessions
//!
//! A successful acquisition returns a `LockSession`; dropping it releases
//! the lock. Release failures are logged, never panicked on.

mod naming;
mod record;
mod session;
mod store;
mod types;


// Re-export public API
pub use record::LockRecord;
pub use session::LockSession;
pub use store::LockStore;
pub use types::{
    CleanReason, CleanedLock, LockInfo, LockState, LockStatus, Lookup, StoreOptions, WaitPolicy,
};
