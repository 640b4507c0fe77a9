use crate::locks::{LockStore, StoreOptions};
use crate::probe::{Liveness, ProcessIdentity, ProcessProbe, StartIdentity, SystemProbe};
use std::ffi::{OsStr, OsString};
use std::io;
use std::process::Command;
use std::sync::{LazyLock, Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;

static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Sets environment variables for the duration of a test and restores them on drop.
pub(crate) struct EnvGuard {
    saved: Vec<(String, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    pub(crate) fn new() -> Self {
        // The process environment is global and not thread-safe.
        // Lock it so tests don't race even if a #[serial] annotation is missed.
        let lock = ENV_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        Self {
            saved: Vec::new(),
            _lock: lock,
        }
    }

    pub(crate) fn set(&mut self, key: &str, value: impl AsRef<OsStr>) {
        self.save(key);
        // SAFETY: ENV_LOCK is held and env-mutating tests are #[serial].
        unsafe { std::env::set_var(key, value) };
    }

    pub(crate) fn remove(&mut self, key: &str) {
        self.save(key);
        // SAFETY: see `set`.
        unsafe { std::env::remove_var(key) };
    }

    fn save(&mut self, key: &str) {
        if !self.saved.iter().any(|(k, _)| k == key) {
            self.saved.push((key.to_string(), std::env::var_os(key)));
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..).rev() {
            // SAFETY: ENV_LOCK is still held.
            unsafe {
                match value {
                    Some(value) => std::env::set_var(&key, value),
                    None => std::env::remove_var(&key),
                }
            }
        }
    }
}

/// Store timings short enough that waiting tests finish quickly.
pub(crate) fn fast_options() -> StoreOptions {
    StoreOptions {
        poll_interval: Duration::from_millis(10),
        max_poll_interval: Duration::from_millis(50),
        gate_timeout: Duration::from_secs(2),
    }
}

/// A lock store over a fresh temporary runtime directory.
pub(crate) fn temp_store() -> (TempDir, LockStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = LockStore::new(temp_dir.path().join("run"), fast_options());
    (temp_dir, store)
}

/// Pid of a process that has already exited and been reaped.
pub(crate) fn dead_pid() -> u32 {
    #[cfg(unix)]
    let mut child = Command::new("true").spawn().unwrap();
    #[cfg(windows)]
    let mut child = Command::new("cmd").args(["/C", "exit 0"]).spawn().unwrap();

    let pid = child.id();
    child.wait().unwrap();
    pid
}

/// Identity of the test process itself.
pub(crate) fn own_identity() -> ProcessIdentity {
    SystemProbe.current().unwrap()
}

/// Probe that reports a fixed verdict for every holder.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedProbe {
    pub(crate) verdict: Liveness,
    pub(crate) identity: ProcessIdentity,
}

impl ScriptedProbe {
    pub(crate) fn new(verdict: Liveness) -> Self {
        Self {
            verdict,
            identity: ProcessIdentity {
                pid: std::process::id(),
                start: StartIdentity(42),
            },
        }
    }
}

impl ProcessProbe for ScriptedProbe {
    fn probe(&self, _pid: u32, _start: StartIdentity) -> Liveness {
        self.verdict.clone()
    }

    fn current(&self) -> io::Result<ProcessIdentity> {
        Ok(self.identity)
    }
}
