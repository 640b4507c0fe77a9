//! Config struct definition and default implementation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for singlerun.
///
/// This struct represents the contents of `config.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Location
    // =========================================================================
    /// Directory holding lock files. Overridden by `--dir` and `SINGLERUN_DIR`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_dir: Option<PathBuf>,

    // =========================================================================
    // Waiting
    // =========================================================================
    /// First sleep between acquisition attempts under `--wait`/`--timeout`.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Cap for the doubling backoff between attempts.
    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u64,

    /// How long one attempt may wait for the runtime directory gate.
    #[serde(default = "default_gate_timeout_ms")]
    pub gate_timeout_ms: u64,

    // =========================================================================
    // Exit codes
    // =========================================================================
    /// Exit code of `run` when another instance holds the lock.
    #[serde(default = "default_busy_exit_code")]
    pub busy_exit_code: i32,

    /// Exit code of `run` when the lock system fails.
    #[serde(default = "default_lock_failure_exit_code")]
    pub lock_failure_exit_code: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime_dir: None,
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
            gate_timeout_ms: default_gate_timeout_ms(),
            busy_exit_code: default_busy_exit_code(),
            lock_failure_exit_code: default_lock_failure_exit_code(),
        }
    }
}

pub(crate) fn default_poll_interval_ms() -> u64 {
    100
}

pub(crate) fn default_max_poll_interval_ms() -> u64 {
    1000
}

pub(crate) fn default_gate_timeout_ms() -> u64 {
    2000
}

pub(crate) fn default_busy_exit_code() -> i32 {
    crate::exit_codes::ALREADY_RUNNING
}

pub(crate) fn default_lock_failure_exit_code() -> i32 {
    crate::exit_codes::LOCK_FAILURE
}
