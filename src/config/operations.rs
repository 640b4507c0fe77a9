//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{Result, SinglerunError};
use crate::exit_codes;
use crate::locks::StoreOptions;
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the config.yaml file
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(SinglerunError::UserError)` - Read error, parse error, or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            SinglerunError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content).map_err(|e| {
            SinglerunError::UserError(format!("{} (in '{}')", e, path.display()))
        })
    }

    /// Load config from `path` if it exists, otherwise use defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml).map_err(|e| {
            SinglerunError::UserError(format!("failed to parse config YAML: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - intervals and the gate timeout must be positive
    /// - `max_poll_interval_ms` must be at least `poll_interval_ms`
    /// - reserved exit codes must be distinct, within 3..=125, and not clash
    ///   with the codes singlerun itself uses for child failures
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("poll_interval_ms", self.poll_interval_ms),
            ("max_poll_interval_ms", self.max_poll_interval_ms),
            ("gate_timeout_ms", self.gate_timeout_ms),
        ] {
            if value == 0 {
                return Err(SinglerunError::UserError(format!(
                    "config validation failed: {} must be greater than 0",
                    field
                )));
            }
        }

        if self.max_poll_interval_ms < self.poll_interval_ms {
            return Err(SinglerunError::UserError(format!(
                "config validation failed: max_poll_interval_ms ({}) must be at least poll_interval_ms ({})",
                self.max_poll_interval_ms, self.poll_interval_ms
            )));
        }

        for (field, code) in [
            ("busy_exit_code", self.busy_exit_code),
            ("lock_failure_exit_code", self.lock_failure_exit_code),
        ] {
            // 0..=2 are success, generic failure, and usage errors; 126+ are
            // spawn failures and signal deaths.
            if !(3..exit_codes::CANNOT_EXECUTE).contains(&code) {
                return Err(SinglerunError::UserError(format!(
                    "config validation failed: {} must be between 3 and {} (found {})",
                    field,
                    exit_codes::CANNOT_EXECUTE - 1,
                    code
                )));
            }
            if code == exit_codes::USER_ERROR {
                return Err(SinglerunError::UserError(format!(
                    "config validation failed: {} must not be {}, which reports invalid usage",
                    field,
                    exit_codes::USER_ERROR
                )));
            }
        }

        if self.busy_exit_code == self.lock_failure_exit_code {
            return Err(SinglerunError::UserError(format!(
                "config validation failed: busy_exit_code and lock_failure_exit_code must differ (both are {})",
                self.busy_exit_code
            )));
        }

        Ok(())
    }

    /// Timing options for the lock store.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_poll_interval: Duration::from_millis(self.max_poll_interval_ms),
            gate_timeout: Duration::from_millis(self.gate_timeout_ms),
        }
    }
}
