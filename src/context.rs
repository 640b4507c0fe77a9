//! Runtime context resolution for singlerun.
//!
//! Every command needs the same two things: the effective configuration and
//! the runtime directory holding lock files. This module resolves both from
//! command-line flags, environment variables, the config file, and platform
//! defaults, in that order of precedence.

use crate::config::Config;
use crate::error::Result;
use crate::locks::LockStore;
use std::env;
use std::path::PathBuf;

/// Environment variable naming the runtime directory.
pub const DIR_ENV: &str = "SINGLERUN_DIR";

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "SINGLERUN_CONFIG";

/// Directory name used under the platform runtime and config dirs.
const APP_DIR: &str = "singlerun";

/// Resolved configuration and runtime directory.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    /// Effective configuration (defaults if no config file exists).
    pub config: Config,

    /// Directory holding lock files.
    pub runtime_dir: PathBuf,
}

impl RuntimeContext {
    /// Resolve the context.
    ///
    /// # Arguments
    ///
    /// * `dir_flag` - value of `--dir`, if given
    /// * `config_flag` - value of `--config`, if given
    ///
    /// An explicitly named config file (flag or `SINGLERUN_CONFIG`) must
    /// exist; the default location is optional.
    ///
    /// # Returns
    ///
    /// * `Ok(RuntimeContext)` - Successfully resolved context
    /// * `Err(SinglerunError::UserError)` - Unreadable or invalid config file
    pub fn resolve(dir_flag: Option<PathBuf>, config_flag: Option<PathBuf>) -> Result<Self> {
        let explicit_config = config_flag.or_else(|| env_path(CONFIG_ENV));
        let config = match explicit_config {
            Some(path) => Config::load(path)?,
            None => match default_config_path() {
                Some(path) => Config::load_or_default(path)?,
                None => Config::default(),
            },
        };

        let runtime_dir = dir_flag
            .or_else(|| env_path(DIR_ENV))
            .or_else(|| config.runtime_dir.clone())
            .unwrap_or_else(default_runtime_dir);

        Ok(Self {
            config,
            runtime_dir,
        })
    }

    /// Lock store over the resolved runtime directory.
    pub fn open_store(&self) -> LockStore {
        LockStore::new(&self.runtime_dir, self.config.store_options())
    }
}

/// A non-empty path from the environment.
fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// `<config dir>/singlerun/config.yaml`, where the config dir is the
/// platform's (`$XDG_CONFIG_HOME` or `~/.config` on Linux).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.yaml"))
}

/// `<runtime dir>/singlerun`, falling back to a per-user temp directory on
/// platforms without a runtime dir (or when `$XDG_RUNTIME_DIR` is unset).
pub fn default_runtime_dir() -> PathBuf {
    match dirs::runtime_dir() {
        Some(dir) => dir.join(APP_DIR),
        None => env::temp_dir().join(format!("{}-{}", APP_DIR, user_tag())),
    }
}

/// Distinguishes users sharing one temp directory.
#[cfg(unix)]
fn user_tag() -> String {
    // SAFETY: getuid has no preconditions and cannot fail.
    unsafe { libc::getuid() }.to_string()
}

#[cfg(not(unix))]
fn user_tag() -> String {
    env::var("USERNAME").unwrap_or_else(|_| "user".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::EnvGuard;
    use serial_test::serial;
    use tempfile::TempDir;

    /// Clear every variable resolution looks at and point the config home
    /// at an empty directory.
    fn isolated_env(temp_dir: &TempDir) -> EnvGuard {
        let mut env = EnvGuard::new();
        env.remove(DIR_ENV);
        env.remove(CONFIG_ENV);
        env.remove("XDG_RUNTIME_DIR");
        env.set("XDG_CONFIG_HOME", temp_dir.path().join("config-home"));
        env
    }

    #[test]
    #[serial]
    fn test_dir_flag_wins() {
        let temp_dir = TempDir::new().unwrap();
        let mut env = isolated_env(&temp_dir);
        env.set(DIR_ENV, temp_dir.path().join("from-env"));

        let flag = temp_dir.path().join("from-flag");
        let ctx = RuntimeContext::resolve(Some(flag.clone()), None).unwrap();
        assert_eq!(ctx.runtime_dir, flag);
    }

    #[test]
    #[serial]
    fn test_dir_env_beats_config() {
        let temp_dir = TempDir::new().unwrap();
        let mut env = isolated_env(&temp_dir);
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "runtime_dir: /from/config\n").unwrap();
        env.set(DIR_ENV, temp_dir.path().join("from-env"));

        let ctx = RuntimeContext::resolve(None, Some(config_path)).unwrap();
        assert_eq!(ctx.runtime_dir, temp_dir.path().join("from-env"));
    }

    #[test]
    #[serial]
    fn test_config_runtime_dir_used() {
        let temp_dir = TempDir::new().unwrap();
        let mut env = isolated_env(&temp_dir);
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "runtime_dir: /from/config\n").unwrap();
        env.set(CONFIG_ENV, &config_path);

        let ctx = RuntimeContext::resolve(None, None).unwrap();
        assert_eq!(ctx.runtime_dir, PathBuf::from("/from/config"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    #[serial]
    fn test_xdg_runtime_dir_default() {
        let temp_dir = TempDir::new().unwrap();
        let mut env = isolated_env(&temp_dir);
        env.set("XDG_RUNTIME_DIR", temp_dir.path());

        let ctx = RuntimeContext::resolve(None, None).unwrap();
        assert_eq!(ctx.runtime_dir, temp_dir.path().join("singlerun"));
        assert_eq!(ctx.config, Config::default());
    }

    #[test]
    #[serial]
    fn test_temp_dir_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let _env = isolated_env(&temp_dir);

        let dir = default_runtime_dir();
        assert!(dir.starts_with(env::temp_dir()));
        let name = dir.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("singlerun-"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    #[serial]
    fn test_default_config_file_is_loaded() {
        let temp_dir = TempDir::new().unwrap();
        let _env = isolated_env(&temp_dir);
        let config_dir = temp_dir.path().join("config-home").join("singlerun");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("config.yaml"), "busy_exit_code: 90\n").unwrap();

        let ctx = RuntimeContext::resolve(Some(temp_dir.path().to_path_buf()), None).unwrap();
        assert_eq!(ctx.config.busy_exit_code, 90);
    }

    #[test]
    #[serial]
    fn test_missing_explicit_config_fails() {
        let temp_dir = TempDir::new().unwrap();
        let _env = isolated_env(&temp_dir);

        let result = RuntimeContext::resolve(None, Some(temp_dir.path().join("nope.yaml")));
        assert!(result.is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    #[serial]
    fn test_empty_env_values_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let mut env = isolated_env(&temp_dir);
        env.set(DIR_ENV, "");
        env.set("XDG_RUNTIME_DIR", temp_dir.path());

        let ctx = RuntimeContext::resolve(None, None).unwrap();
        assert_eq!(ctx.runtime_dir, temp_dir.path().join("singlerun"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    #[serial]
    fn test_relative_xdg_runtime_dir_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let mut env = isolated_env(&temp_dir);
        env.set("XDG_RUNTIME_DIR", "relative/run");

        let dir = default_runtime_dir();
        assert!(dir.starts_with(env::temp_dir()));
    }

    #[test]
    #[serial]
    fn test_open_store_uses_resolved_dir() {
        let temp_dir = TempDir::new().unwrap();
        let _env = isolated_env(&temp_dir);

        let ctx = RuntimeContext::resolve(Some(temp_dir.path().join("locks")), None).unwrap();
        let store = ctx.open_store();
        assert_eq!(store.dir(), temp_dir.path().join("locks"));
    }
}
