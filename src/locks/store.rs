//! Lock acquisition, inspection, and administrative operations.

use super::naming::{self, LOCK_EXTENSION};
use super::record::{LockRecord, RecordContents, get_host_string};
use super::session::LockSession;
use super::types::{
    Backoff, CleanReason, CleanedLock, LockInfo, LockState, LockStatus, Lookup, StoreOptions,
    WaitPolicy,
};
use crate::error::LockError;
use crate::probe::{Liveness, ProcessIdentity, ProcessProbe, SystemProbe};
use fs2::FileExt;
use globset::GlobMatcher;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Directory-wide gate serializing the short lock/inspect/unlink sections.
const GATE_FILE: &str = ".gate";

const GATE_POLL: Duration = Duration::from_millis(2);

/// Reclaims and lost races retry without sleeping, up to this many times in a row.
const MAX_IMMEDIATE_RETRIES: u32 = 8;

/// Outcome of a single acquisition attempt.
enum Attempt {
    Acquired(LockSession),
    Busy(Option<LockRecord>),
    Retry(RetryReason),
}

#[derive(Debug, Clone, Copy)]
enum RetryReason {
    /// A stale lock file was removed; the next attempt creates a fresh one.
    Reclaimed,
    /// Another process reclaimed or replaced the file first.
    ReclaimLost,
    /// The path no longer names the file we locked.
    PathReplaced,
}

impl RetryReason {
    fn as_str(&self) -> &'static str {
        match self {
            RetryReason::Reclaimed => "reclaimed",
            RetryReason::ReclaimLost => "reclaim_lost",
            RetryReason::PathReplaced => "path_replaced",
        }
    }
}

/// Named locks backed by files in a runtime directory.
///
/// The exclusive OS lock on `<dir>/<base>.lock` is the source of truth; the
/// record inside only says who holds it. Lock files are never written
/// without holding that lock.
#[derive(Debug)]
pub struct LockStore<P = SystemProbe> {
    dir: PathBuf,
    options: StoreOptions,
    probe: P,
}

impl LockStore<SystemProbe> {
    /// Create a store over `dir` probing real processes.
    pub fn new(dir: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self::with_probe(dir, options, SystemProbe)
    }
}

impl<P: ProcessProbe> LockStore<P> {
    /// Create a store with a custom process probe.
    pub fn with_probe(dir: impl Into<PathBuf>, options: StoreOptions, probe: P) -> Self {
        Self {
            dir: dir.into(),
            options,
            probe,
        }
    }

    /// The runtime directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the lock file backing `name`.
    pub fn lock_path(&self, name: &str) -> PathBuf {
        self.dir.join(naming::lock_file_name(name))
    }

    fn gate_path(&self) -> PathBuf {
        self.dir.join(GATE_FILE)
    }

    /// Acquire the lock for `name`.
    ///
    /// # Returns
    ///
    /// * `Ok(LockSession)` - the lock is held until the session is released or dropped
    /// * `Err(LockError::Busy)` - a live holder kept the lock for as long as `policy` allows
    /// * `Err(LockError::Io)` - the runtime directory or lock file could not be used
    pub fn acquire(
        &self,
        name: &str,
        command: &str,
        policy: WaitPolicy,
    ) -> Result<LockSession, LockError> {
        validate_name(name)?;
        self.ensure_dir()?;

        let me = self
            .probe
            .current()
            .map_err(|e| LockError::io("failed to determine own process identity", e))?;
        let path = self.lock_path(name);
        let started = Instant::now();
        let mut backoff = Backoff::new(&self.options);
        let mut immediate_retries = 0;

        loop {
            let holder = match self.try_acquire(name, command, &path, &me)? {
                Attempt::Acquired(session) => return Ok(session),
                Attempt::Retry(reason) if immediate_retries < MAX_IMMEDIATE_RETRIES => {
                    immediate_retries += 1;
                    debug!(name, reason = reason.as_str(), "retrying acquisition");
                    continue;
                }
                Attempt::Retry(_) => None,
                Attempt::Busy(holder) => holder,
            };
            immediate_retries = 0;

            let delay = match policy {
                WaitPolicy::FailFast => return Err(busy(name, holder)),
                WaitPolicy::Block => backoff.next_delay(),
                WaitPolicy::Timeout(limit) => {
                    let deadline = started + limit;
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(busy(name, holder));
                    }
                    backoff.next_delay().min(deadline - now)
                }
            };

            debug!(name, delay_ms = delay.as_millis() as u64, "lock is busy; waiting");
            thread::sleep(delay);
        }
    }

    /// One non-blocking attempt, run entirely under the directory gate.
    fn try_acquire(
        &self,
        name: &str,
        command: &str,
        path: &Path,
        me: &ProcessIdentity,
    ) -> Result<Attempt, LockError> {
        let Some(_gate) = self.enter_gate()? else {
            return Ok(Attempt::Busy(None));
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| io_err("failed to open lock file", path, e))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                if !refers_to(&file, path)? {
                    return Ok(Attempt::Retry(RetryReason::PathReplaced));
                }

                let previous = LockRecord::read_from(&mut file)
                    .map_err(|e| io_err("failed to read lock file", path, e))?;
                if let RecordContents::Valid(prev) = &previous
                    && !prev.is_held_by(me)
                {
                    info!(
                        name,
                        previous_pid = prev.holder_pid,
                        "taking over lock left behind by a previous holder"
                    );
                }

                let record = LockRecord::new(name, *me, command);
                record
                    .write_to(&mut file)
                    .map_err(|e| io_err("failed to write lock record", path, e))?;

                debug!(name, pid = me.pid, "acquired lock");
                Ok(Attempt::Acquired(LockSession::new(
                    name,
                    path.to_path_buf(),
                    file,
                    record,
                )))
            }
            Err(e) if is_contended(&e) => self.inspect_holder(name, path, &mut file),
            Err(e) => Err(io_err("failed to lock", path, e)),
        }
    }

    /// The OS lock is taken: decide between busy and stale.
    fn inspect_holder(
        &self,
        name: &str,
        path: &Path,
        file: &mut File,
    ) -> Result<Attempt, LockError> {
        let record = match LockRecord::read_from(file) {
            Ok(RecordContents::Valid(record)) => record,
            Ok(RecordContents::Empty) => return Ok(Attempt::Busy(None)),
            Ok(RecordContents::Corrupt(reason)) => {
                warn!(name, %reason, "held lock has an unreadable record; treating it as busy");
                return Ok(Attempt::Busy(None));
            }
            // Windows refuses reads of a range another handle has locked.
            Err(e) => {
                debug!(name, error = %e, "could not read record of held lock");
                return Ok(Attempt::Busy(None));
            }
        };

        match self.holder_liveness(&record) {
            Liveness::Dead => self.reclaim(name, path, file, &record),
            Liveness::Alive | Liveness::Indeterminate(_) => Ok(Attempt::Busy(Some(record))),
        }
    }

    /// Unlink a stale lock file so the next attempt locks a fresh one.
    ///
    /// Whoever still holds the old descriptor keeps a lock on an orphaned
    /// inode that no acquirer will ever open again.
    fn reclaim(
        &self,
        name: &str,
        path: &Path,
        file: &File,
        stale: &LockRecord,
    ) -> Result<Attempt, LockError> {
        if !refers_to(file, path)? {
            return Ok(Attempt::Retry(RetryReason::ReclaimLost));
        }

        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Attempt::Retry(RetryReason::ReclaimLost));
            }
            Err(e) => return Err(io_err("failed to remove stale lock file", path, e)),
        }

        info!(
            name,
            stale_pid = stale.holder_pid,
            stale_command = %stale.command,
            "reclaimed stale lock"
        );
        Ok(Attempt::Retry(RetryReason::Reclaimed))
    }

    /// Inspect the lock for `name` without modifying it.
    pub fn status(&self, name: &str) -> Result<LockStatus, LockError> {
        validate_name(name)?;
        let path = self.lock_path(name);

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LockStatus::NotHeld),
            Err(e) => return Err(io_err("failed to open lock file", &path, e)),
        };

        match LockRecord::read_from(&mut file)
            .map_err(|e| io_err("failed to read lock file", &path, e))?
        {
            RecordContents::Empty => Ok(LockStatus::NotHeld),
            RecordContents::Corrupt(reason) => Err(LockError::CorruptRecord { path, reason }),
            RecordContents::Valid(record) => match self.holder_liveness(&record) {
                Liveness::Dead => Ok(LockStatus::Stale(record)),
                Liveness::Alive | Liveness::Indeterminate(_) => Ok(LockStatus::Held(record)),
            },
        }
    }

    /// Remove the lock file for `name` regardless of its holder.
    ///
    /// The holder is not signalled. If it is still running it keeps its OS
    /// lock on the removed file, so a later `acquire` can succeed alongside it.
    ///
    /// # Returns
    ///
    /// The record that was cleared, if the file held one.
    pub fn force_release(&self, name: &str) -> Result<Option<LockRecord>, LockError> {
        validate_name(name)?;
        let path = self.lock_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let Some(_gate) = self.enter_gate()? else {
            return Err(LockError::GateTimeout {
                path: self.gate_path(),
            });
        };

        let contents = match File::open(&path) {
            Ok(mut file) => LockRecord::read_from(&mut file).unwrap_or_else(|e| {
                debug!(name, error = %e, "could not read record before force release");
                RecordContents::Empty
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err("failed to open lock file", &path, e)),
        };

        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err("failed to remove lock file", &path, e)),
        }

        let record = match contents {
            RecordContents::Valid(record) => Some(record),
            RecordContents::Empty | RecordContents::Corrupt(_) => None,
        };
        info!(
            name,
            holder_pid = record.as_ref().map(|r| r.holder_pid),
            "force-released lock"
        );
        Ok(record)
    }

    /// List every lock file that carries a record, sorted by name.
    ///
    /// `filter`, when given, is matched against lock names.
    pub fn list(&self, filter: Option<&GlobMatcher>) -> Result<Vec<LockInfo>, LockError> {
        let mut locks = Vec::new();

        for path in self.lock_files()? {
            let mut file = match File::open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_err("failed to open lock file", &path, e)),
            };

            // Skip released, corrupt, and unreadable lock files
            let record = match LockRecord::read_from(&mut file) {
                Ok(RecordContents::Valid(record)) => record,
                Ok(_) => continue,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable lock file");
                    continue;
                }
            };

            if let Some(matcher) = filter
                && !matcher.is_match(&record.name)
            {
                continue;
            }

            let state = if self.holder_liveness(&record).is_alive() {
                LockState::Held
            } else {
                LockState::Stale
            };
            locks.push(LockInfo {
                path,
                record,
                state,
            });
        }

        locks.sort_by(|a, b| a.record.name.cmp(&b.record.name));
        Ok(locks)
    }

    /// Resolve a user-supplied ID to a single lock.
    ///
    /// A lock named exactly `id` wins. Otherwise `id` must be a substring of
    /// exactly one recorded name. Released locks carry no name and never
    /// match.
    pub fn find(&self, id: &str) -> Result<Lookup, LockError> {
        let path = self.lock_path(id);
        let (record, state) = match self.status(id)? {
            LockStatus::Held(record) => (record, LockState::Held),
            LockStatus::Stale(record) => (record, LockState::Stale),
            LockStatus::NotHeld => return self.find_partial(id),
        };
        Ok(Lookup::Found(LockInfo {
            path,
            record,
            state,
        }))
    }

    fn find_partial(&self, id: &str) -> Result<Lookup, LockError> {
        let mut matches: Vec<LockInfo> = self
            .list(None)?
            .into_iter()
            .filter(|lock| lock.record.name.contains(id))
            .collect();

        Ok(match matches.len() {
            0 => Lookup::NoRecord,
            1 => Lookup::Found(matches.remove(0)),
            _ => Lookup::Ambiguous(matches.into_iter().map(|lock| lock.record.name).collect()),
        })
    }

    /// Remove lock files nobody holds any more.
    ///
    /// A file is removable when its OS lock is free (released or abandoned by
    /// a crashed holder) or when the OS lock is held but the recorded holder
    /// is dead. Files held by live or unverifiable holders are kept.
    pub fn clean(&self, dry_run: bool) -> Result<Vec<CleanedLock>, LockError> {
        let mut cleaned = Vec::new();
        for path in self.lock_files()? {
            if let Some(lock) = self.clean_file(path, dry_run)? {
                cleaned.push(lock);
            }
        }
        Ok(cleaned)
    }

    /// Remove the lock file for `name` if nobody holds it.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(CleanedLock))` - the file was (or, in a dry run, would be) removed
    /// * `Ok(None)` - no file, or a live holder still has it
    pub fn clean_lock(&self, name: &str, dry_run: bool) -> Result<Option<CleanedLock>, LockError> {
        validate_name(name)?;
        self.clean_file(self.lock_path(name), dry_run)
    }

    fn clean_file(&self, path: PathBuf, dry_run: bool) -> Result<Option<CleanedLock>, LockError> {
        let Some(_gate) = self.enter_gate()? else {
            return Err(LockError::GateTimeout {
                path: self.gate_path(),
            });
        };

        let mut file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err("failed to open lock file", &path, e)),
        };

        let free = match file.try_lock_exclusive() {
            Ok(()) => true,
            Err(e) if is_contended(&e) => false,
            Err(e) => return Err(io_err("failed to lock", &path, e)),
        };
        if !refers_to(&file, &path)? {
            return Ok(None);
        }

        let contents = match LockRecord::read_from(&mut file) {
            Ok(contents) => contents,
            Err(_) if !free => return Ok(None),
            Err(e) => return Err(io_err("failed to read lock file", &path, e)),
        };

        let (record, reason) = match (free, contents) {
            (true, RecordContents::Empty) => (None, CleanReason::Released),
            (true, RecordContents::Valid(record)) => (Some(record), CleanReason::Abandoned),
            (true, RecordContents::Corrupt(_)) => (None, CleanReason::Abandoned),
            (false, RecordContents::Valid(record))
                if !self.holder_liveness(&record).is_alive() =>
            {
                (Some(record), CleanReason::Stale)
            }
            (false, _) => return Ok(None),
        };

        if !dry_run {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(io_err("failed to remove lock file", &path, e)),
            }
            info!(path = %path.display(), reason = reason.as_str(), "removed lock file");
        }

        Ok(Some(CleanedLock {
            path,
            record,
            reason,
        }))
    }

    /// Liveness of a record's holder; records from other hosts cannot be probed.
    fn holder_liveness(&self, record: &LockRecord) -> Liveness {
        if !record.is_local() {
            let reason = format!(
                "lock was taken on host '{}', this is '{}'",
                record.host,
                get_host_string()
            );
            warn!(name = %record.name, %reason, "cannot probe holder; assuming it is alive");
            return Liveness::Indeterminate(reason);
        }
        self.probe.probe(record.holder_pid, record.start_identity)
    }

    /// Take the directory gate, or `None` if it stays contended past the timeout.
    fn enter_gate(&self) -> Result<Option<File>, LockError> {
        let path = self.gate_path();
        let gate = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_err("failed to open gate file", &path, e))?;

        let deadline = Instant::now() + self.options.gate_timeout;
        loop {
            match gate.try_lock_exclusive() {
                Ok(()) => return Ok(Some(gate)),
                Err(e) if is_contended(&e) => {
                    if Instant::now() >= deadline {
                        warn!(path = %path.display(), "gate stayed busy past its timeout");
                        return Ok(None);
                    }
                    thread::sleep(GATE_POLL);
                }
                Err(e) => return Err(io_err("failed to lock", &path, e)),
            }
        }
    }

    /// Paths of every `*.lock` file in the runtime directory.
    fn lock_files(&self) -> Result<Vec<PathBuf>, LockError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err("failed to read runtime directory", &self.dir, e)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| io_err("failed to read runtime directory entry in", &self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(LOCK_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn ensure_dir(&self) -> Result<(), LockError> {
        if self.dir.is_dir() {
            return Ok(());
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder
            .create(&self.dir)
            .map_err(|e| io_err("failed to create runtime directory", &self.dir, e))
    }
}

fn validate_name(name: &str) -> Result<(), LockError> {
    if name.trim().is_empty() {
        return Err(LockError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn busy(name: &str, holder: Option<LockRecord>) -> LockError {
    LockError::Busy {
        name: name.to_string(),
        holder,
    }
}

fn io_err(action: &str, path: &Path, source: io::Error) -> LockError {
    LockError::io(format!("{} '{}'", action, path.display()), source)
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Whether `path` still names the file behind `file`.
#[cfg(unix)]
fn refers_to(file: &File, path: &Path) -> Result<bool, LockError> {
    use std::os::unix::fs::MetadataExt;

    let open = file
        .metadata()
        .map_err(|e| io_err("failed to stat lock file", path, e))?;
    match fs::metadata(path) {
        Ok(on_disk) => Ok(open.dev() == on_disk.dev() && open.ino() == on_disk.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_err("failed to stat lock file", path, e)),
    }
}

/// Open files cannot be unlinked on Windows, so an existing path is the same file.
#[cfg(not(unix))]
fn refers_to(_file: &File, path: &Path) -> Result<bool, LockError> {
    Ok(path.exists())
}
