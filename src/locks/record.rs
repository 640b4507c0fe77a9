//! Lock record stored inside each lock file.

use crate::probe::{ProcessIdentity, StartIdentity};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Who holds (or last held) a named lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// The caller-chosen lock name.
    pub name: String,

    /// Process ID of the holder.
    pub holder_pid: u32,

    /// Start identity of the holder, to tell it apart from a later process
    /// that reused the same pid.
    pub start_identity: StartIdentity,

    /// Host the holder ran on.
    pub host: String,

    /// What the holder is running (diagnostic only).
    pub command: String,

    /// Timestamp of acquisition (RFC3339).
    pub acquired_at: DateTime<Utc>,
}

/// What a lock file currently contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordContents {
    /// Never written, or truncated on release.
    Empty,
    /// A well-formed record.
    Valid(LockRecord),
    /// Unparseable content; the reason is kept for diagnostics.
    Corrupt(String),
}

impl LockRecord {
    /// Create a record naming `holder` as the holder, stamped now.
    pub fn new(name: &str, holder: ProcessIdentity, command: &str) -> Self {
        Self {
            name: name.to_string(),
            holder_pid: holder.pid,
            start_identity: holder.start,
            host: get_host_string(),
            command: command.to_string(),
            acquired_at: Utc::now(),
        }
    }

    /// Serialize the record to a JSON string.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Whether the holder ran on this host, so its pid means something here.
    pub fn is_local(&self) -> bool {
        self.host == get_host_string()
    }

    /// Whether the record names exactly this process incarnation.
    pub fn is_held_by(&self, identity: &ProcessIdentity) -> bool {
        self.holder_pid == identity.pid && self.start_identity == identity.start
    }

    /// Read whatever the lock file holds, from the start.
    pub fn read_from(file: &mut File) -> io::Result<RecordContents> {
        file.seek(SeekFrom::Start(0))?;
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        Ok(RecordContents::parse(&content))
    }

    /// Replace the lock file's contents with this record and flush it to disk.
    ///
    /// Only called while the exclusive OS lock on `file` is held.
    pub fn write_to(&self, file: &mut File) -> io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()
    }

    /// Calculate the age of the lock.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.acquired_at)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let age = self.age();
        let seconds = age.num_seconds().max(0);
        let minutes = age.num_minutes();
        let hours = age.num_hours();
        let days = age.num_days();

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m", minutes)
        } else {
            format!("{}s", seconds)
        }
    }
}

impl RecordContents {
    /// Classify raw lock file content.
    pub fn parse(content: &str) -> Self {
        if content.trim().is_empty() {
            return RecordContents::Empty;
        }
        match serde_json::from_str(content) {
            Ok(record) => RecordContents::Valid(record),
            Err(e) => RecordContents::Corrupt(e.to_string()),
        }
    }
}

/// Get the host name recorded in lock records.
pub(crate) fn get_host_string() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
