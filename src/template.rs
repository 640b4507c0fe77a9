//! Entry templates.
//!
//! `status -f`, `list -f` and `run --run-after` format a lock entry from a
//! template such as `{pid}\t{name}\t{elapsed}`. Placeholders:
//!
//! | Field        | Value                                      |
//! |--------------|--------------------------------------------|
//! | `{name}`     | lock name                                  |
//! | `{pid}`      | holder pid                                 |
//! | `{host}`     | holder host                                |
//! | `{command}`  | guarded command line                       |
//! | `{state}`    | `held` or `stale`                          |
//! | `{acquired}` | acquisition time, RFC3339                  |
//! | `{elapsed}`  | time since acquisition as `HH:MM:SS`       |
//! | `{age}`      | time since acquisition as `2h 30m`         |
//! | `{path}`     | lock file path                             |
//!
//! `{{` and `}}` stand for literal braces.

use crate::error::{Result, SinglerunError};
use crate::locks::LockInfo;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

static TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|[{}]").expect("valid template regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Pid,
    Host,
    Command,
    State,
    Acquired,
    Elapsed,
    Age,
    Path,
}

impl Field {
    fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "name" => Field::Name,
            "pid" => Field::Pid,
            "host" => Field::Host,
            "command" => Field::Command,
            "state" => Field::State,
            "acquired" => Field::Acquired,
            "elapsed" => Field::Elapsed,
            "age" => Field::Age,
            "path" => Field::Path,
            _ => return None,
        })
    }

    fn value(self, lock: &LockInfo) -> String {
        let record = &lock.record;
        match self {
            Field::Name => record.name.clone(),
            Field::Pid => record.holder_pid.to_string(),
            Field::Host => record.host.clone(),
            Field::Command => record.command.clone(),
            Field::State => lock.state.as_str().to_string(),
            Field::Acquired => record.acquired_at.to_rfc3339(),
            Field::Elapsed => elapsed_clock(record.acquired_at),
            Field::Age => record.age_string(),
            Field::Path => lock.path.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Field(Field),
}

/// A parsed entry template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTemplate {
    pieces: Vec<Piece>,
}

impl EntryTemplate {
    /// Parse a template, rejecting unknown fields and unbalanced braces.
    pub fn parse(template: &str) -> Result<Self> {
        let mut pieces = Vec::new();
        let mut text = String::new();
        let mut last = 0;

        for caps in TOKENS.captures_iter(template) {
            let Some(token) = caps.get(0) else {
                continue;
            };
            text.push_str(&template[last..token.start()]);
            last = token.end();

            match (token.as_str(), caps.get(1)) {
                ("{{", _) => text.push('{'),
                ("}}", _) => text.push('}'),
                (_, Some(key)) => {
                    let field = Field::from_key(key.as_str()).ok_or_else(|| {
                        SinglerunError::UserError(format!(
                            "unknown field '{{{}}}' in template '{}'",
                            key.as_str(),
                            template
                        ))
                    })?;
                    if !text.is_empty() {
                        pieces.push(Piece::Text(std::mem::take(&mut text)));
                    }
                    pieces.push(Piece::Field(field));
                }
                (brace, None) => {
                    return Err(SinglerunError::UserError(format!(
                        "unmatched '{}' in template '{}' (write '{}{}' for a literal brace)",
                        brace, template, brace, brace
                    )));
                }
            }
        }

        text.push_str(&template[last..]);
        if !text.is_empty() {
            pieces.push(Piece::Text(text));
        }
        Ok(Self { pieces })
    }

    /// Format one lock entry.
    pub fn render(&self, lock: &LockInfo) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Field(field) => out.push_str(&field.value(lock)),
            }
        }
        out
    }
}

/// `HH:MM:SS` since `since`; hours keep counting past a day.
fn elapsed_clock(since: DateTime<Utc>) -> String {
    let secs = (Utc::now() - since).num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}
