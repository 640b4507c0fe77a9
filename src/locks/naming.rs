//! Lock name to file name mapping.
//!
//! Names are arbitrary user strings (often a whole command line), so the file
//! name is a readable slug followed by a hash of the full name. The slug keeps
//! `ls` output legible; the hash keeps distinct names from colliding and keeps
//! `../` and friends out of the path.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Extension of lock files inside the runtime directory.
pub const LOCK_EXTENSION: &str = "lock";

const SLUG_LEN: usize = 24;
const HASH_HEX_LEN: usize = 24;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_.+-]+").expect("valid slug regex"));
static SEPARATOR_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[_-]+").expect("valid separator regex"));

/// Reduce a name to characters that are safe in a file name.
pub fn slugify(name: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(name, "_");
    let collapsed = SEPARATOR_RUNS.replace_all(&replaced, "_");
    collapsed
        .trim_matches(|c| c == '_' || c == '.')
        .to_string()
}

/// Deterministic file stem for a lock name.
pub fn file_base(name: &str) -> String {
    let slug: String = slugify(name).chars().take(SLUG_LEN).collect();

    let digest = Sha256::digest(name.as_bytes());
    let hash = hex::encode(&digest[..HASH_HEX_LEN / 2]);

    if slug.is_empty() {
        hash
    } else {
        format!("{}_{}", slug, hash)
    }
}

/// Lock file name for a lock name.
pub fn lock_file_name(name: &str) -> String {
    format!("{}.{}", file_base(name), LOCK_EXTENSION)
}
