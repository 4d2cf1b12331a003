//! Cross-process dedup log
//!
//! One JSON line per recently seen (source, tool, input) hash. Every check
//! reads the log, prunes entries outside the window and either reports a
//! duplicate or appends the new entry, all under the log's own lock.

use crate::io::{read_jsonl, write_jsonl};
use crate::lock::{with_lock, LockOptions};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Number of serialized-input characters that feed the hash
const INPUT_PREFIX_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupEntry {
    /// Epoch millis
    pub timestamp: i64,
    pub hash: String,
    pub source: String,
}

/// Content hash over `source + tool + JSON(input)[..200]`
pub fn dedup_hash(source: &str, tool: &str, input: &serde_json::Value) -> String {
    let json = serde_json::to_string(input).unwrap_or_default();
    let prefix: String = json.chars().take(INPUT_PREFIX_CHARS).collect();

    let mut hasher = blake3::Hasher::new();
    hasher.update(source.as_bytes());
    hasher.update(tool.as_bytes());
    hasher.update(prefix.as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[derive(Debug, Clone)]
pub struct DedupLog {
    path: PathBuf,
    window_ms: i64,
    lock_options: LockOptions,
}

impl DedupLog {
    pub fn new(path: impl Into<PathBuf>, window_ms: i64, lock_options: LockOptions) -> Self {
        Self {
            path: path.into(),
            window_ms,
            lock_options,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` when the same source already observed this tool+input
    /// within the window.
    pub fn check(&self, source: &str, tool: &str, input: &serde_json::Value) -> Result<bool> {
        let now = chrono::Utc::now().timestamp_millis();
        self.check_at(source, &dedup_hash(source, tool, input), now)
    }

    /// Check-then-append for a precomputed hash at an explicit clock reading.
    pub fn check_at(&self, source: &str, hash: &str, now_ms: i64) -> Result<bool> {
        with_lock(&self.path, self.lock_options, || {
            let mut entries: Vec<DedupEntry> = read_jsonl(&self.path)?;
            entries.retain(|e| now_ms.saturating_sub(e.timestamp) < self.window_ms);

            if entries.iter().any(|e| e.hash == hash) {
                tracing::debug!(hash, "duplicate observation suppressed");
                return Ok(true);
            }

            entries.push(DedupEntry {
                timestamp: now_ms,
                hash: hash.to_string(),
                source: source.to_string(),
            });
            write_jsonl(&self.path, &entries)?;
            Ok(false)
        })
    }
}
