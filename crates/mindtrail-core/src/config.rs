//! Configuration for capture, compression and write coordination

use mindtrail_fs::LockOptions;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Name of the per-project config file inside the memory directory
pub const CONFIG_FILE: &str = "config.json";

/// Compressor settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressOptions {
    /// Master switch; when off, output is stored as-is
    pub enabled: bool,

    /// Outputs shorter than this are never compressed
    pub threshold: usize,

    /// Upper bound on compressed output length
    pub target: usize,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 3000,
            target: 2000,
        }
    }
}

/// Plugin configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory (relative to the project) holding store, locks and logs
    pub memory_dir: String,

    /// Compress oversized tool output before storage
    pub auto_compress: bool,

    /// Minimum output length that triggers compression
    pub compression_threshold: usize,

    /// Maximum compressed output length
    pub compression_target: usize,

    /// Maximum observation content length after compression
    pub max_content_chars: usize,

    /// Window within which identical (source, tool, input) triples are suppressed
    pub dedup_window_ms: i64,

    /// Lock acquisition attempts before giving up
    pub lock_retries: u32,

    /// Shortest wait between lock attempts
    pub lock_min_backoff_ms: u64,

    /// Longest wait between lock attempts
    pub lock_max_backoff_ms: u64,

    /// Age after which a lock is considered abandoned
    pub lock_stale_ms: u64,

    /// Store files larger than this are rotated out on open
    pub max_store_bytes: u64,

    /// Backups kept per store path
    pub max_backups: usize,

    /// Tools whose executions are never captured
    pub ignored_tools: Vec<String>,

    /// Outputs shorter than this are not worth recording
    pub min_output_chars: usize,
}

impl Config {
    pub fn new() -> Self {
        Self {
            memory_dir: ".mindtrail".to_string(),
            auto_compress: true,
            compression_threshold: 3000,
            compression_target: 2000,
            max_content_chars: 2500,
            dedup_window_ms: 60_000,
            lock_retries: 1000,
            lock_min_backoff_ms: 5,
            lock_max_backoff_ms: 50,
            lock_stale_ms: 30_000,
            max_store_bytes: 100 * 1024 * 1024,
            max_backups: 3,
            ignored_tools: vec![
                "TodoWrite".to_string(),
                "TodoRead".to_string(),
                "AskUserQuestion".to_string(),
            ],
            min_output_chars: 0,
        }
    }

    pub fn compress_options(&self) -> CompressOptions {
        CompressOptions {
            enabled: self.auto_compress,
            threshold: self.compression_threshold,
            target: self.compression_target,
        }
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            retries: self.lock_retries,
            min_backoff: Duration::from_millis(self.lock_min_backoff_ms),
            max_backoff: Duration::from_millis(
                self.lock_max_backoff_ms.max(self.lock_min_backoff_ms),
            ),
            stale: Duration::from_millis(self.lock_stale_ms),
        }
    }

    /// Tool names are compared case-insensitively
    pub fn is_ignored(&self, tool_name: &str) -> bool {
        self.ignored_tools
            .iter()
            .any(|t| t.eq_ignore_ascii_case(tool_name))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    auto_compress: Option<bool>,
    #[serde(default)]
    compression_threshold: Option<usize>,
    #[serde(default)]
    compression_target: Option<usize>,
    #[serde(default)]
    max_content_chars: Option<usize>,
    #[serde(default)]
    dedup_window_ms: Option<i64>,
    #[serde(default)]
    lock_retries: Option<u32>,
    #[serde(default)]
    lock_min_backoff_ms: Option<u64>,
    #[serde(default)]
    lock_max_backoff_ms: Option<u64>,
    #[serde(default)]
    lock_stale_ms: Option<u64>,
    #[serde(default)]
    max_store_bytes: Option<u64>,
    #[serde(default)]
    max_backups: Option<usize>,
    #[serde(default)]
    ignored_tools: Option<Vec<String>>,
    #[serde(default)]
    min_output_chars: Option<usize>,
}

/// Load `config.json` from a memory directory, falling back to defaults
/// when the file is missing or unreadable.
pub fn load_config(memory_dir: &Path) -> Config {
    let config_path = memory_dir.join(CONFIG_FILE);
    let mut config = Config::new();
    if !config_path.exists() {
        return config;
    }

    let content = match std::fs::read_to_string(&config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(path = %config_path.display(), error = %e, "config unreadable, using defaults");
            return config;
        }
    };

    let file = match serde_json::from_str::<ConfigFile>(&content) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(path = %config_path.display(), error = %e, "malformed config, using defaults");
            return config;
        }
    };

    if let Some(v) = file.auto_compress {
        config.auto_compress = v;
    }
    if let Some(v) = file.compression_threshold {
        config.compression_threshold = v;
    }
    if let Some(v) = file.compression_target {
        config.compression_target = v;
    }
    if let Some(v) = file.max_content_chars {
        config.max_content_chars = v;
    }
    if let Some(v) = file.dedup_window_ms {
        config.dedup_window_ms = v;
    }
    if let Some(v) = file.lock_retries {
        config.lock_retries = v;
    }
    if let Some(v) = file.lock_min_backoff_ms {
        config.lock_min_backoff_ms = v;
    }
    if let Some(v) = file.lock_max_backoff_ms {
        config.lock_max_backoff_ms = v;
    }
    if let Some(v) = file.lock_stale_ms {
        config.lock_stale_ms = v;
    }
    if let Some(v) = file.max_store_bytes {
        config.max_store_bytes = v;
    }
    if let Some(v) = file.max_backups {
        config.max_backups = v;
    }
    if let Some(v) = file.ignored_tools {
        config.ignored_tools = v;
    }
    if let Some(v) = file.min_output_chars {
        config.min_output_chars = v;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new();
        assert_eq!(config.compression_threshold, 3000);
        assert_eq!(config.compression_target, 2000);
        assert_eq!(config.max_content_chars, 2500);
        assert_eq!(config.dedup_window_ms, 60_000);
        assert_eq!(config.lock_stale_ms, 30_000);
        assert_eq!(config.max_store_bytes, 100 * 1024 * 1024);
        assert_eq!(config.max_backups, 3);
    }

    #[test]
    fn test_lock_options_derived() {
        let opts = Config::new().lock_options();
        assert_eq!(opts.retries, 1000);
        assert_eq!(opts.min_backoff, Duration::from_millis(5));
        assert_eq!(opts.max_backoff, Duration::from_millis(50));
        assert_eq!(opts.stale, Duration::from_secs(30));
    }

    #[test]
    fn test_ignored_tools_case_insensitive() {
        let config = Config::new();
        assert!(config.is_ignored("todowrite"));
        assert!(!config.is_ignored("Read"));
    }

    #[test]
    fn test_load_config_overrides() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE),
            r#"{"auto_compress": false, "dedup_window_ms": 5000, "ignored_tools": ["Glob"]}"#,
        )
        .unwrap();

        let config = load_config(temp.path());
        assert!(!config.auto_compress);
        assert_eq!(config.dedup_window_ms, 5000);
        assert_eq!(config.ignored_tools, vec!["Glob"]);
        // untouched fields keep defaults
        assert_eq!(config.compression_target, 2000);
    }

    #[test]
    fn test_load_config_missing_file_returns_default() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = load_config(temp.path());
        assert!(config.auto_compress);
        assert_eq!(config.max_backups, 3);
    }

    #[test]
    fn test_load_config_malformed_returns_default() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join(CONFIG_FILE), "{not json").unwrap();
        let config = load_config(temp.path());
        assert_eq!(config.compression_threshold, 3000);
    }
}
