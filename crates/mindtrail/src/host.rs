//! Boundary with the host runtime: environment, hook payloads, and the
//! capture pipeline that turns one tool execution into a stored observation

use crate::observe;
use mindtrail_compress::compress_output;
use mindtrail_core::{load_config, Config, ObservationType, Source};
use mindtrail_fs::{dedup_hash, DedupLog, Paths};
use mindtrail_store::{Coordinator, CoordinatorOptions, FileStore, FrameInput};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// Environment resolved once per process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnv {
    pub source: Source,
    pub debug: bool,
    /// `MINDTRAIL_DIR`, relative to the project root unless absolute
    pub memory_dir: Option<String>,
}

impl HostEnv {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `OPENCODE` wins over `CLAUDECODE`; neither means `claude`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let source = if is_set(lookup("OPENCODE")) {
            Source::Opencode
        } else {
            Source::Claude
        };
        let memory_dir = lookup("MINDTRAIL_DIR")
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        Self {
            source,
            debug: is_set(lookup("MINDTRAIL_DEBUG")),
            memory_dir,
        }
    }
}

fn is_set(value: Option<String>) -> bool {
    match value {
        Some(v) => {
            let v = v.trim();
            !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false")
        }
        None => false,
    }
}

/// JSON the host pipes to hook commands on stdin
#[derive(Debug, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Value>,
    #[serde(default)]
    pub tool_response: Option<Value>,
}

impl HookInput {
    /// Empty stdin is a valid, empty payload.
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
    }

    pub fn output_text(&self) -> String {
        self.tool_response
            .as_ref()
            .map(response_text)
            .unwrap_or_default()
    }
}

/// Flatten a tool response into the text worth remembering
pub fn response_text(response: &Value) -> String {
    let obj = match response {
        Value::Null => return String::new(),
        Value::String(s) => return s.clone(),
        Value::Object(obj) => obj,
        other => return other.to_string(),
    };

    let field = |key: &str| obj.get(key).and_then(Value::as_str);

    if let Some(output) = field("output") {
        return output.to_string();
    }
    if let Some(stdout) = field("stdout") {
        return match field("stderr") {
            Some(stderr) if !stderr.is_empty() => format!("{}\n{}", stdout, stderr),
            _ => stdout.to_string(),
        };
    }
    if let Some(content) = field("content") {
        return content.to_string();
    }
    if let Some(content) = obj
        .get("file")
        .and_then(|f| f.get("content"))
        .and_then(Value::as_str)
    {
        return content.to_string();
    }
    response.to_string()
}

/// Hashes this process recorded in the shared log, checked before it.
/// Entries age out with the same window as the log.
#[derive(Debug)]
pub struct RecentCache {
    capacity: usize,
    window_ms: i64,
    order: VecDeque<String>,
    seen: HashMap<String, i64>,
}

impl RecentCache {
    pub fn new(capacity: usize, window_ms: i64) -> Self {
        Self {
            capacity: capacity.max(1),
            window_ms,
            order: VecDeque::new(),
            seen: HashMap::new(),
        }
    }

    pub fn contains(&self, hash: &str, now_ms: i64) -> bool {
        self.seen
            .get(hash)
            .is_some_and(|at| now_ms.saturating_sub(*at) < self.window_ms)
    }

    pub fn insert(&mut self, hash: String, now_ms: i64) {
        if self.seen.insert(hash.clone(), now_ms).is_some() {
            return;
        }
        self.order.push_back(hash);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

/// Lazily opened read handle. Writes go through the coordinator with a
/// fresh handle and invalidate this one.
#[derive(Debug)]
pub struct MemoryHandle {
    coordinator: Coordinator,
    store: Option<FileStore>,
}

impl MemoryHandle {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator,
            store: None,
        }
    }

    /// `None` when nothing has been stored yet; reading never creates a store.
    pub fn reader(&mut self) -> mindtrail_store::Result<Option<&FileStore>> {
        if self.store.is_none() && !self.coordinator.store_path().exists() {
            return Ok(None);
        }
        let store = match self.store.take() {
            Some(store) => store,
            None => self.coordinator.open()?,
        };
        let store: &FileStore = self.store.insert(store);
        Ok(Some(store))
    }

    pub fn write(&mut self, frame: FrameInput) -> mindtrail_store::Result<String> {
        let id = self.coordinator.write(frame)?;
        self.reset();
        Ok(id)
    }

    pub fn is_open(&self) -> bool {
        self.store.is_some()
    }

    pub fn reset(&mut self) {
        self.store = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Stored { id: String, obs_type: ObservationType },
    Duplicate,
    Skipped(&'static str),
}

const RECENT_CAPACITY: usize = 256;

/// Everything a hook needs for one project directory
#[derive(Debug)]
pub struct Host {
    pub env: HostEnv,
    pub config: Config,
    pub paths: Paths,
    pub memory: MemoryHandle,
    dedup: DedupLog,
    recent: RecentCache,
}

impl Host {
    pub fn new(env: HostEnv, project_root: &Path) -> Self {
        let memory_dir = env
            .memory_dir
            .clone()
            .unwrap_or_else(|| Config::new().memory_dir);
        let mut config = load_config(&project_root.join(&memory_dir));
        config.memory_dir = memory_dir;
        let paths = Paths::new(project_root, &config.memory_dir);

        let coordinator = Coordinator::new(paths.store_file(), CoordinatorOptions::from(&config));
        let dedup = DedupLog::new(
            paths.dedup_log(),
            config.dedup_window_ms,
            config.lock_options(),
        );
        let recent = RecentCache::new(RECENT_CAPACITY, config.dedup_window_ms);

        Self {
            env,
            config,
            paths,
            memory: MemoryHandle::new(coordinator),
            dedup,
            recent,
        }
    }

    /// Host rooted at the payload's `cwd`, or the process directory.
    pub fn for_input(env: HostEnv, input: &HookInput) -> std::io::Result<Self> {
        let root = match &input.cwd {
            Some(cwd) if cwd.is_dir() => cwd.clone(),
            _ => std::env::current_dir()?,
        };
        Ok(Self::new(env, &root))
    }

    /// Dedup, compress and store one tool execution.
    pub fn capture(&mut self, input: &HookInput, session_id: &str) -> anyhow::Result<CaptureOutcome> {
        let Some(tool) = input.tool_name.as_deref().filter(|t| !t.is_empty()) else {
            return Ok(CaptureOutcome::Skipped("no tool name"));
        };
        if self.config.is_ignored(tool) {
            return Ok(CaptureOutcome::Skipped("ignored tool"));
        }
        let output = input.output_text();
        if output.chars().count() < self.config.min_output_chars {
            return Ok(CaptureOutcome::Skipped("output too short"));
        }

        let source = self.env.source.as_str();
        let tool_input = input.tool_input.clone().unwrap_or(Value::Null);
        let hash = dedup_hash(source, tool, &tool_input);
        let now = chrono::Utc::now().timestamp_millis();
        if self.recent.contains(&hash, now) {
            return Ok(CaptureOutcome::Duplicate);
        }
        if self.dedup.check_at(source, &hash, now)? {
            return Ok(CaptureOutcome::Duplicate);
        }
        self.recent.insert(hash, now);

        let compressed = compress_output(
            tool,
            Some(&tool_input),
            &output,
            &self.config.compress_options(),
        );
        let obs = observe::build_observation(
            &observe::Origin {
                session_id,
                source: self.env.source,
                cwd: &self.paths.project_root,
            },
            tool,
            &tool_input,
            &compressed,
            self.config.max_content_chars,
        );
        let obs_type = obs.obs_type;
        let id = self.memory.write(FrameInput::from(&obs))?;
        tracing::debug!(tool, id = %id, obs_type = %obs_type, "observation stored");

        Ok(CaptureOutcome::Stored { id, obs_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindtrail_store::MemoryStore;
    use serde_json::json;
    use serial_test::serial;
    use std::collections::HashMap;

    fn env_from(vars: &[(&str, &str)]) -> HostEnv {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        HostEnv::from_lookup(|k| vars.get(k).cloned())
    }

    fn hook(tool: &str, input: Value, response: Value) -> HookInput {
        HookInput {
            session_id: Some("sess_1".to_string()),
            cwd: None,
            tool_name: Some(tool.to_string()),
            tool_input: Some(input),
            tool_response: Some(response),
        }
    }

    #[test]
    fn test_source_resolution() {
        assert_eq!(env_from(&[]).source, Source::Claude);
        assert_eq!(env_from(&[("CLAUDECODE", "1")]).source, Source::Claude);
        assert_eq!(env_from(&[("OPENCODE", "1")]).source, Source::Opencode);
        assert_eq!(
            env_from(&[("OPENCODE", "1"), ("CLAUDECODE", "1")]).source,
            Source::Opencode
        );
        assert_eq!(env_from(&[("OPENCODE", "0")]).source, Source::Claude);
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        std::env::set_var("OPENCODE", "1");
        std::env::set_var("MINDTRAIL_DEBUG", "1");
        let env = HostEnv::from_env();
        std::env::remove_var("OPENCODE");
        std::env::remove_var("MINDTRAIL_DEBUG");

        assert_eq!(env.source, Source::Opencode);
        assert!(env.debug);
        assert_eq!(HostEnv::from_env().source, Source::Claude);
    }

    #[test]
    fn test_memory_dir_override() {
        assert_eq!(env_from(&[]).memory_dir, None);
        assert_eq!(env_from(&[("MINDTRAIL_DIR", "  ")]).memory_dir, None);

        let env = env_from(&[("MINDTRAIL_DIR", ".agent-memory")]);
        assert_eq!(env.memory_dir.as_deref(), Some(".agent-memory"));

        let temp = tempfile::TempDir::new().unwrap();
        let host = Host::new(env, temp.path());
        assert_eq!(host.config.memory_dir, ".agent-memory");
        assert_eq!(host.paths.store_file(), temp.path().join(".agent-memory").join("memory.mtl"));
    }

    #[test]
    fn test_config_read_from_overridden_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("mem")).unwrap();
        std::fs::write(
            temp.path().join("mem").join("config.json"),
            r#"{"max_backups": 7}"#,
        )
        .unwrap();

        let env = HostEnv {
            memory_dir: Some("mem".to_string()),
            ..Default::default()
        };
        assert_eq!(Host::new(env, temp.path()).config.max_backups, 7);
        assert_eq!(Host::new(HostEnv::default(), temp.path()).config.max_backups, 3);
    }

    #[test]
    fn test_debug_flag() {
        assert!(!env_from(&[]).debug);
        assert!(env_from(&[("MINDTRAIL_DEBUG", "1")]).debug);
        assert!(!env_from(&[("MINDTRAIL_DEBUG", "false")]).debug);
    }

    #[test]
    fn test_response_text_shapes() {
        assert_eq!(response_text(&json!("plain")), "plain");
        assert_eq!(response_text(&Value::Null), "");
        assert_eq!(response_text(&json!({"output": "o"})), "o");
        assert_eq!(
            response_text(&json!({"stdout": "out", "stderr": "err"})),
            "out\nerr"
        );
        assert_eq!(response_text(&json!({"stdout": "out", "stderr": ""})), "out");
        assert_eq!(response_text(&json!({"file": {"content": "fn a()"}})), "fn a()");
        assert_eq!(response_text(&json!({"ok": true})), "{\"ok\":true}");
    }

    #[test]
    fn test_hook_input_parse() {
        assert!(HookInput::parse("").unwrap().tool_name.is_none());
        let parsed = HookInput::parse(
            r#"{"session_id":"s","tool_name":"Read","tool_input":{"file_path":"a.rs"},"tool_response":"x","extra":1}"#,
        )
        .unwrap();
        assert_eq!(parsed.tool_name.as_deref(), Some("Read"));
        assert_eq!(parsed.output_text(), "x");
        assert!(HookInput::parse("{oops").is_err());
    }

    #[test]
    fn test_recent_cache_evicts_oldest() {
        let mut cache = RecentCache::new(2, 60_000);
        cache.insert("a".to_string(), 0);
        cache.insert("b".to_string(), 0);
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.len(), 2);
        cache.insert("c".to_string(), 2);
        assert!(!cache.contains("a", 3));
        assert!(cache.contains("b", 3));
        assert!(cache.contains("c", 3));
    }

    #[test]
    fn test_recent_cache_entries_expire_with_window() {
        let mut cache = RecentCache::new(8, 100);
        cache.insert("a".to_string(), 1_000);
        assert!(cache.contains("a", 1_099));
        assert!(!cache.contains("a", 1_100));
        assert!(!cache.contains("a", i64::MIN));
    }

    #[test]
    fn test_memory_handle_lazy_and_reset() {
        let temp = tempfile::TempDir::new().unwrap();
        let coordinator = Coordinator::new(
            temp.path().join("memory.mtl"),
            CoordinatorOptions::default(),
        );
        let mut handle = MemoryHandle::new(coordinator);

        assert!(handle.reader().unwrap().is_none());
        assert!(!temp.path().join("memory.mtl").exists());

        handle
            .write(FrameInput {
                title: "t".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(!handle.is_open());

        let count = handle.reader().unwrap().unwrap().stats().unwrap().frame_count;
        assert_eq!(count, 1);
        assert!(handle.is_open());
        handle.reset();
        assert!(!handle.is_open());
    }

    #[test]
    fn test_capture_stores_then_suppresses_duplicate() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut host = Host::new(HostEnv::default(), temp.path());
        let input = hook(
            "Bash",
            json!({"command": "cargo test"}),
            json!({"stdout": "test result: ok. 3 passed", "stderr": ""}),
        );

        let first = host.capture(&input, "sess_1").unwrap();
        assert!(matches!(
            first,
            CaptureOutcome::Stored {
                obs_type: ObservationType::Success,
                ..
            }
        ));
        assert_eq!(host.capture(&input, "sess_1").unwrap(), CaptureOutcome::Duplicate);

        // a fresh process still sees the shared log
        let mut other = Host::new(HostEnv::default(), temp.path());
        assert_eq!(other.capture(&input, "sess_2").unwrap(), CaptureOutcome::Duplicate);

        // the other source is not suppressed
        let mut opencode = Host::new(
            HostEnv {
                source: Source::Opencode,
                ..Default::default()
            },
            temp.path(),
        );
        assert!(matches!(
            opencode.capture(&input, "sess_3").unwrap(),
            CaptureOutcome::Stored { .. }
        ));

        let store = FileStore::open_or_create(&host.paths.store_file()).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_repeat_after_window_is_stored_again() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".mindtrail")).unwrap();
        std::fs::write(
            temp.path().join(".mindtrail").join("config.json"),
            r#"{"dedup_window_ms": 5}"#,
        )
        .unwrap();
        let mut host = Host::new(HostEnv::default(), temp.path());
        let input = hook("Grep", json!({"pattern": "fn main"}), json!("src/main.rs:1:fn main() {"));

        assert!(matches!(
            host.capture(&input, "s").unwrap(),
            CaptureOutcome::Stored { .. }
        ));
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(matches!(
            host.capture(&input, "s").unwrap(),
            CaptureOutcome::Stored { .. }
        ));
        assert_eq!(host.memory.reader().unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_capture_skips_ignored_and_short() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".mindtrail")).unwrap();
        std::fs::write(
            temp.path().join(".mindtrail").join("config.json"),
            r#"{"min_output_chars": 10}"#,
        )
        .unwrap();
        let mut host = Host::new(HostEnv::default(), temp.path());

        let todo = hook("TodoWrite", json!({"todos": []}), json!("updated"));
        assert_eq!(
            host.capture(&todo, "s").unwrap(),
            CaptureOutcome::Skipped("ignored tool")
        );

        let short = hook("Bash", json!({"command": "true"}), json!(""));
        assert_eq!(
            host.capture(&short, "s").unwrap(),
            CaptureOutcome::Skipped("output too short")
        );

        let nameless = HookInput::default();
        assert_eq!(
            host.capture(&nameless, "s").unwrap(),
            CaptureOutcome::Skipped("no tool name")
        );
        assert!(!host.paths.store_file().exists());
    }

    #[test]
    fn test_capture_compresses_large_output() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut host = Host::new(HostEnv::default(), temp.path());
        let input = hook("Grep", json!({"pattern": "x"}), json!("x".repeat(5000)));

        host.capture(&input, "s").unwrap();
        let store = host.memory.reader().unwrap().unwrap();
        let frames = store
            .timeline(mindtrail_store::TimelineOptions::default())
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].text.chars().count() <= host.config.max_content_chars);
        assert_eq!(frames[0].metadata["was_compressed"], true);
        assert_eq!(frames[0].metadata["original_size"], 5000);
    }
}
