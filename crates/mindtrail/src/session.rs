//! Per-source session bookkeeping between hook invocations

use mindtrail_core::{Observation, ObservationType, SessionInfo, Source};
use mindtrail_fs::{atomic_write, with_lock, LockOptions, Paths};
use mindtrail_store::{Frame, FrameInput};

pub fn load_session(paths: &Paths, source: Source) -> Option<SessionInfo> {
    let path = paths.session_file(source.as_str());
    let content = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(info) => Some(info),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "ignoring unreadable session file");
            None
        }
    }
}

pub fn save_session(paths: &Paths, info: &SessionInfo) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(info)?;
    atomic_write(&paths.session_file(info.source.as_str()), json.as_bytes())?;
    Ok(())
}

pub fn new_session_id() -> String {
    format!("sess_{}", uuid::Uuid::new_v4().simple())
}

/// Session id from the hook payload, the saved session, or a new one
pub fn resolve_session_id(paths: &Paths, source: Source, from_input: Option<&str>) -> String {
    if let Some(id) = from_input.filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    load_session(paths, source)
        .map(|s| s.session_id)
        .unwrap_or_else(new_session_id)
}

/// Bump the capture count for the active session, starting one if needed.
/// Concurrent hooks share the file, so the update runs under its lock.
pub fn record_capture(
    paths: &Paths,
    lock: LockOptions,
    source: Source,
    session_id: &str,
    tool: &str,
) -> anyhow::Result<SessionInfo> {
    with_lock(&paths.session_file(source.as_str()), lock, || {
        let mut info = match load_session(paths, source) {
            Some(info) if info.session_id == session_id => info,
            _ => SessionInfo::new(session_id, source),
        };
        info.observation_count += 1;
        info.last_tool = Some(tool.to_string());
        save_session(paths, &info)?;
        Ok(info)
    })
}

/// Observation closing out a session
pub fn summary_observation(info: &SessionInfo, cwd: &str) -> Observation {
    let obs_type = if info.observation_count > 0 {
        ObservationType::Success
    } else {
        ObservationType::Discovery
    };
    let minutes = (chrono::Utc::now() - info.started_at).num_minutes().max(0);
    let mut content = format!(
        "Session {} ({}) captured {} observations over {} min",
        info.session_id, info.source, info.observation_count, minutes
    );
    if let Some(tool) = &info.last_tool {
        content.push_str(&format!("\nLast tool: {}", tool));
    }

    let mut obs = Observation::new(
        crate::observe::new_observation_id(),
        obs_type,
        format!("Session ended: {} observations", info.observation_count),
        content,
    )
    .with_origin(&info.session_id, info.source);
    obs.metadata.insert("cwd".to_string(), cwd.into());
    obs.metadata
        .insert("observation_count".to_string(), info.observation_count.into());
    obs
}

/// Session summaries carry their own label so they are easy to filter.
pub fn summary_frame(obs: &Observation) -> FrameInput {
    let mut frame = FrameInput::from(obs);
    frame.label = "session".to_string();
    frame.tags.push("session".to_string());
    frame
}

/// Short plain-text block of recent memory printed at session start
pub fn context_block(frames: &[Frame]) -> String {
    if frames.is_empty() {
        return String::new();
    }
    let mut lines = vec![format!("## mindtrail: {} recent observations", frames.len())];
    for frame in frames {
        let when = chrono::DateTime::from_timestamp_millis(frame.created_at)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        lines.push(format!("- [{}] {} {}", frame.label, when, frame.title));
    }
    lines.join("\n")
}
