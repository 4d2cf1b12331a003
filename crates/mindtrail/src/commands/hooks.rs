use crate::host::{CaptureOutcome, HookInput, Host, HostEnv};
use crate::session;
use mindtrail_core::SessionInfo;
use mindtrail_fs::with_lock;
use mindtrail_store::{MemoryStore, TimelineOptions};
use std::io::{self, Read};

const CONTEXT_FRAMES: usize = 10;

fn read_input() -> anyhow::Result<HookInput> {
    let mut raw = String::new();
    io::stdin().read_to_string(&mut raw)?;
    Ok(HookInput::parse(&raw)?)
}

// Hooks must never fail the host's tool call.
fn suppress(hook: &str, result: anyhow::Result<()>) -> anyhow::Result<()> {
    if let Err(e) = result {
        tracing::warn!(hook, error = %e, "hook failed");
    }
    Ok(())
}

pub fn hook_session_start(env: &HostEnv) -> anyhow::Result<()> {
    suppress(
        "session-start",
        read_input().and_then(|input| {
            let context = session_start(env, &input)?;
            if !context.is_empty() {
                println!("{}", context);
            }
            Ok(())
        }),
    )
}

pub fn hook_post_tool_use(env: &HostEnv) -> anyhow::Result<()> {
    suppress(
        "post-tool-use",
        read_input().and_then(|input| post_tool_use(env, &input).map(|_| ())),
    )
}

pub fn hook_stop(env: &HostEnv) -> anyhow::Result<()> {
    suppress(
        "stop",
        read_input().and_then(|input| stop(env, &input).map(|_| ())),
    )
}

/// Start a fresh session record and return recent memory as context.
pub fn session_start(env: &HostEnv, input: &HookInput) -> anyhow::Result<String> {
    let mut host = Host::for_input(env.clone(), input)?;
    host.paths.ensure_memory_dir()?;

    let session_id = input
        .session_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(session::new_session_id);
    session::save_session(&host.paths, &SessionInfo::new(session_id, env.source))?;

    let frames = match host.memory.reader()? {
        Some(store) => store.timeline(TimelineOptions {
            limit: CONTEXT_FRAMES,
            reverse: true,
        })?,
        None => Vec::new(),
    };
    Ok(session::context_block(&frames))
}

pub fn post_tool_use(env: &HostEnv, input: &HookInput) -> anyhow::Result<CaptureOutcome> {
    let mut host = Host::for_input(env.clone(), input)?;
    let session_id =
        session::resolve_session_id(&host.paths, env.source, input.session_id.as_deref());

    let outcome = host.capture(input, &session_id)?;
    match &outcome {
        CaptureOutcome::Stored { .. } => {
            let tool = input.tool_name.as_deref().unwrap_or_default();
            session::record_capture(
                &host.paths,
                host.config.lock_options(),
                env.source,
                &session_id,
                tool,
            )?;
        }
        CaptureOutcome::Duplicate => tracing::debug!("duplicate tool event skipped"),
        CaptureOutcome::Skipped(reason) => tracing::debug!(reason, "tool event skipped"),
    }
    Ok(outcome)
}

/// Store the session summary and reset the capture count. Returns the new
/// observation's frame id.
pub fn stop(env: &HostEnv, input: &HookInput) -> anyhow::Result<String> {
    let mut host = Host::for_input(env.clone(), input)?;
    let session_file = host.paths.session_file(env.source.as_str());

    // Same lock as `session::record_capture`.
    with_lock(&session_file, host.config.lock_options(), || {
        let mut info = match session::load_session(&host.paths, env.source) {
            Some(info)
                if input
                    .session_id
                    .as_deref()
                    .map_or(true, |id| id.is_empty() || id == info.session_id) =>
            {
                info
            }
            _ => SessionInfo::new(
                session::resolve_session_id(&host.paths, env.source, input.session_id.as_deref()),
                env.source,
            ),
        };

        let cwd = host.paths.project_root.display().to_string();
        let obs = session::summary_observation(&info, &cwd);
        let id = host.memory.write(session::summary_frame(&obs))?;

        info.observation_count = 0;
        info.last_tool = None;
        session::save_session(&host.paths, &info)?;
        Ok(id)
    })
}
