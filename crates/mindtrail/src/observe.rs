//! Observation building: category, one-line summary, content and metadata

use mindtrail_compress::{truncate_with_marker, CompressionResult};
use mindtrail_core::{Observation, ObservationType, Source};
use serde_json::Value;
use std::path::Path;

const SUMMARY_MAX_CHARS: usize = 120;

const ERROR_MARKERS: &[&str] = &[
    "error:",
    "error[",
    "exception",
    "traceback",
    "panicked at",
    "command not found",
    "no such file or directory",
    "failed",
    "failure",
];

const PASS_MARKERS: &[&str] = &["passed", "success", "succeeded", "test result: ok", "completed", "done"];

/// Where an observation came from
#[derive(Debug, Clone, Copy)]
pub struct Origin<'a> {
    pub session_id: &'a str,
    pub source: Source,
    pub cwd: &'a Path,
}

pub fn classify(tool: &str, input: &Value, output: &str) -> ObservationType {
    let lower = output.to_lowercase();
    if has_error(&lower) {
        return ObservationType::Problem;
    }

    match tool.to_lowercase().as_str() {
        "edit" | "multiedit" | "update" => {
            let input_text = input.to_string().to_lowercase();
            if input_text.contains("fix") || input_text.contains("bug") {
                ObservationType::Bugfix
            } else {
                ObservationType::Refactor
            }
        }
        "write" => ObservationType::Feature,
        "bash" | "shell" if PASS_MARKERS.iter().any(|m| lower.contains(m)) => {
            ObservationType::Success
        }
        _ => ObservationType::Discovery,
    }
}

// "0 failed" is a passing summary, not an error
fn has_error(lower: &str) -> bool {
    lower.lines().any(|line| {
        let line = line.trim();
        ERROR_MARKERS.iter().any(|m| line.contains(m))
            && !line.contains(" 0 failed")
            && !line.starts_with("0 failed")
    })
}

fn str_field<'a>(input: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| input.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

fn file_path(input: &Value) -> Option<&str> {
    str_field(input, &["file_path", "path", "filePath"])
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

pub fn summarize(tool: &str, input: &Value) -> String {
    let lower = tool.to_lowercase();
    let summary = match lower.as_str() {
        "read" | "view" => file_path(input).map(|p| format!("Read {}", file_name(p))),
        "bash" | "shell" => str_field(input, &["command", "cmd"])
            .map(|c| format!("Ran: {}", c.lines().next().unwrap_or(c))),
        "grep" | "search" => {
            str_field(input, &["pattern", "query"]).map(|p| format!("Searched for \"{}\"", p))
        }
        "glob" => str_field(input, &["pattern"]).map(|p| format!("Listed files matching {}", p)),
        "edit" | "multiedit" | "update" => file_path(input).map(|p| format!("Edited {}", file_name(p))),
        "write" => file_path(input).map(|p| format!("Wrote {}", file_name(p))),
        _ => None,
    };

    let summary = summary.unwrap_or_else(|| format!("Used {}", tool));
    clip(&summary, SUMMARY_MAX_CHARS)
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    clipped.push_str("...");
    clipped
}

pub fn build_observation(
    origin: &Origin<'_>,
    tool: &str,
    input: &Value,
    compressed: &CompressionResult,
    max_content_chars: usize,
) -> Observation {
    let obs_type = classify(tool, input, &compressed.compressed);
    let content = truncate_with_marker(&compressed.compressed, max_content_chars);

    let mut obs = Observation::new(
        new_observation_id(),
        obs_type,
        summarize(tool, input),
        content,
    )
    .with_origin(origin.session_id, origin.source);
    obs.tool_name = Some(tool.to_string());

    obs.metadata
        .insert("cwd".to_string(), origin.cwd.display().to_string().into());
    obs.metadata
        .insert("was_compressed".to_string(), compressed.was_compressed.into());
    obs.metadata
        .insert("original_size".to_string(), compressed.original_size.into());
    if let Some(path) = file_path(input) {
        obs.metadata.insert("file_path".to_string(), path.into());
    }
    obs
}

pub fn new_observation_id() -> String {
    format!("obs_{}", uuid::Uuid::new_v4().simple())
}
