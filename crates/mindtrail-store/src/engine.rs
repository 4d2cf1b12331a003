//! The memory engine seen through the six operations this plugin uses

use crate::Result;
use mindtrail_core::Observation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A record to be written
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameInput {
    pub title: String,
    pub label: String,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A stored record as returned by timeline queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: String,
    /// Epoch millis
    pub created_at: i64,
    pub title: String,
    pub label: String,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Every query term must appear
    Lex,
    /// Any query term may match
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub k: usize,
    pub mode: SearchMode,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            k: 10,
            mode: SearchMode::Auto,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub title: String,
    pub text: String,
    pub score: f32,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct TimelineOptions {
    pub limit: usize,
    /// Newest first
    pub reverse: bool,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            reverse: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub frame_count: usize,
    pub size_bytes: u64,
}

/// Narrow view of the embedded memory engine.
///
/// Everything above this trait talks to the engine only through these
/// operations, so tests can substitute a fake.
pub trait MemoryStore: Sized {
    /// Open the store at `path`, creating an empty one when absent.
    fn open_or_create(path: &Path) -> Result<Self>;

    /// Persist one record and return its identifier.
    fn write(&mut self, frame: FrameInput) -> Result<String>;

    fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchHit>>;

    fn ask(&self, question: &str, options: SearchOptions) -> Result<Answer>;

    fn timeline(&self, options: TimelineOptions) -> Result<Vec<Frame>>;

    fn stats(&self) -> Result<StoreStats>;
}

impl From<&Observation> for FrameInput {
    fn from(obs: &Observation) -> Self {
        let mut metadata = obs.metadata.clone();
        metadata.insert("observation_id".to_string(), obs.id.clone().into());
        metadata.insert("timestamp".to_string(), obs.timestamp.into());
        if let Some(tool) = &obs.tool_name {
            metadata.insert("tool_name".to_string(), tool.clone().into());
        }

        let mut tags = vec![obs.obs_type.as_str().to_string()];
        if let Some(tool) = &obs.tool_name {
            tags.push(tool.to_lowercase());
        }
        if let Some(source) = obs.source() {
            tags.push(source.as_str().to_string());
        }

        Self {
            title: obs.summary.clone(),
            label: obs.obs_type.as_str().to_string(),
            text: obs.content.clone(),
            metadata,
            tags,
        }
    }
}
