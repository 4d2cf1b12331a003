//! Core types for captured observations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Closed set of observation categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationType {
    Discovery,
    Decision,
    Problem,
    Solution,
    Pattern,
    Warning,
    Success,
    Refactor,
    Bugfix,
    Feature,
}

impl ObservationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationType::Discovery => "discovery",
            ObservationType::Decision => "decision",
            ObservationType::Problem => "problem",
            ObservationType::Solution => "solution",
            ObservationType::Pattern => "pattern",
            ObservationType::Warning => "warning",
            ObservationType::Success => "success",
            ObservationType::Refactor => "refactor",
            ObservationType::Bugfix => "bugfix",
            ObservationType::Feature => "feature",
        }
    }
}

impl fmt::Display for ObservationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which cooperating host tool produced an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Claude,
    Opencode,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Claude => "claude",
            Source::Opencode => "opencode",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded unit of captured activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    /// Creation time, epoch millis
    pub timestamp: i64,
    pub obs_type: ObservationType,
    #[serde(default)]
    pub tool_name: Option<String>,
    pub summary: String,
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Observation {
    pub fn new(
        id: String,
        obs_type: ObservationType,
        summary: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            timestamp: Utc::now().timestamp_millis(),
            obs_type,
            tool_name: None,
            summary: summary.into(),
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach the session and source every observation carries
    pub fn with_origin(mut self, session_id: &str, source: Source) -> Self {
        self.metadata
            .insert("session_id".to_string(), session_id.into());
        self.metadata
            .insert("source".to_string(), source.as_str().into());
        self
    }

    pub fn source(&self) -> Option<Source> {
        self.metadata
            .get("source")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.metadata.get("session_id").and_then(|v| v.as_str())
    }
}

/// Per-source session bookkeeping persisted between hook invocations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub source: Source,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub observation_count: usize,
    #[serde(default)]
    pub last_tool: Option<String>,
}

impl SessionInfo {
    pub fn new(session_id: impl Into<String>, source: Source) -> Self {
        Self {
            session_id: session_id.into(),
            source,
            started_at: Utc::now(),
            observation_count: 0,
            last_tool: None,
        }
    }
}
