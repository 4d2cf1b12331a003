use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionResult {
    pub compressed: String,
    pub was_compressed: bool,
    /// Character count of the text before compression
    pub original_size: usize,
}

impl CompressionResult {
    pub fn unchanged(text: &str) -> Self {
        Self {
            compressed: text.to_string(),
            was_compressed: false,
            original_size: text.chars().count(),
        }
    }
}

/// Compression strategy family, selected by tool name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// File content
    Read,
    /// Arbitrary command execution
    Shell,
    /// grep-style line matches
    Search,
    /// File enumeration
    Glob,
    /// Edit/write/update operations
    Mutation,
    Generic,
}

impl ToolKind {
    pub fn from_tool_name(tool_name: &str) -> Self {
        match tool_name.to_ascii_lowercase().as_str() {
            "read" | "view" => ToolKind::Read,
            "bash" | "shell" => ToolKind::Shell,
            "grep" | "search" => ToolKind::Search,
            "glob" => ToolKind::Glob,
            "edit" | "multiedit" | "write" | "update" | "patch" => ToolKind::Mutation,
            _ => ToolKind::Generic,
        }
    }
}
