use crate::strategies;
use crate::types::{CompressionResult, ToolKind};
use mindtrail_core::CompressOptions;

/// Appended when a summary is cut to fit its budget
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Compress `output` produced by `tool_name`.
///
/// Short output, or any output when compression is disabled, comes back
/// untouched. Otherwise a tool-specific strategy extracts the parts worth
/// remembering and the result is cut to `options.target` characters.
pub fn compress_output(
    tool_name: &str,
    input: Option<&serde_json::Value>,
    output: &str,
    options: &CompressOptions,
) -> CompressionResult {
    let original_size = output.chars().count();
    if !options.enabled || original_size < options.threshold {
        return CompressionResult::unchanged(output);
    }

    let kind = ToolKind::from_tool_name(tool_name);
    let summary = match kind {
        ToolKind::Read => strategies::compress_read(input, output),
        ToolKind::Shell => strategies::compress_shell(input, output),
        ToolKind::Search => strategies::compress_search(input, output),
        ToolKind::Glob => strategies::compress_glob(input, output),
        ToolKind::Mutation => strategies::compress_mutation(input, output),
        ToolKind::Generic => strategies::compress_generic(output),
    };

    let compressed = truncate_with_marker(&summary, options.target);
    tracing::debug!(
        tool = tool_name,
        ?kind,
        original_size,
        compressed_size = compressed.chars().count(),
        "compressed tool output"
    );

    CompressionResult {
        compressed,
        was_compressed: true,
        original_size,
    }
}

/// Cut `text` to at most `max_chars` characters, marker included.
pub fn truncate_with_marker(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_len {
        return text.chars().take(max_chars).collect();
    }

    let mut out: String = text.chars().take(max_chars - marker_len).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}
