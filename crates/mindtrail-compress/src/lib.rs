//! Tool-output compression: shrink oversized tool results into compact,
//! recall-oriented summaries before they are stored

pub mod compressor;
mod strategies;
mod types;

pub use compressor::{compress_output, truncate_with_marker, TRUNCATION_MARKER};
pub use types::{CompressionResult, ToolKind};
