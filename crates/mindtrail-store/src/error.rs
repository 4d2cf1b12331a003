use std::path::PathBuf;
use thiserror::Error;

/// Substrings in an open failure that mark the store as damaged rather than
/// unreachable. Matching is on free text, so wording changes in the engine
/// can slip past it.
pub const CORRUPTION_SIGNATURES: &[&str] = &[
    "deserialization",
    "deserialize",
    "invalid",
    "corrupt",
    "version mismatch",
    "unsupported version",
    "recovery failed",
    "failed to recover",
];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to open store {}: {message}", path.display())]
    Open { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Lock(#[from] mindtrail_fs::Error),
}

impl StoreError {
    /// Whether this failure matches a known corruption signature
    pub fn is_corruption(&self) -> bool {
        let message = match self {
            StoreError::Open { message, .. } => message.to_lowercase(),
            StoreError::Serialization(e) => format!("deserialization error: {}", e),
            _ => return false,
        };
        CORRUPTION_SIGNATURES.iter().any(|sig| message.contains(sig))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
