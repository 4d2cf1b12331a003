use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timed out acquiring lock {} after {attempts} attempts", path.display())]
    LockTimeout { path: PathBuf, attempts: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;
