//! Path resolution for the per-project memory directory

use std::path::{Path, PathBuf};

const STORE_FILE: &str = "memory.mtl";
const DEDUP_LOG: &str = "dedup.jsonl";

/// Resolves the files that live under a project's memory directory
#[derive(Debug, Clone)]
pub struct Paths {
    pub project_root: PathBuf,
    pub memory_dir: PathBuf,
}

impl Paths {
    /// Paths for `project_root`, with state kept in `project_root/<dir_name>`
    pub fn new(project_root: impl Into<PathBuf>, dir_name: &str) -> Self {
        let project_root = project_root.into();
        let memory_dir = project_root.join(dir_name);
        Self {
            project_root,
            memory_dir,
        }
    }

    /// Paths for the current working directory
    pub fn from_cwd(dir_name: &str) -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?, dir_name))
    }

    /// The single store file holding all observations for the project
    pub fn store_file(&self) -> PathBuf {
        self.memory_dir.join(STORE_FILE)
    }

    /// Shared dedup log for this working directory
    pub fn dedup_log(&self) -> PathBuf {
        self.memory_dir.join(DEDUP_LOG)
    }

    /// Session bookkeeping for one source tag
    pub fn session_file(&self, source: &str) -> PathBuf {
        self.memory_dir.join(format!("session-{}.json", source))
    }

    pub fn ensure_memory_dir(&self) -> std::io::Result<&Path> {
        std::fs::create_dir_all(&self.memory_dir)?;
        Ok(&self.memory_dir)
    }
}
