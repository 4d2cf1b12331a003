//! Cross-process write coordination for a single store file
//!
//! Every open and every write happens under `<store>.lock`. Writes never
//! reuse a handle: another process may have appended since it was opened.

use crate::backup::{move_to_backup, prune_backups};
use crate::engine::{FrameInput, MemoryStore};
use crate::file_store::FileStore;
use crate::{Result, StoreError};
use mindtrail_core::{Config, Observation};
use mindtrail_fs::{with_lock, LockOptions};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorOptions {
    pub lock: LockOptions,
    /// Stores above this size are rotated out on open
    pub max_store_bytes: u64,
    pub max_backups: usize,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            lock: LockOptions::default(),
            max_store_bytes: 100 * 1024 * 1024,
            max_backups: 3,
        }
    }
}

impl From<&Config> for CoordinatorOptions {
    fn from(config: &Config) -> Self {
        Self {
            lock: config.lock_options(),
            max_store_bytes: config.max_store_bytes,
            max_backups: config.max_backups,
        }
    }
}

/// How the store came to be usable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    Created,
    Opened,
    RecoveredCorrupt { backup: Option<PathBuf> },
    RecoveredOversized { backup: Option<PathBuf> },
}

#[derive(Debug)]
pub struct Coordinator<S: MemoryStore = FileStore> {
    store_path: PathBuf,
    options: CoordinatorOptions,
    _engine: PhantomData<fn() -> S>,
}

impl<S: MemoryStore> Coordinator<S> {
    pub fn new(store_path: impl Into<PathBuf>, options: CoordinatorOptions) -> Self {
        Self {
            store_path: store_path.into(),
            options,
            _engine: PhantomData,
        }
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Open the store under its lock, recovering it if needed.
    pub fn open(&self) -> Result<S> {
        self.open_with_outcome().map(|(store, _)| store)
    }

    pub fn open_with_outcome(&self) -> Result<(S, OpenOutcome)> {
        with_lock(&self.store_path, self.options.lock, || self.open_recovering())
    }

    /// Lock, open a fresh handle, run one mutation, unlock.
    pub fn with_fresh_handle<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut S) -> Result<T>,
    {
        with_lock(&self.store_path, self.options.lock, || {
            let (mut store, _) = self.open_recovering()?;
            f(&mut store)
        })
    }

    pub fn write(&self, frame: FrameInput) -> Result<String> {
        self.with_fresh_handle(|store| store.write(frame))
    }

    pub fn write_observation(&self, obs: &Observation) -> Result<String> {
        self.write(FrameInput::from(obs))
    }

    // Caller must hold the store lock.
    fn open_recovering(&self) -> Result<(S, OpenOutcome)> {
        let path = &self.store_path;

        let outcome = if !path.exists() {
            (S::open_or_create(path)?, OpenOutcome::Created)
        } else if self.is_oversized(path) {
            tracing::info!(
                path = %path.display(),
                limit = self.options.max_store_bytes,
                "store exceeds size limit, rotating"
            );
            let backup = move_to_backup(path);
            if backup.is_none() {
                let _ = std::fs::remove_file(path);
            }
            (
                S::open_or_create(path)?,
                OpenOutcome::RecoveredOversized { backup },
            )
        } else {
            match S::open_or_create(path) {
                Ok(store) => (store, OpenOutcome::Opened),
                Err(e) if e.is_corruption() => {
                    tracing::warn!(path = %path.display(), error = %e, "store corrupt, recreating");
                    let backup = move_to_backup(path);
                    if backup.is_none() {
                        let _ = std::fs::remove_file(path);
                    }
                    (
                        S::open_or_create(path)?,
                        OpenOutcome::RecoveredCorrupt { backup },
                    )
                }
                Err(e) => return Err(e),
            }
        };

        prune_backups(path, self.options.max_backups);
        Ok(outcome)
    }

    fn is_oversized(&self, path: &Path) -> bool {
        std::fs::metadata(path)
            .map(|m| m.len() > self.options.max_store_bytes)
            .unwrap_or(false)
    }
}

impl<S: MemoryStore> Coordinator<S> {
    /// Surface a lock timeout distinctly from engine failures
    pub fn is_lock_timeout(err: &StoreError) -> bool {
        matches!(err, StoreError::Lock(mindtrail_fs::Error::LockTimeout { .. }))
    }
}
