//! Memory store access: the engine interface, a file-backed engine, and the
//! coordinator that serializes writes and recovers damaged stores

mod backup;
mod coordinator;
mod engine;
mod error;
mod file_store;

pub use backup::{backup_path, list_backups, prune_backups};
pub use coordinator::{Coordinator, CoordinatorOptions, OpenOutcome};
pub use engine::{
    Answer, Frame, FrameInput, MemoryStore, SearchHit, SearchMode, SearchOptions, StoreStats,
    TimelineOptions,
};
pub use error::{Result, StoreError, CORRUPTION_SIGNATURES};
pub use file_store::FileStore;
