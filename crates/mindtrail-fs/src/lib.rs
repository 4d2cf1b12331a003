//! File-system plumbing shared across processes: JSONL logs, atomic writes,
//! advisory locks and the cross-process dedup log

mod dedup;
mod error;
mod io;
mod lock;
mod paths;

pub use dedup::{dedup_hash, DedupEntry, DedupLog};
pub use error::{Error, Result};
pub use io::{atomic_write, read_jsonl, write_jsonl};
pub use lock::{is_locked, lock_path, with_lock, FileLock, FileLockGuard, LockOptions};
pub use paths::Paths;
