//! Advisory cross-process locks keyed by `<resource>.lock`
//!
//! The lock file is created on first use and never removed. Holding the
//! lock means holding an exclusive `flock(2)` on that file through `fs2`,
//! which the OS drops when the holder exits, so a crashed holder's lock is
//! free for the next waiter without anyone deleting a file. Waiters retry
//! with bounded, jittered backoff. A lock still held past the stale
//! interval belongs to a live process and is reported, never preempted.

use crate::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Retry, backoff and staleness bounds for lock acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Extra attempts after the first one
    pub retries: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    /// Age after which a held lock is reported as stuck
    pub stale: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            retries: 1000,
            min_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(50),
            stale: Duration::from_secs(30),
        }
    }
}

/// `<resource>.lock`, next to the resource it guards
pub fn lock_path(resource: &Path) -> PathBuf {
    let mut s = resource.as_os_str().to_os_string();
    s.push(".lock");
    PathBuf::from(s)
}

/// Whether a live holder currently owns the lock for `resource`. Never
/// creates the lock file.
pub fn is_locked(resource: &Path) -> Result<bool> {
    let file = match OpenOptions::new().read(true).write(true).open(lock_path(resource)) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    match file.try_lock_exclusive() {
        Ok(()) => {
            let _ = FileExt::unlock(&file);
            Ok(false)
        }
        Err(e) if is_contended(&e) => Ok(true),
        Err(e) => Err(e.into()),
    }
}

/// Run `f` while holding the lock for `resource`.
///
/// The lock is released exactly once when `f` returns, whether it
/// succeeded or not.
pub fn with_lock<T, E, F>(
    resource: &Path,
    options: LockOptions,
    f: F,
) -> std::result::Result<T, E>
where
    F: FnOnce() -> std::result::Result<T, E>,
    E: From<Error>,
{
    let lock = FileLock::new(resource, options)?;
    let _guard = lock.acquire()?;
    f()
}

#[derive(Debug)]
pub struct FileLock {
    lock_path: PathBuf,
    options: LockOptions,
}

/// RAII guard that releases the lock when dropped.
#[derive(Debug)]
pub struct FileLockGuard {
    file: File,
    path: PathBuf,
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            // closing the descriptor below releases it regardless
            tracing::debug!(path = %self.path.display(), error = %e, "explicit unlock failed");
        }
    }
}

impl FileLock {
    pub fn new(resource: &Path, options: LockOptions) -> Result<Self> {
        let lock_path = lock_path(resource);
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { lock_path, options })
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    /// Acquire the lock, retrying with backoff until the retry budget runs out.
    pub fn acquire(&self) -> Result<FileLockGuard> {
        let retries = self.options.retries;
        let mut reported_stale = false;
        for attempt in 0..=retries {
            if let Some(guard) = self.try_acquire()? {
                if attempt > 0 {
                    tracing::debug!(
                        path = %self.lock_path.display(),
                        attempt,
                        "lock acquired after contention"
                    );
                }
                return Ok(guard);
            }
            if !reported_stale {
                if let Some(age) = self.held_past_stale() {
                    tracing::warn!(
                        path = %self.lock_path.display(),
                        age_ms = age.as_millis() as u64,
                        "lock held past stale interval, still waiting"
                    );
                    reported_stale = true;
                }
            }
            if attempt < retries {
                std::thread::sleep(self.backoff(attempt));
            }
        }

        Err(Error::LockTimeout {
            path: self.lock_path.clone(),
            attempts: retries.saturating_add(1),
        })
    }

    /// One non-blocking attempt. `Ok(None)` means someone else holds it;
    /// any other failure to open or lock the file is an error.
    pub fn try_acquire(&self) -> Result<Option<FileLockGuard>> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if is_contended(&e) {
                return Ok(None);
            }
            return Err(e.into());
        }

        // Holder stamp for diagnostics; also refreshes the mtime.
        file.set_len(0)?;
        file.write_all(holder_token().as_bytes())?;
        file.flush()?;

        Ok(Some(FileLockGuard {
            file,
            path: self.lock_path.clone(),
        }))
    }

    fn held_past_stale(&self) -> Option<Duration> {
        let modified = fs::metadata(&self.lock_path)
            .and_then(|m| m.modified())
            .ok()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        (age >= self.options.stale).then_some(age)
    }

    // Exponential from min to max, jittered so waiters spread out.
    fn backoff(&self, attempt: u32) -> Duration {
        let min = self.options.min_backoff;
        let max = self.options.max_backoff.max(min);
        let ceiling = min.saturating_mul(1u32 << attempt.min(16)).min(max);

        let span = ceiling.saturating_sub(min).as_millis() as u64;
        if span == 0 {
            return ceiling;
        }
        let noise = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() as u64)
            .unwrap_or(0)
            ^ std::process::id() as u64;
        min + Duration::from_millis(noise % (span + 1))
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn holder_token() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!(
        "{}:{}:{}",
        std::process::id(),
        nanos,
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Instant;

    fn fast_options() -> LockOptions {
        LockOptions {
            retries: 2000,
            min_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            stale: Duration::from_secs(30),
        }
    }

    /// Lock file left behind by a holder that died an hour ago
    fn plant_abandoned_lock(resource: &Path) {
        let path = lock_path(resource);
        std::fs::write(&path, "12345:0:0").unwrap();
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(3600))
            .unwrap();
    }

    #[test]
    fn test_lock_path_appends_suffix() {
        assert_eq!(
            lock_path(Path::new("/tmp/x/memory.mtl")),
            PathBuf::from("/tmp/x/memory.mtl.lock")
        );
    }

    #[test]
    fn test_acquire_and_release() {
        let temp = tempfile::TempDir::new().unwrap();
        let resource = temp.path().join("store.db");
        let lock = FileLock::new(&resource, fast_options()).unwrap();
        assert!(!is_locked(&resource).unwrap());

        let guard = lock.acquire().unwrap();
        assert!(lock.path().exists());
        assert!(is_locked(&resource).unwrap());
        assert!(lock.try_acquire().unwrap().is_none());

        drop(guard);
        assert!(!is_locked(&resource).unwrap());
        assert!(lock.try_acquire().unwrap().is_some());
    }

    #[test]
    fn test_is_locked_does_not_create_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let resource = temp.path().join("store.db");
        assert!(!is_locked(&resource).unwrap());
        assert!(!lock_path(&resource).exists());
    }

    #[test]
    fn test_new_creates_parent_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        let resource = temp.path().join("a").join("b").join("store.db");
        let lock = FileLock::new(&resource, fast_options()).unwrap();
        assert!(lock.path().parent().unwrap().is_dir());
    }

    #[test]
    fn test_contended_lock_times_out() {
        let temp = tempfile::TempDir::new().unwrap();
        let resource = temp.path().join("store.db");
        let holder = FileLock::new(&resource, fast_options()).unwrap();
        let _held = holder.acquire().unwrap();

        let waiter = FileLock::new(
            &resource,
            LockOptions {
                retries: 3,
                ..fast_options()
            },
        )
        .unwrap();
        match waiter.acquire() {
            Err(Error::LockTimeout { attempts, .. }) => assert_eq!(attempts, 4),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_abandoned_lock_is_taken_immediately() {
        let temp = tempfile::TempDir::new().unwrap();
        let resource = temp.path().join("store.db");
        plant_abandoned_lock(&resource);

        let waiter = FileLock::new(
            &resource,
            LockOptions {
                retries: 0,
                ..fast_options()
            },
        )
        .unwrap();
        let guard = waiter.acquire().unwrap();
        let stamp = std::fs::read_to_string(lock_path(&resource)).unwrap();
        assert!(stamp.starts_with(&format!("{}:", std::process::id())));
        drop(guard);
    }

    #[test]
    fn test_abandoned_lock_admits_one_waiter_at_a_time() {
        let temp = tempfile::TempDir::new().unwrap();
        let resource = Arc::new(temp.path().join("store.db"));

        for _ in 0..20 {
            plant_abandoned_lock(&resource);
            let inside = Arc::new(AtomicUsize::new(0));
            let worst = Arc::new(AtomicUsize::new(0));

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let resource = Arc::clone(&resource);
                    let inside = Arc::clone(&inside);
                    let worst = Arc::clone(&worst);
                    std::thread::spawn(move || {
                        let lock = FileLock::new(&resource, fast_options()).unwrap();
                        let _guard = lock.acquire().unwrap();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        worst.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(1));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
            assert_eq!(worst.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_live_holder_is_not_preempted_past_stale_interval() {
        let temp = tempfile::TempDir::new().unwrap();
        let resource = temp.path().join("store.db");
        let options = LockOptions {
            retries: 10,
            stale: Duration::from_millis(10),
            ..fast_options()
        };

        let first = FileLock::new(&resource, options).unwrap();
        let slow_holder = first.acquire().unwrap();
        std::thread::sleep(Duration::from_millis(30));

        let second = FileLock::new(&resource, options).unwrap();
        assert!(matches!(second.acquire(), Err(Error::LockTimeout { .. })));

        drop(slow_holder);
        assert!(second.acquire().is_ok());
    }

    #[test]
    fn test_unusable_lock_path_fails_without_retrying() {
        let temp = tempfile::TempDir::new().unwrap();
        let resource = temp.path().join("store.db");
        // something that cannot be opened as a file sits at the lock path
        std::fs::create_dir(lock_path(&resource)).unwrap();

        let lock = FileLock::new(
            &resource,
            LockOptions {
                retries: 1000,
                min_backoff: Duration::from_millis(50),
                max_backoff: Duration::from_millis(50),
                ..fast_options()
            },
        )
        .unwrap();
        let started = Instant::now();
        assert!(matches!(lock.acquire(), Err(Error::Io(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_with_lock_releases_on_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let resource = temp.path().join("store.db");

        let result: std::result::Result<(), Error> = with_lock(&resource, fast_options(), || {
            Err(Error::Io(std::io::Error::other("boom")))
        });
        assert!(result.is_err());
        assert!(!is_locked(&resource).unwrap());

        let ok: std::result::Result<u32, Error> = with_lock(&resource, fast_options(), || Ok(7));
        assert_eq!(ok.unwrap(), 7);
    }

    #[test]
    fn test_concurrent_writers_are_serialized() {
        let temp = tempfile::TempDir::new().unwrap();
        let resource = Arc::new(temp.path().join("counter.txt"));
        std::fs::write(resource.as_ref(), "0").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resource = Arc::clone(&resource);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        with_lock(&resource, fast_options(), || -> Result<()> {
                            let n: u32 = std::fs::read_to_string(resource.as_ref())?
                                .trim()
                                .parse()
                                .unwrap();
                            std::thread::yield_now();
                            std::fs::write(resource.as_ref(), (n + 1).to_string())?;
                            Ok(())
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let total: u32 = std::fs::read_to_string(resource.as_ref())
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert_eq!(total, 80);
    }
}
