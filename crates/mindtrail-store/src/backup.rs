//! Timestamped backups of damaged or oversized stores

use std::path::{Path, PathBuf};

const BACKUP_INFIX: &str = ".backup-";

/// `<store>.backup-<epochMillis>`, bumped forward if that name is taken
pub fn backup_path(store: &Path, now_ms: i64) -> PathBuf {
    let mut ts = now_ms;
    loop {
        let mut name = store.as_os_str().to_os_string();
        name.push(format!("{}{}", BACKUP_INFIX, ts));
        let candidate = PathBuf::from(name);
        if !candidate.exists() {
            return candidate;
        }
        ts += 1;
    }
}

/// Backups of `store`, newest first by embedded timestamp
pub fn list_backups(store: &Path) -> Vec<(i64, PathBuf)> {
    let (Some(dir), Some(file_name)) = (store.parent(), store.file_name()) else {
        return Vec::new();
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let prefix = format!("{}{}", file_name.to_string_lossy(), BACKUP_INFIX);

    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut backups: Vec<(i64, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let ts = name.strip_prefix(&prefix)?.parse::<i64>().ok()?;
            Some((ts, e.path()))
        })
        .collect();
    backups.sort_by(|a, b| b.0.cmp(&a.0));
    backups
}

/// Delete all but the `keep` newest backups. Failures are ignored.
pub fn prune_backups(store: &Path, keep: usize) -> usize {
    let mut removed = 0;
    for (_, path) in list_backups(store).into_iter().skip(keep) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "could not remove old backup")
            }
        }
    }
    removed
}

/// Move `store` aside. Returns the backup path when the rename worked.
pub(crate) fn move_to_backup(store: &Path) -> Option<PathBuf> {
    let target = backup_path(store, chrono::Utc::now().timestamp_millis());
    match std::fs::rename(store, &target) {
        Ok(()) => Some(target),
        Err(e) => {
            tracing::warn!(path = %store.display(), error = %e, "could not back up store");
            None
        }
    }
}
