//! Line-delimited JSON logs and replace-by-rename writes

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Parse every record in a JSONL file. A missing file reads as empty and
/// lines that do not parse are dropped.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> std::io::Result<Vec<T>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!(path = %path.display(), skipped, "dropped unparsable log lines");
    }
    Ok(records)
}

/// Replace a JSONL file with `records`
pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> std::io::Result<()> {
    let mut buf = Vec::with_capacity(records.len() * 96);
    for record in records {
        serde_json::to_writer(&mut buf, record)?;
        buf.push(b'\n');
    }
    atomic_write(path, &buf)
}

/// Write `data` to a sibling scratch file, flush it to disk, then rename it
/// over `path`. Readers see either the old or the new content.
pub fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let scratch = scratch_path(path);
    let written = File::create(&scratch).and_then(|mut f| {
        f.write_all(data)?;
        f.sync_all()
    });
    let result = written.and_then(|_| std::fs::rename(&scratch, path));
    if result.is_err() {
        let _ = std::fs::remove_file(&scratch);
    }
    result
}

// Scratch names are per process so concurrent writers never collide.
fn scratch_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".tmp.{}", std::process::id()));
    path.with_file_name(name)
}
