//! File-backed memory engine
//!
//! One header line followed by one JSON frame per line. The whole file is
//! loaded on open, so a handle only sees frames written before it was opened.

use crate::engine::{
    Answer, Frame, FrameInput, MemoryStore, SearchHit, SearchMode, SearchOptions, StoreStats,
    TimelineOptions,
};
use crate::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const MAGIC: &str = "mindtrail-store";
const FORMAT_VERSION: u32 = 1;
const SNIPPET_CHARS: usize = 160;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    magic: String,
    version: u32,
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    frames: Vec<Frame>,
}

impl FileStore {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let header = Header {
            magic: MAGIC.to_string(),
            version: FORMAT_VERSION,
        };
        writeln!(file, "{}", serde_json::to_string(&header)?)?;
        file.sync_all()?;
        tracing::debug!(path = %path.display(), "created store");

        Ok(Self {
            path: path.to_path_buf(),
            frames: Vec::new(),
        })
    }

    fn load(path: &Path) -> Result<Self> {
        let open_err = |message: String| StoreError::Open {
            path: path.to_path_buf(),
            message,
        };

        let read_err = |e: std::io::Error| {
            if e.kind() == std::io::ErrorKind::InvalidData {
                open_err(format!("invalid data: {}", e))
            } else {
                StoreError::Io(e)
            }
        };

        let file = File::open(path)?;
        let mut lines = BufReader::new(file).lines();

        let header_line = match lines.next() {
            Some(line) => line.map_err(read_err)?,
            None => return Err(open_err("invalid store header: empty file".to_string())),
        };
        let header: Header = serde_json::from_str(&header_line)
            .map_err(|e| open_err(format!("invalid store header: {}", e)))?;
        if header.magic != MAGIC {
            return Err(open_err(format!(
                "invalid store header: unexpected magic {:?}",
                header.magic
            )));
        }
        if header.version != FORMAT_VERSION {
            return Err(open_err(format!(
                "version mismatch: found {}, expected {}",
                header.version, FORMAT_VERSION
            )));
        }

        let mut frames = Vec::new();
        for (index, line) in lines.enumerate() {
            let line = line.map_err(read_err)?;
            if line.trim().is_empty() {
                continue;
            }
            let frame: Frame = serde_json::from_str(&line).map_err(|e| {
                open_err(format!("deserialization error at line {}: {}", index + 2, e))
            })?;
            frames.push(frame);
        }

        Ok(Self {
            path: path.to_path_buf(),
            frames,
        })
    }

    fn matching_terms(query: &str) -> Vec<String> {
        query
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect()
    }

    fn score(frame: &Frame, terms: &[String], mode: SearchMode) -> f32 {
        let title = frame.title.to_lowercase();
        let body = frame.text.to_lowercase();
        let extra = format!("{} {}", frame.label, frame.tags.join(" ")).to_lowercase();

        let mut score = 0.0;
        let mut matched = 0;
        for term in terms {
            let hits = 2 * title.matches(term.as_str()).count()
                + body.matches(term.as_str()).count()
                + extra.matches(term.as_str()).count();
            if hits > 0 {
                matched += 1;
                score += 1.0 + (hits as f32).ln();
            }
        }

        if matched == 0 || (mode == SearchMode::Lex && matched < terms.len()) {
            return 0.0;
        }
        score
    }

    fn snippet(text: &str, terms: &[String]) -> String {
        let lower = text.to_lowercase();
        let start_byte = terms
            .iter()
            .filter_map(|t| lower.find(t.as_str()))
            .min()
            .unwrap_or(0);
        // lowercase can shift byte offsets; fall back to a char-based window
        let start_char = text
            .char_indices()
            .take_while(|(i, _)| *i < start_byte)
            .count()
            .saturating_sub(SNIPPET_CHARS / 4);
        let snippet: String = text
            .chars()
            .skip(start_char)
            .take(SNIPPET_CHARS)
            .collect();
        snippet.replace('\n', " ")
    }
}

impl MemoryStore for FileStore {
    fn open_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Self::create(path);
        }
        Self::load(path)
    }

    fn write(&mut self, frame: FrameInput) -> Result<String> {
        let id = format!("frame-{}", self.frames.len() + 1);
        let stored = Frame {
            id: id.clone(),
            created_at: chrono::Utc::now().timestamp_millis(),
            title: frame.title,
            label: frame.label,
            text: frame.text,
            metadata: frame.metadata,
            tags: frame.tags,
        };

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        let mut line = serde_json::to_vec(&stored)?;
        line.push(b'\n');
        file.write_all(&line)?;
        file.sync_data()?;

        self.frames.push(stored);
        Ok(id)
    }

    fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchHit>> {
        let terms = Self::matching_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, usize)> = self
            .frames
            .iter()
            .enumerate()
            .map(|(i, f)| (Self::score(f, &terms, options.mode), i))
            .filter(|(s, _)| *s > 0.0)
            .collect();
        // best score first, newer frames win ties
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(b.1.cmp(&a.1)));

        Ok(scored
            .into_iter()
            .take(options.k)
            .map(|(score, i)| {
                let frame = &self.frames[i];
                SearchHit {
                    metadata: frame.metadata.clone(),
                    title: frame.title.clone(),
                    text: frame.text.clone(),
                    score,
                    snippet: Self::snippet(&frame.text, &terms),
                }
            })
            .collect())
    }

    fn ask(&self, question: &str, options: SearchOptions) -> Result<Answer> {
        let hits = self.search(
            question,
            SearchOptions {
                mode: SearchMode::Auto,
                ..options
            },
        )?;
        if hits.is_empty() {
            return Ok(Answer::default());
        }

        let answer = hits
            .iter()
            .map(|h| format!("- {}: {}", h.title, h.snippet))
            .collect::<Vec<_>>()
            .join("\n");
        let sources = hits.into_iter().map(|h| h.title).collect();
        Ok(Answer { answer, sources })
    }

    fn timeline(&self, options: TimelineOptions) -> Result<Vec<Frame>> {
        let frames: Vec<Frame> = if options.reverse {
            self.frames.iter().rev().take(options.limit).cloned().collect()
        } else {
            self.frames.iter().take(options.limit).cloned().collect()
        };
        Ok(frames)
    }

    fn stats(&self) -> Result<StoreStats> {
        let size_bytes = std::fs::metadata(&self.path)?.len();
        Ok(StoreStats {
            frame_count: self.frames.len(),
            size_bytes,
        })
    }
}
