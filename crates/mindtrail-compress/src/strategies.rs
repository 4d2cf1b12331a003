//! Per-tool extraction strategies
//!
//! Each strategy keeps what a person needs to recall what happened, not a
//! faithful copy. Missing input fields drop the matching section.

use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

const MAX_IMPORTS: usize = 10;
const MAX_EXPORTS: usize = 10;
const MAX_FUNCTIONS: usize = 15;
const MAX_NOTES: usize = 5;
const MAX_SIGNATURE_CHARS: usize = 120;

const MAX_COMMAND_CHARS: usize = 100;
const MAX_ERROR_LINES: usize = 10;
const MAX_SUCCESS_LINES: usize = 5;

const MAX_SEARCH_MATCHES: usize = 10;
const MAX_GLOB_GROUPS: usize = 5;
const MAX_GLOB_FILES_PER_GROUP: usize = 5;

const MUTATION_PREVIEW_CHARS: usize = 500;

static IMPORT_RE: OnceLock<Regex> = OnceLock::new();
static EXPORT_RE: OnceLock<Regex> = OnceLock::new();
static FUNCTION_RE: OnceLock<Regex> = OnceLock::new();
static CLASS_RE: OnceLock<Regex> = OnceLock::new();
static NOTE_RE: OnceLock<Regex> = OnceLock::new();
static ERROR_RE: OnceLock<Regex> = OnceLock::new();
static SUCCESS_RE: OnceLock<Regex> = OnceLock::new();

fn import_re() -> &'static Regex {
    IMPORT_RE.get_or_init(|| {
        Regex::new(
            r#"^\s*(?:import\s|from\s+\S+\s+import\s|#include\s*[<"]|use\s+[\w:]+|require\s*\(|(?:const|let|var)\s+.+=\s*require\s*\()"#,
        )
        .unwrap()
    })
}

fn export_re() -> &'static Regex {
    EXPORT_RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:export\s|module\.exports|exports\.\w+\s*=|pub\s+(?:fn|struct|enum|trait|type|const|static|mod|use)\s)",
        )
        .unwrap()
    })
}

fn function_re() -> &'static Regex {
    FUNCTION_RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*\w+\s*\(|(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+\w+|(?:async\s+)?def\s+\w+\s*\(|func\s+(?:\([^)]*\)\s*)?\w+\s*\(|(?:export\s+)?(?:const|let)\s+\w+\s*=\s*(?:async\s+)?(?:\([^)]*\)|\w+)\s*=>)",
        )
        .unwrap()
    })
}

fn class_re() -> &'static Regex {
    CLASS_RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:class|struct|interface|enum|trait|type)\s+([A-Za-z_]\w*)",
        )
        .unwrap()
    })
}

fn note_re() -> &'static Regex {
    NOTE_RE.get_or_init(|| Regex::new(r"\b(?:TODO|FIXME|HACK|BUG|NOTE|XXX)\b").unwrap())
}

fn error_re() -> &'static Regex {
    ERROR_RE.get_or_init(|| Regex::new(r"(?i)error|fail|exception|warning").unwrap())
}

fn success_re() -> &'static Regex {
    SUCCESS_RE.get_or_init(|| Regex::new(r"(?i)success|passed|completed|done").unwrap())
}

/// First string value found under any of `keys`
fn input_str<'a>(input: Option<&'a serde_json::Value>, keys: &[&str]) -> Option<&'a str> {
    let input = input?;
    keys.iter()
        .find_map(|k| input.get(*k).and_then(|v| v.as_str()))
        .filter(|s| !s.trim().is_empty())
}

fn file_path(input: Option<&serde_json::Value>) -> Option<&str> {
    input_str(input, &["file_path", "filePath", "path"])
}

fn clip(line: &str, max_chars: usize) -> String {
    let trimmed = line.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let mut out: String = trimmed.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}

fn push_section(out: &mut Vec<String>, heading: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    out.push(format!("{}:", heading));
    out.extend(lines.iter().map(|l| format!("  {}", l)));
}

/// File content: structure first, a little raw context last
pub fn compress_read(input: Option<&serde_json::Value>, output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let mut out = Vec::new();

    if let Some(path) = file_path(input) {
        out.push(format!("File: {}", path));
    }
    out.push(format!(
        "Size: {} lines, {} chars",
        lines.len(),
        output.chars().count()
    ));

    let mut imports = Vec::new();
    let mut exports = Vec::new();
    let mut functions = Vec::new();
    let mut classes: Vec<String> = Vec::new();
    let mut notes = Vec::new();
    let mut seen_classes = HashSet::new();

    for line in &lines {
        if imports.len() < MAX_IMPORTS && import_re().is_match(line) {
            imports.push(clip(line, MAX_SIGNATURE_CHARS));
        }
        if exports.len() < MAX_EXPORTS && export_re().is_match(line) {
            exports.push(clip(line, MAX_SIGNATURE_CHARS));
        }
        if functions.len() < MAX_FUNCTIONS && function_re().is_match(line) {
            let sig = line.trim().trim_end_matches('{').trim_end();
            functions.push(clip(sig, MAX_SIGNATURE_CHARS));
        }
        if let Some(cap) = class_re().captures(line) {
            let name = cap[1].to_string();
            if seen_classes.insert(name.clone()) {
                classes.push(name);
            }
        }
        if notes.len() < MAX_NOTES && note_re().is_match(line) {
            notes.push(clip(line, MAX_SIGNATURE_CHARS));
        }
    }

    let extracted_anything = !(imports.is_empty()
        && exports.is_empty()
        && functions.is_empty()
        && classes.is_empty()
        && notes.is_empty());

    push_section(&mut out, "Imports", &imports);
    push_section(&mut out, "Exports", &exports);
    push_section(&mut out, "Functions", &functions);
    if !classes.is_empty() {
        out.push(format!("Classes: {}", classes.join(", ")));
    }
    push_section(&mut out, "Notes", &notes);

    if lines.len() > 15 {
        out.push("First 10 lines:".to_string());
        out.extend(lines.iter().take(10).map(|l| l.to_string()));
        out.push("Last 5 lines:".to_string());
        out.extend(lines[lines.len() - 5..].iter().map(|l| l.to_string()));
    } else if !extracted_anything {
        out.push("Preview:".to_string());
        out.push(clip(output, MUTATION_PREVIEW_CHARS));
    }

    out.join("\n")
}

/// Command execution: the command, what went wrong, what went right, and
/// the edges of the output
pub fn compress_shell(input: Option<&serde_json::Value>, output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let mut out = Vec::new();

    if let Some(command) = input_str(input, &["command", "cmd"]) {
        let first = command.lines().next().unwrap_or("");
        out.push(format!("Command: {}", clip(first, MAX_COMMAND_CHARS)));
    }

    let errors: Vec<String> = lines
        .iter()
        .filter(|l| error_re().is_match(l))
        .take(MAX_ERROR_LINES)
        .map(|l| clip(l, MAX_SIGNATURE_CHARS))
        .collect();
    let successes: Vec<String> = lines
        .iter()
        .filter(|l| success_re().is_match(l))
        .take(MAX_SUCCESS_LINES)
        .map(|l| clip(l, MAX_SIGNATURE_CHARS))
        .collect();

    push_section(&mut out, "Errors", &errors);
    push_section(&mut out, "Success", &successes);

    out.push(format!("Output ({} lines):", lines.len()));
    if lines.len() > 20 {
        out.extend(lines.iter().take(10).map(|l| l.to_string()));
        out.push(format!("... [{} lines omitted] ...", lines.len() - 15));
        out.extend(lines[lines.len() - 5..].iter().map(|l| l.to_string()));
    } else {
        out.push(output.to_string());
    }

    out.join("\n")
}

/// grep-style results: counts plus the first few matches
pub fn compress_search(input: Option<&serde_json::Value>, output: &str) -> String {
    let matches: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
    let files: HashSet<&str> = matches
        .iter()
        .map(|m| m.split_once(':').map_or(*m, |(file, _)| file))
        .collect();

    let mut out = Vec::new();
    if let Some(pattern) = input_str(input, &["pattern", "query", "regex"]) {
        out.push(format!("Pattern: {}", pattern));
    }
    out.push(format!(
        "Matches: {} in {} files",
        matches.len(),
        files.len()
    ));
    out.extend(
        matches
            .iter()
            .take(MAX_SEARCH_MATCHES)
            .map(|m| format!("  {}", m)),
    );
    if matches.len() > MAX_SEARCH_MATCHES {
        out.push(format!(
            "+{} more matches",
            matches.len() - MAX_SEARCH_MATCHES
        ));
    }

    out.join("\n")
}

/// File enumeration grouped by directory, busiest directories first
pub fn compress_glob(input: Option<&serde_json::Value>, output: &str) -> String {
    let files: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for file in &files {
        let path = Path::new(file);
        let dir = path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| ".".to_string());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string());
        groups.entry(dir).or_default().push(name);
    }

    let mut sorted: Vec<(String, Vec<String>)> = groups.into_iter().collect();
    // stable sort keeps directory order for equal counts
    sorted.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    let mut out = Vec::new();
    if let Some(pattern) = input_str(input, &["pattern", "glob"]) {
        out.push(format!("Pattern: {}", pattern));
    }
    out.push(format!("Files: {}", files.len()));

    for (dir, names) in sorted.iter().take(MAX_GLOB_GROUPS) {
        out.push(format!("{}/ ({} files)", dir, names.len()));
        out.extend(
            names
                .iter()
                .take(MAX_GLOB_FILES_PER_GROUP)
                .map(|n| format!("  {}", n)),
        );
        if names.len() > MAX_GLOB_FILES_PER_GROUP {
            out.push(format!(
                "  +{} more",
                names.len() - MAX_GLOB_FILES_PER_GROUP
            ));
        }
    }
    if sorted.len() > MAX_GLOB_GROUPS {
        out.push(format!(
            "+{} more directories",
            sorted.len() - MAX_GLOB_GROUPS
        ));
    }

    out.join("\n")
}

/// Edits and writes: the effect matters, not a replay of the diff
pub fn compress_mutation(input: Option<&serde_json::Value>, output: &str) -> String {
    let mut out = Vec::new();
    if let Some(path) = file_path(input) {
        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        out.push(format!("File: {}", name));
        out.push(format!("Path: {}", path));
    }
    out.push("Status: changes applied".to_string());
    out.push("Result:".to_string());
    out.push(output.chars().take(MUTATION_PREVIEW_CHARS).collect());
    out.join("\n")
}

/// Head and tail of anything else
pub fn compress_generic(output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() <= 30 {
        return output.to_string();
    }

    let omitted = lines.len() - 25;
    let mut out: Vec<String> = lines.iter().take(15).map(|l| l.to_string()).collect();
    out.push(format!("... [{} lines omitted] ...", omitted));
    out.extend(lines[lines.len() - 10..].iter().map(|l| l.to_string()));
    out.join("\n")
}
