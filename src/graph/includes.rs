// src/graph/includes.rs

//! `INCLUDE` directive extraction and include-path resolution.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

static INCLUDE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*INCLUDE\s+(.+)$").expect("include regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Code,
    LineComment,
    BlockComment { saw_newline: bool },
}

/// Remove `//` line comments and `/* */` block comments in a single pass.
///
/// A block comment that spans one or more newlines is replaced by exactly one
/// newline, so an `INCLUDE` following it still starts on its own line.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = ScanState::Code;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            ScanState::Code => match (c, chars.peek()) {
                ('/', Some('/')) => {
                    chars.next();
                    state = ScanState::LineComment;
                }
                ('/', Some('*')) => {
                    chars.next();
                    state = ScanState::BlockComment { saw_newline: false };
                }
                _ => out.push(c),
            },
            ScanState::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = ScanState::Code;
                }
            }
            ScanState::BlockComment { saw_newline } => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    if saw_newline {
                        out.push('\n');
                    }
                    state = ScanState::Code;
                } else if c == '\n' {
                    state = ScanState::BlockComment { saw_newline: true };
                }
            }
        }
    }

    out
}

/// Return the raw include paths written in `text`, in source order.
pub fn extract_includes(text: &str) -> Vec<String> {
    strip_comments(text)
        .lines()
        .filter_map(|line| {
            let caps = INCLUDE_LINE.captures(line)?;
            let raw = caps.get(1)?.as_str().trim();
            if raw.is_empty() {
                None
            } else {
                Some(raw.to_string())
            }
        })
        .collect()
}

/// Resolve `raw` against `base_dir` (both relative to the project root) and
/// fold away `.` and `..` segments.
///
/// Returns `None` if the result would climb above the project root or the
/// include is absolute.
pub fn resolve_include(base_dir: &Path, raw: &str) -> Option<PathBuf> {
    let raw = raw.replace('\\', "/");
    let raw_path = Path::new(&raw);
    if raw_path.is_absolute() {
        return None;
    }
    normalize(&base_dir.join(raw_path))
}

/// Lexically normalize a relative path.
pub fn normalize(path: &Path) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::Normal(part) => parts.push(part),
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.iter().collect())
}

/// Directory of a project-relative file path (empty for top-level files).
pub fn dir_of(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new(""))
}
