// src/diagnostics.rs

//! Structured compiler diagnostics.
//!
//! The compiler reports problems as plain text lines of the form
//!
//! ```text
//! ERROR: 'chapters/intro.ink' line 12: Expected end of line
//! WARNING: Apparent loose end exists
//! TODO: rewrite the ending
//! ```
//!
//! [`parse_line`] turns one such line into a [`Diagnostic`]. Lines that don't
//! match the grammar are logged and dropped; they never abort a compile job.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

static DIAGNOSTIC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(ERROR|WARNING|TODO):\s*(?:'([^']+)'\s+line\s+(\d+):\s*)?(.*?)\s*$")
        .expect("diagnostic line regex is valid")
});

/// How serious a diagnostic is.
///
/// `Author` covers `TODO:` notes the writer left in the source.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Severity {
    Author,
    Warning,
    Error,
}

impl Severity {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ERROR" => Some(Severity::Error),
            "WARNING" => Some(Severity::Warning),
            "TODO" => Some(Severity::Author),
            _ => None,
        }
    }

    pub fn is_error(self) -> bool {
        self == Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Author => write!(f, "todo"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One parsed compiler diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Source path exactly as the compiler printed it (usually relative to
    /// the master file's directory).
    pub file: Option<String>,
    pub line: Option<u32>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => {
                write!(f, "{}: {}:{}: {}", self.severity, file, line, self.message)
            }
            (Some(file), None) => write!(f, "{}: {}: {}", self.severity, file, self.message),
            _ => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Parse a single raw compiler output line.
///
/// Returns `None` (after logging a warning) when the line doesn't follow the
/// diagnostic grammar.
pub fn parse_line(raw: &str) -> Option<Diagnostic> {
    let Some(caps) = DIAGNOSTIC_LINE.captures(raw) else {
        warn!(line = %raw, "could not parse compiler output line; dropping it");
        return None;
    };

    let severity = caps.get(1).and_then(|m| Severity::from_tag(m.as_str()))?;
    let file = caps.get(2).map(|m| m.as_str().to_string());
    let line = match caps.get(3) {
        Some(m) => match m.as_str().parse::<u32>() {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(line = %raw, error = %e, "line number out of range; keeping the message without it");
                None
            }
        },
        None => None,
    };
    let message = caps
        .get(4)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    Some(Diagnostic {
        severity,
        file,
        line,
        message,
    })
}

/// Parse every line of a raw output buffer, skipping blank lines.
pub fn parse_lines<'a, I>(lines: I) -> Vec<Diagnostic>
where
    I: IntoIterator<Item = &'a String>,
{
    lines
        .into_iter()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| parse_line(l))
        .collect()
}

/// Echo a diagnostic to the log at a level matching its severity.
pub fn log_diagnostic(master: &str, diagnostic: &Diagnostic) {
    match diagnostic.severity {
        Severity::Error => error!(master = %master, "{}", diagnostic),
        Severity::Warning => warn!(master = %master, "{}", diagnostic),
        Severity::Author => info!(master = %master, "{}", diagnostic),
    }
}
