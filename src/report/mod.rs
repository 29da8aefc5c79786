//! Run statistics and location-aware message context.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Statistics collected while transforming modules.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Stats {
    /// Number of doctypes successfully translated into annotations.
    pub matched: usize,
    /// Number of doctypes rejected by the grammar.
    pub syntax_errors: usize,
    /// Unknown type names and how often each occurred.
    pub unknown_names: BTreeMap<String, usize>,
}

impl Stats {
    /// Tallies one occurrence of an unknown type name.
    pub fn record_unknown(&mut self, name: &str) {
        *self.unknown_names.entry(name.to_string()).or_default() += 1;
    }

    /// Folds another statistics value into this one.
    pub fn merge(&mut self, other: Stats) {
        self.matched += other.matched;
        self.syntax_errors += other.syntax_errors;
        for (name, count) in other.unknown_names {
            *self.unknown_names.entry(name).or_default() += count;
        }
    }

    /// Total number of unknown-name occurrences.
    pub fn total_unknown(&self) -> usize {
        self.unknown_names.values().sum()
    }

    /// Formats unknown names as a list, most frequent first, ties sorted
    /// by name.
    pub fn format_unknown_names(&self) -> String {
        let mut entries: Vec<(&str, usize)> = self
            .unknown_names
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

        let pad = entries
            .first()
            .map(|(_, count)| count.to_string().len())
            .unwrap_or(0);
        entries
            .iter()
            .map(|(name, count)| format!("{count:>pad$}  {name}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A file/line location attached to log messages.
#[derive(Debug, Clone, Default)]
pub struct Context {
    path: Option<PathBuf>,
    line: Option<usize>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with the given path.
    pub fn with_path(&self, path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            line: self.line,
        }
    }

    /// Returns a copy with the given 1-based line.
    pub fn with_line(&self, line: usize) -> Self {
        Self {
            path: self.path.clone(),
            line: Some(line),
        }
    }

    /// Returns a copy with the line shifted by `offset`.
    pub fn with_line_offset(&self, offset: usize) -> Self {
        Self {
            path: self.path.clone(),
            line: Some(self.line.unwrap_or(1) + offset),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, self.line) {
            (Some(path), Some(line)) => write!(f, "{}:{line}", path.display()),
            (Some(path), None) => write!(f, "{}", path.display()),
            (None, Some(line)) => write!(f, "<source>:{line}"),
            (None, None) => write!(f, "<source>"),
        }
    }
}
