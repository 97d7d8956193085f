// src/patterns.rs
//! Pattern store: loads keyword and author pattern files into immutable,
//! compiled `PatternSet`s.
//!
//! File format is one pattern per line. Blank lines and `#` comments are
//! ignored. A line is matched as:
//! - a plain case-insensitive substring (default),
//! - a wildcard when it contains `*` (any run of characters) or `?` (one character),
//! - a regular expression when prefixed with `re:` (compiled case-insensitively).

use regex::{Regex, RegexBuilder};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Result, WatchError};

pub const REGEX_PREFIX: &str = "re:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternCategory {
    Keyword,
    Author,
}

impl PatternCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::Keyword => "keyword",
            PatternCategory::Author => "author",
        }
    }
}

impl fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single matching rule. Texts handed to `matches` are expected to be
/// lower-cased already (see `record::normalize`).
#[derive(Debug, Clone)]
pub enum Pattern {
    Substring(String),
    Wildcard { source: String, re: Regex },
    Regex { source: String, re: Regex },
}

impl Pattern {
    /// Parse one raw line. `Ok(None)` for blank and comment lines.
    pub fn parse(raw: &str) -> std::result::Result<Option<Pattern>, regex::Error> {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        if let Some(expr) = line.strip_prefix(REGEX_PREFIX) {
            let expr = expr.trim();
            if expr.is_empty() {
                return Ok(None);
            }
            let re = RegexBuilder::new(expr).case_insensitive(true).build()?;
            return Ok(Some(Pattern::Regex {
                source: format!("{REGEX_PREFIX}{expr}"),
                re,
            }));
        }

        let folded = collapse_whitespace(line).to_lowercase();
        if folded.contains(['*', '?']) {
            let re = wildcard_regex(&folded)?;
            return Ok(Some(Pattern::Wildcard { source: folded, re }));
        }
        Ok(Some(Pattern::Substring(folded)))
    }

    /// The normalized pattern string, as reported in match explanations.
    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Substring(s) => s,
            Pattern::Wildcard { source, .. } => source,
            Pattern::Regex { source, .. } => source,
        }
    }

    /// Key used to drop duplicate lines. Regex sources compile
    /// case-insensitively, so their case is folded too, except right after a
    /// backslash where `\B` and `\b` differ.
    fn dedup_key(&self) -> String {
        match self {
            Pattern::Regex { source, .. } => {
                let mut key = String::with_capacity(source.len());
                let mut escaped = false;
                for ch in source.chars() {
                    if escaped {
                        key.push(ch);
                    } else {
                        key.extend(ch.to_lowercase());
                    }
                    escaped = !escaped && ch == '\\';
                }
                key
            }
            other => other.as_str().to_string(),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            Pattern::Substring(needle) => text.contains(needle.as_str()),
            Pattern::Wildcard { re, .. } => re.is_match(text),
            Pattern::Regex { re, .. } => re.is_match(text),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `*` → any run of characters, `?` → exactly one, everything else literal.
fn wildcard_regex(glob: &str) -> std::result::Result<Regex, regex::Error> {
    let mut expr = String::with_capacity(glob.len() + 8);
    let mut literal = String::new();
    for ch in glob.chars() {
        match ch {
            '*' | '?' => {
                expr.push_str(&regex::escape(&literal));
                literal.clear();
                expr.push_str(if ch == '*' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    expr.push_str(&regex::escape(&literal));
    RegexBuilder::new(&expr)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
}

/// Ordered, deduplicated, immutable collection of patterns for one category.
#[derive(Debug, Clone)]
pub struct PatternSet {
    category: PatternCategory,
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn empty(category: PatternCategory) -> Self {
        Self {
            category,
            patterns: Vec::new(),
        }
    }

    /// Build from raw lines. Invalid wildcard/regex lines are skipped with a warning.
    pub fn from_lines<I, S>(category: PatternCategory, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns: Vec<Pattern> = Vec::new();
        for (lineno, raw) in lines.into_iter().enumerate() {
            let raw = raw.as_ref();
            match Pattern::parse(raw) {
                Ok(Some(p)) => {
                    let key = p.dedup_key();
                    if patterns.iter().any(|q| q.dedup_key() == key) {
                        debug!(target: "patterns", category = %category, pattern = p.as_str(), "duplicate pattern dropped");
                        continue;
                    }
                    patterns.push(p);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        target: "patterns",
                        category = %category,
                        line = lineno + 1,
                        error = %e,
                        "invalid pattern skipped"
                    );
                }
            }
        }
        Self { category, patterns }
    }

    pub fn from_str_lines(category: PatternCategory, content: &str) -> Self {
        Self::from_lines(category, content.lines())
    }

    /// Load from a pattern file. A missing file yields an empty set; a file
    /// that exists but cannot be read is a `PatternSource` error.
    pub fn load(category: PatternCategory, path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Self::from_str_lines(category, &content)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    target: "patterns",
                    category = %category,
                    path = %path.display(),
                    "pattern file missing; category will never match"
                );
                Ok(Self::empty(category))
            }
            Err(source) => Err(WatchError::PatternSource {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// `load` with the degraded mode applied: unreadable sources become an empty set.
    pub fn load_or_empty(category: PatternCategory, path: &Path) -> Self {
        match Self::load(category, path) {
            Ok(set) => set,
            Err(e) => {
                warn!(target: "patterns", category = %category, error = %e, "degrading to empty pattern set");
                Self::empty(category)
            }
        }
    }

    pub fn category(&self) -> PatternCategory {
        self.category
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.patterns.iter().any(|p| p.as_str() == pattern)
    }
}
