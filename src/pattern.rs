//! Wildcard subscription patterns.
//!
//! Patterns address records by key (`main.player.*`) or, with a `$`
//! prefix, by group tag (`$main.playerinfo`). A literal `.` matches the
//! separator, `*` greedily matches any remaining suffix at its position,
//! and the whole pattern is anchored at both ends, so a bare key matches
//! only itself. Each pattern is compiled to a regex exactly once, at
//! subscription time, and reused for every candidate afterwards.

use crate::error::{PropertyError, Result};
use crate::types::Key;
use regex::Regex;
use std::fmt;

/// What a pattern is evaluated against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternTarget {
    /// The record's key.
    Key,
    /// The record's optional group tag.
    Group,
}

/// A compiled subscription pattern.
#[derive(Clone, Debug)]
pub struct Pattern {
    raw: String,
    target: PatternTarget,
    regex: Regex,
}

impl Pattern {
    /// Compile a pattern string.
    pub fn compile(text: &str) -> Result<Self> {
        let raw = text.trim();
        if raw.is_empty() {
            return Err(PropertyError::InvalidPattern(text.to_string()));
        }

        let (target, body) = match raw.strip_prefix('$') {
            Some(rest) => (PatternTarget::Group, rest),
            None => (PatternTarget::Key, raw),
        };
        if body.is_empty() || body.chars().any(char::is_whitespace) || body.contains('$') {
            return Err(PropertyError::InvalidPattern(text.to_string()));
        }

        let anchored = format!(
            "^{}$",
            body.split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*")
        );
        let regex = Regex::new(&anchored)
            .map_err(|e| PropertyError::InvalidPattern(format!("{}: {}", text, e)))?;

        Ok(Pattern {
            raw: raw.to_string(),
            target,
            regex,
        })
    }

    /// The pattern text as written (including any `$` prefix).
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn target(&self) -> PatternTarget {
        self.target
    }

    /// Evaluate against a bare candidate string, ignoring the target.
    pub fn matches(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// Evaluate against a record's key or group tag, per the pattern's
    /// target.
    pub fn matches_record(&self, key: &Key, group: Option<&str>) -> bool {
        match self.target {
            PatternTarget::Key => self.regex.is_match(key.as_str()),
            PatternTarget::Group => group.is_some_and(|g| self.regex.is_match(g)),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
