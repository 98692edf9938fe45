//! Event filtering with regex patterns.
//!
//! Each destination may list ignore patterns. An event is ignored for that
//! destination when its subject or any dropped item name matches one of them.

use fancy_regex::Regex;
use tracing::warn;

use crate::common::types::{DomainEvent, EventKind};

/// Compiled ignore patterns for one destination.
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    patterns: Vec<CompiledPattern>,
}

/// A compiled regex pattern with its original string for debugging.
#[derive(Debug, Clone)]
struct CompiledPattern {
    original: String,
    regex: Regex,
}

impl IgnoreFilter {
    /// Create a filter from pattern strings.
    ///
    /// Invalid regex patterns are logged and skipped.
    pub fn new(patterns: Option<Vec<String>>) -> Self {
        Self {
            patterns: compile_patterns(patterns.unwrap_or_default()),
        }
    }

    /// Create an empty filter that allows all events.
    #[cfg(test)]
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Returns `true` if the event matches any pattern and should be skipped.
    pub fn should_ignore(&self, event: &DomainEvent) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        if event.subject().is_some_and(|s| self.matches(s)) {
            return true;
        }
        match &event.kind {
            EventKind::Drop { items, .. } => items.iter().any(|item| self.matches(&item.name)),
            _ => false,
        }
    }

    /// Check a single text against every pattern.
    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| {
            p.regex.is_match(text).unwrap_or_else(|e| {
                warn!("Regex match error for pattern '{}': {}", p.original, e);
                false
            })
        })
    }

    pub fn has_patterns(&self) -> bool {
        !self.patterns.is_empty()
    }
}

/// Compile a list of regex pattern strings, skipping invalid ones.
fn compile_patterns(patterns: Vec<String>) -> Vec<CompiledPattern> {
    patterns
        .into_iter()
        .filter_map(|pattern| match Regex::new(&pattern) {
            Ok(regex) => Some(CompiledPattern {
                original: pattern,
                regex,
            }),
            Err(e) => {
                warn!("Invalid ignore regex pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}
