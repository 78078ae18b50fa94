//! Query matching logic.
//!
//! # Responsibilities
//! - Match query prefix (case-sensitive)
//! - Match query suffix (completer detection)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Metric paths are case-sensitive, so is every matcher
//! - Empty prefix never matches (routing disabled, not "match all")
//! - No regex to guarantee O(n) matching

/// Trait for matching queries against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the query matches this condition.
    fn matches(&self, query: &str) -> bool;
}

/// Matches the query prefix.
#[derive(Debug, Clone)]
pub struct PrefixMatcher {
    prefix: String,
}

impl PrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Matcher for PrefixMatcher {
    fn matches(&self, query: &str) -> bool {
        !self.prefix.is_empty() && query.starts_with(&self.prefix)
    }
}

/// Matches the query suffix.
#[derive(Debug, Clone)]
pub struct SuffixMatcher {
    suffix: String,
}

impl SuffixMatcher {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl Matcher for SuffixMatcher {
    fn matches(&self, query: &str) -> bool {
        query.ends_with(&self.suffix)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, query: &str) -> bool {
        !self.matchers.is_empty() && self.matchers.iter().all(|m| m.matches(query))
    }
}
