//! Wait targets.
//!
//! A [`Pattern`] is tested against one cleaned line at a time. Plain strings
//! convert into substring patterns; regular expressions are opt-in through
//! [`Pattern::regex`].

use std::fmt;

use regex::Regex;

use crate::error::{ExpectError, Result};

/// A target that a line either contains or does not.
#[derive(Clone)]
pub enum Pattern {
    /// Match when the line contains this substring.
    Literal(String),

    /// Match when the regular expression finds a match anywhere in the line.
    Regex(CompiledRegex),
}

impl Pattern {
    /// Create a substring pattern.
    #[must_use]
    pub fn literal(s: impl Into<String>) -> Self {
        Self::Literal(s.into())
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn regex(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            ExpectError::invalid_pattern(format!("'{pattern}': {e}"))
        })?;
        Ok(Self::Regex(CompiledRegex::new(pattern.to_string(), regex)))
    }

    /// Get the pattern source for display purposes.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) => s,
            Self::Regex(r) => r.pattern(),
        }
    }

    /// Check whether `text` satisfies this pattern.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Literal(s) => text.contains(s.as_str()),
            Self::Regex(r) => r.is_match(text),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "Literal({s:?})"),
            Self::Regex(r) => write!(f, "Regex({:?})", r.pattern()),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

impl From<&String> for Pattern {
    fn from(s: &String) -> Self {
        Self::Literal(s.clone())
    }
}

/// A compiled regular expression with its source pattern.
#[derive(Clone)]
pub struct CompiledRegex {
    pattern: String,
    regex: Regex,
}

impl CompiledRegex {
    /// Create a new compiled regex.
    #[must_use]
    pub const fn new(pattern: String, regex: Regex) -> Self {
        Self { pattern, regex }
    }

    /// Get the source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Check whether the regex matches anywhere in `text`.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// An ordered list of patterns checked against each line.
///
/// Earlier patterns win when several match the same line.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Create an empty set. An empty set never matches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pattern at the end of the set.
    pub fn add(&mut self, pattern: impl Into<Pattern>) -> &mut Self {
        self.patterns.push(pattern.into());
        self
    }

    /// Number of patterns in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The patterns in priority order.
    #[must_use]
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Index of the first pattern that matches `text`.
    #[must_use]
    pub fn first_match(&self, text: &str) -> Option<usize> {
        self.patterns.iter().position(|p| p.matches(text))
    }
}

impl<P: Into<Pattern>> FromIterator<P> for PatternSet {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self {
            patterns: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Pattern> for PatternSet {
    fn from(pattern: Pattern) -> Self {
        Self {
            patterns: vec![pattern],
        }
    }
}

impl<P: Into<Pattern>> From<Vec<P>> for PatternSet {
    fn from(patterns: Vec<P>) -> Self {
        patterns.into_iter().collect()
    }
}

impl<P: Into<Pattern>, const N: usize> From<[P; N]> for PatternSet {
    fn from(patterns: [P; N]) -> Self {
        patterns.into_iter().collect()
    }
}
