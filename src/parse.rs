//! Parsing of user selections into concrete group indices.
//!
//! # Syntax
//!
//! A group selector is a comma-separated list of:
//! - `N` - group N
//! - `A-B` - groups A through B (inclusive)
//! - `all` - every group
//!
//! Indices outside `1..=total` are dropped when the selector is resolved.
//! Alternatively a [`Pattern`] selects every group whose change lines or
//! context window match it.
//!
//! # Examples
//!
//! ```
//! use git_partial_stage::parse::{parse_selector, resolve, Selector};
//!
//! let selectors = parse_selector("2,5,7-9").unwrap();
//! assert_eq!(selectors[2], Selector::Range(7, 9));
//!
//! let indices = resolve(&selectors, 8);
//! assert_eq!(indices.into_iter().collect::<Vec<_>>(), vec![2, 5, 7, 8]);
//! ```

use crate::group::{ChangeGroup, LineMatcher};
use error_set::error_set;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;

error_set! {
    /// Errors from parsing group selections
    ParseError := {
        /// No selector tokens provided
        #[display("No groups selected: selector is empty")]
        EmptySelector,
        /// Token is not a positive integer
        #[display("Invalid group number '{value}'")]
        InvalidIndex { value: String },
        /// Range has start greater than end
        #[display("Invalid range {start}-{end}: start must be <= end")]
        InvalidRange { start: usize, end: usize },
        /// Pattern is not a valid regular expression
        #[display("Invalid pattern '{pattern}': {message}")]
        InvalidPattern { pattern: String, message: String },
    }
}

/// A single token of a group selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Every group
    All,
    /// One group by number
    Index(usize),
    /// Inclusive range of group numbers
    Range(usize, usize),
}

/// Parse a selector string such as `1,3,5-7` or `all`.
///
/// # Errors
///
/// Returns [`ParseError`] if:
/// - No tokens are present
/// - A number is not a positive integer
/// - A range is reversed
pub fn parse_selector(input: &str) -> Result<Vec<Selector>, ParseError> {
    let selectors = input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_single)
        .collect::<Result<Vec<_>, _>>()?;

    if selectors.is_empty() {
        return Err(ParseError::EmptySelector);
    }

    Ok(selectors)
}

fn parse_single(input: &str) -> Result<Selector, ParseError> {
    if input.eq_ignore_ascii_case("all") {
        return Ok(Selector::All);
    }

    if let Some((start, end)) = input.split_once('-') {
        let start = parse_index(start)?;
        let end = parse_index(end)?;
        if start > end {
            return Err(ParseError::InvalidRange { start, end });
        }
        return Ok(Selector::Range(start, end));
    }

    Ok(Selector::Index(parse_index(input)?))
}

/// Parse a positive group number
fn parse_index(input: &str) -> Result<usize, ParseError> {
    let trimmed = input.trim();
    match trimmed.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ParseError::InvalidIndex {
            value: trimmed.to_string(),
        }),
    }
}

/// Resolve parsed selectors against `total` groups, dropping anything
/// outside `1..=total`
pub fn resolve(selectors: &[Selector], total: usize) -> BTreeSet<usize> {
    let mut indices = BTreeSet::new();
    for selector in selectors {
        let (start, end) = match *selector {
            Selector::All => (1, total),
            Selector::Index(n) => (n, n),
            Selector::Range(start, end) => (start, end),
        };
        indices.extend(start.max(1)..=end.min(total));
    }
    indices
}

/// Case-insensitive regular expression matched against group text
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile `pattern` case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidPattern`] if the regex does not compile.
    pub fn new(pattern: &str) -> Result<Self, ParseError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ParseError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl LineMatcher for Pattern {
    fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// How the user picked the groups to act on
#[derive(Debug, Clone)]
pub enum Selection {
    /// Explicit numbers, ranges or `all`
    Groups(Vec<Selector>),
    /// Every group matching a pattern
    Grep(Pattern),
}

impl Selection {
    /// Build a selection from the `--groups`/`--grep` pair of options.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the selector or pattern is malformed, or if
    /// neither option is given.
    pub fn from_args(groups: Option<&str>, grep: Option<&str>) -> Result<Self, ParseError> {
        match (groups, grep) {
            (_, Some(pattern)) => Ok(Selection::Grep(Pattern::new(pattern)?)),
            (Some(groups), None) => Ok(Selection::Groups(parse_selector(groups)?)),
            (None, None) => Err(ParseError::EmptySelector),
        }
    }

    /// The set of group indices this selection picks out of `groups`.
    ///
    /// An empty result is a valid outcome, not an error.
    pub fn resolve(&self, groups: &[ChangeGroup]) -> BTreeSet<usize> {
        match self {
            Selection::Groups(selectors) => resolve(selectors, groups.len()),
            Selection::Grep(pattern) => groups
                .iter()
                .filter(|g| g.matches(pattern))
                .map(|g| g.index)
                .collect(),
        }
    }
}
