pub mod file;
pub mod hunk;

pub use file::FileDiff;
pub use hunk::{Hunk, HunkRange};

use std::fmt;

/// A single classified line inside a hunk.
///
/// Line numbers are assigned by replaying the hunk header's counters, so each
/// variant carries exactly the positions it occupies: context lines exist on
/// both sides, additions only in the new file and deletions only in the old.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    /// Unchanged line present in both versions
    Context {
        old_line: u32,
        new_line: u32,
        content: String,
    },
    /// Added line with new line number and content
    Add { new_line: u32, content: String },
    /// Deleted line with old line number and content
    Delete { old_line: u32, content: String },
    /// `\ No newline at end of file`, kept verbatim (including the backslash).
    ///
    /// Zero-width: it occupies no line number on either side and annotates
    /// the line immediately before it.
    NoNewline { marker: String },
}

impl DiffLine {
    /// Text of the line without its diff marker
    pub fn content(&self) -> &str {
        match self {
            DiffLine::Context { content, .. }
            | DiffLine::Add { content, .. }
            | DiffLine::Delete { content, .. } => content,
            DiffLine::NoNewline { marker } => marker,
        }
    }

    pub fn old_line(&self) -> Option<u32> {
        match self {
            DiffLine::Context { old_line, .. } | DiffLine::Delete { old_line, .. } => {
                Some(*old_line)
            }
            _ => None,
        }
    }

    pub fn new_line(&self) -> Option<u32> {
        match self {
            DiffLine::Context { new_line, .. } | DiffLine::Add { new_line, .. } => {
                Some(*new_line)
            }
            _ => None,
        }
    }

    /// True for additions and deletions, the lines change groups are made of
    pub fn is_change(&self) -> bool {
        matches!(self, DiffLine::Add { .. } | DiffLine::Delete { .. })
    }

    pub fn is_context(&self) -> bool {
        matches!(self, DiffLine::Context { .. })
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, DiffLine::NoNewline { .. })
    }

    /// The same line seen from a diff with old and new swapped
    #[must_use]
    pub fn reversed(&self) -> Self {
        match self.clone() {
            DiffLine::Context {
                old_line,
                new_line,
                content,
            } => DiffLine::Context {
                old_line: new_line,
                new_line: old_line,
                content,
            },
            DiffLine::Add { new_line, content } => DiffLine::Delete {
                old_line: new_line,
                content,
            },
            DiffLine::Delete { old_line, content } => DiffLine::Add {
                new_line: old_line,
                content,
            },
            marker @ DiffLine::NoNewline { .. } => marker,
        }
    }
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffLine::Context { content, .. } => write!(f, " {}", content),
            DiffLine::Add { content, .. } => write!(f, "+{}", content),
            DiffLine::Delete { content, .. } => write!(f, "-{}", content),
            DiffLine::NoNewline { marker } => f.write_str(marker),
        }
    }
}
