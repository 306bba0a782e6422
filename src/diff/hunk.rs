use super::DiffLine;
use nom::{
    IResult, Parser,
    bytes::complete::tag,
    character::complete::{char, u32 as line_number},
    combinator::{opt, rest},
    sequence::preceded,
};
use std::fmt;

/// One side of a hunk header: `start[,count]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkRange {
    pub start: u32,
    pub count: u32,
}

impl fmt::Display for HunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.count {
            1 => write!(f, "{}", self.start),
            n => write!(f, "{},{}", self.start, n),
        }
    }
}

/// A single `@@ -a,b +c,d @@` region of a unified diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old: HunkRange,
    pub new: HunkRange,
    /// Free text after the closing `@@`, kept verbatim (usually a leading
    /// space and the enclosing function name)
    pub trailer: String,
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    /// Parse a hunk header line into an empty hunk.
    ///
    /// Omitted counts default to 1. Returns `None` if the line is not a
    /// well-formed header.
    ///
    /// ```
    /// use git_partial_stage::diff::Hunk;
    ///
    /// let hunk = Hunk::parse_header("@@ -136,0 +137 @@ inputs").unwrap();
    /// assert_eq!((hunk.old.start, hunk.old.count), (136, 0));
    /// assert_eq!((hunk.new.start, hunk.new.count), (137, 1));
    /// assert_eq!(hunk.trailer, " inputs");
    /// ```
    #[must_use]
    pub fn parse_header(line: &str) -> Option<Self> {
        let (_, (old, new, trailer)) = header(line).ok()?;
        Some(Hunk {
            old,
            new,
            trailer: trailer.to_string(),
            lines: Vec::new(),
        })
    }

    /// Old and new line counts obtained by replaying the hunk's lines.
    ///
    /// For a hunk straight out of the parser these equal `old.count` and
    /// `new.count`.
    pub fn replayed_counts(&self) -> (u32, u32) {
        self.lines
            .iter()
            .fold((0, 0), |(old, new), line| match line {
                DiffLine::Context { .. } => (old + 1, new + 1),
                DiffLine::Delete { .. } => (old + 1, new),
                DiffLine::Add { .. } => (old, new + 1),
                DiffLine::NoNewline { .. } => (old, new),
            })
    }

    /// The hunk of the inverse diff: old and new swapped, additions and
    /// deletions exchanged, line order kept
    #[must_use]
    pub fn reversed(&self) -> Self {
        Hunk {
            old: self.new,
            new: self.old,
            trailer: self.trailer.clone(),
            lines: self.lines.iter().map(DiffLine::reversed).collect(),
        }
    }

    /// The header line as it is rendered
    pub fn header(&self) -> String {
        format!("@@ -{} +{} @@{}", self.old, self.new, self.trailer)
    }
}

fn range(input: &str) -> IResult<&str, HunkRange> {
    (line_number, opt(preceded(char(','), line_number)))
        .map(|(start, count)| HunkRange {
            start,
            count: count.unwrap_or(1),
        })
        .parse(input)
}

fn header(input: &str) -> IResult<&str, (HunkRange, HunkRange, &str)> {
    (
        preceded(tag("@@ -"), range),
        preceded(tag(" +"), range),
        preceded(tag(" @@"), rest),
    )
        .parse(input)
}

impl fmt::Display for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header())?;
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
