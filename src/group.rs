//! Change groups: the individually selectable units of a diff.
//!
//! A change group is a maximal run of added/removed lines inside one hunk.
//! Groups are numbered from 1 across the whole file in hunk order; that
//! number is the identity users select by, and the patch builder reuses the
//! spans recorded here so both sides always agree on it.

use crate::diff::{DiffLine, Hunk};
use std::ops::Range;

/// Default number of context lines attached on each side of a group
pub const DEFAULT_CONTEXT: usize = 3;

/// Something that can decide whether a line of text is interesting.
///
/// Implemented for [`crate::parse::Pattern`] (case-insensitive regex) and for
/// any `Fn(&str) -> bool`, so other matching styles plug in without touching
/// extraction or patch building.
pub trait LineMatcher {
    fn is_match(&self, text: &str) -> bool;
}

impl<F> LineMatcher for F
where
    F: Fn(&str) -> bool,
{
    fn is_match(&self, text: &str) -> bool {
        self(text)
    }
}

/// A maximal run of non-context lines within one hunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeGroup {
    /// 1-based, global across the file
    pub index: usize,
    /// 1-based index of the owning hunk
    pub hunk_index: usize,
    /// Positions in the owning hunk's `lines` covered by this run, from the
    /// first change line up to and including the last one
    pub span: Range<usize>,
    /// The added/removed lines in their original order
    pub lines: Vec<DiffLine>,
    /// Display-only context windows; never used for reconstruction
    pub context_before: Vec<DiffLine>,
    pub context_after: Vec<DiffLine>,
}

impl ChangeGroup {
    pub fn additions(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, DiffLine::Add { .. }))
            .count()
    }

    pub fn deletions(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, DiffLine::Delete { .. }))
            .count()
    }

    /// Short change summary like `+2, -1`
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.additions() > 0 {
            parts.push(format!("+{}", self.additions()));
        }
        if self.deletions() > 0 {
            parts.push(format!("-{}", self.deletions()));
        }
        parts.join(", ")
    }

    /// True if any line of the context windows or of the change itself matches
    pub fn matches(&self, matcher: &impl LineMatcher) -> bool {
        self.context_before
            .iter()
            .chain(&self.lines)
            .chain(&self.context_after)
            .any(|line| matcher.is_match(line.content()))
    }

    /// Render the group for the terminal.
    ///
    /// Change lines carry the line number they occupy on their side (`-N` old,
    /// `+N` new); `verbose` adds the context windows around them.
    pub fn render(&self, verbose: bool) -> String {
        let mut out = format!(
            "Group {} (hunk {}) [{}]\n",
            self.index,
            self.hunk_index,
            self.summary()
        );

        let context = |out: &mut String, lines: &[DiffLine]| {
            for line in lines {
                if let Some(n) = line.new_line() {
                    out.push_str(&format!("   {}:\t{}\n", n, line.content()));
                }
            }
        };

        if verbose {
            context(&mut out, &self.context_before);
        }
        for line in &self.lines {
            match line {
                DiffLine::Add { new_line, content } => {
                    out.push_str(&format!("  +{}:\t{}\n", new_line, content));
                }
                DiffLine::Delete { old_line, content } => {
                    out.push_str(&format!("  -{}:\t{}\n", old_line, content));
                }
                _ => {}
            }
        }
        if verbose {
            context(&mut out, &self.context_after);
        }

        out
    }
}

/// Narrowing applied by `show`: a single group number and/or a pattern
pub struct GroupFilter<M> {
    pub index: Option<usize>,
    pub matcher: Option<M>,
}

impl<M: LineMatcher> GroupFilter<M> {
    pub fn apply(&self, groups: Vec<ChangeGroup>) -> Vec<ChangeGroup> {
        groups
            .into_iter()
            .filter(|g| self.matcher.as_ref().is_none_or(|m| g.matches(m)))
            .filter(|g| self.index.is_none_or(|i| g.index == i))
            .collect()
    }
}

/// Tracks the change run currently being accumulated while scanning a hunk
#[derive(Default)]
struct RunTracker {
    start: Option<usize>,
    end: usize,
    runs: Vec<Range<usize>>,
}

impl RunTracker {
    fn change(&mut self, at: usize) {
        self.start.get_or_insert(at);
        self.end = at + 1;
    }

    fn close(&mut self) {
        if let Some(start) = self.start.take() {
            self.runs.push(start..self.end);
        }
    }
}

/// Split a hunk's lines into the spans of its change runs.
///
/// Context lines close a run; no-newline markers annotate the previous line
/// and neither open nor close one.
pub fn change_runs(lines: &[DiffLine]) -> Vec<Range<usize>> {
    let mut tracker = RunTracker::default();
    for (i, line) in lines.iter().enumerate() {
        match line {
            DiffLine::Add { .. } | DiffLine::Delete { .. } => tracker.change(i),
            DiffLine::Context { .. } => tracker.close(),
            DiffLine::NoNewline { .. } => {}
        }
    }
    tracker.close();
    tracker.runs
}

/// Extract every change group of a file, numbered in hunk order.
///
/// `window` bounds the context attached on each side of a group. The window
/// before a group holds the last context lines seen in the hunk so far, and
/// may reach past earlier groups; the window after holds the context that
/// directly follows. Windows of neighbouring groups may overlap and are not
/// clipped against each other.
pub fn extract_groups(hunks: &[Hunk], window: usize) -> Vec<ChangeGroup> {
    let mut groups: Vec<ChangeGroup> = Vec::new();

    for (h, hunk) in hunks.iter().enumerate() {
        for span in change_runs(&hunk.lines) {
            let lines = hunk.lines[span.clone()]
                .iter()
                .filter(|l| l.is_change())
                .cloned()
                .collect();

            // Every context line seen so far in the hunk, even past an
            // earlier run
            let seen: Vec<&DiffLine> = hunk.lines[..span.start]
                .iter()
                .filter(|l| l.is_context())
                .collect();
            let context_before = seen[seen.len().saturating_sub(window)..]
                .iter()
                .map(|&l| l.clone())
                .collect();

            let context_after = hunk.lines[span.end..]
                .iter()
                .filter(|l| !l.is_marker())
                .take_while(|l| l.is_context())
                .take(window)
                .cloned()
                .collect();

            groups.push(ChangeGroup {
                index: groups.len() + 1,
                hunk_index: h + 1,
                span,
                lines,
                context_before,
                context_after,
            });
        }
    }

    log::debug!(
        "extracted {} change group(s) from {} hunk(s)",
        groups.len(),
        hunks.len()
    );
    groups
}
