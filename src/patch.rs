//! Rebuild a unified diff that carries only a chosen subset of change groups.
//!
//! Within every hunk that owns at least one selected group:
//! - selected groups keep their additions and deletions;
//! - unselected groups fall back to the old file: deletions become context
//!   and additions disappear;
//! - the header counts are recomputed from the emitted lines, while the
//!   start positions are carried over unchanged.
//!
//! Hunks without a selected group are left out. Forward application locates
//! hunks by the old side, which is the unmodified base, so carrying the
//! starts over is exact. To take groups back out of a target that already
//! holds every change, select from [`FileDiff::reversed`] and reverse the
//! result again: unselected groups then fall back to the new file instead.

use crate::diff::{DiffLine, FileDiff, Hunk, HunkRange};
use crate::group::ChangeGroup;
use std::collections::BTreeSet;

/// Build a patch containing only the `selected` groups.
///
/// `groups` must be the output of [`crate::group::extract_groups`] for
/// `diff`; their recorded spans decide which hunk lines belong to which
/// group. Returns an empty string when nothing in `selected` names a group.
pub fn build_patch(diff: &FileDiff, groups: &[ChangeGroup], selected: &BTreeSet<usize>) -> String {
    let subset = select_groups(diff, groups, selected);
    if subset.is_empty() {
        return String::new();
    }
    subset.to_string()
}

/// The diff restricted to the `selected` groups, header kept.
///
/// Has no hunks when nothing in `selected` names a group.
pub fn select_groups(
    diff: &FileDiff,
    groups: &[ChangeGroup],
    selected: &BTreeSet<usize>,
) -> FileDiff {
    let hunks: Vec<Hunk> = diff
        .hunks
        .iter()
        .enumerate()
        .filter_map(|(i, hunk)| {
            let owned: Vec<&ChangeGroup> =
                groups.iter().filter(|g| g.hunk_index == i + 1).collect();
            owned
                .iter()
                .any(|g| selected.contains(&g.index))
                .then(|| rebuild_hunk(hunk, &owned, selected))
        })
        .collect();

    log::debug!(
        "kept {} of {} hunk(s) for {} selected group(s)",
        hunks.len(),
        diff.hunks.len(),
        selected.len()
    );

    FileDiff {
        header: diff.header.clone(),
        hunks,
    }
}

/// Where the emitter is within a hunk's line sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Context,
    Run { selected: bool, end: usize },
}

/// Accumulates the rebuilt hunk body and its running line numbers.
///
/// Rejected deletions turn into context, so the new side can run past the
/// numbers the parser checked; the counters saturate there since only the
/// header starts and counts reach the rendered patch.
struct HunkEmitter {
    lines: Vec<DiffLine>,
    old_line: u32,
    new_line: u32,
    old_count: u32,
    new_count: u32,
    /// Whether the most recent non-marker line made it into the output
    last_kept: bool,
}

impl HunkEmitter {
    fn new(hunk: &Hunk) -> Self {
        Self {
            lines: Vec::with_capacity(hunk.lines.len()),
            old_line: hunk.old.start,
            new_line: hunk.new.start,
            old_count: 0,
            new_count: 0,
            last_kept: false,
        }
    }

    fn context(&mut self, content: &str) {
        self.lines.push(DiffLine::Context {
            old_line: self.old_line,
            new_line: self.new_line,
            content: content.to_string(),
        });
        self.old_line = self.old_line.saturating_add(1);
        self.new_line = self.new_line.saturating_add(1);
        self.old_count += 1;
        self.new_count += 1;
        self.last_kept = true;
    }

    fn delete(&mut self, content: &str) {
        self.lines.push(DiffLine::Delete {
            old_line: self.old_line,
            content: content.to_string(),
        });
        self.old_line = self.old_line.saturating_add(1);
        self.old_count += 1;
        self.last_kept = true;
    }

    fn add(&mut self, content: &str) {
        self.lines.push(DiffLine::Add {
            new_line: self.new_line,
            content: content.to_string(),
        });
        self.new_line = self.new_line.saturating_add(1);
        self.new_count += 1;
        self.last_kept = true;
    }

    fn drop_line(&mut self) {
        self.last_kept = false;
    }

    /// A no-newline marker follows the fate of the line it annotates
    fn marker(&mut self, marker: &str) {
        if self.last_kept {
            self.lines.push(DiffLine::NoNewline {
                marker: marker.to_string(),
            });
        }
    }

    fn emit(&mut self, line: &DiffLine, state: State) {
        match (line, state) {
            (DiffLine::NoNewline { marker }, _) => self.marker(marker),
            (DiffLine::Context { content, .. }, _) => self.context(content),
            (DiffLine::Delete { content, .. }, State::Run { selected: true, .. }) => {
                self.delete(content)
            }
            (DiffLine::Add { content, .. }, State::Run { selected: true, .. }) => self.add(content),
            // Rejected deletion: the line is still present in the base
            (DiffLine::Delete { content, .. }, _) => self.context(content),
            // Rejected addition: never existed in the base
            (DiffLine::Add { .. }, _) => self.drop_line(),
        }
    }

    fn finish(self, hunk: &Hunk) -> Hunk {
        Hunk {
            old: HunkRange {
                start: hunk.old.start,
                count: self.old_count,
            },
            new: HunkRange {
                start: hunk.new.start,
                count: self.new_count,
            },
            trailer: hunk.trailer.clone(),
            lines: self.lines,
        }
    }
}

/// Re-emit one hunk, accepting or rejecting each of its change runs
fn rebuild_hunk(hunk: &Hunk, owned: &[&ChangeGroup], selected: &BTreeSet<usize>) -> Hunk {
    let mut emitter = HunkEmitter::new(hunk);
    let mut runs = owned.iter().peekable();
    let mut state = State::Context;

    for (i, line) in hunk.lines.iter().enumerate() {
        if state == State::Context
            && let Some(group) = runs.next_if(|g| g.span.start == i)
        {
            state = State::Run {
                selected: selected.contains(&group.index),
                end: group.span.end,
            };
        }

        emitter.emit(line, state);

        if let State::Run { end, .. } = state
            && i + 1 == end
        {
            state = State::Context;
        }
    }

    emitter.finish(hunk)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::group::extract_groups;
    use crate::parse::{Selector, parse_selector, resolve};
    use similar_asserts::assert_eq;

    const HEADER: &str = "diff --git a/f b/f\nindex 1111111..2222222 100644\n--- a/f\n+++ b/f\n";

    fn build(text: &str, selected: &[usize]) -> String {
        let diff = FileDiff::parse(text).unwrap();
        let groups = extract_groups(&diff.hunks, 3);
        build_patch(&diff, &groups, &selected.iter().copied().collect())
    }

    #[test]
    fn selected_group_reproduces_hunk() {
        let text = format!("{HEADER}@@ -1,3 +1,4 @@\n a\n-b\n+x\n+y\n c\n");
        assert_eq!(build(&text, &[1]), text);
    }

    #[test]
    fn deselected_group_reverts_to_context() {
        let text = format!(
            "{HEADER}@@ -1,3 +1,4 @@\n a\n-b\n+x\n+y\n c\n@@ -20 +21 @@\n-p\n+q\n"
        );
        assert_eq!(
            build(&text, &[2]),
            format!("{HEADER}@@ -20 +21 @@\n-p\n+q\n")
        );

        // Force the first hunk to be emitted while its only group is rejected
        let diff = FileDiff::parse(&text).unwrap();
        let groups = extract_groups(&diff.hunks, 3);
        let hunk = rebuild_hunk(&diff.hunks[0], &[&groups[0]], &BTreeSet::new());
        assert_eq!(hunk.to_string(), "@@ -1,3 +1,3 @@\n a\n b\n c\n");
    }

    #[test]
    fn select_first_of_two_groups_in_hunk() {
        let text = format!("{HEADER}@@ -1,6 +1,6 @@\n p\n-q\n+Q\n r\n s\n-t\n+T\n u\n");
        assert_eq!(
            build(&text, &[1]),
            format!("{HEADER}@@ -1,6 +1,6 @@\n p\n-q\n+Q\n r\n s\n t\n u\n")
        );
        assert_eq!(
            build(&text, &[2]),
            format!("{HEADER}@@ -1,6 +1,6 @@\n p\n q\n r\n s\n-t\n+T\n u\n")
        );
    }

    #[test]
    fn rejected_pure_addition_shrinks_new_count() {
        let text = format!("{HEADER}@@ -1,4 +1,6 @@\n a\n+new 1\n b\n c\n+new 2\n d\n");
        assert_eq!(
            build(&text, &[2]),
            format!("{HEADER}@@ -1,4 +1,5 @@\n a\n b\n c\n+new 2\n d\n")
        );
    }

    #[test]
    fn rejected_pure_deletion_becomes_context() {
        let text = format!("{HEADER}@@ -1,5 +1,3 @@\n a\n-gone 1\n b\n-gone 2\n c\n");
        assert_eq!(
            build(&text, &[1]),
            format!("{HEADER}@@ -1,5 +1,4 @@\n a\n-gone 1\n b\n gone 2\n c\n")
        );
    }

    #[test]
    fn selecting_from_reversed_diff_keeps_new_side() {
        let text = format!("{HEADER}@@ -1,6 +1,6 @@\n p\n-q\n+Q\n r\n s\n-t\n+T\n u\n");
        let diff = FileDiff::parse(&text).unwrap();
        let groups = extract_groups(&diff.hunks, 3);

        let inverse = diff.reversed();
        let subset = select_groups(&inverse, &groups, &BTreeSet::from([1])).reversed();
        assert_eq!(
            subset.to_string(),
            format!("{HEADER}@@ -1,6 +1,6 @@\n p\n-q\n+Q\n r\n s\n T\n u\n")
        );
    }

    #[test]
    fn rejected_deletion_at_highest_new_line_does_not_overflow() {
        let diff = FileDiff::parse("@@ -10,2 +4294967295,0 @@\n-a\n-b\n").unwrap();
        let groups = extract_groups(&diff.hunks, 3);
        let hunk = rebuild_hunk(&diff.hunks[0], &[&groups[0]], &BTreeSet::new());
        assert_eq!(hunk.to_string(), "@@ -10,2 +4294967295,2 @@\n a\n b\n");
    }

    #[test]
    fn empty_selection_builds_nothing() {
        let text = format!("{HEADER}@@ -1,3 +1,4 @@\n a\n-b\n+x\n+y\n c\n");
        assert_eq!(build(&text, &[]), "");
        assert_eq!(build(&text, &[7]), "");
    }

    #[test]
    fn unselected_hunks_are_omitted_and_order_kept() {
        let text = format!(
            "{HEADER}@@ -1,2 +1,2 @@ one\n-a\n+A\n k\n@@ -10,2 +10,2 @@ two\n k\n-b\n+B\n@@ -30 +30 @@ three\n-c\n+C\n"
        );
        assert_eq!(
            build(&text, &[3, 1]),
            format!("{HEADER}@@ -1,2 +1,2 @@ one\n-a\n+A\n k\n@@ -30 +30 @@ three\n-c\n+C\n")
        );
    }

    #[test]
    fn trailing_marker_follows_rejected_addition() {
        // Old file ends with "b\n"; new file ends with "b2" and no newline
        let text = format!(
            "{HEADER}@@ -1,2 +1,2 @@\n a\n-b\n+b2\n\\ No newline at end of file\n"
        );
        let diff = FileDiff::parse(&text).unwrap();
        let groups = extract_groups(&diff.hunks, 3);
        assert_eq!(groups.len(), 1);

        let hunk = rebuild_hunk(&diff.hunks[0], &[&groups[0]], &BTreeSet::new());
        assert_eq!(hunk.to_string(), "@@ -1,2 +1,2 @@\n a\n b\n");

        assert_eq!(build(&text, &[1]), text);
    }

    #[test]
    fn marker_kept_on_rejected_deletion() {
        // Old file ends with "b" and no newline; new file appends "c"
        let text = format!(
            "{HEADER}@@ -1,2 +1,3 @@\n a\n-b\n\\ No newline at end of file\n+b\n+c\n"
        );
        let diff = FileDiff::parse(&text).unwrap();
        let groups = extract_groups(&diff.hunks, 3);

        let hunk = rebuild_hunk(&diff.hunks[0], &[&groups[0]], &BTreeSet::new());
        assert_eq!(
            hunk.to_string(),
            "@@ -1,2 +1,2 @@\n a\n b\n\\ No newline at end of file\n"
        );
        assert_eq!(build(&text, &[1]), text);
    }

    #[test]
    fn marker_after_context_is_kept() {
        let text = format!(
            "{HEADER}@@ -1,2 +1,3 @@\n-a\n+A\n+A2\n z\n\\ No newline at end of file\n"
        );
        assert_eq!(build(&text, &[1]), text);
    }

    #[test]
    fn output_reparses_with_consistent_counts() {
        let text = format!(
            "{HEADER}@@ -1,6 +1,6 @@ fn\n p\n-q\n+Q\n+Q2\n r\n s\n-t\n u\n@@ -40,3 +41,3 @@\n x\n-y\n+Y\n z\n"
        );
        for selected in [vec![1], vec![2], vec![3], vec![1, 3], vec![2, 3], vec![1, 2, 3]] {
            let patch = build(&text, &selected);
            let reparsed = FileDiff::parse(&patch).unwrap();
            for hunk in &reparsed.hunks {
                assert_eq!(hunk.replayed_counts(), (hunk.old.count, hunk.new.count));
            }
        }
    }

    #[test]
    fn all_equals_full_range() {
        let text = format!("{HEADER}@@ -1,6 +1,6 @@\n p\n-q\n+Q\n r\n s\n-t\n+T\n u\n");
        let diff = FileDiff::parse(&text).unwrap();
        let groups = extract_groups(&diff.hunks, 3);

        let all = resolve(&parse_selector("all").unwrap(), groups.len());
        let range = resolve(&[Selector::Range(1, groups.len())], groups.len());
        assert_eq!(all, range);
        assert_eq!(build_patch(&diff, &groups, &all), text);
    }
}
