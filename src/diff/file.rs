use super::{DiffLine, Hunk};
use error_set::error_set;
use std::fmt;

error_set! {
    /// The diff text violates the unified diff grammar
    DiffError := {
        /// Non-empty input without a single hunk header
        #[display("No hunks found in diff input")]
        NoHunks,
        /// A line starting with `@@` that is not a valid hunk header
        #[display("Invalid hunk header at line {line_number}: '{line}'")]
        InvalidHunkHeader { line_number: usize, line: String },
        /// A line inside a hunk without a `+`, `-`, ` ` or `\` prefix
        #[display("Unexpected line {line_number} inside hunk: '{line}'")]
        UnexpectedLine { line_number: usize, line: String },
        /// Replaying the hunk body runs past the largest representable line
        #[display("Line number overflow at line {line_number}")]
        LineNumberOverflow { line_number: usize },
        /// Replaying the hunk body disagrees with its header
        #[display("Hunk '{header}' declares {expected_old} old/{expected_new} new lines but contains {actual_old}/{actual_new}")]
        CountMismatch {
            header: String,
            expected_old: u32,
            actual_old: u32,
            expected_new: u32,
            actual_new: u32,
        },
    }
}

/// A parsed diff for a single file.
///
/// Holds everything before the first hunk verbatim (the `diff --git`,
/// `index`, mode and `---`/`+++` lines) followed by the hunks in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDiff {
    /// Lines preceding the first hunk, joined with `\n`, no trailing newline
    pub header: String,
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    /// Parse a single-file unified diff.
    ///
    /// Empty (or whitespace-only) input means "no changes" and yields an
    /// empty `FileDiff`. Line numbers are assigned by replaying the counters
    /// of each hunk header, and every hunk is checked against its declared
    /// counts.
    ///
    /// ```
    /// use git_partial_stage::diff::{DiffLine, FileDiff};
    ///
    /// let diff = FileDiff::parse("--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n a\n-b\n+c\n").unwrap();
    /// assert_eq!(diff.header, "--- a/f\n+++ b/f");
    /// assert_eq!(
    ///     diff.hunks[0].lines[2],
    ///     DiffLine::Add { new_line: 2, content: "c".to_string() }
    /// );
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`DiffError`] if a hunk header is malformed, a hunk contains
    /// an unclassifiable line or disagrees with its header counts, or
    /// non-empty input has no hunks at all.
    pub fn parse(text: &str) -> Result<Self, DiffError> {
        if text.trim().is_empty() {
            return Ok(FileDiff::default());
        }

        let mut header = Vec::new();
        let mut hunks: Vec<Hunk> = Vec::new();
        let mut old_line = 0u32;
        let mut new_line = 0u32;

        // Split on '\n' only so that a '\r' belonging to the content survives
        for (i, line) in text.split_terminator('\n').enumerate() {
            let line_number = i + 1;

            if line.starts_with("@@") {
                if let Some(previous) = hunks.last() {
                    check_counts(previous)?;
                }
                let hunk = Hunk::parse_header(line).ok_or_else(|| DiffError::InvalidHunkHeader {
                    line_number,
                    line: line.to_string(),
                })?;
                old_line = hunk.old.start;
                new_line = hunk.new.start;
                hunks.push(hunk);
                continue;
            }

            let Some(hunk) = hunks.last_mut() else {
                header.push(line);
                continue;
            };

            let overflow = || DiffError::LineNumberOverflow { line_number };
            let parsed = if let Some(content) = line.strip_prefix('+') {
                DiffLine::Add {
                    new_line: advance(&mut new_line).ok_or_else(overflow)?,
                    content: content.to_string(),
                }
            } else if let Some(content) = line.strip_prefix('-') {
                DiffLine::Delete {
                    old_line: advance(&mut old_line).ok_or_else(overflow)?,
                    content: content.to_string(),
                }
            } else if let Some(content) = line.strip_prefix(' ') {
                DiffLine::Context {
                    old_line: advance(&mut old_line).ok_or_else(overflow)?,
                    new_line: advance(&mut new_line).ok_or_else(overflow)?,
                    content: content.to_string(),
                }
            } else if line.starts_with('\\') {
                DiffLine::NoNewline {
                    marker: line.to_string(),
                }
            } else {
                return Err(DiffError::UnexpectedLine {
                    line_number,
                    line: line.to_string(),
                });
            };
            hunk.lines.push(parsed);
        }

        let Some(last) = hunks.last() else {
            return Err(DiffError::NoHunks);
        };
        check_counts(last)?;

        Ok(FileDiff {
            header: header.join("\n"),
            hunks,
        })
    }

    /// True when the diff carries no hunks, i.e. there is nothing to stage
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// The inverse diff, taking the new version back to the old one.
    ///
    /// The header is kept as is; only hunks are inverted.
    #[must_use]
    pub fn reversed(&self) -> Self {
        FileDiff {
            header: self.header.clone(),
            hunks: self.hunks.iter().map(Hunk::reversed).collect(),
        }
    }

    /// File path from the `+++ b/path` header, falling back to `--- a/path`
    /// for deletions
    pub fn path(&self) -> Option<&str> {
        let lines = || self.header.lines();
        lines()
            .find_map(|line| line.strip_prefix("+++ b/"))
            .or_else(|| lines().find_map(|line| line.strip_prefix("--- a/")))
            .filter(|p| !p.is_empty())
    }
}

/// Hand out the current line number and move the counter past it
fn advance(counter: &mut u32) -> Option<u32> {
    let current = *counter;
    *counter = current.checked_add(1)?;
    Some(current)
}

fn check_counts(hunk: &Hunk) -> Result<(), DiffError> {
    let (actual_old, actual_new) = hunk.replayed_counts();
    if actual_old == hunk.old.count && actual_new == hunk.new.count {
        return Ok(());
    }
    Err(DiffError::CountMismatch {
        header: hunk.header(),
        expected_old: hunk.old.count,
        actual_old,
        expected_new: hunk.new.count,
        actual_new,
    })
}

impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.header.is_empty() {
            writeln!(f, "{}", self.header)?;
        }
        for hunk in &self.hunks {
            write!(f, "{}", hunk)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::diff::HunkRange;
    use similar_asserts::assert_eq;

    const TWO_HUNKS: &str = r#"diff --git a/config.nix b/config.nix
index fa2da6e..41114ff 100644
--- a/config.nix
+++ b/config.nix
@@ -1,4 +1,4 @@ header
 line 1
-line 2
+LINE 2
 line 3
 line 4
@@ -8,3 +8,4 @@ line 7
 line 8
+# INSERTED
 line 9
 line 10
"#;

    #[test]
    fn parse_empty_input_means_no_changes() {
        assert!(FileDiff::parse("").unwrap().is_empty());
        assert!(FileDiff::parse("\n  \n").unwrap().is_empty());
    }

    #[test]
    fn parse_keeps_header_verbatim() {
        let diff = FileDiff::parse(TWO_HUNKS).unwrap();
        assert_eq!(
            diff.header,
            "diff --git a/config.nix b/config.nix\nindex fa2da6e..41114ff 100644\n--- a/config.nix\n+++ b/config.nix"
        );
        assert_eq!(diff.path(), Some("config.nix"));
    }

    #[test]
    fn parse_assigns_line_numbers_by_replay() {
        let diff = FileDiff::parse(TWO_HUNKS).unwrap();
        assert_eq!(diff.hunks.len(), 2);

        let first = &diff.hunks[0];
        assert_eq!(first.old, HunkRange { start: 1, count: 4 });
        assert_eq!(first.trailer, " header");
        assert_eq!(
            first.lines[1],
            DiffLine::Delete {
                old_line: 2,
                content: "line 2".to_string()
            }
        );
        assert_eq!(
            first.lines[2],
            DiffLine::Add {
                new_line: 2,
                content: "LINE 2".to_string()
            }
        );
        assert_eq!(
            first.lines[3],
            DiffLine::Context {
                old_line: 3,
                new_line: 3,
                content: "line 3".to_string()
            }
        );

        // Counters restart from the second header
        let second = &diff.hunks[1];
        assert_eq!(
            second.lines[1],
            DiffLine::Add {
                new_line: 9,
                content: "# INSERTED".to_string()
            }
        );
        assert_eq!(
            second.lines[3],
            DiffLine::Context {
                old_line: 10,
                new_line: 11,
                content: "line 10".to_string()
            }
        );
    }

    #[test]
    fn parse_no_newline_marker_has_no_line_numbers() {
        let text = "--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n a\n-b\n\\ No newline at end of file\n+b\n";
        let diff = FileDiff::parse(text).unwrap();
        let marker = &diff.hunks[0].lines[2];
        assert!(marker.is_marker());
        assert_eq!(marker.content(), "\\ No newline at end of file");
        assert_eq!((marker.old_line(), marker.new_line()), (None, None));
        assert_eq!(
            diff.hunks[0].lines[3],
            DiffLine::Add {
                new_line: 2,
                content: "b".to_string()
            }
        );
    }

    #[test]
    fn parse_preserves_carriage_returns() {
        let text = "--- a/f\n+++ b/f\n@@ -1 +1 @@\n-old\r\n+new\r\n";
        let diff = FileDiff::parse(text).unwrap();
        assert_eq!(diff.hunks[0].lines[0].content(), "old\r");
        assert_eq!(diff.to_string(), text);
    }

    #[test]
    fn parse_bare_hunk_without_header() {
        let diff = FileDiff::parse("@@ -3 +3 @@\n-x\n+y\n").unwrap();
        assert_eq!(diff.header, "");
        assert_eq!(diff.path(), None);
        assert_eq!(diff.to_string(), "@@ -3 +3 @@\n-x\n+y\n");
    }

    #[test]
    fn parse_deleted_file_path_from_old_side() {
        let text = "--- a/gone.txt\n+++ /dev/null\n@@ -1 +0,0 @@\n-bye\n";
        assert_eq!(FileDiff::parse(text).unwrap().path(), Some("gone.txt"));
    }

    #[test]
    fn parse_rejects_text_without_hunks() {
        let result = FileDiff::parse("just some text\nwith no diff in it\n");
        assert!(matches!(result, Err(DiffError::NoHunks)));

        let result = FileDiff::parse("diff --git a/x b/x\nBinary files a/x and b/x differ\n");
        assert!(matches!(result, Err(DiffError::NoHunks)));
    }

    #[test]
    fn parse_rejects_bad_header() {
        let result = FileDiff::parse("--- a/f\n+++ b/f\n@@ -x +1 @@\n+a\n");
        assert!(matches!(
            result,
            Err(DiffError::InvalidHunkHeader { line_number: 3, .. })
        ));
    }

    #[test]
    fn parse_rejects_unprefixed_line() {
        let result = FileDiff::parse("--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n a\nbogus\n");
        assert!(matches!(
            result,
            Err(DiffError::UnexpectedLine { line_number: 5, .. })
        ));
    }

    #[test]
    fn parse_rejects_count_mismatch() {
        let result = FileDiff::parse("--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+c\n");
        assert!(matches!(
            result,
            Err(DiffError::CountMismatch {
                expected_old: 3,
                actual_old: 2,
                ..
            })
        ));
    }

    #[test]
    fn parse_rejects_count_mismatch_in_earlier_hunk() {
        let text = "@@ -1,2 +1,2 @@\n a\n@@ -9 +9 @@\n-x\n+y\n";
        assert!(matches!(
            FileDiff::parse(text),
            Err(DiffError::CountMismatch { .. })
        ));
    }

    #[test]
    fn parse_rejects_line_number_overflow() {
        let result = FileDiff::parse("@@ -4294967295 +4294967295 @@\n x\n");
        assert!(matches!(
            result,
            Err(DiffError::LineNumberOverflow { line_number: 2 })
        ));

        let result = FileDiff::parse("@@ -1 +4294967295,2 @@\n-a\n+b\n+c\n");
        assert!(matches!(
            result,
            Err(DiffError::LineNumberOverflow { line_number: 3 })
        ));
    }

    #[test]
    fn render_round_trips_parsed_diff() {
        let diff = FileDiff::parse(TWO_HUNKS).unwrap();
        assert_eq!(diff.to_string(), TWO_HUNKS);
    }
}
