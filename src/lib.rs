use error_set::error_set;
use std::io::Write;
use std::process::{Command, Output, Stdio};

pub mod diff;
pub mod group;
pub mod parse;
pub mod patch;

pub use diff::file::DiffError;
pub use diff::{DiffLine, FileDiff, Hunk};
pub use group::{ChangeGroup, DEFAULT_CONTEXT, GroupFilter, LineMatcher};
pub use parse::{ParseError, Pattern, Selection};

error_set! {
    /// Top-level error for git-partial-stage operations
    PartialStageError := {
        DiffError(DiffError),
        ParseError(ParseError),
    } || GitCommandError

    /// Failures of the git subprocesses that read diffs and apply patches
    GitCommandError := {
        #[display("Could not run git {command}: {message}")]
        Io { command: String, message: String },
        #[display("git diff failed: {stderr}")]
        DiffExitError { stderr: String },
        #[display("git diff printed invalid UTF-8: {message}")]
        InvalidUtf8 { message: String },
        /// The patch was refused, usually because the index moved underneath
        #[display("git apply rejected the patch: {stderr}")]
        ApplyExitError { stderr: String },
    }
}

/// Which side of the index a patch moves changes across
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Working tree changes into the index
    Stage,
    /// Index changes back out, by reverse-applying against the index
    Unstage,
}

impl Direction {
    /// Whether the diff for this direction compares against the index
    pub fn cached(self) -> bool {
        matches!(self, Direction::Unstage)
    }
}

/// Result of a stage/unstage request that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The file has no changes on the relevant side
    NoChanges,
    /// The diff parsed but contains no change groups
    NoGroups,
    /// The selection resolved to no groups; nothing was applied
    NothingSelected,
    /// The listed groups were applied
    Applied(Vec<ChangeGroup>),
}

/// What `show` found in a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// The file has no changes on the inspected side
    NoChanges,
    /// The diff parsed but contains no change groups
    NoGroups,
    /// Groups left after filtering; empty when the filter matched nothing
    Groups(Vec<ChangeGroup>),
}

/// Main interface for git-partial-stage operations
pub struct PartialStager<'a> {
    repo_path: &'a str,
    context: usize,
}

impl<'a> PartialStager<'a> {
    /// Create a new PartialStager for the given repository path
    pub fn new(repo_path: &'a str) -> Self {
        Self {
            repo_path,
            context: DEFAULT_CONTEXT,
        }
    }

    /// Number of context lines attached to each group for display and grep
    #[must_use]
    pub fn with_context(mut self, context: usize) -> Self {
        self.context = context;
        self
    }

    /// Parse a file's diff and split it into change groups.
    ///
    /// `cached` selects the staged diff (index against HEAD) instead of the
    /// unstaged one (working tree against index).
    pub fn groups(
        &self,
        file: &str,
        cached: bool,
    ) -> Result<(FileDiff, Vec<ChangeGroup>), PartialStageError> {
        let diff = FileDiff::parse(&self.get_raw_diff(file, cached)?)?;
        let groups = group::extract_groups(&diff.hunks, self.context);
        log::debug!(
            "{}: {} hunk(s), {} group(s)",
            diff.path().unwrap_or(file),
            diff.hunks.len(),
            groups.len()
        );
        Ok((diff, groups))
    }

    /// List the change groups of a file, narrowed by `filter`
    ///
    /// # Examples
    /// ```no_run
    /// # use git_partial_stage::{GroupFilter, Listing, Pattern, PartialStager};
    /// let stager = PartialStager::new(".");
    /// let filter = GroupFilter { index: None, matcher: Some(Pattern::new("lightbox").unwrap()) };
    /// if let Listing::Groups(groups) = stager.show("src/app.js", false, &filter).unwrap() {
    ///     for group in &groups {
    ///         println!("{}", group.render(false));
    ///     }
    /// }
    /// ```
    pub fn show<M: LineMatcher>(
        &self,
        file: &str,
        cached: bool,
        filter: &GroupFilter<M>,
    ) -> Result<Listing, PartialStageError> {
        let (diff, groups) = self.groups(file, cached)?;
        if diff.is_empty() {
            return Ok(Listing::NoChanges);
        }
        if groups.is_empty() {
            return Ok(Listing::NoGroups);
        }
        Ok(Listing::Groups(filter.apply(groups)))
    }

    /// Stage the selected change groups of a file
    ///
    /// # Examples
    /// ```no_run
    /// # use git_partial_stage::{PartialStager, Selection};
    /// let stager = PartialStager::new(".");
    /// stager.stage("flake.nix", &Selection::from_args(Some("2,5,7-9"), None).unwrap()).unwrap();
    /// stager.stage("flake.nix", &Selection::from_args(None, Some("stylix")).unwrap()).unwrap();
    /// ```
    pub fn stage(&self, file: &str, selection: &Selection) -> Result<Outcome, PartialStageError> {
        self.transfer(file, selection, Direction::Stage)
    }

    /// Unstage the selected change groups of a file
    pub fn unstage(&self, file: &str, selection: &Selection) -> Result<Outcome, PartialStageError> {
        self.transfer(file, selection, Direction::Unstage)
    }

    /// Summary of everything currently staged (`git diff --cached --stat`)
    pub fn cached_stat(&self) -> Result<String, GitCommandError> {
        self.run_diff(&["--cached", "--stat"])
    }

    fn transfer(
        &self,
        file: &str,
        selection: &Selection,
        direction: Direction,
    ) -> Result<Outcome, PartialStageError> {
        let (diff, groups) = self.groups(file, direction.cached())?;
        self.apply_groups(&diff, groups, selection, direction)
    }

    /// Apply the selected groups of an already extracted diff.
    ///
    /// `diff` and `groups` come from [`PartialStager::groups`] with the
    /// `cached` flag matching `direction`. If the index moved since then,
    /// git refuses the whole patch and the index is left untouched.
    pub fn apply_groups(
        &self,
        diff: &FileDiff,
        groups: Vec<ChangeGroup>,
        selection: &Selection,
        direction: Direction,
    ) -> Result<Outcome, PartialStageError> {
        if diff.is_empty() {
            return Ok(Outcome::NoChanges);
        }
        if groups.is_empty() {
            return Ok(Outcome::NoGroups);
        }

        let selected = selection.resolve(&groups);
        if selected.is_empty() {
            return Ok(Outcome::NothingSelected);
        }

        let patch = match direction {
            Direction::Stage => patch::build_patch(diff, &groups, &selected),
            // The index already holds every staged group, so the ones left
            // alone must fall back to the new side of the cached diff
            Direction::Unstage => patch::select_groups(&diff.reversed(), &groups, &selected)
                .reversed()
                .to_string(),
        };
        log::info!(
            "{:?}: applying {} group(s){}",
            direction,
            selected.len(),
            diff.path().map(|p| format!(" from {}", p)).unwrap_or_default()
        );
        self.apply_patch(&patch, direction)?;

        Ok(Outcome::Applied(
            groups
                .into_iter()
                .filter(|g| selected.contains(&g.index))
                .collect(),
        ))
    }

    /// Get raw git diff output for a single file
    fn get_raw_diff(&self, file: &str, cached: bool) -> Result<String, GitCommandError> {
        let mut args = Vec::new();
        if cached {
            args.push("--cached");
        }
        args.extend(["--", file]);
        self.run_diff(&args)
    }

    fn run_diff(&self, extra: &[&str]) -> Result<String, GitCommandError> {
        let mut args = vec!["diff", "--no-ext-diff", "--no-color"];
        args.extend_from_slice(extra);

        let output = self.git(&args, None)?;
        if !output.status.success() {
            return Err(GitCommandError::DiffExitError {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        String::from_utf8(output.stdout).map_err(|e| GitCommandError::InvalidUtf8 {
            message: e.to_string(),
        })
    }

    /// Apply a patch to the index, in reverse when unstaging
    fn apply_patch(&self, patch: &str, direction: Direction) -> Result<(), GitCommandError> {
        let args: &[&str] = match direction {
            Direction::Stage => &["apply", "--cached", "-"],
            Direction::Unstage => &["apply", "--cached", "--reverse", "-"],
        };

        let output = self.git(args, Some(patch))?;
        if !output.status.success() {
            log::warn!("git apply rejected the patch:\n{}", patch);
            return Err(GitCommandError::ApplyExitError {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }

    /// Run git inside the repository, feeding `input` on stdin when given.
    ///
    /// A non-zero exit is not an error here; callers decide what it means.
    fn git(&self, args: &[&str], input: Option<&str>) -> Result<Output, GitCommandError> {
        let io_error = |e: std::io::Error| GitCommandError::Io {
            command: args.join(" "),
            message: e.to_string(),
        };

        let mut child = Command::new("git")
            .arg("-C")
            .arg(self.repo_path)
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(io_error)?;

        if let (Some(text), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(text.as_bytes()).map_err(io_error)?;
        }

        child.wait_with_output().map_err(io_error)
    }
}
