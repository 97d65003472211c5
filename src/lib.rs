use error_set::error_set;
use log::debug;
use std::collections::BTreeSet;
use std::sync::Arc;

pub mod diff;
pub mod parse;
mod patch;
pub mod syntax;
pub mod text;

pub use diff::{ChangeKind, ParseError, Patch};
pub use parse::{FileLineRefs, LineRef, RefError, parse_file_refs, parse_line_numbers};
pub use patch::{PatchDirection, select_hunk, select_lines};

error_set! {
    /// Top-level error for patch-stager operations
    PatchStagerError := {
        #[display("The diff contains no changes")]
        EmptyDiff,
        #[display("Nothing to {direction}: no added or deleted lines selected")]
        NothingToApply { direction: PatchDirection },
        ParseError(ParseError),
        RefError(RefError),
    } || InputError

    /// I/O errors of the command line front end
    InputError := {
        #[display("Failed to read {path}: {message}")]
        ReadFailed { path: String, message: String },
        #[display("Failed to write output: {message}")]
        WriteFailed { message: String },
    }
}

/// Selects changes from one parsed diff.
///
/// # Examples
/// ```
/// # use patch_stager::{PatchDirection, Stager};
/// let diff = "\
/// diff --git a/flake.nix b/flake.nix
/// --- a/flake.nix
/// +++ b/flake.nix
/// @@ -137 +137,2 @@
/// -old
/// +new
/// +newer
/// ";
/// let stager = Stager::parse(diff).unwrap();
/// let staged = stager.stage("flake.nix:137").unwrap();
/// assert!(staged.to_string().ends_with("@@ -137 +137,2 @@\n old\n+new\n"));
/// ```
#[derive(Debug, Clone)]
pub struct Stager {
    patch: Arc<Patch>,
    whole_hunks: bool,
}

impl Stager {
    /// Parse diff text.
    pub fn parse(text: &str) -> Result<Self, PatchStagerError> {
        Ok(Self::new(Patch::parse(text)?))
    }

    /// Parse raw diff output, which must be UTF-8.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, PatchStagerError> {
        Ok(Self::new(Patch::parse_bytes(bytes)?))
    }

    pub fn new(patch: Arc<Patch>) -> Self {
        Self {
            patch,
            whole_hunks: false,
        }
    }

    /// Widen every selection to the hunks it touches.
    #[must_use]
    pub fn whole_hunks(mut self, whole_hunks: bool) -> Self {
        self.whole_hunks = whole_hunks;
        self
    }

    pub fn patch(&self) -> &Arc<Patch> {
        &self.patch
    }

    /// Patch staging the lines named by a `file:refs` reference.
    pub fn stage(&self, file_ref: &str) -> Result<Arc<Patch>, PatchStagerError> {
        self.select_refs(&[parse::parse_file_refs(file_ref)?], PatchDirection::Stage)
    }

    /// Patch unstaging the lines named by a `file:refs` reference.
    pub fn unstage(&self, file_ref: &str) -> Result<Arc<Patch>, PatchStagerError> {
        self.select_refs(&[parse::parse_file_refs(file_ref)?], PatchDirection::Unstage)
    }

    /// Patch discarding the lines named by a `file:refs` reference.
    pub fn discard(&self, file_ref: &str) -> Result<Arc<Patch>, PatchStagerError> {
        self.select_refs(&[parse::parse_file_refs(file_ref)?], PatchDirection::Discard)
    }

    /// Select the lines of several files at once.
    pub fn select_refs(
        &self,
        refs: &[FileLineRefs],
        direction: PatchDirection,
    ) -> Result<Arc<Patch>, PatchStagerError> {
        let mut indices = Vec::new();
        for file_refs in refs {
            indices.extend(file_refs.resolve(&self.patch)?);
        }
        self.select(&indices, direction)
    }

    /// Select by 1-based diff line numbers (`N,N..M`).
    pub fn select_line_numbers(
        &self,
        lines: &str,
        direction: PatchDirection,
    ) -> Result<Arc<Patch>, PatchStagerError> {
        self.select(&parse::parse_line_numbers(lines)?, direction)
    }

    /// Select by 0-based line indices of the diff text.
    pub fn select(
        &self,
        line_indices: &[usize],
        direction: PatchDirection,
    ) -> Result<Arc<Patch>, PatchStagerError> {
        if self.patch.is_empty() {
            return Err(PatchStagerError::EmptyDiff);
        }

        let selection = if self.whole_hunks {
            self.hunk_changes(line_indices)
        } else {
            line_indices.to_vec()
        };

        select_lines(&self.patch, &selection, direction)?
            .ok_or(PatchStagerError::NothingToApply { direction })
    }

    /// Every change line in the hunks containing `line_indices`.
    fn hunk_changes(&self, line_indices: &[usize]) -> Vec<usize> {
        let hunks: BTreeSet<usize> = line_indices
            .iter()
            .filter_map(|&index| self.patch.find_hunk(index))
            .map(|hunk| hunk.first_line_index())
            .collect();
        debug!("selection widened to {} hunks", hunks.len());

        hunks
            .into_iter()
            .filter_map(|first| self.patch.find_hunk(first))
            .flat_map(|hunk| hunk.changes().map(|line| line.line_index()))
            .collect()
    }
}
