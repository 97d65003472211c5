use std::fmt;
use std::sync::{Arc, LazyLock};

use super::file::PatchEntry;
use super::hunk::{PatchHunk, PatchHunkLine};
use super::parser::{self, ParseError};
use crate::syntax::{SyntaxKind, SyntaxTree, TreeBuilder};
use crate::text::SourceText;

static EMPTY: LazyLock<Arc<Patch>> = LazyLock::new(|| {
    let mut builder = TreeBuilder::default();
    builder.start_node(SyntaxKind::Patch);
    builder.finish_node();
    Arc::new(Patch {
        text: SourceText::default(),
        tree: builder.finish(),
        entries: Vec::new(),
    })
});

/// A parsed unified diff: the source text, its syntax tree and one
/// [`PatchEntry`] per file.
///
/// Patches are immutable. Selecting lines produces a new patch.
///
/// `==` compares text and structure. Entries compare by position, so use
/// [`Patch::matching_entry`] to find the same entry text in another patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    text: SourceText,
    tree: SyntaxTree,
    entries: Vec<PatchEntry>,
}

impl Patch {
    pub(crate) fn from_parts(text: SourceText, tree: SyntaxTree, entries: Vec<PatchEntry>) -> Self {
        Self {
            text,
            tree,
            entries,
        }
    }

    /// The shared patch with no text and no entries.
    #[must_use]
    pub fn empty() -> Arc<Patch> {
        Arc::clone(&EMPTY)
    }

    /// Parse the output of `git diff`.
    ///
    /// Empty input yields [`Patch::empty`].
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] locating the first malformed line.
    pub fn parse(text: &str) -> Result<Arc<Patch>, ParseError> {
        parser::parse(text)
    }

    /// Parse raw process output.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidUtf8`] for bytes that are not UTF-8,
    /// otherwise as [`Patch::parse`].
    pub fn parse_bytes(bytes: &[u8]) -> Result<Arc<Patch>, ParseError> {
        parser::parse_bytes(bytes)
    }

    #[must_use]
    pub fn text(&self) -> &SourceText {
        &self.text
    }

    #[must_use]
    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    #[must_use]
    pub fn entries(&self) -> &[PatchEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry that owns `line_index`, headers included.
    #[must_use]
    pub fn find_entry(&self, line_index: usize) -> Option<&PatchEntry> {
        let position = self
            .entries
            .partition_point(|entry| entry.first_line_index() <= line_index);
        let entry = self.entries.get(position.checked_sub(1)?)?;
        entry.contains_line(line_index).then_some(entry)
    }

    #[must_use]
    pub fn find_hunk(&self, line_index: usize) -> Option<&PatchHunk> {
        self.find_entry(line_index)?.find_hunk(line_index)
    }

    #[must_use]
    pub fn find_line(&self, line_index: usize) -> Option<&PatchHunkLine> {
        self.find_entry(line_index)?.find_line(line_index)
    }

    /// First added or deleted line after `line_index`.
    #[must_use]
    pub fn next_change(&self, line_index: usize) -> Option<usize> {
        self.change_lines().find(|&index| index > line_index)
    }

    /// Last added or deleted line before `line_index`.
    #[must_use]
    pub fn previous_change(&self, line_index: usize) -> Option<usize> {
        self.change_lines().take_while(|&index| index < line_index).last()
    }

    fn change_lines(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .flat_map(PatchEntry::hunks)
            .flat_map(PatchHunk::changes)
            .map(PatchHunkLine::line_index)
    }

    /// The exact source text of entry `index`, line terminators included.
    #[must_use]
    pub fn entry_text(&self, index: usize) -> Option<&str> {
        let entry = self.entries.get(index)?;
        Some(self.text.slice(self.tree.full_span(entry.node())))
    }

    /// The entry of `previous` whose text is byte-identical to entry `index`
    /// of this patch. Lets a caller carry per-entry state across re-parses.
    #[must_use]
    pub fn matching_entry<'a>(&self, index: usize, previous: &'a Patch) -> Option<&'a PatchEntry> {
        let text = self.entry_text(index)?;
        (0..previous.entries.len())
            .find(|&candidate| previous.entry_text(candidate) == Some(text))
            .and_then(|candidate| previous.entries.get(candidate))
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::with_capacity(self.text.len());
        self.tree.write_text(self.tree.root(), &self.text, &mut out);
        f.write_str(&out)
    }
}
