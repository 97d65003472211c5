use std::fmt;

use crate::syntax::{NodeId, SyntaxKind};
use crate::text::{SourceText, TextLine};

/// One side of a hunk header: `start[,length]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LineRange {
    pub start: u32,
    pub length: u32,
}

impl fmt::Display for LineRange {
    /// A length of exactly one is left implicit, as git does.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.length == 1 {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{},{}", self.start, self.length)
        }
    }
}

/// The `@@ -old +new @@ function` line opening a hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkHeader {
    pub(crate) node: NodeId,
    pub(crate) line_index: usize,
    pub(crate) old: LineRange,
    pub(crate) new: LineRange,
    pub(crate) function: Option<String>,
}

impl HunkHeader {
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[must_use]
    pub fn line_index(&self) -> usize {
        self.line_index
    }

    #[must_use]
    pub fn old(&self) -> LineRange {
        self.old
    }

    #[must_use]
    pub fn new(&self) -> LineRange {
        self.new
    }

    /// Function context git prints after the closing `@@`, if any.
    #[must_use]
    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HunkLineKind {
    Context,
    Added,
    Deleted,
    /// `\ No newline at end of file`, qualifying the line before it.
    NoFinalLineBreak,
}

impl HunkLineKind {
    /// Classify a hunk line by its first byte. An empty line is context
    /// whose leading space was trimmed away.
    #[must_use]
    pub fn from_line(text: &str) -> Option<Self> {
        match text.as_bytes().first() {
            None | Some(b' ') => Some(Self::Context),
            Some(b'+') => Some(Self::Added),
            Some(b'-') => Some(Self::Deleted),
            Some(b'\\') => Some(Self::NoFinalLineBreak),
            Some(_) => None,
        }
    }

    #[must_use]
    pub const fn syntax_kind(self) -> SyntaxKind {
        match self {
            Self::Context => SyntaxKind::ContextLine,
            Self::Added => SyntaxKind::AddedLine,
            Self::Deleted => SyntaxKind::DeletedLine,
            Self::NoFinalLineBreak => SyntaxKind::NoFinalLineBreakLine,
        }
    }

    #[must_use]
    pub const fn marker_kind(self) -> SyntaxKind {
        match self {
            Self::Context => SyntaxKind::ContextMarkerToken,
            Self::Added => SyntaxKind::AddedMarkerToken,
            Self::Deleted => SyntaxKind::DeletedMarkerToken,
            Self::NoFinalLineBreak => SyntaxKind::BackslashToken,
        }
    }

    #[must_use]
    pub const fn is_change(self) -> bool {
        matches!(self, Self::Added | Self::Deleted)
    }
}

/// A single line inside a hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchHunkLine {
    pub(crate) node: NodeId,
    pub(crate) kind: HunkLineKind,
    pub(crate) line_index: usize,
    pub(crate) line: TextLine,
}

impl PatchHunkLine {
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[must_use]
    pub fn kind(&self) -> HunkLineKind {
        self.kind
    }

    #[must_use]
    pub fn is_change(&self) -> bool {
        self.kind.is_change()
    }

    /// Index of this line in the patch's source text.
    #[must_use]
    pub fn line_index(&self) -> usize {
        self.line_index
    }

    #[must_use]
    pub fn text_line(&self) -> &TextLine {
        &self.line
    }

    /// The line text after its marker, without the terminator.
    #[must_use]
    pub fn content<'a>(&self, source: &'a SourceText) -> &'a str {
        let text = source.slice(self.line.span());
        text.get(1..).unwrap_or_default()
    }
}

/// One `@@`-delimited block of lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchHunk {
    pub(crate) node: NodeId,
    pub(crate) header: HunkHeader,
    pub(crate) lines: Vec<PatchHunkLine>,
}

impl PatchHunk {
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[must_use]
    pub fn header(&self) -> &HunkHeader {
        &self.header
    }

    #[must_use]
    pub fn lines(&self) -> &[PatchHunkLine] {
        &self.lines
    }

    /// Added and deleted lines only.
    pub fn changes(&self) -> impl Iterator<Item = &PatchHunkLine> {
        self.lines.iter().filter(|line| line.is_change())
    }

    #[must_use]
    pub fn first_line_index(&self) -> usize {
        self.header.line_index
    }

    #[must_use]
    pub fn last_line_index(&self) -> usize {
        self.lines
            .last()
            .map_or(self.header.line_index, |line| line.line_index)
    }

    /// True for the header line and every hunk line.
    #[must_use]
    pub fn contains_line(&self, line_index: usize) -> bool {
        (self.first_line_index()..=self.last_line_index()).contains(&line_index)
    }

    /// The hunk line at `line_index`. The header is not a hunk line.
    #[must_use]
    pub fn find_line(&self, line_index: usize) -> Option<&PatchHunkLine> {
        let offset = line_index.checked_sub(self.header.line_index + 1)?;
        self.lines.get(offset)
    }

    /// Old-side and new-side line counts implied by the hunk content.
    #[must_use]
    pub fn content_lengths(&self) -> (u32, u32) {
        self.lines
            .iter()
            .fold((0, 0), |(old, new), line| match line.kind {
                HunkLineKind::Context => (old + 1, new + 1),
                HunkLineKind::Deleted => (old + 1, new),
                HunkLineKind::Added => (old, new + 1),
                HunkLineKind::NoFinalLineBreak => (old, new),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::diff::Patch;

    const DIFF: &str = "diff --git a/notes.txt b/notes.txt
--- a/notes.txt
+++ b/notes.txt
@@ -3,4 +3,3 @@ section
 alpha
-beta
-gamma
+delta

@@ -20,0 +20 @@
+tail
\\ No newline at end of file
";

    #[test]
    fn line_range_omits_length_of_one() {
        assert_eq!(LineRange { start: 7, length: 1 }.to_string(), "7");
        assert_eq!(LineRange { start: 7, length: 0 }.to_string(), "7,0");
        assert_eq!(LineRange { start: 7, length: 3 }.to_string(), "7,3");
    }

    #[test]
    fn classifies_lines_by_marker() {
        assert_eq!(HunkLineKind::from_line(" x"), Some(HunkLineKind::Context));
        assert_eq!(HunkLineKind::from_line(""), Some(HunkLineKind::Context));
        assert_eq!(HunkLineKind::from_line("+x"), Some(HunkLineKind::Added));
        assert_eq!(HunkLineKind::from_line("-x"), Some(HunkLineKind::Deleted));
        assert_eq!(
            HunkLineKind::from_line("\\ No newline at end of file"),
            Some(HunkLineKind::NoFinalLineBreak)
        );
        assert_eq!(HunkLineKind::from_line("diff --git"), None);
    }

    #[test]
    fn hunk_header_values() {
        let patch = Patch::parse(DIFF).unwrap();
        let hunks = patch.entries()[0].hunks();
        assert_eq!(hunks.len(), 2);

        let header = hunks[0].header();
        assert_eq!(header.old(), LineRange { start: 3, length: 4 });
        assert_eq!(header.new(), LineRange { start: 3, length: 3 });
        assert_eq!(header.function(), Some("section"));

        let header = hunks[1].header();
        assert_eq!(header.old(), LineRange { start: 20, length: 0 });
        assert_eq!(header.new(), LineRange { start: 20, length: 1 });
        assert_eq!(header.function(), None);
    }

    #[test]
    fn unmarked_empty_line_is_context() {
        let patch = Patch::parse(DIFF).unwrap();
        let hunk = &patch.entries()[0].hunks()[0];
        let kinds: Vec<HunkLineKind> = hunk.lines().iter().map(PatchHunkLine::kind).collect();
        assert_eq!(
            kinds,
            vec![
                HunkLineKind::Context,
                HunkLineKind::Deleted,
                HunkLineKind::Deleted,
                HunkLineKind::Added,
                HunkLineKind::Context,
            ]
        );
        assert_eq!(hunk.lines()[4].content(patch.text()), "");
        assert_eq!(hunk.content_lengths(), (4, 3));
    }

    #[test]
    fn finds_lines_by_text_index() {
        let patch = Patch::parse(DIFF).unwrap();
        let hunk = &patch.entries()[0].hunks()[0];
        assert_eq!(hunk.first_line_index(), 3);
        assert_eq!(hunk.last_line_index(), 8);
        assert!(hunk.find_line(3).is_none());
        assert_eq!(hunk.find_line(5).unwrap().content(patch.text()), "beta");
        assert!(hunk.contains_line(3));
        assert!(!hunk.contains_line(9));
        assert_eq!(hunk.changes().count(), 3);
    }

    #[test]
    fn marker_line_follows_last_addition() {
        let patch = Patch::parse(DIFF).unwrap();
        let hunk = &patch.entries()[0].hunks()[1];
        assert_eq!(hunk.lines().len(), 2);
        assert_eq!(hunk.lines()[1].kind(), HunkLineKind::NoFinalLineBreak);
        assert_eq!(
            hunk.lines()[1].content(patch.text()),
            " No newline at end of file"
        );
    }
}
