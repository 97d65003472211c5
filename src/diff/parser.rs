//! Line-driven recursive-descent parser for `git diff` output.
//!
//! The parser walks the source one line at a time. Entry headers are picked
//! by keyword prefix, hunk lines by their first byte, and hunk bodies are
//! bounded by the line counts in their `@@` header. Any malformed line aborts
//! the parse with a positioned [`ParseError`]; there is no partial result.

use std::sync::Arc;

use error_set::error_set;
use log::trace;

use super::file::{EntryHeader, PatchEntry, PatchEntryHeader};
use super::full::Patch;
use super::hunk::{HunkHeader, HunkLineKind, PatchHunk, PatchHunkLine};
use super::path::quoted_len;
use super::tokenizer::LineTokenizer;
use crate::syntax::{NodeId, SyntaxKind, SyntaxTree, TreeBuilder};
use crate::text::SourceText;

error_set! {
    /// Malformed diff text. Lines and columns are 1-based.
    ParseError := {
        #[display("{line}:{column}: expected 'diff --git' header")]
        ExpectedDiffHeader { line: usize, column: usize },
        #[display("{line}:{column}: expected {kind}")]
        ExpectedLine { line: usize, column: usize, kind: SyntaxKind },
        #[display("{line}:{column}: expected integer")]
        ExpectedInteger { line: usize, column: usize },
        #[display("{line}:{column}: expected percentage between 1% and 100%")]
        ExpectedPercentage { line: usize, column: usize },
        #[display("{line}:{column}: expected file mode")]
        ExpectedMode { line: usize, column: usize },
        #[display("{line}:{column}: expected {expected}")]
        ExpectedText { line: usize, column: usize, expected: &'static str },
        #[display("{line}:{column}: invalid UTF-8")]
        InvalidUtf8 { line: usize, column: usize },
    }
}

impl ParseError {
    /// 1-based line and column of the error.
    #[must_use]
    pub fn location(&self) -> (usize, usize) {
        match *self {
            Self::ExpectedDiffHeader { line, column }
            | Self::ExpectedLine { line, column, .. }
            | Self::ExpectedInteger { line, column }
            | Self::ExpectedPercentage { line, column }
            | Self::ExpectedMode { line, column }
            | Self::ExpectedText { line, column, .. }
            | Self::InvalidUtf8 { line, column } => (line, column),
        }
    }
}

const HEADER_PREFIXES: &[(&str, SyntaxKind)] = &[
    ("index", SyntaxKind::IndexHeader),
    ("old mode", SyntaxKind::OldModeHeader),
    ("new mode", SyntaxKind::NewModeHeader),
    ("deleted file mode", SyntaxKind::DeletedFileModeHeader),
    ("new file mode", SyntaxKind::NewFileModeHeader),
    ("copy from", SyntaxKind::CopyFromHeader),
    ("copy to", SyntaxKind::CopyToHeader),
    ("rename from", SyntaxKind::RenameFromHeader),
    ("rename to", SyntaxKind::RenameToHeader),
    ("similarity index", SyntaxKind::SimilarityIndexHeader),
    ("dissimilarity index", SyntaxKind::DissimilarityIndexHeader),
    ("---", SyntaxKind::OldPathHeader),
    ("+++", SyntaxKind::NewPathHeader),
    ("Binary files", SyntaxKind::BinaryFilesHeader),
];

const DIFF_GIT: &str = "diff --git";
const HUNK_START: &str = "@@";

pub(crate) fn parse(text: &str) -> Result<Arc<Patch>, ParseError> {
    if text.is_empty() {
        return Ok(Patch::empty());
    }

    let source = SourceText::new(text);
    let (tree, entries) = Parser::new(&source).parse_patch()?;
    debug_assert!(tree.covers(&source), "syntax tree leaves gaps in the source");
    Ok(Arc::new(Patch::from_parts(source, tree, entries)))
}

pub(crate) fn parse_bytes(bytes: &[u8]) -> Result<Arc<Patch>, ParseError> {
    match std::str::from_utf8(bytes) {
        Ok(text) => parse(text),
        Err(error) => {
            let valid = bytes.get(..error.valid_up_to()).unwrap_or_default();
            let prefix = SourceText::new(String::from_utf8_lossy(valid));
            let (line, line_start) = prefix
                .lines()
                .iter()
                .filter(|line| line.has_line_break())
                .fold((0, 0), |(count, _), line| {
                    (count + 1, line.span_including_line_break().end())
                });
            Err(ParseError::InvalidUtf8 {
                line: line + 1,
                column: valid.len() - line_start + 1,
            })
        }
    }
}

struct Parser<'s> {
    source: &'s SourceText,
    builder: TreeBuilder,
    line_index: usize,
}

impl<'s> Parser<'s> {
    fn new(source: &'s SourceText) -> Self {
        Self {
            source,
            builder: TreeBuilder::default(),
            line_index: 0,
        }
    }

    fn current_line(&self) -> Option<&'s str> {
        let line = self.source.line(self.line_index)?;
        Some(self.source.slice(line.span()))
    }

    /// Parse the current line as a node of `kind`, then move to the next.
    fn line<T>(
        &mut self,
        kind: SyntaxKind,
        parse: impl FnOnce(&mut LineTokenizer<'s>, &mut TreeBuilder) -> Result<T, ParseError>,
    ) -> Result<(NodeId, T), ParseError> {
        let Some(line) = self.source.line(self.line_index).copied() else {
            return Err(ParseError::ExpectedLine {
                line: self.line_index + 1,
                column: 1,
                kind,
            });
        };

        let node = self.builder.start_node(kind);
        let mut tokenizer = LineTokenizer::new(self.source, self.line_index, line);
        let value = parse(&mut tokenizer, &mut self.builder)?;
        tokenizer.finish(&mut self.builder)?;
        self.builder.finish_node();
        self.line_index += 1;
        Ok((node, value))
    }

    fn parse_patch(mut self) -> Result<(SyntaxTree, Vec<PatchEntry>), ParseError> {
        self.builder.start_node(SyntaxKind::Patch);
        let mut entries = Vec::new();
        while self.current_line().is_some() {
            entries.push(self.entry()?);
        }
        self.builder.finish_node();
        trace!("parsed {} entries", entries.len());
        Ok((self.builder.finish(), entries))
    }

    fn entry(&mut self) -> Result<PatchEntry, ParseError> {
        if !self
            .current_line()
            .is_some_and(|text| text.starts_with(DIFF_GIT))
        {
            return Err(ParseError::ExpectedDiffHeader {
                line: self.line_index + 1,
                column: 1,
            });
        }

        trace!("entry at line {}", self.line_index + 1);
        let node = self.builder.start_node(SyntaxKind::Entry);
        let mut headers = vec![self.diff_git_header()?];
        while let Some(text) = self.current_line() {
            if text.starts_with(HUNK_START) || text.starts_with(DIFF_GIT) {
                break;
            }
            headers.push(self.entry_header(text)?);
        }

        let mut hunks = Vec::new();
        while self
            .current_line()
            .is_some_and(|text| text.starts_with(HUNK_START))
        {
            hunks.push(self.hunk()?);
        }

        self.builder.finish_node();
        Ok(PatchEntry::new(node, headers, hunks))
    }

    fn diff_git_header(&mut self) -> Result<PatchEntryHeader, ParseError> {
        let line_index = self.line_index;
        let (node, header) = self.line(SyntaxKind::DiffGitHeader, |t, b| {
            t.keyword(b, SyntaxKind::DiffKeyword, "diff")?;
            t.space(b)?;
            t.keyword(b, SyntaxKind::GitKeyword, "--git")?;
            t.space(b)?;
            let Some(old_length) = split_git_paths(t.rest()) else {
                return Err(t.expected_text(SyntaxKind::PathToken.description()));
            };
            let old_path = t.path(b, old_length, "a/")?;
            t.space(b)?;
            let new_path = t.path(b, t.rest().len(), "b/")?;
            Ok(EntryHeader::Diff { old_path, new_path })
        })?;

        Ok(PatchEntryHeader {
            node,
            line_index,
            header,
        })
    }

    fn entry_header(&mut self, text: &str) -> Result<PatchEntryHeader, ParseError> {
        let line_index = self.line_index;
        let kind = HEADER_PREFIXES
            .iter()
            .find(|(prefix, _)| text.starts_with(prefix))
            .map_or(SyntaxKind::UnknownHeader, |&(_, kind)| kind);
        trace!("{kind} at line {}", line_index + 1);

        let (node, header) = self.line(kind, |t, b| header_body(kind, t, b))?;
        Ok(PatchEntryHeader {
            node,
            line_index,
            header,
        })
    }

    fn hunk(&mut self) -> Result<PatchHunk, ParseError> {
        let node = self.builder.start_node(SyntaxKind::Hunk);
        let header = self.hunk_header()?;
        trace!(
            "hunk -{} +{} at line {}",
            header.old,
            header.new,
            header.line_index + 1
        );

        let mut old_remaining = header.old.length;
        let mut new_remaining = header.new.length;
        let mut lines = Vec::new();
        loop {
            let expected = expected_line_kind(old_remaining, new_remaining);
            let Some(text) = self.current_line() else {
                if old_remaining == 0 && new_remaining == 0 {
                    break;
                }
                return Err(ParseError::ExpectedLine {
                    line: self.line_index + 1,
                    column: 1,
                    kind: expected,
                });
            };

            let kind = HunkLineKind::from_line(text);
            if kind != Some(HunkLineKind::NoFinalLineBreak)
                && old_remaining == 0
                && new_remaining == 0
            {
                break;
            }

            match kind {
                Some(HunkLineKind::Context) if old_remaining > 0 && new_remaining > 0 => {
                    old_remaining -= 1;
                    new_remaining -= 1;
                }
                Some(HunkLineKind::Deleted) if old_remaining > 0 => old_remaining -= 1,
                Some(HunkLineKind::Added) if new_remaining > 0 => new_remaining -= 1,
                Some(HunkLineKind::NoFinalLineBreak) => {}
                _ => {
                    return Err(ParseError::ExpectedLine {
                        line: self.line_index + 1,
                        column: 1,
                        kind: expected,
                    });
                }
            }

            if let Some(kind) = kind {
                lines.push(self.hunk_line(kind)?);
            }
        }

        self.builder.finish_node();
        Ok(PatchHunk {
            node,
            header,
            lines,
        })
    }

    fn hunk_header(&mut self) -> Result<HunkHeader, ParseError> {
        let line_index = self.line_index;
        let (node, (old, new, function)) = self.line(SyntaxKind::HunkHeader, |t, b| {
            t.keyword(b, SyntaxKind::AtAtToken, "@@")?;
            t.space(b)?;
            let old = t.line_range(b, '-')?;
            t.space(b)?;
            let new = t.line_range(b, '+')?;
            t.space(b)?;
            t.keyword(b, SyntaxKind::AtAtToken, "@@")?;
            let function = if t.separator(b) && !t.is_at_end() {
                Some(t.rest_token(b, SyntaxKind::TextToken, None).to_string())
            } else {
                None
            };
            Ok((old, new, function))
        })?;

        Ok(HunkHeader {
            node,
            line_index,
            old,
            new,
            function,
        })
    }

    fn hunk_line(&mut self, kind: HunkLineKind) -> Result<PatchHunkLine, ParseError> {
        let line_index = self.line_index;
        let (node, line) = self.line(kind.syntax_kind(), |t, b| {
            // An empty context line has lost its leading space.
            if !t.is_at_end() {
                t.token(b, kind.marker_kind(), 1, None);
            }
            t.rest_token(b, SyntaxKind::TextToken, None);
            Ok(t.text_line())
        })?;

        Ok(PatchHunkLine {
            node,
            kind,
            line_index,
            line,
        })
    }
}

/// The line kind a hunk still needs, given its remaining line counts.
fn expected_line_kind(old_remaining: u32, new_remaining: u32) -> SyntaxKind {
    match (old_remaining > 0, new_remaining > 0) {
        (true, true) => SyntaxKind::ContextLine,
        (true, false) => SyntaxKind::DeletedLine,
        _ => SyntaxKind::AddedLine,
    }
}

/// Byte length of the old path in the text after `diff --git `.
///
/// A quoted old path ends at its closing quote. Otherwise the two paths are
/// split in the middle when both halves name the same file, which is the
/// only unambiguous reading of paths containing spaces; failing that, at
/// the first ` b/` or ` "b/`.
fn split_git_paths(text: &str) -> Option<usize> {
    if let Some(length) = quoted_len(text) {
        return text.get(length..)?.starts_with(' ').then_some(length);
    }

    let middle = text.len() / 2;
    if text.len() % 2 == 1 && text.as_bytes().get(middle) == Some(&b' ') {
        if let (Some(old), Some(new)) = (text.get(..middle), text.get(middle + 1..)) {
            if old
                .strip_prefix("a/")
                .is_some_and(|old| new.strip_prefix("b/") == Some(old))
            {
                return Some(middle);
            }
        }
    }

    text.find(" b/").or_else(|| text.find(" \"b/"))
}

fn header_body(
    kind: SyntaxKind,
    t: &mut LineTokenizer<'_>,
    b: &mut TreeBuilder,
) -> Result<EntryHeader, ParseError> {
    use SyntaxKind::{
        CopyKeyword, DeletedKeyword, DissimilarityKeyword, FileKeyword, FromKeyword,
        IndexKeyword, ModeKeyword, NewKeyword, OldKeyword, RenameKeyword, SimilarityKeyword,
        ToKeyword,
    };

    match kind {
        SyntaxKind::IndexHeader => {
            t.keyword(b, IndexKeyword, "index")?;
            t.space(b)?;
            let old_hash = t.hash(b)?;
            t.keyword(b, SyntaxKind::DotDotToken, "..")?;
            let new_hash = t.hash(b)?;
            let mode = if t.only_blanks_left() {
                None
            } else {
                t.space(b)?;
                Some(t.mode(b)?)
            };
            Ok(EntryHeader::Index {
                old_hash,
                new_hash,
                mode,
            })
        }
        SyntaxKind::OldModeHeader => {
            t.keywords(b, &[(OldKeyword, "old"), (ModeKeyword, "mode")])?;
            t.space(b)?;
            Ok(EntryHeader::OldMode(t.mode(b)?))
        }
        SyntaxKind::NewModeHeader => {
            t.keywords(b, &[(NewKeyword, "new"), (ModeKeyword, "mode")])?;
            t.space(b)?;
            Ok(EntryHeader::NewMode(t.mode(b)?))
        }
        SyntaxKind::DeletedFileModeHeader => {
            t.keywords(
                b,
                &[
                    (DeletedKeyword, "deleted"),
                    (FileKeyword, "file"),
                    (ModeKeyword, "mode"),
                ],
            )?;
            t.space(b)?;
            Ok(EntryHeader::DeletedFileMode(t.mode(b)?))
        }
        SyntaxKind::NewFileModeHeader => {
            t.keywords(
                b,
                &[
                    (NewKeyword, "new"),
                    (FileKeyword, "file"),
                    (ModeKeyword, "mode"),
                ],
            )?;
            t.space(b)?;
            Ok(EntryHeader::NewFileMode(t.mode(b)?))
        }
        SyntaxKind::CopyFromHeader => {
            t.keywords(b, &[(CopyKeyword, "copy"), (FromKeyword, "from")])?;
            t.space(b)?;
            Ok(EntryHeader::CopyFrom(t.path(b, t.rest().len(), "")?))
        }
        SyntaxKind::CopyToHeader => {
            t.keywords(b, &[(CopyKeyword, "copy"), (ToKeyword, "to")])?;
            t.space(b)?;
            Ok(EntryHeader::CopyTo(t.path(b, t.rest().len(), "")?))
        }
        SyntaxKind::RenameFromHeader => {
            t.keywords(b, &[(RenameKeyword, "rename"), (FromKeyword, "from")])?;
            t.space(b)?;
            Ok(EntryHeader::RenameFrom(t.path(b, t.rest().len(), "")?))
        }
        SyntaxKind::RenameToHeader => {
            t.keywords(b, &[(RenameKeyword, "rename"), (ToKeyword, "to")])?;
            t.space(b)?;
            Ok(EntryHeader::RenameTo(t.path(b, t.rest().len(), "")?))
        }
        SyntaxKind::SimilarityIndexHeader => {
            t.keywords(b, &[(SimilarityKeyword, "similarity"), (IndexKeyword, "index")])?;
            t.space(b)?;
            Ok(EntryHeader::SimilarityIndex(t.percentage(b)?))
        }
        SyntaxKind::DissimilarityIndexHeader => {
            t.keywords(
                b,
                &[(DissimilarityKeyword, "dissimilarity"), (IndexKeyword, "index")],
            )?;
            t.space(b)?;
            Ok(EntryHeader::DissimilarityIndex(t.percentage(b)?))
        }
        SyntaxKind::OldPathHeader => {
            t.keyword(b, SyntaxKind::MinusMinusMinusToken, "---")?;
            t.space(b)?;
            Ok(EntryHeader::OldPath(t.path(b, t.rest().len(), "a/")?))
        }
        SyntaxKind::NewPathHeader => {
            t.keyword(b, SyntaxKind::PlusPlusPlusToken, "+++")?;
            t.space(b)?;
            Ok(EntryHeader::NewPath(t.path(b, t.rest().len(), "b/")?))
        }
        SyntaxKind::BinaryFilesHeader => binary_files_header(t, b),
        _ => {
            t.rest_token(b, SyntaxKind::TextToken, None);
            Ok(EntryHeader::Unknown)
        }
    }
}

/// `Binary files <old> and <new> differ`
fn binary_files_header(
    t: &mut LineTokenizer<'_>,
    b: &mut TreeBuilder,
) -> Result<EntryHeader, ParseError> {
    const AND: &str = " and ";
    const DIFFER: &str = " differ";

    t.keywords(
        b,
        &[(SyntaxKind::BinaryKeyword, "Binary"), (SyntaxKind::FilesKeyword, "files")],
    )?;
    t.space(b)?;

    let rest = t.rest();
    let Some(paths) = rest.strip_suffix(DIFFER) else {
        return Err(t.expected_text(SyntaxKind::DifferKeyword.description()));
    };
    let Some(old_length) = paths.rfind(AND) else {
        return Err(t.expected_text(SyntaxKind::AndKeyword.description()));
    };
    let new_length = paths.len() - old_length - AND.len();

    let old_path = t.path(b, old_length, "a/")?;
    t.space(b)?;
    t.keyword(b, SyntaxKind::AndKeyword, "and")?;
    t.space(b)?;
    let new_path = t.path(b, new_length, "b/")?;
    t.space(b)?;
    t.keyword(b, SyntaxKind::DifferKeyword, "differ")?;
    Ok(EntryHeader::BinaryFiles { old_path, new_path })
}
