//! Build a smaller patch that applies only a selection of changed lines.
//!
//! The output is plain diff text assembled from verbatim slices of the
//! source patch. Only a line's marker byte is ever rewritten (when an
//! unselected change is demoted to context); headers that have to change
//! are synthesized. The text is parsed again before it is returned, so a
//! successful result is always a well-formed [`Patch`].

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::diff::path::quote_path;
use crate::diff::{FileMode, HunkLineKind, LineRange, ParseError, Patch, PatchEntry, PatchHunk};
use crate::text::{SourceText, TextLine};

/// Where the selected changes go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchDirection {
    /// Working tree change into the index.
    Stage,
    /// Staged change back out of the index.
    Unstage,
    /// Working tree change thrown away.
    Discard,
}

impl PatchDirection {
    /// Unstage and Discard produce a patch that is applied in reverse.
    #[must_use]
    pub const fn is_undo(self) -> bool {
        matches!(self, Self::Unstage | Self::Discard)
    }

    /// Flags for `git apply` matching this direction.
    #[must_use]
    pub const fn apply_args(self) -> &'static [&'static str] {
        match self {
            Self::Stage => &["--cached"],
            Self::Unstage => &["--cached", "--reverse"],
            Self::Discard => &["--reverse"],
        }
    }
}

impl fmt::Display for PatchDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stage => "stage",
            Self::Unstage => "unstage",
            Self::Discard => "discard",
        })
    }
}

/// Build a patch containing only the changes on `line_indices`.
///
/// Indices are 0-based lines of `patch`'s text. Indices that are not added
/// or deleted lines are ignored. Returns `Ok(None)` when nothing is left to
/// apply.
///
/// # Errors
///
/// Returns a [`ParseError`] only if the synthesized text fails to parse,
/// which indicates a bug rather than bad input.
pub fn select_lines(
    patch: &Patch,
    line_indices: &[usize],
    direction: PatchDirection,
) -> Result<Option<Arc<Patch>>, ParseError> {
    let selected: BTreeSet<usize> = line_indices
        .iter()
        .copied()
        .filter(|&index| patch.find_line(index).is_some_and(|line| line.is_change()))
        .collect();

    if selected.is_empty() {
        debug!("{direction}: no added or deleted lines selected");
        return Ok(None);
    }

    let mut writer = PatchWriter {
        source: patch.text(),
        selected: &selected,
        is_undo: direction.is_undo(),
        out: String::new(),
    };
    for entry in patch.entries() {
        writer.entry(entry);
    }

    debug!(
        "{direction}: {} selected lines, {} bytes of patch",
        selected.len(),
        writer.out.len()
    );
    Patch::parse(&writer.out).map(|patch| (!patch.is_empty()).then_some(patch))
}

/// Build a patch for every change in the hunk containing `line_index`.
///
/// # Errors
///
/// As [`select_lines`].
pub fn select_hunk(
    patch: &Patch,
    line_index: usize,
    direction: PatchDirection,
) -> Result<Option<Arc<Patch>>, ParseError> {
    let Some(hunk) = patch.find_hunk(line_index) else {
        debug!("{direction}: line {line_index} is not inside a hunk");
        return Ok(None);
    };
    let lines: Vec<usize> = hunk.changes().map(|line| line.line_index()).collect();
    select_lines(patch, &lines, direction)
}

struct PatchWriter<'a> {
    source: &'a SourceText,
    selected: &'a BTreeSet<usize>,
    is_undo: bool,
    out: String,
}

impl PatchWriter<'_> {
    fn is_selected(&self, line_index: usize) -> bool {
        self.selected.contains(&line_index)
    }

    fn has_selection(&self, hunk: &PatchHunk) -> bool {
        hunk.changes().any(|line| self.is_selected(line.line_index()))
    }

    /// The terminator of `line`, or `fallback` if it has none.
    fn line_break<'s>(&'s self, line: &TextLine, fallback: &'s str) -> &'s str {
        if line.has_line_break() {
            self.source.slice(line.line_break_span())
        } else {
            fallback
        }
    }

    fn copy_line(&mut self, line: &TextLine, line_break: &str) {
        let text = self.source.slice(line.span_including_line_break());
        self.out.push_str(text);
        if !line.has_line_break() {
            self.out.push_str(line_break);
        }
    }

    /// Write `line` with its marker replaced by `marker`.
    fn remark_line(&mut self, line: &TextLine, marker: char, line_break: &str) {
        let content = self.source.slice(line.span());
        self.out.push(marker);
        self.out.push_str(content.get(1..).unwrap_or_default());
        let line_break = self.line_break(line, line_break).to_string();
        self.out.push_str(&line_break);
    }

    fn entry(&mut self, entry: &PatchEntry) {
        let Some(diff_header) = entry.diff_header() else {
            return;
        };
        if !entry.hunks().iter().any(|hunk| self.has_selection(hunk)) {
            return;
        }
        let Some(header_line) = self.source.line(diff_header.line_index()).copied() else {
            return;
        };
        let line_break = self.line_break(&header_line, "\n").to_string();

        let all_selected = entry
            .hunks()
            .iter()
            .flat_map(PatchHunk::changes)
            .all(|line| self.is_selected(line.line_index()));

        // Hunks go to a separate buffer first; whether the old file exists
        // depends on their old-side lengths.
        self.copy_line(&header_line, &line_break);
        let hunks_start = self.out.len();
        let mut old_exists = entry.old_mode().exists();
        for hunk in entry.hunks() {
            if self.has_selection(hunk) {
                old_exists |= self.hunk(hunk, &line_break) != 0;
            } else {
                debug!("omitting hunk at line {}", hunk.first_line_index() + 1);
            }
        }
        let hunks = self.out.split_off(hunks_start);

        let deletes_file = entry.new_path().is_empty() && all_selected;
        let mut headers = String::new();
        if deletes_file {
            let mode = match entry.old_mode() {
                FileMode::Nonexistent => FileMode::RegularNonExecutableFile,
                mode => mode,
            };
            headers.push_str(&format!("deleted file mode {mode}{line_break}"));
        }
        if old_exists {
            let old_path = if entry.old_path().is_empty() {
                entry.new_path()
            } else {
                entry.old_path()
            };
            headers.push_str(&format!("--- {}{line_break}", quote_path("a/", old_path)));
        } else {
            let mode = match entry.new_mode() {
                FileMode::Nonexistent => FileMode::RegularNonExecutableFile,
                mode => mode,
            };
            headers.push_str(&format!("new file mode {mode}{line_break}"));
            headers.push_str(&format!("--- /dev/null{line_break}"));
        }

        if !entry.new_path().is_empty() {
            headers.push_str(&format!("+++ {}{line_break}", quote_path("b/", entry.new_path())));
        } else if deletes_file {
            headers.push_str(&format!("+++ /dev/null{line_break}"));
        } else {
            debug!("partial selection keeps {}", entry.old_path());
            headers.push_str(&format!("+++ {}{line_break}", quote_path("b/", entry.old_path())));
        }

        self.out.push_str(&headers);
        self.out.push_str(&hunks);
    }

    /// Write one hunk and return its old-side length.
    fn hunk(&mut self, hunk: &PatchHunk, line_break: &str) -> u32 {
        let mut old_length: u32 = 0;
        let mut delta: i64 = 0;
        for line in hunk.lines() {
            let selected = self.is_selected(line.line_index());
            match line.kind() {
                HunkLineKind::Context => old_length += 1,
                HunkLineKind::Deleted => {
                    if !self.is_undo || selected {
                        old_length += 1;
                    }
                    if selected {
                        delta -= 1;
                    }
                }
                HunkLineKind::Added => {
                    if self.is_undo && !selected {
                        old_length += 1;
                    }
                    if selected {
                        delta += 1;
                    }
                }
                HunkLineKind::NoFinalLineBreak => {}
            }
        }
        let new_length = u32::try_from(i64::from(old_length) + delta).unwrap_or_default();

        let header = hunk.header();
        let old = LineRange {
            start: clamp_start(header.old().start, old_length),
            length: old_length,
        };
        let new = LineRange {
            start: clamp_start(header.new().start, new_length),
            length: new_length,
        };
        debug!(
            "hunk at line {}: -{} +{} becomes -{old} +{new}",
            hunk.first_line_index() + 1,
            header.old(),
            header.new()
        );
        self.out.push_str(&format!("@@ -{old} +{new} @@{line_break}"));

        let lines = hunk.lines();
        let mut previous_included = false;
        let mut pending_addition: Option<(String, String)> = None;
        for (i, line) in lines.iter().enumerate() {
            let text_line = line.text_line();
            let selected = self.is_selected(line.line_index());
            previous_included = match line.kind() {
                HunkLineKind::Context => {
                    self.copy_line(text_line, line_break);
                    true
                }
                HunkLineKind::Added | HunkLineKind::Deleted if selected => {
                    self.copy_line(text_line, line_break);
                    true
                }
                HunkLineKind::Deleted if !self.is_undo => {
                    if self.bridges_missing_line_break(hunk, i) {
                        // The old last line had no terminator. Keep it
                        // deleted and add it back with one, so the selected
                        // additions can follow it.
                        self.copy_line(text_line, line_break);
                        let content = line.content(self.source).to_string();
                        let terminator = self.line_break(text_line, line_break).to_string();
                        pending_addition = Some((content, terminator));
                    } else {
                        self.remark_line(text_line, ' ', line_break);
                    }
                    true
                }
                HunkLineKind::Added if self.is_undo => {
                    self.remark_line(text_line, ' ', line_break);
                    true
                }
                HunkLineKind::Added | HunkLineKind::Deleted => false,
                HunkLineKind::NoFinalLineBreak => {
                    if previous_included {
                        self.copy_line(text_line, line_break);
                    }
                    if let Some((content, terminator)) = pending_addition.take() {
                        self.out.push('+');
                        self.out.push_str(&content);
                        self.out.push_str(&terminator);
                    }
                    false
                }
            };
        }

        old_length
    }

    /// An unselected deletion directly followed by `\ No newline at end of
    /// file`, with a selected addition somewhere after it.
    fn bridges_missing_line_break(&self, hunk: &PatchHunk, index: usize) -> bool {
        let lines = hunk.lines();
        lines
            .get(index + 1)
            .is_some_and(|next| next.kind() == HunkLineKind::NoFinalLineBreak)
            && lines.iter().skip(index + 2).any(|line| {
                line.kind() == HunkLineKind::Added && self.is_selected(line.line_index())
            })
    }
}

/// A hunk side with lines cannot start at line 0.
fn clamp_start(start: u32, length: u32) -> u32 {
    if start == 0 && length > 0 { 1 } else { start }
}
