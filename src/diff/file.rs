use std::fmt;

use super::hunk::{PatchHunk, PatchHunkLine};
use super::mode::FileMode;
use crate::syntax::{NodeId, SyntaxKind};

/// What happened to a file, derived from its entry headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Deleted,
    Modified,
    Renamed,
    Copied,
    ModeChanged,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Added => "added",
            Self::Deleted => "deleted",
            Self::Modified => "modified",
            Self::Renamed => "renamed",
            Self::Copied => "copied",
            Self::ModeChanged => "mode changed",
        })
    }
}

/// The decoded content of one entry header line.
///
/// Paths are unquoted, have their `a/`/`b/` prefix removed and are empty for
/// `/dev/null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryHeader {
    Diff {
        old_path: String,
        new_path: String,
    },
    Index {
        old_hash: String,
        new_hash: String,
        mode: Option<FileMode>,
    },
    OldMode(FileMode),
    NewMode(FileMode),
    DeletedFileMode(FileMode),
    NewFileMode(FileMode),
    CopyFrom(String),
    CopyTo(String),
    RenameFrom(String),
    RenameTo(String),
    SimilarityIndex(u8),
    DissimilarityIndex(u8),
    OldPath(String),
    NewPath(String),
    BinaryFiles {
        old_path: String,
        new_path: String,
    },
    /// A header line this parser does not interpret. Kept verbatim.
    Unknown,
}

impl EntryHeader {
    #[must_use]
    pub const fn syntax_kind(&self) -> SyntaxKind {
        match self {
            Self::Diff { .. } => SyntaxKind::DiffGitHeader,
            Self::Index { .. } => SyntaxKind::IndexHeader,
            Self::OldMode(_) => SyntaxKind::OldModeHeader,
            Self::NewMode(_) => SyntaxKind::NewModeHeader,
            Self::DeletedFileMode(_) => SyntaxKind::DeletedFileModeHeader,
            Self::NewFileMode(_) => SyntaxKind::NewFileModeHeader,
            Self::CopyFrom(_) => SyntaxKind::CopyFromHeader,
            Self::CopyTo(_) => SyntaxKind::CopyToHeader,
            Self::RenameFrom(_) => SyntaxKind::RenameFromHeader,
            Self::RenameTo(_) => SyntaxKind::RenameToHeader,
            Self::SimilarityIndex(_) => SyntaxKind::SimilarityIndexHeader,
            Self::DissimilarityIndex(_) => SyntaxKind::DissimilarityIndexHeader,
            Self::OldPath(_) => SyntaxKind::OldPathHeader,
            Self::NewPath(_) => SyntaxKind::NewPathHeader,
            Self::BinaryFiles { .. } => SyntaxKind::BinaryFilesHeader,
            Self::Unknown => SyntaxKind::UnknownHeader,
        }
    }
}

/// A header line together with its place in the patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchEntryHeader {
    pub(crate) node: NodeId,
    pub(crate) line_index: usize,
    pub(crate) header: EntryHeader,
}

impl PatchEntryHeader {
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[must_use]
    pub fn line_index(&self) -> usize {
        self.line_index
    }

    #[must_use]
    pub fn header(&self) -> &EntryHeader {
        &self.header
    }
}

/// The diff of a single file: its headers and hunks.
///
/// Equality includes node ids and line indices, so byte-identical entries
/// at different offsets are not equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchEntry {
    node: NodeId,
    headers: Vec<PatchEntryHeader>,
    hunks: Vec<PatchHunk>,
    old_path: String,
    new_path: String,
    old_mode: FileMode,
    new_mode: FileMode,
    change_kind: ChangeKind,
}

impl PatchEntry {
    /// Build an entry and derive its paths, modes and change kind.
    ///
    /// Classification precedence, first match wins:
    /// 1. `new file mode` gives [`ChangeKind::Added`] with no old path or mode
    /// 2. `deleted file mode` gives [`ChangeKind::Deleted`] with no new path or mode
    /// 3. any hunk gives [`ChangeKind::Modified`]
    /// 4. `copy from`/`copy to` gives [`ChangeKind::Copied`]
    /// 5. `rename from`/`rename to` gives [`ChangeKind::Renamed`]
    /// 6. `old mode`/`new mode` gives [`ChangeKind::ModeChanged`]
    /// 7. otherwise [`ChangeKind::Modified`]
    ///
    /// The mode on the `index` line applies to both sides only when neither
    /// an `old mode` nor a `new mode` header is present.
    pub(crate) fn new(node: NodeId, headers: Vec<PatchEntryHeader>, hunks: Vec<PatchHunk>) -> Self {
        let mut old_path = String::new();
        let mut new_path = String::new();
        let mut index_mode = None;
        let mut old_mode_header = None;
        let mut new_mode_header = None;
        let mut created = None;
        let mut deleted = None;
        let mut copied = false;
        let mut renamed = false;

        for header in &headers {
            match &header.header {
                EntryHeader::Diff {
                    old_path: old,
                    new_path: new,
                }
                | EntryHeader::BinaryFiles {
                    old_path: old,
                    new_path: new,
                } => {
                    old_path.clone_from(old);
                    new_path.clone_from(new);
                }
                EntryHeader::Index { mode, .. } => index_mode = *mode,
                EntryHeader::OldMode(mode) => old_mode_header = Some(*mode),
                EntryHeader::NewMode(mode) => new_mode_header = Some(*mode),
                EntryHeader::DeletedFileMode(mode) => deleted = Some(*mode),
                EntryHeader::NewFileMode(mode) => created = Some(*mode),
                EntryHeader::CopyFrom(path) => {
                    copied = true;
                    old_path.clone_from(path);
                }
                EntryHeader::CopyTo(path) => {
                    copied = true;
                    new_path.clone_from(path);
                }
                EntryHeader::RenameFrom(path) => {
                    renamed = true;
                    old_path.clone_from(path);
                }
                EntryHeader::RenameTo(path) => {
                    renamed = true;
                    new_path.clone_from(path);
                }
                EntryHeader::OldPath(path) => old_path.clone_from(path),
                EntryHeader::NewPath(path) => new_path.clone_from(path),
                EntryHeader::SimilarityIndex(_)
                | EntryHeader::DissimilarityIndex(_)
                | EntryHeader::Unknown => {}
            }
        }

        let has_mode_headers = old_mode_header.is_some() || new_mode_header.is_some();
        let shared_mode = if has_mode_headers { None } else { index_mode };
        let mut old_mode = old_mode_header.or(deleted).or(shared_mode).unwrap_or_default();
        let mut new_mode = new_mode_header.or(created).or(shared_mode).unwrap_or_default();

        let change_kind = if created.is_some() {
            old_path.clear();
            old_mode = FileMode::Nonexistent;
            ChangeKind::Added
        } else if deleted.is_some() {
            new_path.clear();
            new_mode = FileMode::Nonexistent;
            ChangeKind::Deleted
        } else if !hunks.is_empty() {
            ChangeKind::Modified
        } else if copied {
            ChangeKind::Copied
        } else if renamed {
            ChangeKind::Renamed
        } else if has_mode_headers {
            ChangeKind::ModeChanged
        } else {
            ChangeKind::Modified
        };

        Self {
            node,
            headers,
            hunks,
            old_path,
            new_path,
            old_mode,
            new_mode,
            change_kind,
        }
    }

    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Header lines in order. The first is always the `diff --git` line.
    #[must_use]
    pub fn headers(&self) -> &[PatchEntryHeader] {
        &self.headers
    }

    #[must_use]
    pub fn diff_header(&self) -> Option<&PatchEntryHeader> {
        self.headers.first()
    }

    #[must_use]
    pub fn hunks(&self) -> &[PatchHunk] {
        &self.hunks
    }

    /// Old path, empty when the file did not exist before.
    #[must_use]
    pub fn old_path(&self) -> &str {
        &self.old_path
    }

    /// New path, empty when the file no longer exists.
    #[must_use]
    pub fn new_path(&self) -> &str {
        &self.new_path
    }

    /// The path a user would call this file by.
    #[must_use]
    pub fn path(&self) -> &str {
        if self.new_path.is_empty() {
            &self.old_path
        } else {
            &self.new_path
        }
    }

    #[must_use]
    pub fn old_mode(&self) -> FileMode {
        self.old_mode
    }

    #[must_use]
    pub fn new_mode(&self) -> FileMode {
        self.new_mode
    }

    #[must_use]
    pub fn change_kind(&self) -> ChangeKind {
        self.change_kind
    }

    #[must_use]
    pub fn first_line_index(&self) -> usize {
        self.headers.first().map_or(0, |header| header.line_index)
    }

    #[must_use]
    pub fn last_line_index(&self) -> usize {
        match (self.hunks.last(), self.headers.last()) {
            (Some(hunk), _) => hunk.last_line_index(),
            (None, Some(header)) => header.line_index,
            (None, None) => 0,
        }
    }

    #[must_use]
    pub fn contains_line(&self, line_index: usize) -> bool {
        (self.first_line_index()..=self.last_line_index()).contains(&line_index)
    }

    /// The hunk whose header or body is on `line_index`.
    #[must_use]
    pub fn find_hunk(&self, line_index: usize) -> Option<&PatchHunk> {
        let position = self
            .hunks
            .partition_point(|hunk| hunk.first_line_index() <= line_index);
        let hunk = self.hunks.get(position.checked_sub(1)?)?;
        hunk.contains_line(line_index).then_some(hunk)
    }

    #[must_use]
    pub fn find_line(&self, line_index: usize) -> Option<&PatchHunkLine> {
        self.find_hunk(line_index)?.find_line(line_index)
    }
}
