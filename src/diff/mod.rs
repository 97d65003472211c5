//! The patch model: entries, hunks and lines over a lossless syntax tree.

mod file;
mod full;
mod hunk;
mod mode;
mod parser;
pub(crate) mod path;
mod tokenizer;

pub use file::{ChangeKind, EntryHeader, PatchEntry, PatchEntryHeader};
pub use full::Patch;
pub use hunk::{HunkHeader, HunkLineKind, LineRange, PatchHunk, PatchHunkLine};
pub use mode::FileMode;
pub use parser::ParseError;
