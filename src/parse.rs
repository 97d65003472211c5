//! Line references for selecting changes without an interactive view.
//!
//! Two notations are accepted:
//!
//! - `FILE:REFS`, where REFS is a comma-separated list of file line numbers:
//!   `N` (addition at new line N), `-N` (deletion at old line N), `N..M` and
//!   `-N..-M` (inclusive ranges). [`FileLineRefs::resolve`] maps these onto
//!   lines of a parsed [`Patch`].
//! - `N,N..M`, 1-based line numbers of the diff text itself, as shown by
//!   `patch-stager check --numbered`.
//!
//! ```
//! use patch_stager::parse::{parse_file_refs, parse_line_numbers, LineRef};
//! use std::num::NonZeroU32;
//!
//! let refs = parse_file_refs("config.nix:-10,12..13").unwrap();
//! assert_eq!(refs.file, "config.nix");
//! assert_eq!(refs.refs, vec![
//!     LineRef::Delete(NonZeroU32::new(10).unwrap()),
//!     LineRef::AddRange(NonZeroU32::new(12).unwrap(), NonZeroU32::new(13).unwrap()),
//! ]);
//!
//! assert_eq!(parse_line_numbers("7,9..10").unwrap(), vec![6, 8, 9]);
//! ```

use std::num::NonZeroU32;

use error_set::error_set;
use log::debug;
use nom::bytes::complete::tag;
use nom::character::complete::{char, digit1, space0};
use nom::combinator::{all_consuming, map_res, opt};
use nom::multi::separated_list1;
use nom::sequence::{delimited, preceded};
use nom::{IResult, Parser};

use crate::diff::{HunkLineKind, Patch};

error_set! {
    /// Errors from parsing or resolving line references
    RefError := {
        /// Input string does not contain a colon separator
        #[display("Invalid format '{input}': expected 'file:refs'")]
        InvalidFormat { input: String },
        /// File name portion before the colon is empty or whitespace
        #[display("Invalid format '{input}': file name cannot be empty")]
        EmptyFileName { input: String },
        #[display("No line references provided")]
        EmptyRefs,
        /// Line number could not be parsed as a valid non-zero u32
        #[display("Invalid line number '{value}'")]
        InvalidLineNumber { value: String },
        #[display("Invalid range {start}..{end}: start must be <= end")]
        InvalidRange { start: u32, end: u32 },
        /// Deletion range end does not start with '-'
        #[display("Delete reference must start with '-', got '{value}'")]
        InvalidDeleteRef { value: String },
        #[display("Invalid line list '{input}': expected 'N,N..M'")]
        InvalidLineList { input: String },
        #[display("No changes for {file} in this diff")]
        UnknownFile { file: String },
        #[display("No changed lines of {file} match the references")]
        NoMatchingLines { file: String },
    }
}

/// A reference to lines of a file.
///
/// Additions use new line numbers, deletions old line numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum LineRef {
    /// Addition at new line number
    Add(NonZeroU32),
    /// Addition range (inclusive start and end)
    AddRange(NonZeroU32, NonZeroU32),
    /// Deletion at old line number
    Delete(NonZeroU32),
    /// Deletion range (inclusive start and end)
    DeleteRange(NonZeroU32, NonZeroU32),
}

impl LineRef {
    fn matches_added(&self, line: u32) -> bool {
        match *self {
            Self::Add(n) => n.get() == line,
            Self::AddRange(start, end) => (start.get()..=end.get()).contains(&line),
            Self::Delete(_) | Self::DeleteRange(..) => false,
        }
    }

    fn matches_deleted(&self, line: u32) -> bool {
        match *self {
            Self::Delete(n) => n.get() == line,
            Self::DeleteRange(start, end) => (start.get()..=end.get()).contains(&line),
            Self::Add(_) | Self::AddRange(..) => false,
        }
    }
}

/// Parsed `file:refs` selection.
#[derive(Debug, Clone, PartialEq)]
pub struct FileLineRefs {
    /// The file path
    pub file: String,
    /// The line references to select from this file
    pub refs: Vec<LineRef>,
}

impl FileLineRefs {
    /// Indices of the patch lines these references select.
    ///
    /// The file is matched against each entry's new path, then its old path.
    /// Walking each hunk from its header's start lines, a deleted line is
    /// selected when a deletion reference covers its old line number and an
    /// added line when an addition reference covers its new line number.
    ///
    /// # Errors
    ///
    /// [`RefError::UnknownFile`] if no entry is for this file and
    /// [`RefError::NoMatchingLines`] if no changed line matches.
    pub fn resolve(&self, patch: &Patch) -> Result<Vec<usize>, RefError> {
        let entry = patch
            .entries()
            .iter()
            .find(|entry| entry.new_path() == self.file || entry.old_path() == self.file)
            .ok_or_else(|| RefError::UnknownFile {
                file: self.file.clone(),
            })?;

        let mut indices = Vec::new();
        for hunk in entry.hunks() {
            let mut old_line = hunk.header().old().start;
            let mut new_line = hunk.header().new().start;
            for line in hunk.lines() {
                match line.kind() {
                    HunkLineKind::Context => {
                        old_line += 1;
                        new_line += 1;
                    }
                    HunkLineKind::Deleted => {
                        if self.refs.iter().any(|r| r.matches_deleted(old_line)) {
                            indices.push(line.line_index());
                        }
                        old_line += 1;
                    }
                    HunkLineKind::Added => {
                        if self.refs.iter().any(|r| r.matches_added(new_line)) {
                            indices.push(line.line_index());
                        }
                        new_line += 1;
                    }
                    HunkLineKind::NoFinalLineBreak => {}
                }
            }
        }

        debug!("{} resolved to {} patch lines", self.file, indices.len());
        if indices.is_empty() {
            return Err(RefError::NoMatchingLines {
                file: self.file.clone(),
            });
        }
        Ok(indices)
    }
}

/// Parse a `file:refs` string.
///
/// # Errors
///
/// Returns [`RefError`] if:
/// - Input doesn't contain `:` separator
/// - File name is empty or whitespace
/// - No line references provided
/// - Line numbers or ranges are invalid
pub fn parse_file_refs(input: &str) -> Result<FileLineRefs, RefError> {
    let Some((file, refs)) = input.split_once(':') else {
        return Err(RefError::InvalidFormat {
            input: input.to_string(),
        });
    };

    let file = file.trim();
    if file.is_empty() {
        return Err(RefError::EmptyFileName {
            input: input.to_string(),
        });
    }

    let refs = refs
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_single_ref)
        .collect::<Result<Vec<_>, _>>()?;
    if refs.is_empty() {
        return Err(RefError::EmptyRefs);
    }

    Ok(FileLineRefs {
        file: file.to_string(),
        refs,
    })
}

/// Parse 1-based diff line numbers `N,N..M` into 0-based line indices.
///
/// # Errors
///
/// [`RefError::InvalidLineList`] for malformed input,
/// [`RefError::InvalidLineNumber`] for 0 and [`RefError::InvalidRange`] for
/// a range that runs backwards.
pub fn parse_line_numbers(input: &str) -> Result<Vec<usize>, RefError> {
    let result: IResult<&str, Vec<(u32, Option<u32>)>> = all_consuming(separated_list1(
        char(','),
        delimited(space0, number_range, space0),
    ))
    .parse(input.trim());
    let Ok((_, ranges)) = result else {
        return Err(RefError::InvalidLineList {
            input: input.to_string(),
        });
    };

    let mut indices = Vec::new();
    for (start, end) in ranges {
        let end = end.unwrap_or(start);
        if start == 0 || end == 0 {
            return Err(RefError::InvalidLineNumber {
                value: "0".to_string(),
            });
        }
        if start > end {
            return Err(RefError::InvalidRange { start, end });
        }
        indices.extend((start..=end).map(|line| line as usize - 1));
    }
    Ok(indices)
}

fn number(input: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse::<u32>).parse(input)
}

fn number_range(input: &str) -> IResult<&str, (u32, Option<u32>)> {
    (number, opt(preceded(tag(".."), number))).parse(input)
}

/// Parse one reference: `N`, `-N`, `N..M` or `-N..-M`.
fn parse_single_ref(input: &str) -> Result<LineRef, RefError> {
    match input.split_once("..") {
        Some((start, end)) if start.starts_with('-') => {
            let start = deleted_line(start)?;
            let end = deleted_line(end)?;
            check_range(start, end)?;
            Ok(LineRef::DeleteRange(start, end))
        }
        Some((start, end)) => {
            let start = added_line(start)?;
            let end = added_line(end)?;
            check_range(start, end)?;
            Ok(LineRef::AddRange(start, end))
        }
        None if input.starts_with('-') => Ok(LineRef::Delete(deleted_line(input)?)),
        None => Ok(LineRef::Add(added_line(input)?)),
    }
}

fn check_range(start: NonZeroU32, end: NonZeroU32) -> Result<(), RefError> {
    if start > end {
        return Err(RefError::InvalidRange {
            start: start.get(),
            end: end.get(),
        });
    }
    Ok(())
}

fn added_line(input: &str) -> Result<NonZeroU32, RefError> {
    let result: IResult<&str, u32> = all_consuming(number).parse(input);
    result
        .ok()
        .and_then(|(_, line)| NonZeroU32::new(line))
        .ok_or_else(|| RefError::InvalidLineNumber {
            value: input.to_string(),
        })
}

fn deleted_line(input: &str) -> Result<NonZeroU32, RefError> {
    let Some(digits) = input.strip_prefix('-') else {
        return Err(RefError::InvalidDeleteRef {
            value: input.to_string(),
        });
    };
    added_line(digits).map_err(|_| RefError::InvalidLineNumber {
        value: input.to_string(),
    })
}
