//! Immutable source text addressed by byte spans.
//!
//! Every position in the patch model is a byte offset into a [`SourceText`].
//! The text is split once into a table of [`TextLine`]s that covers the
//! whole buffer without gaps, so any line, token or trivia can be sliced back
//! out of the original bytes unchanged.

use std::fmt;
use std::ops::Range;

/// A half-open byte range `[start, start + length)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextSpan {
    start: usize,
    length: usize,
}

impl TextSpan {
    #[must_use]
    pub const fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    /// Build a span from its inclusive start and exclusive end.
    #[must_use]
    pub fn from_bounds(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span end {end} before start {start}");
        Self {
            start,
            length: end.saturating_sub(start),
        }
    }

    #[must_use]
    pub const fn start(self) -> usize {
        self.start
    }

    #[must_use]
    pub const fn end(self) -> usize {
        self.start + self.length
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.length
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.length == 0
    }

    #[must_use]
    pub fn range(self) -> Range<usize> {
        self.start..self.end()
    }

    /// True if both spans share at least one position.
    #[must_use]
    pub fn overlaps(self, other: TextSpan) -> bool {
        self.start.max(other.start) < self.end().min(other.end())
    }

    #[must_use]
    pub fn contains(self, position: usize) -> bool {
        self.start <= position && position < self.end()
    }

    /// Span containment. An empty span is contained if its start is.
    #[must_use]
    pub fn contains_span(self, other: TextSpan) -> bool {
        if other.is_empty() {
            self.contains(other.start)
        } else {
            self.start <= other.start && other.end() <= self.end()
        }
    }

    /// Smallest span covering both.
    #[must_use]
    pub fn union(self, other: TextSpan) -> TextSpan {
        TextSpan::from_bounds(self.start.min(other.start), self.end().max(other.end()))
    }
}

impl fmt::Display for TextSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{})", self.start, self.end())
    }
}

/// One line of a [`SourceText`], with its terminator tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextLine {
    start: usize,
    length: usize,
    line_break_length: usize,
}

impl TextLine {
    const fn new(start: usize, length: usize, line_break_length: usize) -> Self {
        Self {
            start,
            length,
            line_break_length,
        }
    }

    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// The line content, excluding its terminator.
    #[must_use]
    pub const fn span(&self) -> TextSpan {
        TextSpan::new(self.start, self.length)
    }

    #[must_use]
    pub const fn span_including_line_break(&self) -> TextSpan {
        TextSpan::new(self.start, self.length + self.line_break_length)
    }

    /// The terminator alone; empty for a final line without one.
    #[must_use]
    pub const fn line_break_span(&self) -> TextSpan {
        TextSpan::new(self.start + self.length, self.line_break_length)
    }

    #[must_use]
    pub const fn has_line_break(&self) -> bool {
        self.line_break_length > 0
    }
}

/// Zero-based line and column of a byte position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePosition {
    pub line: usize,
    pub column: usize,
}

/// An immutable buffer plus its line table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceText {
    text: String,
    lines: Vec<TextLine>,
}

impl SourceText {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let lines = split_lines(&text);
        debug_assert!(
            lines_cover_text(&lines, text.len()),
            "line table does not cover the text"
        );
        Self { text, lines }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[must_use]
    pub fn lines(&self) -> &[TextLine] {
        &self.lines
    }

    #[must_use]
    pub fn line(&self, index: usize) -> Option<&TextLine> {
        self.lines.get(index)
    }

    /// Index of the line containing `position`.
    ///
    /// Positions at or past the end of the text map to the last line. On
    /// empty text this returns 0 even though there are no lines.
    #[must_use]
    pub fn line_index(&self, position: usize) -> usize {
        self.lines
            .partition_point(|line| line.start <= position)
            .saturating_sub(1)
    }

    #[must_use]
    pub fn line_position(&self, position: usize) -> LinePosition {
        let line = self.line_index(position);
        let line_start = self.lines.get(line).map_or(0, TextLine::start);
        LinePosition {
            line,
            column: position.saturating_sub(line_start),
        }
    }

    /// Zero-copy view of `span`. Out-of-range spans are a programming error.
    #[must_use]
    pub fn slice(&self, span: TextSpan) -> &str {
        &self.text[span.range()]
    }

    /// Content of line `index` without its terminator.
    #[must_use]
    pub fn line_text(&self, index: usize) -> &str {
        self.lines
            .get(index)
            .map_or("", |line| self.slice(line.span()))
    }
}

impl From<&str> for SourceText {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for SourceText {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl fmt::Display for SourceText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Split on `\r\n`, `\r` and `\n`. A trailing line without terminator is
/// kept; an empty remainder after the last terminator is not a line.
fn split_lines(text: &str) -> Vec<TextLine> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let break_length = match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => 2,
            b'\r' | b'\n' => 1,
            _ => {
                i += 1;
                continue;
            }
        };
        lines.push(TextLine::new(start, i - start, break_length));
        i += break_length;
        start = i;
    }

    if start < bytes.len() {
        lines.push(TextLine::new(start, bytes.len() - start, 0));
    }

    lines
}

fn lines_cover_text(lines: &[TextLine], length: usize) -> bool {
    let mut expected_start = 0;
    for line in lines {
        if line.start != expected_start {
            return false;
        }
        expected_start = line.span_including_line_break().end();
    }
    expected_start == length
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn line_texts(text: &SourceText) -> Vec<&str> {
        text.lines()
            .iter()
            .map(|line| text.slice(line.span_including_line_break()))
            .collect()
    }

    #[test]
    fn span_from_bounds() {
        let span = TextSpan::from_bounds(3, 7);
        assert_eq!(span.start(), 3);
        assert_eq!(span.len(), 4);
        assert_eq!(span.end(), 7);
        assert_eq!(span.to_string(), "[3..7)");
    }

    #[test]
    fn span_contains_position_is_half_open() {
        let span = TextSpan::new(2, 3);
        assert!(!span.contains(1));
        assert!(span.contains(2));
        assert!(span.contains(4));
        assert!(!span.contains(5));
    }

    #[test]
    fn span_contains_empty_span_tests_start_only() {
        let span = TextSpan::new(2, 3);
        assert!(span.contains_span(TextSpan::new(2, 0)));
        assert!(span.contains_span(TextSpan::new(4, 0)));
        assert!(!span.contains_span(TextSpan::new(5, 0)));
        assert!(span.contains_span(TextSpan::new(3, 2)));
        assert!(!span.contains_span(TextSpan::new(3, 3)));
    }

    #[test]
    fn span_overlaps() {
        let span = TextSpan::new(2, 3);
        assert!(span.overlaps(TextSpan::new(4, 10)));
        assert!(!span.overlaps(TextSpan::new(5, 10)));
        assert!(!span.overlaps(TextSpan::new(0, 2)));
        assert!(!span.overlaps(TextSpan::new(3, 0)));
    }

    #[test]
    fn splits_every_terminator_kind() {
        let text = SourceText::from("a\r\nb\rc\nd");
        assert_eq!(line_texts(&text), vec!["a\r\n", "b\r", "c\n", "d"]);
        assert_eq!(text.line_text(0), "a");
        assert_eq!(text.line_text(3), "d");
        assert!(!text.lines()[3].has_line_break());
        assert_eq!(text.lines()[0].line_break_span(), TextSpan::new(1, 2));
    }

    #[test]
    fn trailing_terminator_does_not_add_empty_line() {
        let text = SourceText::from("one\ntwo\n");
        assert_eq!(text.lines().len(), 2);
        assert_eq!(line_texts(&text).concat(), "one\ntwo\n");
    }

    #[test]
    fn blank_lines_are_lines() {
        let text = SourceText::from("\n\n");
        assert_eq!(text.lines().len(), 2);
        assert!(text.lines()[1].span().is_empty());
    }

    #[test]
    fn empty_text_has_no_lines() {
        let text = SourceText::from("");
        assert!(text.lines().is_empty());
        assert_eq!(text.line_index(0), 0);
    }

    #[test]
    fn line_index_is_greatest_start_at_or_before() {
        let text = SourceText::from("ab\ncd\nef");
        assert_eq!(text.line_index(0), 0);
        assert_eq!(text.line_index(2), 0);
        assert_eq!(text.line_index(3), 1);
        assert_eq!(text.line_index(6), 2);
        assert_eq!(text.line_index(100), 2);
    }

    #[test]
    fn line_position_is_zero_based() {
        let text = SourceText::from("ab\ncd\n");
        assert_eq!(
            text.line_position(4),
            LinePosition { line: 1, column: 1 }
        );
    }

    #[test]
    fn lines_reconstruct_text() {
        let source = "x\r\n\ry\n\nz\r";
        let text = SourceText::from(source);
        assert_eq!(line_texts(&text).concat(), source);
        assert!(lines_cover_text(text.lines(), text.len()));
    }
}
