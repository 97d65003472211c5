//! Cursor over a single line of diff text.
//!
//! Every method either consumes a token (pushing it into the tree builder) or
//! returns a positioned [`ParseError`]. Whitespace between tokens and the line
//! terminator become trailing trivia of the preceding token.

use nom::bytes::complete::take_while1;
use nom::character::complete::{digit1, hex_digit1};
use nom::{IResult, Parser};

use super::hunk::LineRange;
use super::mode::FileMode;
use super::parser::ParseError;
use super::path::path_value;
use crate::syntax::{NodeId, SyntaxKind, TokenValue, TreeBuilder};
use crate::text::{SourceText, TextLine, TextSpan};

fn digits(input: &str) -> IResult<&str, &str> {
    digit1(input)
}

fn hex_digits(input: &str) -> IResult<&str, &str> {
    hex_digit1(input)
}

fn octal_digits(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_digit(8)).parse(input)
}

fn blanks(text: &str) -> usize {
    text.len() - text.trim_start_matches([' ', '\t']).len()
}

pub(crate) struct LineTokenizer<'s> {
    source: &'s SourceText,
    line: TextLine,
    line_index: usize,
    position: usize,
}

impl<'s> LineTokenizer<'s> {
    pub(crate) fn new(source: &'s SourceText, line_index: usize, line: TextLine) -> Self {
        Self {
            source,
            line,
            line_index,
            position: line.start(),
        }
    }

    pub(crate) fn text_line(&self) -> TextLine {
        self.line
    }

    /// Unconsumed text up to, not including, the line terminator.
    pub(crate) fn rest(&self) -> &'s str {
        self.source
            .slice(TextSpan::from_bounds(self.position, self.line.span().end()))
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.position >= self.line.span().end()
    }

    /// 1-based line and column of the byte `offset` bytes past the cursor.
    fn location(&self, offset: usize) -> (usize, usize) {
        (
            self.line_index + 1,
            self.position - self.line.start() + offset + 1,
        )
    }

    pub(crate) fn expected_text(&self, expected: &'static str) -> ParseError {
        self.expected_text_at(0, expected)
    }

    fn expected_text_at(&self, offset: usize, expected: &'static str) -> ParseError {
        let (line, column) = self.location(offset);
        ParseError::ExpectedText {
            line,
            column,
            expected,
        }
    }

    fn expected_integer_at(&self, offset: usize) -> ParseError {
        let (line, column) = self.location(offset);
        ParseError::ExpectedInteger { line, column }
    }

    fn scan(&self, offset: usize, parser: fn(&str) -> IResult<&str, &str>) -> Option<usize> {
        let text = self.rest().get(offset..)?;
        parser(text).ok().map(|(_, matched)| matched.len())
    }

    pub(crate) fn token(
        &mut self,
        builder: &mut TreeBuilder,
        kind: SyntaxKind,
        length: usize,
        value: Option<TokenValue>,
    ) -> NodeId {
        let span = TextSpan::new(self.position, length);
        self.position += length;
        builder.token(kind, span, value)
    }

    /// Consume the rest of the line as one token and return its text.
    pub(crate) fn rest_token(
        &mut self,
        builder: &mut TreeBuilder,
        kind: SyntaxKind,
        value: Option<TokenValue>,
    ) -> &'s str {
        let text = self.rest();
        self.token(builder, kind, text.len(), value);
        text
    }

    pub(crate) fn keyword(
        &mut self,
        builder: &mut TreeBuilder,
        kind: SyntaxKind,
        text: &'static str,
    ) -> Result<NodeId, ParseError> {
        if self.rest().starts_with(text) {
            Ok(self.token(builder, kind, text.len(), None))
        } else {
            Err(self.expected_text(kind.description()))
        }
    }

    /// Keywords separated by whitespace, e.g. `deleted file mode`.
    pub(crate) fn keywords(
        &mut self,
        builder: &mut TreeBuilder,
        keywords: &[(SyntaxKind, &'static str)],
    ) -> Result<(), ParseError> {
        for (i, &(kind, text)) in keywords.iter().enumerate() {
            if i > 0 {
                self.space(builder)?;
            }
            self.keyword(builder, kind, text)?;
        }
        Ok(())
    }

    /// One or more spaces or tabs.
    pub(crate) fn space(&mut self, builder: &mut TreeBuilder) -> Result<(), ParseError> {
        let length = blanks(self.rest());
        if length == 0 {
            return Err(self.expected_text(SyntaxKind::SpaceTrivia.description()));
        }
        builder.trivia(SyntaxKind::SpaceTrivia, TextSpan::new(self.position, length));
        self.position += length;
        Ok(())
    }

    /// Exactly one space, if present.
    pub(crate) fn separator(&mut self, builder: &mut TreeBuilder) -> bool {
        if !self.rest().starts_with(' ') {
            return false;
        }
        builder.trivia(SyntaxKind::SpaceTrivia, TextSpan::new(self.position, 1));
        self.position += 1;
        true
    }

    /// True when only whitespace is left on the line.
    pub(crate) fn only_blanks_left(&self) -> bool {
        let rest = self.rest();
        blanks(rest) == rest.len()
    }

    /// A path token of `length` bytes with `prefix` stripped from its value.
    pub(crate) fn path(
        &mut self,
        builder: &mut TreeBuilder,
        length: usize,
        prefix: &str,
    ) -> Result<String, ParseError> {
        let raw = self.rest().get(..length).unwrap_or_default();
        if raw.is_empty() {
            return Err(self.expected_text(SyntaxKind::PathToken.description()));
        }
        let value = path_value(raw, prefix);
        self.token(
            builder,
            SyntaxKind::PathToken,
            length,
            Some(TokenValue::Path(value.clone())),
        );
        Ok(value)
    }

    pub(crate) fn hash(&mut self, builder: &mut TreeBuilder) -> Result<String, ParseError> {
        let Some(length) = self.scan(0, hex_digits) else {
            return Err(self.expected_text(SyntaxKind::HashToken.description()));
        };
        let text = self.rest().get(..length).unwrap_or_default().to_string();
        self.token(builder, SyntaxKind::HashToken, length, None);
        Ok(text)
    }

    pub(crate) fn mode(&mut self, builder: &mut TreeBuilder) -> Result<FileMode, ParseError> {
        let mode = self.scan(0, octal_digits).and_then(|length| {
            let text = self.rest().get(..length)?;
            FileMode::from_octal(text).map(|mode| (mode, length))
        });
        let Some((mode, length)) = mode else {
            let (line, column) = self.location(0);
            return Err(ParseError::ExpectedMode { line, column });
        };
        self.token(builder, SyntaxKind::ModeToken, length, Some(TokenValue::Mode(mode)));
        Ok(mode)
    }

    /// `N%` with N in `1..=100`.
    pub(crate) fn percentage(&mut self, builder: &mut TreeBuilder) -> Result<u8, ParseError> {
        let (line, column) = self.location(0);
        let invalid = ParseError::ExpectedPercentage { line, column };
        let Some(length) = self.scan(0, digits) else {
            return Err(invalid);
        };
        let value = self
            .rest()
            .get(..length)
            .and_then(|text| text.parse::<u8>().ok())
            .filter(|value| (1..=100).contains(value))
            .ok_or(invalid)?;
        if !self.rest().get(length..).is_some_and(|text| text.starts_with('%')) {
            return Err(self.expected_text_at(length, "'%'"));
        }
        self.token(
            builder,
            SyntaxKind::PercentageToken,
            length + 1,
            Some(TokenValue::Percentage(value)),
        );
        Ok(value)
    }

    fn integer_at(&self, offset: usize) -> Result<(u32, usize), ParseError> {
        let length = self
            .scan(offset, digits)
            .ok_or_else(|| self.expected_integer_at(offset))?;
        let value = self
            .rest()
            .get(offset..offset + length)
            .and_then(|text| text.parse::<u32>().ok())
            .ok_or_else(|| self.expected_integer_at(offset))?;
        Ok((value, length))
    }

    /// `<sign>start[,length]` from a hunk header. An omitted length is 1.
    pub(crate) fn line_range(
        &mut self,
        builder: &mut TreeBuilder,
        sign: char,
    ) -> Result<LineRange, ParseError> {
        if !self.rest().starts_with(sign) {
            let kind = if sign == '-' {
                SyntaxKind::DeletedMarkerToken
            } else {
                SyntaxKind::AddedMarkerToken
            };
            return Err(self.expected_text(kind.description()));
        }

        let (start, digits) = self.integer_at(1)?;
        let mut length = 1 + digits;
        let mut range = LineRange { start, length: 1 };
        if self.rest().get(length..).is_some_and(|text| text.starts_with(',')) {
            let (count, digits) = self.integer_at(length + 1)?;
            range.length = count;
            length += 1 + digits;
        }

        self.token(
            builder,
            SyntaxKind::RangeToken,
            length,
            Some(TokenValue::Range(range)),
        );
        Ok(range)
    }

    /// Attach trailing whitespace and the line terminator to the last token.
    pub(crate) fn finish(self, builder: &mut TreeBuilder) -> Result<(), ParseError> {
        let rest = self.rest();
        if !rest.is_empty() {
            if !self.only_blanks_left() {
                return Err(self.expected_text(SyntaxKind::EndOfLineTrivia.description()));
            }
            builder.trivia(
                SyntaxKind::SpaceTrivia,
                TextSpan::new(self.position, rest.len()),
            );
        }
        builder.trivia(SyntaxKind::EndOfLineTrivia, self.line.line_break_span());
        Ok(())
    }
}
