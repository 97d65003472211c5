//! Lossless syntax tree for unified diffs.
//!
//! Nodes live in an arena ([`SyntaxTree`]) and are addressed by [`NodeId`].
//! Each node records its parent when it is created, so ancestor queries never
//! need a side table. Leaves are tokens; a token owns the whitespace and line
//! terminator that follow it as trailing [`Trivia`]. Writing every token span
//! and its trivia in document order reproduces the source text exactly.

use std::fmt;

use crate::diff::{FileMode, LineRange};
use crate::text::{SourceText, TextSpan};

/// Index of a node in its [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Every kind of node, token and trivia in a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    // Trivia
    SpaceTrivia,
    EndOfLineTrivia,

    // Value tokens
    PathToken,
    TextToken,
    HashToken,
    ModeToken,
    PercentageToken,
    RangeToken,

    // Keywords
    DiffKeyword,
    GitKeyword,
    IndexKeyword,
    OldKeyword,
    NewKeyword,
    DeletedKeyword,
    FileKeyword,
    ModeKeyword,
    CopyKeyword,
    RenameKeyword,
    FromKeyword,
    ToKeyword,
    SimilarityKeyword,
    DissimilarityKeyword,
    BinaryKeyword,
    FilesKeyword,
    AndKeyword,
    DifferKeyword,

    // Operators and line markers
    DotDotToken,
    MinusMinusMinusToken,
    PlusPlusPlusToken,
    AtAtToken,
    ContextMarkerToken,
    AddedMarkerToken,
    DeletedMarkerToken,
    BackslashToken,

    // Structure
    Patch,
    Entry,
    Hunk,

    // Entry headers
    DiffGitHeader,
    IndexHeader,
    OldModeHeader,
    NewModeHeader,
    DeletedFileModeHeader,
    NewFileModeHeader,
    CopyFromHeader,
    CopyToHeader,
    RenameFromHeader,
    RenameToHeader,
    SimilarityIndexHeader,
    DissimilarityIndexHeader,
    OldPathHeader,
    NewPathHeader,
    BinaryFilesHeader,
    UnknownHeader,
    HunkHeader,

    // Hunk lines
    ContextLine,
    AddedLine,
    DeletedLine,
    NoFinalLineBreakLine,
}

impl SyntaxKind {
    #[must_use]
    pub const fn is_trivia(self) -> bool {
        matches!(self, Self::SpaceTrivia | Self::EndOfLineTrivia)
    }

    #[must_use]
    pub const fn is_token(self) -> bool {
        matches!(
            self,
            Self::PathToken
                | Self::TextToken
                | Self::HashToken
                | Self::ModeToken
                | Self::PercentageToken
                | Self::RangeToken
                | Self::DiffKeyword
                | Self::GitKeyword
                | Self::IndexKeyword
                | Self::OldKeyword
                | Self::NewKeyword
                | Self::DeletedKeyword
                | Self::FileKeyword
                | Self::ModeKeyword
                | Self::CopyKeyword
                | Self::RenameKeyword
                | Self::FromKeyword
                | Self::ToKeyword
                | Self::SimilarityKeyword
                | Self::DissimilarityKeyword
                | Self::BinaryKeyword
                | Self::FilesKeyword
                | Self::AndKeyword
                | Self::DifferKeyword
                | Self::DotDotToken
                | Self::MinusMinusMinusToken
                | Self::PlusPlusPlusToken
                | Self::AtAtToken
                | Self::ContextMarkerToken
                | Self::AddedMarkerToken
                | Self::DeletedMarkerToken
                | Self::BackslashToken
        )
    }

    /// Entry header lines, not counting the hunk header.
    #[must_use]
    pub const fn is_entry_header(self) -> bool {
        matches!(
            self,
            Self::DiffGitHeader
                | Self::IndexHeader
                | Self::OldModeHeader
                | Self::NewModeHeader
                | Self::DeletedFileModeHeader
                | Self::NewFileModeHeader
                | Self::CopyFromHeader
                | Self::CopyToHeader
                | Self::RenameFromHeader
                | Self::RenameToHeader
                | Self::SimilarityIndexHeader
                | Self::DissimilarityIndexHeader
                | Self::OldPathHeader
                | Self::NewPathHeader
                | Self::BinaryFilesHeader
                | Self::UnknownHeader
        )
    }

    #[must_use]
    pub const fn is_hunk_line(self) -> bool {
        matches!(
            self,
            Self::ContextLine | Self::AddedLine | Self::DeletedLine | Self::NoFinalLineBreakLine
        )
    }

    /// Human readable name used in parse errors.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::SpaceTrivia => "space",
            Self::EndOfLineTrivia => "end of line",
            Self::PathToken => "path",
            Self::TextToken => "text",
            Self::HashToken => "object hash",
            Self::ModeToken => "file mode",
            Self::PercentageToken => "percentage",
            Self::RangeToken => "line range",
            Self::DiffKeyword => "'diff'",
            Self::GitKeyword => "'--git'",
            Self::IndexKeyword => "'index'",
            Self::OldKeyword => "'old'",
            Self::NewKeyword => "'new'",
            Self::DeletedKeyword => "'deleted'",
            Self::FileKeyword => "'file'",
            Self::ModeKeyword => "'mode'",
            Self::CopyKeyword => "'copy'",
            Self::RenameKeyword => "'rename'",
            Self::FromKeyword => "'from'",
            Self::ToKeyword => "'to'",
            Self::SimilarityKeyword => "'similarity'",
            Self::DissimilarityKeyword => "'dissimilarity'",
            Self::BinaryKeyword => "'Binary'",
            Self::FilesKeyword => "'files'",
            Self::AndKeyword => "'and'",
            Self::DifferKeyword => "'differ'",
            Self::DotDotToken => "'..'",
            Self::MinusMinusMinusToken => "'---'",
            Self::PlusPlusPlusToken => "'+++'",
            Self::AtAtToken => "'@@'",
            Self::ContextMarkerToken => "' '",
            Self::AddedMarkerToken => "'+'",
            Self::DeletedMarkerToken => "'-'",
            Self::BackslashToken => "'\\'",
            Self::Patch => "patch",
            Self::Entry => "patch entry",
            Self::Hunk => "hunk",
            Self::DiffGitHeader => "diff header",
            Self::IndexHeader => "index header",
            Self::OldModeHeader => "old mode header",
            Self::NewModeHeader => "new mode header",
            Self::DeletedFileModeHeader => "deleted file mode header",
            Self::NewFileModeHeader => "new file mode header",
            Self::CopyFromHeader => "copy from header",
            Self::CopyToHeader => "copy to header",
            Self::RenameFromHeader => "rename from header",
            Self::RenameToHeader => "rename to header",
            Self::SimilarityIndexHeader => "similarity index header",
            Self::DissimilarityIndexHeader => "dissimilarity index header",
            Self::OldPathHeader => "old path header",
            Self::NewPathHeader => "new path header",
            Self::BinaryFilesHeader => "binary files header",
            Self::UnknownHeader => "header",
            Self::HunkHeader => "hunk header",
            Self::ContextLine => "context line",
            Self::AddedLine => "added line",
            Self::DeletedLine => "deleted line",
            Self::NoFinalLineBreakLine => "no newline marker",
        }
    }
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Typed value carried by value-bearing tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValue {
    /// Unquoted path with any `a/`/`b/` prefix removed. Empty for `/dev/null`.
    Path(String),
    Mode(FileMode),
    Percentage(u8),
    Range(LineRange),
}

/// Whitespace or a line terminator trailing a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trivia {
    pub kind: SyntaxKind,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    kind: SyntaxKind,
    span: TextSpan,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    trailing_trivia: Vec<Trivia>,
    value: Option<TokenValue>,
}

impl SyntaxNode {
    #[must_use]
    pub fn kind(&self) -> SyntaxKind {
        self.kind
    }

    /// Tight span: the token text alone, or the union of the children.
    #[must_use]
    pub fn span(&self) -> TextSpan {
        self.span
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[must_use]
    pub fn trailing_trivia(&self) -> &[Trivia] {
        &self.trailing_trivia
    }

    #[must_use]
    pub fn value(&self) -> Option<&TokenValue> {
        self.value.as_ref()
    }
}

/// Arena holding every node of one parsed patch. Node 0 is the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
}

impl SyntaxTree {
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn kind(&self, id: NodeId) -> SyntaxKind {
        self.node(id).kind
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Proper ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), |&node| self.parent(node))
    }

    /// Proper descendants of `id` in document order.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { tree: self, stack }
    }

    /// Tokens under `id` (or `id` itself if it is a token) in document order.
    pub fn tokens(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(id)
            .chain(self.descendants(id))
            .filter(|&node| self.kind(node).is_token())
    }

    #[must_use]
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|candidate| candidate == ancestor)
    }

    /// Nearest node of `kind` among `id` and its ancestors.
    #[must_use]
    pub fn ancestor_or_self_of_kind(&self, id: NodeId, kind: SyntaxKind) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|&node| self.kind(node) == kind)
    }

    /// Span including the trailing trivia of the last token.
    #[must_use]
    pub fn full_span(&self, id: NodeId) -> TextSpan {
        let node = self.node(id);
        let last_token = if node.kind.is_token() {
            Some(id)
        } else {
            self.tokens(id).last()
        };

        let end = last_token
            .and_then(|token| self.node(token).trailing_trivia.last())
            .map_or(node.span.end(), |trivia| trivia.span.end());

        TextSpan::from_bounds(node.span.start(), end)
    }

    /// Deepest token whose full span contains `position`.
    #[must_use]
    pub fn token_at(&self, position: usize) -> Option<NodeId> {
        let mut current = self.root();
        loop {
            if self.kind(current).is_token() {
                return Some(current);
            }
            let children = self.children(current);
            let index = children
                .partition_point(|&child| self.node(child).span.start() <= position)
                .checked_sub(1)?;
            let child = children[index];
            if !self.full_span(child).contains(position) {
                return None;
            }
            current = child;
        }
    }

    /// Append the text of `id`, trivia included, to `out`.
    pub fn write_text(&self, id: NodeId, source: &SourceText, out: &mut String) {
        for token in self.tokens(id) {
            let node = self.node(token);
            out.push_str(source.slice(node.span));
            for trivia in &node.trailing_trivia {
                out.push_str(source.slice(trivia.span));
            }
        }
    }

    /// True when tokens and trivia tile `[0, source.len())` with no gap.
    #[must_use]
    pub fn covers(&self, source: &SourceText) -> bool {
        let mut expected = 0;
        for token in self.tokens(self.root()) {
            let node = self.node(token);
            if node.span.start() != expected {
                return false;
            }
            expected = node.span.end();
            for trivia in &node.trailing_trivia {
                if trivia.span.start() != expected {
                    return false;
                }
                expected = trivia.span.end();
            }
        }
        expected == source.len()
    }
}

/// Pre-order walk produced by [`SyntaxTree::descendants`].
pub struct Descendants<'a> {
    tree: &'a SyntaxTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(node).iter().rev().copied());
        Some(node)
    }
}

/// Builds a [`SyntaxTree`] top-down, recording parents as nodes are created.
#[derive(Debug, Default)]
pub(crate) struct TreeBuilder {
    nodes: Vec<SyntaxNode>,
    stack: Vec<NodeId>,
    last_token: Option<NodeId>,
}

impl TreeBuilder {
    fn push(&mut self, kind: SyntaxKind, span: TextSpan, value: Option<TokenValue>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let parent = self.stack.last().copied();
        self.nodes.push(SyntaxNode {
            kind,
            span,
            parent,
            children: Vec::new(),
            trailing_trivia: Vec::new(),
            value,
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        id
    }

    pub(crate) fn start_node(&mut self, kind: SyntaxKind) -> NodeId {
        let id = self.push(kind, TextSpan::default(), None);
        self.stack.push(id);
        id
    }

    /// Close the innermost open node and give it the union of its children.
    pub(crate) fn finish_node(&mut self) {
        debug_assert!(!self.stack.is_empty(), "finish_node without open node");
        let Some(id) = self.stack.pop() else {
            return;
        };
        let node = &self.nodes[id.index()];
        let span = match (node.children.first(), node.children.last()) {
            (Some(first), Some(last)) => TextSpan::from_bounds(
                self.nodes[first.index()].span.start(),
                self.nodes[last.index()].span.end(),
            ),
            _ => TextSpan::default(),
        };
        self.nodes[id.index()].span = span;
    }

    pub(crate) fn token(
        &mut self,
        kind: SyntaxKind,
        span: TextSpan,
        value: Option<TokenValue>,
    ) -> NodeId {
        debug_assert!(kind.is_token(), "{kind:?} is not a token kind");
        let id = self.push(kind, span, value);
        self.last_token = Some(id);
        id
    }

    /// Attach trivia to the most recent token.
    pub(crate) fn trivia(&mut self, kind: SyntaxKind, span: TextSpan) {
        debug_assert!(kind.is_trivia(), "{kind:?} is not a trivia kind");
        debug_assert!(self.last_token.is_some(), "trivia before the first token");
        if span.is_empty() {
            return;
        }
        if let Some(token) = self.last_token {
            self.nodes[token.index()]
                .trailing_trivia
                .push(Trivia { kind, span });
        }
    }

    pub(crate) fn finish(self) -> SyntaxTree {
        debug_assert!(self.stack.is_empty(), "unclosed syntax nodes");
        SyntaxTree { nodes: self.nodes }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::diff::Patch;
    use similar_asserts::assert_eq;

    const DIFF: &str = "diff --git a/src/lib.rs b/src/lib.rs
index 1a2b3c4..5d6e7f8 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,2 +1,2 @@ fn main()
 keep
-old
+new
";

    #[test]
    fn tree_round_trips_source() {
        let patch = Patch::parse(DIFF).unwrap();
        let tree = patch.tree();
        let mut out = String::new();
        tree.write_text(tree.root(), patch.text(), &mut out);
        assert_eq!(out, DIFF);
        assert!(tree.covers(patch.text()));
    }

    #[test]
    fn root_is_patch_and_has_no_parent() {
        let patch = Patch::parse(DIFF).unwrap();
        let tree = patch.tree();
        assert_eq!(tree.kind(tree.root()), SyntaxKind::Patch);
        assert_eq!(tree.parent(tree.root()), None);
        assert_eq!(tree.children(tree.root()).len(), 1);
    }

    #[test]
    fn ancestors_walk_to_root() {
        let patch = Patch::parse(DIFF).unwrap();
        let tree = patch.tree();
        let position = DIFF.find("+new").unwrap() + 1;
        let token = tree.token_at(position).unwrap();
        assert_eq!(tree.kind(token), SyntaxKind::TextToken);

        let kinds: Vec<SyntaxKind> = tree.ancestors(token).map(|id| tree.kind(id)).collect();
        assert_eq!(
            kinds,
            vec![
                SyntaxKind::AddedLine,
                SyntaxKind::Hunk,
                SyntaxKind::Entry,
                SyntaxKind::Patch
            ]
        );
        let entry = tree
            .ancestor_or_self_of_kind(token, SyntaxKind::Entry)
            .unwrap();
        assert!(tree.is_ancestor_of(entry, token));
        assert!(!tree.is_ancestor_of(token, entry));
    }

    #[test]
    fn descendants_are_in_document_order() {
        let patch = Patch::parse(DIFF).unwrap();
        let tree = patch.tree();
        let starts: Vec<usize> = tree
            .tokens(tree.root())
            .map(|id| tree.node(id).span().start())
            .collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);

        for id in tree.descendants(tree.root()) {
            let parent = tree.parent(id).unwrap();
            assert!(tree.children(parent).contains(&id));
        }
    }

    #[test]
    fn token_span_excludes_trivia() {
        let patch = Patch::parse(DIFF).unwrap();
        let tree = patch.tree();
        let token = tree.token_at(0).unwrap();
        assert_eq!(tree.kind(token), SyntaxKind::DiffKeyword);
        assert_eq!(tree.node(token).span(), TextSpan::new(0, 4));
        assert_eq!(tree.full_span(token), TextSpan::new(0, 5));
        assert_eq!(
            tree.node(token).trailing_trivia()[0].kind,
            SyntaxKind::SpaceTrivia
        );
    }

    #[test]
    fn line_node_span_is_tight_and_full_span_has_line_break() {
        let patch = Patch::parse(DIFF).unwrap();
        let tree = patch.tree();
        let header = patch.entries()[0].headers()[0].node();
        assert_eq!(tree.kind(header), SyntaxKind::DiffGitHeader);
        assert_eq!(
            patch.text().slice(tree.node(header).span()),
            "diff --git a/src/lib.rs b/src/lib.rs"
        );
        assert_eq!(
            patch.text().slice(tree.full_span(header)),
            "diff --git a/src/lib.rs b/src/lib.rs\n"
        );
    }

    #[test]
    fn value_tokens_carry_values() {
        let patch = Patch::parse(DIFF).unwrap();
        let tree = patch.tree();
        let values: Vec<&TokenValue> = tree
            .descendants(tree.root())
            .filter_map(|id| tree.node(id).value())
            .collect();
        assert_eq!(
            values,
            vec![
                &TokenValue::Path("src/lib.rs".to_string()),
                &TokenValue::Path("src/lib.rs".to_string()),
                &TokenValue::Mode(FileMode::RegularNonExecutableFile),
                &TokenValue::Path("src/lib.rs".to_string()),
                &TokenValue::Path("src/lib.rs".to_string()),
                &TokenValue::Range(LineRange { start: 1, length: 2 }),
                &TokenValue::Range(LineRange { start: 1, length: 2 }),
            ]
        );
    }
}
