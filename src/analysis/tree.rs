//! Structural tree over the token stream.
//!
//! This is not a C parser. It recovers just enough shape for style rules:
//! brace blocks, statements, declarations, function and type definitions,
//! preprocessor conditionals, and comment blocks tied to the code they
//! describe. Unbalanced input is recorded as `StructureError`s and the tree
//! is still produced.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::ops::Range;

use super::token::{is_control_keyword, is_declaration_keyword, Token, TokenKind};
use crate::error::{StructureError, StructureErrorKind};

pub type NodeId = usize;

/// Brace nesting beyond this is kept flat.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    TranslationUnit,
    BraceBlock,
    Statement,
    Declaration,
    FunctionDefinition,
    TypeDefinition,
    MacroDefinition,
    CommentBlock,
    /// `#if`/`#ifdef`/`#ifndef` through the matching `#endif`.
    PreprocessorBlock,
    /// Any directive other than `#define`.
    Directive,
    Label,
}

#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    /// Token index range, end exclusive.
    pub tokens: Range<usize>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Defining identifier for functions and labels.
    pub name: Option<usize>,
    /// Comment block that shares its line with code.
    pub trailing: bool,
    /// Block synthesized while recovering from an unmatched `}`.
    pub recovered: bool,
}

#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
    errors: Vec<StructureError>,
    comment_targets: HashMap<NodeId, NodeId>,
    block_openers: HashSet<usize>,
}

/// Name of a directive: `# ifdef FOO` gives `ifdef`.
pub fn directive_name(text: &str) -> &str {
    let rest = text.trim_start_matches('#').trim_start_matches([' ', '\t']);
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    &rest[..end]
}

impl SyntaxTree {
    pub fn build(tokens: &[Token]) -> Self {
        let mut builder = Builder {
            tokens,
            nodes: vec![SyntaxNode {
                kind: NodeKind::TranslationUnit,
                tokens: 0..tokens.len(),
                parent: None,
                children: Vec::new(),
                name: None,
                trailing: false,
                recovered: false,
            }],
            errors: Vec::new(),
            pos: 0,
            depth: 0,
        };
        builder.items(0, false, Scope::FILE, false);

        let count = builder.nodes.len();
        for id in 0..count {
            if !builder.nodes[id].children.is_empty() {
                builder.group_conditionals(id);
            }
        }

        let mut errors = builder.errors;
        errors.sort_by_key(|e| e.span.start_byte);
        let nodes = builder.nodes;

        let mut comment_targets = HashMap::new();
        for (id, node) in nodes.iter().enumerate() {
            for (i, &child) in node.children.iter().enumerate() {
                if nodes[child].kind != NodeKind::CommentBlock {
                    continue;
                }
                let target = node.children[i + 1..]
                    .iter()
                    .copied()
                    .find(|&c| nodes[c].kind != NodeKind::CommentBlock)
                    .unwrap_or(id);
                comment_targets.insert(child, target);
            }
        }

        let block_openers = nodes
            .iter()
            .filter(|n| n.kind == NodeKind::BraceBlock && !n.recovered)
            .map(|n| n.tokens.start)
            .collect();

        Self {
            nodes,
            errors,
            comment_targets,
            block_openers,
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1 && self.nodes[0].children.is_empty()
    }

    pub fn errors(&self) -> &[StructureError] {
        &self.errors
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// All nodes under `id` (inclusive) in source order.
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.nodes[n].children.iter().rev());
        }
        out
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[id].parent, move |&n| self.nodes[n].parent)
    }

    pub fn enclosing(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.ancestors(id).find(|&n| self.nodes[n].kind == kind)
    }

    /// First brace block directly under `id`.
    pub fn block(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].kind == NodeKind::BraceBlock)
    }

    /// The construct a comment block describes.
    pub fn comment_target(&self, comment: NodeId) -> Option<NodeId> {
        self.comment_targets.get(&comment).copied()
    }

    /// Closest standalone comment block linked to `target`.
    pub fn leading_comment(&self, target: NodeId) -> Option<NodeId> {
        let parent = self.nodes[target].parent?;
        self.nodes[parent].children.iter().rev().copied().find(|&c| {
            self.nodes[c].kind == NodeKind::CommentBlock
                && !self.nodes[c].trailing
                && self.comment_target(c) == Some(target)
        })
    }

    /// Whether the token at `index` opens a brace block (as opposed to an
    /// initializer).
    pub fn opens_block(&self, index: usize) -> bool {
        self.block_openers.contains(&index)
    }

    /// First code token of a node.
    pub fn first_code(&self, tokens: &[Token], id: NodeId) -> Option<usize> {
        self.nodes[id]
            .tokens
            .clone()
            .find(|&i| tokens[i].kind.is_code())
    }

    /// Last code token of a node.
    pub fn last_code(&self, tokens: &[Token], id: NodeId) -> Option<usize> {
        self.nodes[id]
            .tokens
            .clone()
            .rev()
            .find(|&i| tokens[i].kind.is_code())
    }

    /// Leading keyword of a statement, if it starts with one.
    pub fn lead_keyword<'t>(&self, tokens: &'t [Token], id: NodeId) -> Option<&'t str> {
        let first = self.first_code(tokens, id)?;
        (tokens[first].kind == TokenKind::Keyword).then(|| tokens[first].text.as_str())
    }

    /// Statement opening with `if`, `for`, `while`, `do`, `switch` or `else`.
    pub fn is_control(&self, tokens: &[Token], id: NodeId) -> bool {
        self.nodes[id].kind == NodeKind::Statement
            && self
                .lead_keyword(tokens, id)
                .is_some_and(is_control_keyword)
    }
}

#[derive(Clone, Copy)]
struct Scope {
    in_function: bool,
}

impl Scope {
    const FILE: Scope = Scope { in_function: false };
}

struct Builder<'t> {
    tokens: &'t [Token],
    nodes: Vec<SyntaxNode>,
    errors: Vec<StructureError>,
    pos: usize,
    depth: usize,
}

impl<'t> Builder<'t> {
    fn push_node(&mut self, kind: NodeKind, parent: NodeId, start: usize) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(SyntaxNode {
            kind,
            tokens: start..start,
            parent: Some(parent),
            children: Vec::new(),
            name: None,
            trailing: false,
            recovered: false,
        });
        self.nodes[parent].children.push(id);
        id
    }

    fn finish(&mut self, id: NodeId, end: usize) {
        self.nodes[id].tokens.end = end;
    }

    fn error(&mut self, kind: StructureErrorKind, index: usize) {
        self.errors.push(StructureError {
            kind,
            span: self.tokens[index].span,
        });
    }

    fn next_code(&self, from: usize) -> Option<usize> {
        (from..self.tokens.len()).find(|&i| self.tokens[i].kind.is_code())
    }

    fn prev_code(&self, before: usize, floor: usize) -> Option<usize> {
        (floor..before).rev().find(|&i| self.tokens[i].kind.is_code())
    }

    /// Parse items until end of input or, when `closing`, an unconsumed `}`.
    fn items(&mut self, parent: NodeId, closing: bool, scope: Scope, recovering: bool) {
        let tokens = self.tokens;
        while let Some(tok) = tokens.get(self.pos) {
            match tok.kind {
                TokenKind::Whitespace | TokenKind::Newline | TokenKind::Invalid(_) => {
                    self.pos += 1;
                }
                TokenKind::LineComment | TokenKind::BlockComment => self.comment_block(parent),
                TokenKind::Preprocessor => self.directive(parent),
                _ if tok.is_punct("}") => {
                    if closing {
                        return;
                    }
                    self.error(StructureErrorKind::UnmatchedClose('}'), self.pos);
                    if recovering {
                        self.pos += 1;
                        continue;
                    }
                    // Everything after a stray `}` becomes one recovered block.
                    let block = self.push_node(NodeKind::BraceBlock, parent, self.pos);
                    self.nodes[block].recovered = true;
                    self.pos += 1;
                    self.items(block, false, scope, true);
                    self.finish(block, tokens.len());
                    return;
                }
                _ if tok.is_punct("{") => {
                    self.block(parent, scope);
                }
                _ => self.statement(parent, scope),
            }
        }
    }

    fn block(&mut self, parent: NodeId, scope: Scope) -> NodeId {
        let open = self.pos;
        let id = self.push_node(NodeKind::BraceBlock, parent, open);
        if self.depth >= MAX_DEPTH {
            self.skip_balanced(open);
            self.finish(id, self.pos);
            return id;
        }
        self.pos += 1;
        self.depth += 1;
        self.items(id, true, scope, false);
        self.depth -= 1;
        if self.tokens.get(self.pos).is_some_and(|t| t.is_punct("}")) {
            self.pos += 1;
        } else {
            self.error(StructureErrorKind::UnclosedOpen('{'), open);
        }
        self.finish(id, self.pos);
        id
    }

    /// Consume a `{ ... }` group flat, starting at the `{`.
    fn skip_balanced(&mut self, open: usize) {
        let mut depth = 0usize;
        self.pos = open;
        while let Some(tok) = self.tokens.get(self.pos) {
            self.pos += 1;
            if tok.is_punct("{") {
                depth += 1;
            } else if tok.is_punct("}") {
                depth -= 1;
                if depth == 0 {
                    return;
                }
            }
        }
        self.error(StructureErrorKind::UnclosedOpen('{'), open);
    }

    fn has_code_before(&self, index: usize) -> bool {
        for tok in self.tokens[..index].iter().rev() {
            match tok.kind {
                TokenKind::Whitespace => continue,
                TokenKind::Newline => return false,
                _ => return true,
            }
        }
        false
    }

    /// Consecutive comments separated by at most one line break form a block.
    /// A comment beside code stands alone.
    fn comment_block(&mut self, parent: NodeId) {
        let start = self.pos;
        let trailing = self.has_code_before(start);
        let id = self.push_node(NodeKind::CommentBlock, parent, start);
        self.nodes[id].trailing = trailing;
        let mut end = start + 1;
        if !trailing {
            loop {
                let mut i = end;
                let mut newlines = 0;
                while let Some(tok) = self.tokens.get(i) {
                    match tok.kind {
                        TokenKind::Whitespace => i += 1,
                        TokenKind::Newline if newlines == 0 => {
                            newlines += 1;
                            i += 1;
                        }
                        _ => break,
                    }
                }
                match self.tokens.get(i) {
                    Some(tok) if tok.kind.is_comment() => end = i + 1,
                    _ => break,
                }
            }
        }
        self.pos = end;
        self.finish(id, end);
    }

    fn directive(&mut self, parent: NodeId) {
        let kind = if directive_name(&self.tokens[self.pos].text) == "define" {
            NodeKind::MacroDefinition
        } else {
            NodeKind::Directive
        };
        let id = self.push_node(kind, parent, self.pos);
        self.pos += 1;
        self.finish(id, self.pos);
    }

    /// Guess the node kind from the first few tokens.
    fn classify(&self, start: usize) -> NodeKind {
        let tokens = self.tokens;
        let first = &tokens[start];
        if first.is_keyword("typedef") {
            return NodeKind::TypeDefinition;
        }
        if first.kind == TokenKind::Keyword {
            return if is_declaration_keyword(&first.text) {
                NodeKind::Declaration
            } else {
                NodeKind::Statement
            };
        }
        if !first.is_identifier() {
            return NodeKind::Statement;
        }
        let Some(mut next) = self.next_code(start + 1) else {
            return NodeKind::Statement;
        };
        if tokens[next].is_identifier() || tokens[next].kind == TokenKind::Keyword {
            return NodeKind::Declaration;
        }
        if !tokens[next].is_punct("*") {
            return NodeKind::Statement;
        }
        while tokens[next].is_punct("*") || tokens[next].is_keyword("const") {
            match self.next_code(next + 1) {
                Some(n) => next = n,
                None => return NodeKind::Statement,
            }
        }
        if !tokens[next].is_identifier() {
            return NodeKind::Statement;
        }
        match self.next_code(next + 1) {
            Some(after)
                if [";", "=", ",", "[", "(", ")"]
                    .iter()
                    .any(|p| tokens[after].is_punct(p)) =>
            {
                NodeKind::Declaration
            }
            _ => NodeKind::Statement,
        }
    }

    /// `{` directly after `struct`, `union` or `enum`, or after their tag.
    fn is_aggregate_body(&self, start: usize, brace: usize) -> bool {
        let is_tag_keyword = |i: usize| {
            let t = &self.tokens[i];
            t.is_keyword("struct") || t.is_keyword("union") || t.is_keyword("enum")
        };
        match self.prev_code(brace, start) {
            Some(p) if is_tag_keyword(p) => true,
            Some(p) if self.tokens[p].is_identifier() => {
                self.prev_code(p, start).is_some_and(is_tag_keyword)
            }
            _ => false,
        }
    }

    fn close_unclosed(&mut self, opens: &mut Vec<(char, usize)>) {
        for (expected, index) in std::mem::take(opens) {
            let open = if expected == ')' { '(' } else { '[' };
            self.error(StructureErrorKind::UnclosedOpen(open), index);
        }
    }

    fn case_label(&mut self, parent: NodeId, start: usize) {
        let id = self.push_node(NodeKind::Statement, parent, start);
        let mut ternary = 0usize;
        let mut last = start;
        let mut i = start + 1;
        while let Some(tok) = self.tokens.get(i) {
            if tok.kind.is_code() {
                if tok.is_punct("?") {
                    ternary += 1;
                } else if tok.is_punct(":") {
                    if ternary == 0 {
                        last = i;
                        break;
                    }
                    ternary -= 1;
                } else if tok.is_punct(";") || tok.is_punct("{") || tok.is_punct("}") {
                    break;
                }
                last = i;
            }
            i += 1;
        }
        self.pos = last + 1;
        self.finish(id, last + 1);
    }

    fn statement(&mut self, parent: NodeId, scope: Scope) {
        let tokens = self.tokens;
        let start = self.pos;
        let first = &tokens[start];

        if scope.in_function && first.is_identifier() {
            if let Some(colon) = self.next_code(start + 1) {
                if tokens[colon].is_punct(":") {
                    let id = self.push_node(NodeKind::Label, parent, start);
                    self.nodes[id].name = Some(start);
                    self.pos = colon + 1;
                    self.finish(id, colon + 1);
                    return;
                }
            }
        }

        let lead = if first.kind == TokenKind::Keyword {
            first.text.as_str()
        } else {
            ""
        };
        if lead == "case" || lead == "default" {
            self.case_label(parent, start);
            return;
        }

        let control = is_control_keyword(lead);
        let kind = if control {
            NodeKind::Statement
        } else {
            self.classify(start)
        };
        let id = self.push_node(kind, parent, start);

        let mut opens: Vec<(char, usize)> = Vec::new();
        let mut last_code = start;
        let mut prev_code: Option<usize> = None;
        let mut call_name: Option<usize> = None;
        let mut saw_call = false;
        let mut saw_assign = false;
        let mut aggregate_end: Option<usize> = None;

        while let Some(tok) = tokens.get(self.pos) {
            let idx = self.pos;
            if !tok.kind.is_code() {
                if tok.kind == TokenKind::Preprocessor && opens.is_empty() {
                    break;
                }
                self.pos += 1;
                continue;
            }

            if tok.is_punct("(") || tok.is_punct("[") {
                if tok.is_punct("(") && opens.is_empty() && !saw_call {
                    saw_call = true;
                    call_name = prev_code.filter(|&p| tokens[p].is_identifier());
                }
                opens.push((if tok.is_punct("(") { ')' } else { ']' }, idx));
            } else if tok.is_punct(")") || tok.is_punct("]") {
                let found = if tok.is_punct(")") { ')' } else { ']' };
                match opens.pop() {
                    Some((expected, _)) if expected == found => {}
                    Some((expected, _)) => {
                        self.error(StructureErrorKind::MismatchedClose { expected, found }, idx)
                    }
                    None => self.error(StructureErrorKind::UnmatchedClose(found), idx),
                }
            } else if tok.is_punct("=") && opens.is_empty() {
                saw_assign = true;
            } else if tok.is_punct(";") && opens.is_empty() {
                if kind == NodeKind::Declaration
                    && aggregate_end.is_some()
                    && aggregate_end == prev_code
                {
                    self.nodes[id].kind = NodeKind::TypeDefinition;
                }
                self.pos = idx + 1;
                self.finish(id, idx + 1);
                return;
            } else if tok.is_punct("{") {
                self.close_unclosed(&mut opens);
                if saw_assign {
                    self.skip_balanced(idx);
                    last_code = self.pos - 1;
                    prev_code = Some(last_code);
                    continue;
                }
                if control {
                    self.block(id, scope);
                    last_code = self.pos - 1;
                    if lead == "do" {
                        prev_code = Some(last_code);
                        continue;
                    }
                    self.finish(id, self.pos);
                    return;
                }
                if self.is_aggregate_body(start, idx) {
                    self.block(id, Scope::FILE);
                    last_code = self.pos - 1;
                    prev_code = Some(last_code);
                    aggregate_end = prev_code;
                    continue;
                }
                if saw_call && !scope.in_function {
                    self.nodes[id].kind = NodeKind::FunctionDefinition;
                    self.nodes[id].name = call_name;
                    self.block(id, Scope { in_function: true });
                    self.finish(id, self.pos);
                    return;
                }
                self.block(id, scope);
                self.finish(id, self.pos);
                return;
            } else if tok.is_punct("}") {
                break;
            }
            last_code = idx;
            prev_code = Some(idx);
            self.pos += 1;
        }

        // Ended without `;`: before a `}`, a directive, or end of input.
        self.close_unclosed(&mut opens);
        self.pos = last_code + 1;
        self.finish(id, last_code + 1);
    }

    fn is_directive(&self, id: NodeId, names: &[&str]) -> bool {
        let node = &self.nodes[id];
        node.kind == NodeKind::Directive
            && names.contains(&directive_name(&self.tokens[node.tokens.start].text))
    }

    /// Wrap `#if ... #endif` runs among `parent`'s children into
    /// preprocessor blocks. Conditionals nested past `MAX_DEPTH` stay flat.
    fn group_conditionals(&mut self, parent: NodeId) {
        let children = std::mem::take(&mut self.nodes[parent].children);
        let mut out: Vec<NodeId> = Vec::with_capacity(children.len());
        // Members collected for each open `#if`, innermost last.
        let mut open: Vec<Vec<NodeId>> = Vec::new();
        let mut flat_opens = 0usize;

        for child in children {
            if self.is_directive(child, &["if", "ifdef", "ifndef"]) {
                if open.len() < MAX_DEPTH {
                    open.push(vec![child]);
                    continue;
                }
                flat_opens += 1;
            } else if self.is_directive(child, &["endif"]) {
                if flat_opens > 0 {
                    flat_opens -= 1;
                } else if let Some(mut members) = open.pop() {
                    members.push(child);
                    let block = self.wrap_conditional(parent, members);
                    open.last_mut().unwrap_or(&mut out).push(block);
                    continue;
                }
            }
            open.last_mut().unwrap_or(&mut out).push(child);
        }

        // An `#if` without `#endif` is left as a plain child.
        for members in open {
            out.extend(members);
        }
        self.nodes[parent].children = out;
    }

    fn wrap_conditional(&mut self, parent: NodeId, members: Vec<NodeId>) -> NodeId {
        let block = self.nodes.len();
        let first = members[0];
        let last = members[members.len() - 1];
        let range = self.nodes[first].tokens.start..self.nodes[last].tokens.end;
        for &m in &members {
            self.nodes[m].parent = Some(block);
        }
        self.nodes.push(SyntaxNode {
            kind: NodeKind::PreprocessorBlock,
            tokens: range,
            parent: Some(parent),
            children: members,
            name: None,
            trailing: false,
            recovered: false,
        });
        block
    }
}
