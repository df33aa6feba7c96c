//! Fact structures extracted from the token stream and structural tree.
//!
//! Facts are computed once per file so the naming, keyword and
//! documentation rules do not each re-derive declarations from tokens.

use serde::Serialize;
use std::fmt;

use super::source::SourceFile;
use super::token::{is_declaration_keyword, Token, TokenKind};
use super::tree::{directive_name, NodeId, NodeKind, SyntaxTree};
use super::Span;

/// Where a variable is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VariableScope {
    File,
    Local,
    Parameter,
    Member,
}

impl VariableScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableScope::File => "global",
            VariableScope::Local => "local",
            VariableScope::Parameter => "parameter",
            VariableScope::Member => "member",
        }
    }
}

impl fmt::Display for VariableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TagKind {
    Struct,
    Union,
    Enum,
}

impl TagKind {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "struct" => Some(TagKind::Struct),
            "union" => Some(TagKind::Union),
            "enum" => Some(TagKind::Enum),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TagKind::Struct => "struct",
            TagKind::Union => "union",
            TagKind::Enum => "enum",
        }
    }

    /// Prefix a tag of this kind must carry.
    pub fn tag_prefix(&self) -> &'static str {
        match self {
            TagKind::Struct => "st_",
            TagKind::Union => "u_",
            TagKind::Enum => "e_",
        }
    }
}

/// Top-level file sections, in their required order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Section {
    Include,
    Macro,
    Type,
    Global,
    Function,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Include => "includes",
            Section::Macro => "macros",
            Section::Type => "type definitions",
            Section::Global => "global declarations",
            Section::Function => "function definitions",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineInfo {
    pub number: usize,
    pub blank: bool,
    pub has_code: bool,
    pub has_comment: bool,
}

#[derive(Debug, Clone)]
pub struct LabelFact {
    pub name: String,
    pub token: usize,
}

#[derive(Debug, Clone)]
pub struct GotoFact {
    pub target: String,
    pub keyword: usize,
    pub target_token: usize,
}

#[derive(Debug, Clone)]
pub struct FunctionFact {
    pub node: NodeId,
    pub name: String,
    pub name_token: usize,
    pub body: Option<NodeId>,
    pub labels: Vec<LabelFact>,
    pub gotos: Vec<GotoFact>,
}

#[derive(Debug, Clone)]
pub struct VariableFact {
    pub name: String,
    pub token: usize,
    pub pointer_depth: usize,
    pub scope: VariableScope,
    pub is_static: bool,
    pub is_extern: bool,
    pub is_const: bool,
}

/// A function declared without a body.
#[derive(Debug, Clone)]
pub struct PrototypeFact {
    pub name: String,
    pub token: usize,
}

#[derive(Debug, Clone)]
pub struct TypeFact {
    pub node: NodeId,
    pub tag_kind: Option<TagKind>,
    pub tag: Option<usize>,
    pub has_body: bool,
    /// Typedef name.
    pub alias: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct MacroFact {
    pub node: NodeId,
    pub name: String,
    pub span: Span,
    pub function_like: bool,
}

#[derive(Debug, Clone)]
pub struct EnumConstantFact {
    pub name: String,
    pub token: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SectionEntry {
    pub section: Section,
    pub node: NodeId,
}

/// All facts for one file.
#[derive(Debug, Clone, Default)]
pub struct FileFacts {
    pub lines: Vec<LineInfo>,
    pub functions: Vec<FunctionFact>,
    pub variables: Vec<VariableFact>,
    pub prototypes: Vec<PrototypeFact>,
    pub types: Vec<TypeFact>,
    pub macros: Vec<MacroFact>,
    pub enum_constants: Vec<EnumConstantFact>,
    pub sections: Vec<SectionEntry>,
}

impl FileFacts {
    pub fn build(source: &SourceFile, tree: &SyntaxTree) -> Self {
        let tokens = source.tokens();
        let mut facts = FileFacts {
            lines: line_table(source),
            ..Default::default()
        };

        for id in tree.preorder(tree.root()) {
            match tree.node(id).kind {
                NodeKind::FunctionDefinition => facts.add_function(tokens, tree, id),
                NodeKind::Declaration => facts.add_declaration(tokens, tree, id),
                NodeKind::TypeDefinition => facts.add_type_definition(tokens, tree, id),
                NodeKind::MacroDefinition => {
                    if let Some(m) = parse_macro(source, tree, id) {
                        facts.macros.push(m);
                    }
                }
                _ => {}
            }
        }

        for i in 0..facts.types.len() {
            let ty = &facts.types[i];
            if ty.tag_kind == Some(TagKind::Enum) && ty.has_body {
                if let Some(body) = tree.block(ty.node) {
                    let constants = enum_constants(tokens, tree, body);
                    facts.enum_constants.extend(constants);
                }
            }
        }

        collect_sections(source, tree, tree.root(), &mut facts.sections);
        facts
    }

    /// Line info for a 1-based line number.
    pub fn line(&self, number: usize) -> Option<&LineInfo> {
        number.checked_sub(1).and_then(|i| self.lines.get(i))
    }

    pub fn function_at(&self, node: NodeId) -> Option<&FunctionFact> {
        self.functions.iter().find(|f| f.node == node)
    }

    fn add_function(&mut self, tokens: &[Token], tree: &SyntaxTree, id: NodeId) {
        let node = tree.node(id);
        let Some(name_token) = node.name else { return };
        let body = tree.block(id);

        let mut labels = Vec::new();
        let mut gotos = Vec::new();
        if let Some(body) = body {
            for n in tree.preorder(body) {
                if let (NodeKind::Label, Some(t)) = (tree.node(n).kind, tree.node(n).name) {
                    labels.push(LabelFact {
                        name: tokens[t].text.clone(),
                        token: t,
                    });
                }
            }
            let range = tree.node(body).tokens.clone();
            for i in range.clone() {
                if !tokens[i].is_keyword("goto") {
                    continue;
                }
                let target = (i + 1..range.end).find(|&j| tokens[j].kind.is_code());
                if let Some(t) = target.filter(|&t| tokens[t].is_identifier()) {
                    gotos.push(GotoFact {
                        target: tokens[t].text.clone(),
                        keyword: i,
                        target_token: t,
                    });
                }
            }
        }

        for param in parameters(tokens, name_token, node.tokens.end) {
            let (spec, declarators) = split_declaration(tokens, &param, None);
            if let Some(d) = declarators.into_iter().next() {
                self.variables.push(VariableFact {
                    name: tokens[d.name].text.clone(),
                    token: d.name,
                    pointer_depth: d.pointer_depth,
                    scope: VariableScope::Parameter,
                    is_static: false,
                    is_extern: false,
                    is_const: spec.is_const,
                });
            }
        }

        self.functions.push(FunctionFact {
            node: id,
            name: tokens[name_token].text.clone(),
            name_token,
            body,
            labels,
            gotos,
        });
    }

    fn add_declaration(&mut self, tokens: &[Token], tree: &SyntaxTree, id: NodeId) {
        let (indices, body_at) = code_indices(tokens, tree, id);
        let (spec, declarators) = split_declaration(tokens, &indices, body_at);
        if let Some((kind, tag)) = spec.tag {
            if body_at.is_some() {
                self.types.push(TypeFact {
                    node: id,
                    tag_kind: Some(kind),
                    tag,
                    has_body: true,
                    alias: None,
                });
            }
        }
        let scope = variable_scope(tree, id);
        for d in declarators {
            if d.is_function {
                if scope == VariableScope::File {
                    self.prototypes.push(PrototypeFact {
                        name: tokens[d.name].text.clone(),
                        token: d.name,
                    });
                }
                continue;
            }
            self.variables.push(VariableFact {
                name: tokens[d.name].text.clone(),
                token: d.name,
                pointer_depth: d.pointer_depth,
                scope,
                is_static: spec.is_static,
                is_extern: spec.is_extern,
                is_const: spec.is_const,
            });
        }
    }

    fn add_type_definition(&mut self, tokens: &[Token], tree: &SyntaxTree, id: NodeId) {
        let (indices, body_at) = code_indices(tokens, tree, id);
        let (spec, declarators) = split_declaration(tokens, &indices, body_at);
        let (tag_kind, tag) = match spec.tag {
            Some((kind, tag)) => (Some(kind), tag),
            None => (None, None),
        };
        let has_body = body_at.is_some();
        if !spec.is_typedef || declarators.is_empty() {
            self.types.push(TypeFact {
                node: id,
                tag_kind,
                tag,
                has_body,
                alias: None,
            });
            return;
        }
        for (i, d) in declarators.into_iter().enumerate() {
            self.types.push(TypeFact {
                node: id,
                tag_kind,
                tag: if i == 0 { tag } else { None },
                has_body: has_body && i == 0,
                alias: Some(d.name),
            });
        }
    }
}

fn line_table(source: &SourceFile) -> Vec<LineInfo> {
    let count = source.line_count();
    let mut lines: Vec<LineInfo> = (1..=count)
        .map(|number| LineInfo {
            number,
            blank: true,
            has_code: false,
            has_comment: false,
        })
        .collect();
    for tok in source.tokens() {
        if tok.kind.is_trivia() {
            continue;
        }
        let span = tok.span;
        let last = if span.end_col == 1 && span.end_line > span.start_line {
            span.end_line - 1
        } else {
            span.end_line
        };
        for line in span.start_line..=last.min(count) {
            let info = &mut lines[line - 1];
            info.blank = false;
            if tok.kind.is_comment() {
                info.has_comment = true;
            } else {
                info.has_code = true;
            }
        }
    }
    lines
}

fn variable_scope(tree: &SyntaxTree, id: NodeId) -> VariableScope {
    for ancestor in tree.ancestors(id) {
        let node = tree.node(ancestor);
        match node.kind {
            NodeKind::FunctionDefinition => return VariableScope::Local,
            NodeKind::BraceBlock => {
                let parent_kind = node.parent.map(|p| tree.node(p).kind);
                if matches!(
                    parent_kind,
                    Some(NodeKind::TypeDefinition | NodeKind::Declaration)
                ) {
                    return VariableScope::Member;
                }
            }
            _ => {}
        }
    }
    VariableScope::File
}

/// Code tokens of a declaration, skipping an aggregate body. Also returns
/// where in the list the body sat.
fn code_indices(tokens: &[Token], tree: &SyntaxTree, id: NodeId) -> (Vec<usize>, Option<usize>) {
    let node = tree.node(id);
    let mut out = Vec::new();
    let mut body_at = None;
    let mut i = node.tokens.start;
    while i < node.tokens.end {
        let child = node
            .children
            .iter()
            .map(|&c| tree.node(c))
            .find(|c| c.tokens.start == i && c.tokens.end > i);
        if let Some(child) = child {
            if child.kind == NodeKind::BraceBlock && body_at.is_none() {
                body_at = Some(out.len());
            }
            i = child.tokens.end;
            continue;
        }
        if tokens[i].kind.is_code() {
            out.push(i);
        }
        i += 1;
    }
    if out.last().is_some_and(|&last| tokens[last].is_punct(";")) {
        out.pop();
    }
    (out, body_at)
}

#[derive(Debug, Default)]
struct DeclSpec {
    is_typedef: bool,
    is_static: bool,
    is_extern: bool,
    is_const: bool,
    tag: Option<(TagKind, Option<usize>)>,
}

#[derive(Debug)]
struct Declarator {
    name: usize,
    pointer_depth: usize,
    is_function: bool,
}

const BASE_TYPE_KEYWORDS: [&str; 11] = [
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "_Bool",
    "_Complex",
];

/// Split a declaration into its specifiers and declarators.
///
/// `body_at` is the position in `indices` where an aggregate body was cut
/// out; an identifier at that position is a declarator, not a tag.
fn split_declaration(
    tokens: &[Token],
    indices: &[usize],
    body_at: Option<usize>,
) -> (DeclSpec, Vec<Declarator>) {
    let mut spec = DeclSpec::default();
    let mut has_base = false;
    let mut i = 0;
    while i < indices.len() {
        let tok = &tokens[indices[i]];
        if tok.kind == TokenKind::Keyword {
            if let Some(kind) = TagKind::from_keyword(&tok.text) {
                has_base = true;
                i += 1;
                let tag = (i < indices.len()
                    && body_at.map_or(true, |b| i < b)
                    && tokens[indices[i]].is_identifier())
                .then(|| indices[i]);
                if tag.is_some() {
                    i += 1;
                }
                spec.tag = Some((kind, tag));
                continue;
            }
            if !is_declaration_keyword(&tok.text) {
                break;
            }
            match tok.text.as_str() {
                "typedef" => spec.is_typedef = true,
                "static" => spec.is_static = true,
                "extern" => spec.is_extern = true,
                "const" => spec.is_const = true,
                word if BASE_TYPE_KEYWORDS.contains(&word) => has_base = true,
                _ => {}
            }
            i += 1;
        } else if tok.is_identifier() && !has_base {
            let declarator_follows = indices.get(i + 1).is_some_and(|&n| {
                tokens[n].is_identifier() || tokens[n].is_punct("*") || tokens[n].is_punct("(")
                    || tokens[n].kind == TokenKind::Keyword
            });
            if !declarator_follows {
                break;
            }
            has_base = true;
            i += 1;
        } else {
            break;
        }
    }
    if !has_base {
        return (spec, Vec::new());
    }

    let declarators = split_top_level(tokens, &indices[i..], ",")
        .into_iter()
        .filter_map(|segment| parse_declarator(tokens, segment))
        .collect();
    (spec, declarators)
}

/// Split on a separator at bracket depth zero.
fn split_top_level<'a>(tokens: &[Token], indices: &'a [usize], sep: &str) -> Vec<&'a [usize]> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (pos, &i) in indices.iter().enumerate() {
        let t = &tokens[i];
        if t.is_punct("(") || t.is_punct("[") || t.is_punct("{") {
            depth += 1;
        } else if t.is_punct(")") || t.is_punct("]") || t.is_punct("}") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && t.is_punct(sep) {
            out.push(&indices[start..pos]);
            start = pos + 1;
        }
    }
    out.push(&indices[start..]);
    out
}

fn parse_declarator(tokens: &[Token], segment: &[usize]) -> Option<Declarator> {
    // Drop initializers and bit-field widths.
    let mut depth = 0usize;
    let mut end = segment.len();
    for (pos, &i) in segment.iter().enumerate() {
        let t = &tokens[i];
        if t.is_punct("(") || t.is_punct("[") || t.is_punct("{") {
            depth += 1;
        } else if t.is_punct(")") || t.is_punct("]") || t.is_punct("}") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && (t.is_punct("=") || t.is_punct(":")) {
            end = pos;
            break;
        }
    }
    let segment = &segment[..end];

    let first_group = segment
        .iter()
        .position(|&i| tokens[i].is_punct("(") || tokens[i].is_punct("["));

    // `(*name)(...)`: pointer to function or array.
    if let Some(open) = first_group {
        let starts_pointer = segment
            .get(open + 1)
            .is_some_and(|&i| tokens[i].is_punct("*"));
        if tokens[segment[open]].is_punct("(") && starts_pointer {
            let mut depth = 0usize;
            let mut close = segment.len();
            for (pos, &i) in segment.iter().enumerate().skip(open) {
                if tokens[i].is_punct("(") {
                    depth += 1;
                } else if tokens[i].is_punct(")") {
                    depth -= 1;
                    if depth == 0 {
                        close = pos;
                        break;
                    }
                }
            }
            let inner = &segment[open + 1..close];
            let inner_head_end = inner
                .iter()
                .position(|&i| tokens[i].is_punct("(") || tokens[i].is_punct("["))
                .unwrap_or(inner.len());
            let name = inner[..inner_head_end]
                .iter()
                .rev()
                .copied()
                .find(|&i| tokens[i].is_identifier())?;
            let pointer_depth = inner.iter().filter(|&&i| tokens[i].is_punct("*")).count();
            return Some(Declarator {
                name,
                pointer_depth,
                is_function: false,
            });
        }
    }

    let head = &segment[..first_group.unwrap_or(segment.len())];
    let name = head
        .iter()
        .rev()
        .copied()
        .find(|&i| tokens[i].is_identifier())?;
    let pointer_depth = head.iter().filter(|&&i| tokens[i].is_punct("*")).count();
    let is_function = first_group.is_some_and(|g| {
        tokens[segment[g]].is_punct("(") && head.last() == Some(&name)
    });
    Some(Declarator {
        name,
        pointer_depth,
        is_function,
    })
}

/// Parameter token groups of a function definition.
fn parameters(tokens: &[Token], name_token: usize, end: usize) -> Vec<Vec<usize>> {
    let Some(open) = (name_token + 1..end).find(|&i| tokens[i].kind.is_code()) else {
        return Vec::new();
    };
    if !tokens[open].is_punct("(") {
        return Vec::new();
    }
    let mut depth = 0usize;
    let mut inner = Vec::new();
    for i in open..end {
        let t = &tokens[i];
        if !t.kind.is_code() {
            continue;
        }
        if t.is_punct("(") {
            depth += 1;
            if depth == 1 {
                continue;
            }
        } else if t.is_punct(")") {
            depth -= 1;
            if depth == 0 {
                break;
            }
        }
        inner.push(i);
    }
    split_top_level(tokens, &inner, ",")
        .into_iter()
        .map(|s| s.to_vec())
        .collect()
}

fn enum_constants(tokens: &[Token], tree: &SyntaxTree, body: NodeId) -> Vec<EnumConstantFact> {
    let range = tree.node(body).tokens.clone();
    let inner: Vec<usize> = range
        .filter(|&i| tokens[i].kind.is_code())
        .skip(1)
        .collect();
    let inner = match inner.last() {
        Some(&last) if tokens[last].is_punct("}") => &inner[..inner.len() - 1],
        _ => &inner[..],
    };
    split_top_level(tokens, inner, ",")
        .into_iter()
        .filter_map(|segment| segment.first().copied())
        .filter(|&i| tokens[i].is_identifier())
        .map(|i| EnumConstantFact {
            name: tokens[i].text.clone(),
            token: i,
        })
        .collect()
}

/// Name of the macro defined by `#define NAME...`, as a byte range.
fn macro_name_range(bytes: &[u8]) -> Option<(usize, usize, bool)> {
    let skip_blanks = |mut i: usize| {
        while i < bytes.len() && matches!(bytes[i], b' ' | b'\t') {
            i += 1;
        }
        i
    };
    let mut i = skip_blanks(1);
    if !bytes[i..].starts_with(b"define") {
        return None;
    }
    i = skip_blanks(i + "define".len());
    let start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    (i > start).then(|| (start, i, bytes.get(i) == Some(&b'(')))
}

fn parse_macro(source: &SourceFile, tree: &SyntaxTree, id: NodeId) -> Option<MacroFact> {
    let tok = &source.tokens()[tree.node(id).tokens.start];
    let bytes = source.slice(&tok.span);
    let (start, end, function_like) = macro_name_range(bytes)?;
    let base = tok.span.start_byte;
    Some(MacroFact {
        node: id,
        name: String::from_utf8_lossy(&bytes[start..end]).into_owned(),
        span: source.span_for(base + start, base + end),
        function_like,
    })
}

/// `#ifndef X` / `#define X` pair opening a preprocessor block.
fn is_include_guard(source: &SourceFile, tree: &SyntaxTree, id: NodeId) -> bool {
    let Some(parent) = tree.node(id).parent else {
        return false;
    };
    let siblings = tree.children(parent);
    if tree.node(parent).kind != NodeKind::PreprocessorBlock || siblings.get(1) != Some(&id) {
        return false;
    }
    let tokens = source.tokens();
    let opener = &tokens[tree.node(siblings[0]).tokens.start].text;
    if directive_name(opener) != "ifndef" {
        return false;
    }
    let guarded = opener
        .trim_start_matches('#')
        .trim_start()
        .trim_start_matches("ifndef")
        .trim();
    parse_macro(source, tree, id).is_some_and(|m| m.name == guarded)
}

fn collect_sections(
    source: &SourceFile,
    tree: &SyntaxTree,
    id: NodeId,
    out: &mut Vec<SectionEntry>,
) {
    let tokens = source.tokens();
    for &child in tree.children(id) {
        let node = tree.node(child);
        let section = match node.kind {
            NodeKind::PreprocessorBlock => {
                collect_sections(source, tree, child, out);
                continue;
            }
            NodeKind::Directive if directive_name(&tokens[node.tokens.start].text) == "include" => {
                Section::Include
            }
            NodeKind::MacroDefinition if !is_include_guard(source, tree, child) => Section::Macro,
            NodeKind::TypeDefinition => Section::Type,
            NodeKind::Declaration => Section::Global,
            NodeKind::FunctionDefinition => Section::Function,
            _ => continue,
        };
        out.push(SectionEntry {
            section,
            node: child,
        });
    }
}
