//! Whitespace and layout rules.
//!
//! Spacing rules look at the tokens directly around an operator. A line
//! break on either side always satisfies them; only spaces on the same line
//! count.

use phf::phf_map;
use std::collections::BTreeSet;

use super::context::{Emitter, FileContext};
use super::registry::RuleDef;
use super::types::{Category, Severity};
use crate::analysis::{is_declaration_keyword, NodeKind, Token, TokenKind};
use crate::error::RuleEvaluationError;

pub(super) static RULES: &[RuleDef] = &[
    RuleDef::new(
        "WHITESPACE.LINE_LENGTH",
        Category::Whitespace,
        Severity::Warning,
        "Lines stay within the configured length",
        check_line_length,
    ),
    RuleDef::new(
        "WHITESPACE.TAB",
        Category::Whitespace,
        Severity::Warning,
        "Tabs are not used for layout",
        check_tab,
    ),
    RuleDef::new(
        "WHITESPACE.TRAILING",
        Category::Whitespace,
        Severity::Warning,
        "No trailing whitespace",
        check_trailing,
    ),
    RuleDef::new(
        "WHITESPACE.MULTIPLE_SPACES",
        Category::Whitespace,
        Severity::Warning,
        "Tokens are separated by a single space",
        check_multiple_spaces,
    ),
    RuleDef::new(
        "WHITESPACE.OPERATOR_SPACING",
        Category::Whitespace,
        Severity::Warning,
        "Binary, assignment and ternary operators have a space on each side",
        check_operator_spacing,
    ),
    RuleDef::new(
        "WHITESPACE.COMMA_SPACING",
        Category::Whitespace,
        Severity::Warning,
        "Commas take no space before and one after",
        check_comma_spacing,
    ),
    RuleDef::new(
        "WHITESPACE.MEMBER_ACCESS",
        Category::Whitespace,
        Severity::Warning,
        "No spaces around . and ->",
        check_member_access,
    ),
    RuleDef::new(
        "WHITESPACE.UNARY_SPACING",
        Category::Whitespace,
        Severity::Warning,
        "Unary operators sit directly against their operand",
        check_unary_spacing,
    ),
    RuleDef::new(
        "WHITESPACE.PAREN_SPACING",
        Category::Whitespace,
        Severity::Warning,
        "No spaces inside parentheses and brackets or before a call's parenthesis",
        check_paren_spacing,
    ),
    RuleDef::new(
        "WHITESPACE.KEYWORD_SPACING",
        Category::Whitespace,
        Severity::Warning,
        "Control keywords are followed by a space before (",
        check_keyword_spacing,
    ),
    RuleDef::new(
        "WHITESPACE.SEMICOLON_SPACING",
        Category::Whitespace,
        Severity::Warning,
        "No space before a semicolon",
        check_semicolon_spacing,
    ),
    RuleDef::new(
        "WHITESPACE.BRACE_OPEN_LINE",
        Category::Whitespace,
        Severity::Warning,
        "Opening braces of blocks sit on their own line",
        check_brace_open_line,
    ),
    RuleDef::new(
        "WHITESPACE.BRACE_CLOSE_LINE",
        Category::Whitespace,
        Severity::Warning,
        "Closing braces of blocks sit on their own line",
        check_brace_close_line,
    ),
    RuleDef::new(
        "WHITESPACE.INDENTATION",
        Category::Whitespace,
        Severity::Warning,
        "Indentation is a multiple of the indent width",
        check_indentation,
    ),
    RuleDef::new(
        "WHITESPACE.BLANK_LINES",
        Category::Whitespace,
        Severity::Info,
        "No long runs of blank lines",
        check_blank_lines,
    ),
    RuleDef::new(
        "WHITESPACE.FINAL_NEWLINE",
        Category::Whitespace,
        Severity::Warning,
        "Files end with a line break",
        check_final_newline,
    ),
    RuleDef::new(
        "WHITESPACE.LINE_ENDING",
        Category::Whitespace,
        Severity::Warning,
        "Line endings are consistent and not bare CR",
        check_line_ending,
    ),
];

/// What separates a token from its neighbour on one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gap {
    None,
    Space,
    LineBreak,
}

fn gap_before(tokens: &[Token], i: usize) -> Gap {
    if i == 0 {
        return Gap::LineBreak;
    }
    match tokens[i - 1].kind {
        TokenKind::Newline | TokenKind::Preprocessor => Gap::LineBreak,
        TokenKind::Whitespace => {
            if i == 1 || tokens[i - 2].kind == TokenKind::Newline {
                Gap::LineBreak
            } else {
                Gap::Space
            }
        }
        TokenKind::LineComment | TokenKind::BlockComment => Gap::Space,
        _ => Gap::None,
    }
}

fn gap_after(tokens: &[Token], i: usize) -> Gap {
    match tokens.get(i + 1).map(|t| t.kind) {
        None | Some(TokenKind::Newline) => Gap::LineBreak,
        Some(TokenKind::Whitespace) => match tokens.get(i + 2).map(|t| t.kind) {
            None | Some(TokenKind::Newline) => Gap::LineBreak,
            _ => Gap::Space,
        },
        Some(TokenKind::LineComment | TokenKind::BlockComment) => Gap::Space,
        _ => Gap::None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpClass {
    Binary,
    /// `+` or `-`: binary after an operand, unary otherwise.
    Additive,
    /// `:` of a conditional expression; labels and bit-fields are skipped.
    Colon,
    Comma,
    Member,
    Unary,
    Increment,
    Semicolon,
}

static OPERATORS: phf::Map<&'static str, OpClass> = phf_map! {
    "=" => OpClass::Binary,
    "+=" => OpClass::Binary,
    "-=" => OpClass::Binary,
    "*=" => OpClass::Binary,
    "/=" => OpClass::Binary,
    "%=" => OpClass::Binary,
    "&=" => OpClass::Binary,
    "|=" => OpClass::Binary,
    "^=" => OpClass::Binary,
    "<<=" => OpClass::Binary,
    ">>=" => OpClass::Binary,
    "==" => OpClass::Binary,
    "!=" => OpClass::Binary,
    "<" => OpClass::Binary,
    ">" => OpClass::Binary,
    "<=" => OpClass::Binary,
    ">=" => OpClass::Binary,
    "&&" => OpClass::Binary,
    "||" => OpClass::Binary,
    "/" => OpClass::Binary,
    "%" => OpClass::Binary,
    "<<" => OpClass::Binary,
    ">>" => OpClass::Binary,
    "|" => OpClass::Binary,
    "^" => OpClass::Binary,
    "?" => OpClass::Binary,
    "+" => OpClass::Additive,
    "-" => OpClass::Additive,
    ":" => OpClass::Colon,
    "," => OpClass::Comma,
    "." => OpClass::Member,
    "->" => OpClass::Member,
    "!" => OpClass::Unary,
    "~" => OpClass::Unary,
    "++" => OpClass::Increment,
    "--" => OpClass::Increment,
    ";" => OpClass::Semicolon,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Need {
    Space,
    NoSpace,
    Any,
}

impl Need {
    fn violated_by(self, gap: Gap) -> bool {
        matches!((self, gap), (Need::Space, Gap::None) | (Need::NoSpace, Gap::Space))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpacingRule {
    Operator,
    Comma,
    Member,
    Unary,
    Semicolon,
}

/// Whether the `)` at `close` ends a cast such as `(uint8_t)` or `(char *)`.
fn closes_cast(tokens: &[Token], close: usize) -> bool {
    let type_like = |t: &Token| {
        (t.kind == TokenKind::Keyword && is_declaration_keyword(&t.text))
            || t.is_identifier()
            || t.is_punct("*")
    };
    // Walk back over type-like tokens only; anything else ends the search.
    let mut first = None;
    let mut open = None;
    for i in (0..close).rev() {
        let t = &tokens[i];
        if !t.kind.is_code() {
            continue;
        }
        if t.is_punct("(") {
            open = Some(i);
            break;
        }
        if !type_like(t) {
            return false;
        }
        first = Some(i);
    }
    let (Some(open), Some(first)) = (open, first) else {
        return false;
    };
    let head = &tokens[first];
    let starts_with_type = (head.kind == TokenKind::Keyword && is_declaration_keyword(&head.text))
        || (head.is_identifier() && head.text.ends_with("_t"));
    let before = (0..open).rev().find(|&i| tokens[i].kind.is_code());
    let after_call =
        before.is_some_and(|b| tokens[b].is_identifier() || tokens[b].is_keyword("sizeof"));
    starts_with_type && !after_call
}

/// Whether the token can end an operand, making a following `+`/`-` binary.
fn ends_operand(tokens: &[Token], i: usize) -> bool {
    let t = &tokens[i];
    t.is_identifier()
        || t.kind.is_literal()
        || t.is_punct("]")
        || (t.is_punct(")") && !closes_cast(tokens, i))
}

fn spacing_requirement(
    ctx: &FileContext<'_>,
    i: usize,
    class: OpClass,
    paren_depth: usize,
) -> Option<(SpacingRule, Need, Need)> {
    let tokens = ctx.tokens();
    let prev = ctx.prev_code(i);
    let next = ctx.next_code(i);
    let operand_before = prev.is_some_and(|p| ends_operand(tokens, p));
    match class {
        OpClass::Binary | OpClass::Colon => Some((SpacingRule::Operator, Need::Space, Need::Space)),
        OpClass::Additive if operand_before => {
            Some((SpacingRule::Operator, Need::Space, Need::Space))
        }
        OpClass::Additive | OpClass::Unary => Some((SpacingRule::Unary, Need::Any, Need::NoSpace)),
        OpClass::Increment => {
            let postfix = operand_before && gap_before(tokens, i) == Gap::None;
            let operand_after = next.is_some_and(|n| {
                let t = &tokens[n];
                t.is_identifier() || t.is_punct("(") || t.is_punct("*")
            });
            if !postfix && operand_after {
                Some((SpacingRule::Unary, Need::Any, Need::NoSpace))
            } else {
                Some((SpacingRule::Unary, Need::NoSpace, Need::Any))
            }
        }
        OpClass::Comma => Some((SpacingRule::Comma, Need::NoSpace, Need::Space)),
        OpClass::Member => {
            let designator = prev.map_or(true, |p| {
                let t = &tokens[p];
                t.is_punct("{") || t.is_punct(",") || t.is_punct("(")
            });
            let before = if designator { Need::Any } else { Need::NoSpace };
            Some((SpacingRule::Member, before, Need::NoSpace))
        }
        OpClass::Semicolon => {
            let empty_before =
                prev.map_or(true, |p| tokens[p].is_punct("(") || tokens[p].is_punct(";"));
            let before = if empty_before { Need::Any } else { Need::NoSpace };
            let tight_after =
                next.map_or(true, |n| tokens[n].is_punct(")") || tokens[n].is_punct(";"));
            let after = if paren_depth > 0 && !tight_after {
                Need::Space
            } else {
                Need::Any
            };
            Some((SpacingRule::Semicolon, before, after))
        }
    }
}

fn describe(text: &str, before: Need, after: Need, gap_b: Gap, gap_a: Gap) -> String {
    let bad_before = before.violated_by(gap_b);
    let bad_after = after.violated_by(gap_a);
    let side = |need: Need, where_: &str| match need {
        Need::Space => format!("missing space {} '{}'", where_, text),
        _ => format!("unexpected space {} '{}'", where_, text),
    };
    match (bad_before, bad_after) {
        (true, true) if before == after => match before {
            Need::Space => format!("'{}' needs a space on each side", text),
            _ => format!("'{}' must not be surrounded by spaces", text),
        },
        (true, true) => format!("{}; {}", side(before, "before"), side(after, "after")),
        (true, false) => side(before, "before"),
        _ => side(after, "after"),
    }
}

fn check_spacing(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
    rule: SpacingRule,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let mut open_ternaries = 0usize;
    let mut paren_depth = 0usize;
    for (i, tok) in tokens.iter().enumerate() {
        if !matches!(tok.kind, TokenKind::Operator | TokenKind::Punctuation) {
            continue;
        }
        match tok.text.as_str() {
            "(" => paren_depth += 1,
            ")" => paren_depth = paren_depth.saturating_sub(1),
            "{" | "}" => {
                open_ternaries = 0;
                paren_depth = 0;
            }
            _ => {}
        }
        let Some(&class) = OPERATORS.get(tok.text.as_str()) else {
            continue;
        };
        match class {
            OpClass::Binary if tok.text == "?" => open_ternaries += 1,
            OpClass::Colon if open_ternaries == 0 => continue,
            OpClass::Colon => open_ternaries -= 1,
            OpClass::Semicolon if paren_depth == 0 => open_ternaries = 0,
            _ => {}
        }
        let Some((owner, before, after)) = spacing_requirement(ctx, i, class, paren_depth) else {
            continue;
        };
        if owner != rule {
            continue;
        }
        let (gb, ga) = (gap_before(tokens, i), gap_after(tokens, i));
        if before.violated_by(gb) || after.violated_by(ga) {
            out.emit(tok.span, describe(&tok.text, before, after, gb, ga));
        }
    }
    Ok(())
}

fn check_operator_spacing(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    check_spacing(ctx, out, SpacingRule::Operator)
}

fn check_comma_spacing(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    check_spacing(ctx, out, SpacingRule::Comma)
}

fn check_member_access(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    check_spacing(ctx, out, SpacingRule::Member)
}

fn check_unary_spacing(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    check_spacing(ctx, out, SpacingRule::Unary)
}

fn check_semicolon_spacing(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    check_spacing(ctx, out, SpacingRule::Semicolon)
}

fn check_line_length(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    let source = ctx.source();
    let max = ctx.params.max_line_length;
    for line in 1..=source.line_count() {
        let Some(range) = source.line_range(line) else { continue };
        let len = range.len();
        if len > max {
            out.emit(
                source.span_for(range.start + max, range.end),
                format!("line is {} characters long, limit is {}", len, max),
            );
        }
    }
    Ok(())
}

fn check_tab(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    let source = ctx.source();
    for tok in ctx.tokens() {
        let scanned = matches!(
            tok.kind,
            TokenKind::Whitespace
                | TokenKind::Preprocessor
                | TokenKind::LineComment
                | TokenKind::BlockComment
        );
        if !scanned {
            continue;
        }
        let bytes = source.slice(&tok.span);
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'\t' {
                i += 1;
                continue;
            }
            let start = i;
            while i < bytes.len() && bytes[i] == b'\t' {
                i += 1;
            }
            let base = tok.span.start_byte;
            out.emit(
                source.span_for(base + start, base + i),
                "tab character; indent and align with spaces",
            );
        }
    }
    Ok(())
}

fn check_trailing(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    let source = ctx.source();
    let bytes = source.bytes();
    for line in 1..=source.line_count() {
        let Some(range) = source.line_range(line) else { continue };
        let mut start = range.end;
        while start > range.start && matches!(bytes[start - 1], b' ' | b'\t') {
            start -= 1;
        }
        if start < range.end {
            out.emit_with_fix(source.span_for(start, range.end), "trailing whitespace", "");
        }
    }
    Ok(())
}

fn check_multiple_spaces(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    for (i, tok) in tokens.iter().enumerate() {
        if tok.kind != TokenKind::Whitespace || !tok.text.contains("  ") {
            continue;
        }
        let leading = i == 0 || tokens[i - 1].kind == TokenKind::Newline;
        let followed_by = tokens.get(i + 1).map(|t| t.kind);
        let before_break_or_comment = matches!(
            followed_by,
            None | Some(TokenKind::Newline | TokenKind::LineComment | TokenKind::BlockComment)
        );
        if leading || before_break_or_comment {
            continue;
        }
        out.emit_with_fix(
            tok.span,
            format!("{} spaces where one is expected", tok.text.len()),
            " ",
        );
    }
    Ok(())
}

fn check_paren_spacing(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    for (i, tok) in tokens.iter().enumerate() {
        let mut problems = Vec::new();
        if tok.is_punct("(") || tok.is_punct("[") {
            if gap_after(tokens, i) == Gap::Space {
                problems.push(format!("space after '{}'", tok.text));
            }
            if tok.is_punct("(") && gap_before(tokens, i) == Gap::Space {
                let callee = ctx
                    .prev_code(i)
                    .filter(|&p| tokens[p].is_identifier() && p + 2 == i);
                let pointer_declarator = ctx.next_code(i).is_some_and(|n| tokens[n].is_punct("*"));
                if let Some(p) = callee.filter(|_| !pointer_declarator) {
                    problems.push(format!("space between '{}' and '('", tokens[p].text));
                }
            }
        } else if (tok.is_punct(")") || tok.is_punct("]")) && gap_before(tokens, i) == Gap::Space {
            problems.push(format!("space before '{}'", tok.text));
        }
        if !problems.is_empty() {
            out.emit(tok.span, problems.join("; "));
        }
    }
    Ok(())
}

fn check_keyword_spacing(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    for (i, tok) in tokens.iter().enumerate() {
        if tok.kind != TokenKind::Keyword
            || !matches!(tok.text.as_str(), "if" | "while" | "for" | "switch" | "return")
        {
            continue;
        }
        if tokens.get(i + 1).is_some_and(|n| n.is_punct("(")) {
            out.emit_with_fix(
                tok.span,
                format!("missing space between '{}' and '('", tok.text),
                format!("{} (", tok.text),
            );
        }
    }
    Ok(())
}

/// Whether the block opened at `open` and closed at `close` is `{}` or
/// `{ }` on one line.
fn is_empty_inline_block(ctx: &FileContext<'_>, open: usize) -> bool {
    let tokens = ctx.tokens();
    ctx.next_code(open).is_some_and(|n| {
        tokens[n].is_punct("}") && (open + 1..n).all(|k| tokens[k].kind == TokenKind::Whitespace)
    })
}

fn check_brace_open_line(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let tree = ctx.tree();
    for (i, tok) in tokens.iter().enumerate() {
        if !tok.is_punct("{") || !tree.opens_block(i) || is_empty_inline_block(ctx, i) {
            continue;
        }
        if !ctx.starts_line(i) {
            out.emit(tok.span, "opening brace must be on its own line");
        } else if !ctx.ends_line(i) {
            out.emit(tok.span, "code follows the opening brace on the same line");
        }
    }
    Ok(())
}

fn check_brace_close_line(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let tree = ctx.tree();
    for id in tree.preorder(tree.root()) {
        if ctx.is_cancelled() {
            break;
        }
        let node = tree.node(id);
        if node.kind != NodeKind::BraceBlock || node.recovered || node.tokens.is_empty() {
            continue;
        }
        let close = node.tokens.end - 1;
        if !tokens[close].is_punct("}") || is_empty_inline_block(ctx, node.tokens.start) {
            continue;
        }
        if !ctx.starts_line(close) {
            out.emit(tokens[close].span, "closing brace must be on its own line");
            continue;
        }
        if ctx.ends_line(close) {
            continue;
        }
        let parent_kind = node.parent.map(|p| tree.node(p).kind);
        let names_declarator = matches!(
            parent_kind,
            Some(NodeKind::TypeDefinition | NodeKind::Declaration)
        );
        let allowed = ctx.next_code(close).is_some_and(|n| {
            let next = &tokens[n];
            next.is_punct(";") || next.is_punct(",") || next.is_keyword("while") || names_declarator
        });
        if !allowed {
            out.emit(tokens[close].span, "code follows the closing brace on the same line");
        }
    }
    Ok(())
}

/// Visual width of leading whitespace.
fn indent_width(text: &str, tab: usize) -> usize {
    text.chars().fold(0, |col, c| match c {
        '\t' if tab > 0 => (col / tab + 1) * tab,
        _ => col + 1,
    })
}

fn check_indentation(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let tree = ctx.tree();
    let width = ctx.params.indent_width;
    if width == 0 {
        return Ok(());
    }
    let mut starts = BTreeSet::new();
    for id in tree.preorder(tree.root()) {
        let node = tree.node(id);
        match node.kind {
            NodeKind::Statement
            | NodeKind::Declaration
            | NodeKind::FunctionDefinition
            | NodeKind::TypeDefinition => {
                starts.extend(tree.first_code(tokens, id));
            }
            NodeKind::CommentBlock if !node.trailing => {
                starts.insert(node.tokens.start);
            }
            NodeKind::BraceBlock if !node.recovered && !node.tokens.is_empty() => {
                starts.insert(node.tokens.start);
                let close = node.tokens.end - 1;
                if tokens[close].is_punct("}") {
                    starts.insert(close);
                }
            }
            _ => {}
        }
    }

    let mut seen_lines = BTreeSet::new();
    for i in starts {
        if i == 0 || !ctx.starts_line(i) || !seen_lines.insert(tokens[i].line()) {
            continue;
        }
        let ws = &tokens[i - 1];
        if ws.kind != TokenKind::Whitespace {
            continue;
        }
        let columns = indent_width(&ws.text, width);
        if columns % width != 0 {
            out.emit(
                ws.span,
                format!("indentation of {} is not a multiple of {}", columns, width),
            );
        }
    }
    Ok(())
}

fn check_blank_lines(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    let source = ctx.source();
    let lines = &ctx.facts().lines;
    let max = ctx.params.max_blank_lines;
    let mut run = 0usize;
    for info in lines {
        if !info.blank {
            run = 0;
            continue;
        }
        run += 1;
        if run == max + 1 {
            if let Some(span) = source.line_span(info.number) {
                out.emit(span, format!("more than {} consecutive blank lines", max));
            }
        }
    }
    Ok(())
}

fn check_final_newline(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let source = ctx.source();
    match source.bytes().last() {
        Some(b'\n' | b'\r') | None => {}
        Some(_) => {
            out.emit_with_fix(source.eof_span(), "file does not end with a line break", "\n")
        }
    }
    Ok(())
}

fn check_line_ending(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    let source = ctx.source();
    let bytes = source.bytes();
    let mut expected: Option<&'static str> = None;
    let mut i = 0;
    while i < bytes.len() {
        let (ending, len): (&'static str, usize) = match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => ("CRLF", 2),
            b'\r' => ("CR", 1),
            b'\n' => ("LF", 1),
            _ => {
                i += 1;
                continue;
            }
        };
        let span = source.span_for(i, i + len);
        if ending == "CR" {
            out.emit(span, "bare CR line ending");
        } else {
            match expected {
                None => expected = Some(ending),
                Some(first) if first != ending => out.emit(
                    span,
                    format!("{} line ending in a file that uses {}", ending, first),
                ),
                Some(_) => {}
            }
        }
        i += len;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::closes_cast;
    use crate::analysis::tokenize;
    use crate::detect::test_support::{run_rule, run_rule_with};
    use crate::detect::RuleParams;

    #[test]
    fn test_double_space_fires_at_column_eight() {
        let diags = run_rule("WHITESPACE.MULTIPLE_SPACES", "uint8_t  x;\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line(), 1);
        assert_eq!(diags[0].column(), 8);
        assert!(run_rule("WHITESPACE.MULTIPLE_SPACES", "uint8_t x;\n").is_empty());
    }

    #[test]
    fn test_multiple_spaces_ignores_indentation_and_comment_alignment() {
        let src = "void f(void)\n{\n    int abc;    /* aligned */\n}\n";
        assert!(run_rule("WHITESPACE.MULTIPLE_SPACES", src).is_empty());
    }

    #[test]
    fn test_line_length() {
        let params = RuleParams {
            max_line_length: 10,
            ..RuleParams::default()
        };
        let diags = run_rule_with("WHITESPACE.LINE_LENGTH", "int g_abcdefgh;\nint g_a;\n", &params);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].column(), 11);
        assert_eq!(diags[0].span.end_col, 16);
    }

    #[test]
    fn test_tabs_and_trailing() {
        let src = "int g_a;\t\n\tint g_b;\n/* x */  \n";
        let tabs = run_rule("WHITESPACE.TAB", src);
        assert_eq!(tabs.len(), 2);
        let trailing = run_rule("WHITESPACE.TRAILING", src);
        let lines: Vec<usize> = trailing.iter().map(|d| d.line()).collect();
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn test_operator_spacing() {
        let src = "void f(void)\n{\n    a=b;\n    c = d + e;\n    x = -1;\n    y = a-b;\n    z = (int)-y;\n    return -1;\n}\n";
        let diags = run_rule("WHITESPACE.OPERATOR_SPACING", src);
        let lines: Vec<usize> = diags.iter().map(|d| d.line()).collect();
        assert_eq!(lines, vec![3, 6]);
        assert!(diags[0].message.contains("needs a space on each side"));
    }

    #[test]
    fn test_ternary_colon_but_not_case_labels() {
        let src = "void f(int n)\n{\n    switch (n)\n    {\n    case 1:\n        n = n?1:2;\n        break;\n    }\n}\n";
        let diags = run_rule("WHITESPACE.OPERATOR_SPACING", src);
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| d.line() == 6));
    }

    #[test]
    fn test_comma_member_and_unary() {
        let src = "void f(void)\n{\n    g(a ,b);\n    p -> x = s . y;\n    n = ! m;\n    i ++;\n    ++j;\n}\n";
        let comma = run_rule("WHITESPACE.COMMA_SPACING", src);
        assert_eq!(comma.len(), 1);
        assert!(comma[0].message.contains("unexpected space before ','"));
        assert!(comma[0].message.contains("missing space after ','"));
        assert_eq!(run_rule("WHITESPACE.MEMBER_ACCESS", src).len(), 2);
        let unary = run_rule("WHITESPACE.UNARY_SPACING", src);
        let lines: Vec<usize> = unary.iter().map(|d| d.line()).collect();
        assert_eq!(lines, vec![5, 6]);
    }

    fn closing_parens(src: &str) -> Vec<bool> {
        let tokens = tokenize(src.as_bytes()).tokens;
        (0..tokens.len())
            .filter(|&i| tokens[i].is_punct(")"))
            .map(|i| closes_cast(&tokens, i))
            .collect()
    }

    #[test]
    fn test_closes_cast() {
        assert_eq!(closing_parens("x = (uint8_t)y;\n"), vec![true]);
        assert_eq!(closing_parens("x = (char *)p;\n"), vec![true]);
        assert_eq!(closing_parens("x = f(a) - b;\n"), vec![false]);
        assert_eq!(closing_parens("x = sizeof(int) - b;\n"), vec![false]);
        assert_eq!(closing_parens("x = (a + b) - c;\n"), vec![false]);
    }

    #[test]
    fn test_unmatched_close_parens_stop_early() {
        let src = format!("x = a{};\n", ")".repeat(50_000));
        let casts = closing_parens(&src);
        assert_eq!(casts.len(), 50_000);
        assert!(casts.iter().all(|&c| !c));
    }

    #[test]
    fn test_designated_initializer_member_is_clean() {
        let src = "point_t g_origin = { .x = 0, .y = 0 };\n";
        assert!(run_rule("WHITESPACE.MEMBER_ACCESS", src).is_empty());
    }

    #[test]
    fn test_paren_and_keyword_spacing() {
        let src = "void f(void)\n{\n    if( x )\n    {\n        g (x);\n    }\n    void (*p_fn)(void);\n}\n";
        let parens = run_rule("WHITESPACE.PAREN_SPACING", src);
        let lines: Vec<usize> = parens.iter().map(|d| d.line()).collect();
        assert_eq!(lines, vec![3, 3, 5]);
        let keywords = run_rule("WHITESPACE.KEYWORD_SPACING", src);
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].fix.as_deref(), Some("if ("));
    }

    #[test]
    fn test_semicolon_spacing() {
        let src = "void f(void)\n{\n    g() ;\n    for (i = 0;i < n; i++)\n    {\n    }\n    for (;;)\n    {\n    }\n}\n";
        let diags = run_rule("WHITESPACE.SEMICOLON_SPACING", src);
        let lines: Vec<usize> = diags.iter().map(|d| d.line()).collect();
        assert_eq!(lines, vec![3, 4]);
    }

    #[test]
    fn test_brace_lines() {
        let src = "void f(void) {\n    if (x)\n    {\n        g();\n    } else\n    {\n        h();\n    }\n}\ntypedef struct st_p\n{\n    int x;\n} p_t;\nint g_v[2] = { 1, 2 };\n";
        let open = run_rule("WHITESPACE.BRACE_OPEN_LINE", src);
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].line(), 1);
        let close = run_rule("WHITESPACE.BRACE_CLOSE_LINE", src);
        assert_eq!(close.len(), 1);
        assert_eq!(close[0].line(), 5);
    }

    #[test]
    fn test_do_while_close_is_allowed() {
        let src = "void f(void)\n{\n    do\n    {\n        n--;\n    } while (n > 0);\n}\n";
        assert!(run_rule("WHITESPACE.BRACE_CLOSE_LINE", src).is_empty());
    }

    #[test]
    fn test_indentation() {
        let src = "void f(void)\n{\n   int abc;\n    int def;\n}\n";
        let diags = run_rule("WHITESPACE.INDENTATION", src);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line(), 3);
        assert!(diags[0].message.contains("indentation of 3"));
    }

    #[test]
    fn test_blank_lines() {
        let src = "int g_a;\n\n\n\n\nint g_b;\n";
        let diags = run_rule("WHITESPACE.BLANK_LINES", src);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line(), 4);
    }

    #[test]
    fn test_final_newline() {
        assert_eq!(run_rule("WHITESPACE.FINAL_NEWLINE", "int g_a;").len(), 1);
        assert!(run_rule("WHITESPACE.FINAL_NEWLINE", "int g_a;\n").is_empty());
        assert!(run_rule("WHITESPACE.FINAL_NEWLINE", "").is_empty());
    }

    #[test]
    fn test_line_endings() {
        let diags = run_rule("WHITESPACE.LINE_ENDING", "int g_a;\nint g_b;\r\nint g_c;\rint g_d;\n");
        let messages: Vec<&str> = diags.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages.len(), 2, "{:?}", messages);
        assert!(messages[0].contains("CRLF line ending in a file that uses LF"));
        assert!(messages[1].contains("bare CR"));
        assert!(run_rule("WHITESPACE.LINE_ENDING", "a;\r\nb;\r\n").is_empty());
    }
}
