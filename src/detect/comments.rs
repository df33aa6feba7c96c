//! Comment placement and formatting rules.

use super::context::{Emitter, FileContext};
use super::registry::RuleDef;
use super::types::{Category, Severity};
use crate::analysis::{NodeKind, TokenKind};
use crate::error::RuleEvaluationError;

pub(super) static RULES: &[RuleDef] = &[
    RuleDef::new(
        "COMMENTS.SINGLE_LINE_PLACEMENT",
        Category::Comments,
        Severity::Warning,
        "// comments only follow code on the same line",
        check_single_line_placement,
    ),
    RuleDef::new(
        "COMMENTS.NESTED",
        Category::Comments,
        Severity::Warning,
        "Block comments do not contain /*",
        check_nested,
    ),
    RuleDef::new(
        "COMMENTS.CAPITALIZATION",
        Category::Comments,
        Severity::Info,
        "Comments start with a capital letter",
        check_capitalization,
    ),
    RuleDef::new(
        "COMMENTS.BLANK_LINE_BEFORE",
        Category::Comments,
        Severity::Info,
        "Standalone comments are preceded by a blank line",
        check_blank_line_before,
    ),
    RuleDef::new(
        "COMMENTS.DELIMITER_SPACING",
        Category::Comments,
        Severity::Warning,
        "Comment delimiters are separated from the text by a space",
        check_delimiter_spacing,
    ),
];

fn check_single_line_placement(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    for (i, tok) in ctx.tokens().iter().enumerate() {
        if tok.kind == TokenKind::LineComment && ctx.starts_line(i) {
            out.emit(
                tok.span,
                "'//' comment on its own line; use /* */ for standalone comments",
            );
        }
    }
    Ok(())
}

fn check_nested(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    let source = ctx.source();
    for tok in ctx.tokens() {
        if tok.kind != TokenKind::BlockComment {
            continue;
        }
        let bytes = source.slice(&tok.span);
        let body_end = bytes.len().saturating_sub(2).max(2);
        let mut i = 2;
        while i + 1 < body_end {
            if bytes[i] == b'/' && bytes[i + 1] == b'*' {
                let start = tok.span.start_byte + i;
                out.emit(source.span_for(start, start + 2), "'/*' inside a block comment");
                i += 2;
            } else {
                i += 1;
            }
        }
    }
    Ok(())
}

/// Byte range of the first word of a comment, after delimiters and
/// decoration.
fn first_word(bytes: &[u8]) -> Option<(usize, usize)> {
    let mut i = if bytes.starts_with(b"//") || bytes.starts_with(b"/*") { 2 } else { 0 };
    let end = if bytes.ends_with(b"*/") && bytes.len() >= 4 {
        bytes.len() - 2
    } else {
        bytes.len()
    };
    while i < end {
        let c = bytes[i];
        if c.is_ascii_whitespace() || matches!(c, b'*' | b'/' | b'!' | b'-' | b'=' | b'#') {
            i += 1;
            continue;
        }
        let start = i;
        while i < end && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        return Some((start, i));
    }
    None
}

fn check_capitalization(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let source = ctx.source();
    let tokens = ctx.tokens();
    let tree = ctx.tree();
    for id in tree.preorder(tree.root()) {
        let node = tree.node(id);
        if node.kind != NodeKind::CommentBlock {
            continue;
        }
        let tok = &tokens[node.tokens.start];
        let bytes = source.slice(&tok.span);
        let Some((start, end)) = first_word(bytes) else { continue };
        let word = &bytes[start..end];
        let trimmed_len = word.len()
            - word
                .iter()
                .rev()
                .take_while(|b| matches!(b, b'.' | b',' | b':' | b';' | b'!' | b'?' | b')'))
                .count();
        let word = &word[..trimmed_len];
        if word.is_empty() || !word.iter().all(|b| b.is_ascii_lowercase()) {
            continue;
        }
        let base = tok.span.start_byte;
        let mut fixed = String::from_utf8_lossy(word).into_owned();
        fixed[..1].make_ascii_uppercase();
        out.emit_with_fix(
            source.span_for(base + start, base + start + trimmed_len),
            format!("comment starts with lowercase '{}'", String::from_utf8_lossy(word)),
            fixed,
        );
    }
    Ok(())
}

fn check_blank_line_before(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let tree = ctx.tree();
    let facts = ctx.facts();
    for id in tree.preorder(tree.root()) {
        let node = tree.node(id);
        if node.kind != NodeKind::CommentBlock || node.trailing {
            continue;
        }
        let first = node.tokens.start;
        let line = tokens[first].line();
        if line == 1 || facts.line(line - 1).is_some_and(|l| l.blank) {
            continue;
        }
        let previous = tokens[..first].iter().rev().find(|t| !t.kind.is_trivia());
        let opens_scope = previous.is_some_and(|t| t.is_punct("{") || t.is_punct(":"));
        if opens_scope {
            continue;
        }
        let last = node.tokens.end - 1;
        out.emit(
            tokens[first].span.to(&tokens[last].span),
            "comment must be preceded by a blank line",
        );
    }
    Ok(())
}

fn check_delimiter_spacing(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let source = ctx.source();
    for tok in ctx.tokens() {
        let bytes = source.slice(&tok.span);
        let base = tok.span.start_byte;
        match tok.kind {
            TokenKind::LineComment => {
                let ok = bytes
                    .get(2)
                    .map_or(true, |&c| matches!(c, b' ' | b'/' | b'!' | b'\r' | b'\n'));
                if !ok {
                    out.emit(source.span_for(base, base + 2), "missing space after '//'");
                }
            }
            TokenKind::BlockComment if bytes.len() > 4 => {
                let after_open = bytes[2];
                if !(after_open.is_ascii_whitespace() || after_open == b'*' || after_open == b'!') {
                    out.emit(source.span_for(base, base + 2), "missing space after '/*'");
                }
                let before_close = bytes[bytes.len() - 3];
                if !(before_close.is_ascii_whitespace() || before_close == b'*') {
                    let end = base + bytes.len();
                    out.emit(source.span_for(end - 2, end), "missing space before '*/'");
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::test_support::run_rule;

    #[test]
    fn test_line_comment_placement() {
        let src = "// standalone\nint g_a; // beside code\n";
        let diags = run_rule("COMMENTS.SINGLE_LINE_PLACEMENT", src);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line(), 1);
    }

    #[test]
    fn test_nested_comment() {
        let diags = run_rule("COMMENTS.NESTED", "/* outer /* inner */\nint g_a;\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].column(), 10);
        assert!(run_rule("COMMENTS.NESTED", "/* plain */\n/**/\n").is_empty());
    }

    #[test]
    fn test_first_word() {
        assert_eq!(first_word(b"/* hello */"), Some((3, 8)));
        assert_eq!(first_word(b"/*\n * Title\n */"), Some((6, 11)));
        assert_eq!(first_word(b"/**/"), None);
    }

    #[test]
    fn test_capitalization() {
        let src = "/* counts things. */\nint g_a;\n\n/* Counts things. */\nint g_b;\n\n/* p_next is set */\nint g_c;\n";
        let diags = run_rule("COMMENTS.CAPITALIZATION", src);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].column(), 4);
        assert_eq!(diags[0].fix.as_deref(), Some("Counts"));
    }

    #[test]
    fn test_blank_line_before() {
        let src = "int g_a;\n/* Needs space. */\nint g_b;\n\n/* Fine. */\nint g_c;\nvoid f(void)\n{\n    /* Fine at block start. */\n    g();\n}\n";
        let diags = run_rule("COMMENTS.BLANK_LINE_BEFORE", src);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line(), 2);
    }

    #[test]
    fn test_delimiter_spacing() {
        let src = "/*tight*/\n/* ok */\n/**\n * Doc.\n */\nint g_a; //x\nint g_b; // y\n";
        let diags = run_rule("COMMENTS.DELIMITER_SPACING", src);
        let messages: Vec<&str> = diags.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "missing space after '/*'",
                "missing space before '*/'",
                "missing space after '//'"
            ]
        );
    }
}
