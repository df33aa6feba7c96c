//! File and function documentation, and top-level section order.

use super::context::{Emitter, FileContext};
use super::registry::RuleDef;
use super::types::{Category, Severity};
use crate::analysis::{NodeKind, Section, TokenKind};
use crate::error::RuleEvaluationError;

pub(super) static RULES: &[RuleDef] = &[
    RuleDef::new(
        "DOCUMENTATION.FILE_HEADER",
        Category::Documentation,
        Severity::Warning,
        "Files open with a block comment header",
        check_file_header,
    ),
    RuleDef::new(
        "DOCUMENTATION.FUNCTION_HEADER",
        Category::Documentation,
        Severity::Warning,
        "Function definitions are preceded by a block comment",
        check_function_header,
    ),
    RuleDef::new(
        "DOCUMENTATION.SECTION_ORDER",
        Category::Documentation,
        Severity::Info,
        "Includes, macros, types, globals and functions appear in that order",
        check_section_order,
    ),
];

/// Index of the first token that is not whitespace.
fn first_significant(ctx: &FileContext<'_>) -> Option<usize> {
    ctx.tokens().iter().position(|t| !t.kind.is_trivia())
}

fn check_file_header(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    let Some(first) = first_significant(ctx) else {
        return Ok(());
    };
    let tok = &ctx.tokens()[first];
    if tok.kind != TokenKind::BlockComment {
        out.emit(tok.span, "file does not start with a block comment header");
    }
    Ok(())
}

fn check_function_header(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let tree = ctx.tree();
    let file_header = first_significant(ctx).filter(|&i| tokens[i].kind == TokenKind::BlockComment);
    for func in &ctx.facts().functions {
        let documented = tree.leading_comment(func.node).is_some_and(|comment| {
            let node = tree.node(comment);
            let start = node.tokens.start;
            Some(start) != file_header
                && node
                    .tokens
                    .clone()
                    .any(|i| tokens[i].kind == TokenKind::BlockComment)
        });
        if !documented {
            out.emit(
                tokens[func.name_token].span,
                format!("function '{}' has no header comment", func.name),
            );
        }
    }
    Ok(())
}

fn check_section_order(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let tree = ctx.tree();
    let mut furthest: Option<Section> = None;
    for entry in &ctx.facts().sections {
        match furthest {
            Some(seen) if entry.section < seen => {
                let node = tree.node(entry.node);
                let first = match node.kind {
                    NodeKind::Directive | NodeKind::MacroDefinition => Some(node.tokens.start),
                    _ => tree.first_code(tokens, entry.node),
                };
                if let Some(first) = first {
                    out.emit(
                        tokens[first].span,
                        format!("{} must come before {}", entry.section, seen),
                    );
                }
            }
            Some(seen) if entry.section <= seen => {}
            _ => furthest = Some(entry.section),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::detect::test_support::run_rule;

    #[test]
    fn test_file_header() {
        assert!(run_rule("DOCUMENTATION.FILE_HEADER", "\n/* Module. */\nint g_a;\n").is_empty());
        let diags = run_rule("DOCUMENTATION.FILE_HEADER", "#include <stdio.h>\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line(), 1);
        assert!(run_rule("DOCUMENTATION.FILE_HEADER", "").is_empty());
    }

    #[test]
    fn test_function_header() {
        let src = "/* File header. */\n\nint first(void)\n{\n    return 0;\n}\n\n/* Second. */\nint second(void)\n{\n    return 0;\n}\n\n// Third.\nint third(void)\n{\n    return 0;\n}\n";
        let diags = run_rule("DOCUMENTATION.FUNCTION_HEADER", src);
        let names: Vec<&str> = diags
            .iter()
            .map(|d| d.message.split('\'').nth(1).unwrap_or(""))
            .collect();
        assert_eq!(names, vec!["first", "third"]);
    }

    #[test]
    fn test_section_order() {
        let src = "/* Header. */\n#include <stdio.h>\nint g_a;\n#define LIMIT 4\ntypedef int id_t;\nvoid f(void)\n{\n}\n";
        let diags = run_rule("DOCUMENTATION.SECTION_ORDER", src);
        let lines: Vec<usize> = diags.iter().map(|d| d.line()).collect();
        assert_eq!(lines, vec![4, 5]);
        assert!(diags[0].message.contains("macros must come before global declarations"));
    }
}
