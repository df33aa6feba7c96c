//! Structural rules over the syntax tree.

use super::context::{Emitter, FileContext};
use super::registry::RuleDef;
use super::types::{Category, Severity};
use crate::analysis::{NodeId, NodeKind, SyntaxTree, Token, TokenKind};
use crate::error::RuleEvaluationError;

pub(super) static RULES: &[RuleDef] = &[
    RuleDef::new(
        "STRUCTURE.UNBALANCED",
        Category::Structure,
        Severity::Error,
        "Braces, parentheses and brackets are balanced",
        check_unbalanced,
    ),
    RuleDef::new(
        "STRUCTURE.BRACES_REQUIRED",
        Category::Structure,
        Severity::Warning,
        "Bodies of if, else, for, while, do and switch are enclosed in braces",
        check_braces_required,
    ),
    RuleDef::new(
        "STRUCTURE.SWITCH_DEFAULT",
        Category::Structure,
        Severity::Warning,
        "Every switch has a default label",
        check_switch_default,
    ),
    RuleDef::new(
        "STRUCTURE.ELSE_IF_TERMINATION",
        Category::Structure,
        Severity::Warning,
        "An if ... else if chain ends with a plain else",
        check_else_if_termination,
    ),
    RuleDef::new(
        "STRUCTURE.NESTING_DEPTH",
        Category::Structure,
        Severity::Warning,
        "Control statements are not nested too deeply",
        check_nesting_depth,
    ),
    RuleDef::new(
        "STRUCTURE.TERNARY_NESTING",
        Category::Structure,
        Severity::Warning,
        "Conditional operators are not nested",
        check_ternary_nesting,
    ),
    RuleDef::new(
        "STRUCTURE.FUNCTION_LENGTH",
        Category::Structure,
        Severity::Warning,
        "Function bodies stay within the line limit",
        check_function_length,
    ),
    RuleDef::new(
        "STRUCTURE.FILE_LENGTH",
        Category::Structure,
        Severity::Info,
        "Files stay within the line limit",
        check_file_length,
    ),
    RuleDef::new(
        "STRUCTURE.ONE_STATEMENT_PER_LINE",
        Category::Structure,
        Severity::Warning,
        "At most one statement or declaration per line",
        check_one_statement_per_line,
    ),
];

fn check_unbalanced(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    for err in ctx.tree().errors() {
        out.emit(err.span, err.kind.to_string());
    }
    Ok(())
}

/// Lead keyword token of a control statement.
fn lead_token(
    tokens: &[Token],
    tree: &SyntaxTree,
    id: NodeId,
    rule: &str,
) -> Result<usize, RuleEvaluationError> {
    tree.first_code(tokens, id)
        .ok_or_else(|| RuleEvaluationError::new(rule, "control statement without tokens"))
}

/// Whether an `else` statement continues with `if`.
fn is_else_if(ctx: &FileContext<'_>, id: NodeId) -> bool {
    let tokens = ctx.tokens();
    let tree = ctx.tree();
    tree.lead_keyword(tokens, id) == Some("else")
        && tree
            .first_code(tokens, id)
            .and_then(|first| ctx.next_code(first))
            .is_some_and(|n| tokens[n].is_keyword("if"))
}

fn control_statements(ctx: &FileContext<'_>) -> Vec<NodeId> {
    let tokens = ctx.tokens();
    let tree = ctx.tree();
    tree.preorder(tree.root())
        .into_iter()
        .filter(|&id| tree.is_control(tokens, id))
        .collect()
}

fn check_braces_required(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let tree = ctx.tree();
    for id in control_statements(ctx) {
        if tree.block(id).is_some() {
            continue;
        }
        let lead = lead_token(tokens, tree, id, out.rule_id())?;
        let what = if is_else_if(ctx, id) {
            "else if".to_string()
        } else {
            tokens[lead].text.clone()
        };
        out.emit(
            tokens[lead].span,
            format!("body of '{}' must be enclosed in braces", what),
        );
    }
    Ok(())
}

/// Whether a `default` label appears in the block, not counting nested
/// switches.
fn has_default(tokens: &[Token], tree: &SyntaxTree, block: NodeId) -> bool {
    let mut stack = vec![block];
    while let Some(id) = stack.pop() {
        for &child in tree.children(id) {
            match tree.lead_keyword(tokens, child) {
                Some("default") if tree.node(child).kind == NodeKind::Statement => return true,
                Some("switch") => continue,
                _ => stack.push(child),
            }
        }
    }
    false
}

fn check_switch_default(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let tree = ctx.tree();
    for id in control_statements(ctx) {
        if tree.lead_keyword(tokens, id) != Some("switch") {
            continue;
        }
        let lead = lead_token(tokens, tree, id, out.rule_id())?;
        let found = tree
            .block(id)
            .is_some_and(|block| has_default(tokens, tree, block));
        if !found {
            out.emit(tokens[lead].span, "switch has no default label");
        }
    }
    Ok(())
}

fn check_else_if_termination(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let tree = ctx.tree();
    for parent in tree.preorder(tree.root()) {
        let children = tree.children(parent);
        let mut i = 0;
        while i < children.len() {
            if tree.lead_keyword(tokens, children[i]) != Some("if") {
                i += 1;
                continue;
            }
            let mut last_else_if = None;
            let mut terminated = false;
            let mut j = i + 1;
            while j < children.len() {
                let sibling = children[j];
                if tree.node(sibling).kind == NodeKind::CommentBlock {
                    j += 1;
                    continue;
                }
                if tree.lead_keyword(tokens, sibling) != Some("else") {
                    break;
                }
                if is_else_if(ctx, sibling) {
                    last_else_if = Some(sibling);
                } else {
                    terminated = true;
                    j += 1;
                    break;
                }
                j += 1;
            }
            if let (Some(last), false) = (last_else_if, terminated) {
                let lead = lead_token(tokens, tree, last, out.rule_id())?;
                out.emit(
                    tokens[lead].span,
                    "if ... else if chain must end with an else",
                );
            }
            i = j.max(i + 1);
        }
    }
    Ok(())
}

fn check_nesting_depth(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let tree = ctx.tree();
    let max = ctx.params.max_nesting_depth;
    for id in control_statements(ctx) {
        if ctx.is_cancelled() {
            break;
        }
        let depth = 1 + tree
            .ancestors(id)
            .filter(|&a| tree.is_control(tokens, a))
            .count();
        if depth == max + 1 {
            let lead = lead_token(tokens, tree, id, out.rule_id())?;
            out.emit(
                tokens[lead].span,
                format!("control statement nested {} deep, limit is {}", depth, max),
            );
        }
    }
    Ok(())
}

fn check_ternary_nesting(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let max = ctx.params.max_ternary_depth;
    // (count at level entry, current count)
    let mut levels: Vec<(usize, usize)> = vec![(0, 0)];
    for tok in tokens {
        if tok.kind == TokenKind::Preprocessor {
            levels = vec![(0, 0)];
            continue;
        }
        if !tok.kind.is_code() {
            continue;
        }
        match tok.text.as_str() {
            "(" | "[" => {
                let current = levels.last().map_or(0, |l| l.1);
                levels.push((current, current));
            }
            ")" | "]" => {
                if levels.len() > 1 {
                    levels.pop();
                }
            }
            "," => {
                if let Some(level) = levels.last_mut() {
                    level.1 = level.0;
                }
            }
            ";" | "{" | "}" => levels = vec![(0, 0)],
            "?" => {
                if let Some(level) = levels.last_mut() {
                    level.1 += 1;
                    if level.1 == max + 1 {
                        out.emit(
                            tok.span,
                            format!(
                                "conditional operator nested {} deep, limit is {}",
                                level.1, max
                            ),
                        );
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_function_length(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let tree = ctx.tree();
    let max = ctx.params.max_function_lines;
    for func in &ctx.facts().functions {
        let Some(body) = func.body else { continue };
        let range = &tree.node(body).tokens;
        if range.is_empty() {
            continue;
        }
        let open_line = tokens[range.start].line();
        let close_line = tokens[range.end - 1].span.end_line;
        let lines = close_line.saturating_sub(open_line + 1);
        if lines > max {
            out.emit(
                tokens[func.name_token].span,
                format!(
                    "function '{}' body is {} lines long, limit is {}",
                    func.name, lines, max
                ),
            );
        }
    }
    Ok(())
}

fn check_file_length(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    let source = ctx.source();
    let max = ctx.params.max_file_lines;
    let count = source.line_count();
    if count > max {
        if let Some(span) = source.line_span(max + 1) {
            out.emit(span, format!("file is {} lines long, limit is {}", count, max));
        }
    }
    Ok(())
}

fn check_one_statement_per_line(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let tree = ctx.tree();
    for parent in tree.preorder(tree.root()) {
        let mut prev: Option<(NodeId, usize)> = None;
        for &child in tree.children(parent) {
            let kind = tree.node(child).kind;
            if !matches!(
                kind,
                NodeKind::Statement
                    | NodeKind::Declaration
                    | NodeKind::TypeDefinition
                    | NodeKind::FunctionDefinition
                    | NodeKind::Label
            ) {
                if kind != NodeKind::CommentBlock {
                    prev = None;
                }
                continue;
            }
            let (Some(first), Some(last)) =
                (tree.first_code(tokens, child), tree.last_code(tokens, child))
            else {
                continue;
            };
            if let Some((prev_id, prev_line)) = prev {
                let prev_is_label = tree.node(prev_id).kind == NodeKind::Label
                    || matches!(tree.lead_keyword(tokens, prev_id), Some("case" | "default"));
                let is_else = tree.lead_keyword(tokens, child) == Some("else");
                if tokens[first].line() == prev_line && !prev_is_label && !is_else {
                    out.emit(
                        tokens[first].span,
                        "more than one statement on this line",
                    );
                }
            }
            prev = Some((child, tokens[last].line()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::detect::test_support::{run_rule, run_rule_with};
    use crate::detect::RuleParams;

    #[test]
    fn test_unbalanced() {
        let diags = run_rule("STRUCTURE.UNBALANCED", "int g_a;\n}\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line(), 2);
        assert!(diags[0].message.contains("unmatched closing '}'"));
    }

    #[test]
    fn test_braces_required() {
        let src = "void f(void)\n{\n    if (a)\n        g();\n    else if (b)\n    {\n        h();\n    }\n    else\n        k();\n    while (c)\n    {\n        c--;\n    }\n}\n";
        let diags = run_rule("STRUCTURE.BRACES_REQUIRED", src);
        let lines: Vec<usize> = diags.iter().map(|d| d.line()).collect();
        assert_eq!(lines, vec![3, 9]);
    }

    #[test]
    fn test_switch_without_default_fires_once_at_switch() {
        let src = "void f(int n)\n{\n    switch (n)\n    {\n    case 1:\n        g();\n        break;\n    }\n}\n";
        let diags = run_rule("STRUCTURE.SWITCH_DEFAULT", src);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line(), 3);
        assert_eq!(diags[0].column(), 5);
    }

    #[test]
    fn test_nested_switch_default_does_not_count_for_outer() {
        let src = "void f(int n)\n{\n    switch (n)\n    {\n    case 1:\n        switch (n)\n        {\n        default:\n            break;\n        }\n        break;\n    }\n}\n";
        let diags = run_rule("STRUCTURE.SWITCH_DEFAULT", src);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line(), 3);
    }

    #[test]
    fn test_switch_with_default_is_clean() {
        let src = "void f(int n)\n{\n    switch (n)\n    {\n    default:\n        break;\n    }\n}\n";
        assert!(run_rule("STRUCTURE.SWITCH_DEFAULT", src).is_empty());
    }

    #[test]
    fn test_else_if_termination() {
        let src = "void f(void)\n{\n    if (a)\n    {\n        g();\n    }\n    else if (b)\n    {\n        h();\n    }\n    if (c)\n    {\n        g();\n    }\n    else if (d)\n    {\n        h();\n    }\n    else\n    {\n        k();\n    }\n}\n";
        let diags = run_rule("STRUCTURE.ELSE_IF_TERMINATION", src);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line(), 7);
    }

    #[test]
    fn test_nesting_depth() {
        let params = RuleParams {
            max_nesting_depth: 2,
            ..RuleParams::default()
        };
        let src = "void f(void)\n{\n    if (a)\n    {\n        while (b)\n        {\n            if (c)\n            {\n                if (d)\n                {\n                    g();\n                }\n            }\n        }\n    }\n}\n";
        let diags = run_rule_with("STRUCTURE.NESTING_DEPTH", src, &params);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line(), 7);
    }

    #[test]
    fn test_nested_ternary() {
        let nested = "int g_v = a ? b : c ? d : e;\n";
        let diags = run_rule("STRUCTURE.TERNARY_NESTING", nested);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].column(), 21);

        assert!(run_rule("STRUCTURE.TERNARY_NESTING", "int g_v = a ? b : c;\n").is_empty());
        let separate = "void f(void)\n{\n    x = a ? b : c;\n    y = g(a ? b : c, d ? e : f);\n}\n";
        assert!(run_rule("STRUCTURE.TERNARY_NESTING", separate).is_empty());
        let parenthesized = "int g_v = a ? (b ? c : d) : e;\n";
        assert_eq!(run_rule("STRUCTURE.TERNARY_NESTING", parenthesized).len(), 1);
    }

    #[test]
    fn test_function_and_file_length() {
        let params = RuleParams {
            max_function_lines: 2,
            max_file_lines: 5,
            ..RuleParams::default()
        };
        let src = "int f(void)\n{\n    int abc;\n    abc = 1;\n    return abc;\n}\n";
        let func = run_rule_with("STRUCTURE.FUNCTION_LENGTH", src, &params);
        assert_eq!(func.len(), 1);
        assert!(func[0].message.contains("3 lines"));
        let file = run_rule_with("STRUCTURE.FILE_LENGTH", src, &params);
        assert_eq!(file.len(), 1);
        assert_eq!(file[0].line(), 6);
    }

    #[test]
    fn test_one_statement_per_line() {
        let src = "void f(int n)\n{\n    int abc; int def;\n    switch (n)\n    {\n    case 1: g();\n        break;\n    default:\n        break;\n    }\n}\n";
        let diags = run_rule("STRUCTURE.ONE_STATEMENT_PER_LINE", src);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line(), 3);
        assert_eq!(diags[0].column(), 14);
    }
}
