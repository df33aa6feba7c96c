//! Restricted keywords and goto discipline.

use super::context::{Emitter, FileContext};
use super::registry::RuleDef;
use super::types::{Category, Severity};
use crate::analysis::{FunctionFact, NodeId, NodeKind, SyntaxTree, TokenKind};
use crate::error::RuleEvaluationError;

pub(super) static RULES: &[RuleDef] = &[
    RuleDef::new(
        "KEYWORDS.NO_AUTO",
        Category::Keywords,
        Severity::Warning,
        "The auto storage class is not used",
        check_no_auto,
    ),
    RuleDef::new(
        "KEYWORDS.NO_REGISTER",
        Category::Keywords,
        Severity::Warning,
        "The register storage class is not used",
        check_no_register,
    ),
    RuleDef::new(
        "KEYWORDS.GOTO_BACKWARD",
        Category::Keywords,
        Severity::Error,
        "goto only jumps forward",
        check_goto_backward,
    ),
    RuleDef::new(
        "KEYWORDS.GOTO_SCOPE",
        Category::Keywords,
        Severity::Error,
        "goto targets a label in the same or an enclosing block of the same function",
        check_goto_scope,
    ),
    RuleDef::new(
        "KEYWORDS.LABEL_NAME",
        Category::Keywords,
        Severity::Warning,
        "Labels are prefixed with the name of their function",
        check_label_name,
    ),
];

fn forbid_keyword(ctx: &FileContext<'_>, out: &mut Emitter, word: &str) {
    for tok in ctx.tokens() {
        if tok.kind == TokenKind::Keyword && tok.text == word {
            out.emit_with_fix(tok.span, format!("'{}' must not be used", word), "");
        }
    }
}

fn check_no_auto(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    forbid_keyword(ctx, out, "auto");
    Ok(())
}

fn check_no_register(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    forbid_keyword(ctx, out, "register");
    Ok(())
}

fn check_goto_backward(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    for func in &ctx.facts().functions {
        for goto in &func.gotos {
            let Some(label) = func.labels.iter().find(|l| l.name == goto.target) else {
                continue;
            };
            if label.token < goto.keyword {
                out.emit(
                    tokens[goto.keyword].span,
                    format!(
                        "goto jumps backward to '{}' on line {}",
                        goto.target,
                        tokens[label.token].line()
                    ),
                );
            }
        }
    }
    Ok(())
}

/// Innermost brace block of the function body containing the token.
fn innermost_block(tree: &SyntaxTree, body: NodeId, token: usize) -> NodeId {
    tree.preorder(body)
        .into_iter()
        .filter(|&n| {
            let node = tree.node(n);
            node.kind == NodeKind::BraceBlock && node.tokens.contains(&token)
        })
        .min_by_key(|&n| tree.node(n).tokens.len())
        .unwrap_or(body)
}

fn label_node(tree: &SyntaxTree, func: &FunctionFact, token: usize) -> Option<NodeId> {
    let body = func.body?;
    tree.preorder(body)
        .into_iter()
        .find(|&n| tree.node(n).kind == NodeKind::Label && tree.node(n).name == Some(token))
}

fn check_goto_scope(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let tree = ctx.tree();
    for func in &ctx.facts().functions {
        let Some(body) = func.body else { continue };
        for goto in &func.gotos {
            let span = tokens[goto.target_token].span;
            let Some(label) = func.labels.iter().find(|l| l.name == goto.target) else {
                out.emit(
                    span,
                    format!("goto target '{}' is not a label in '{}'", goto.target, func.name),
                );
                continue;
            };
            let Some(label_id) = label_node(tree, func, label.token) else {
                return Err(
                    RuleEvaluationError::new(out.rule_id(), "label fact without a label node")
                        .at(span),
                );
            };
            // Conditional groups are transparent; only braces open a scope.
            let Some(label_block) = tree
                .ancestors(label_id)
                .find(|&a| tree.node(a).kind == NodeKind::BraceBlock)
            else {
                continue;
            };
            let goto_block = innermost_block(tree, body, goto.keyword);
            let reachable = goto_block == label_block
                || tree.ancestors(goto_block).any(|a| a == label_block);
            if !reachable {
                out.emit(
                    span,
                    format!("goto jumps into a nested block to reach '{}'", goto.target),
                );
            }
        }
    }
    Ok(())
}

fn check_label_name(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    for func in &ctx.facts().functions {
        let prefix = format!("{}_", func.name);
        for label in &func.labels {
            if label.name != func.name && !label.name.starts_with(&prefix) {
                out.emit_with_fix(
                    tokens[label.token].span,
                    format!("label '{}' must start with '{}'", label.name, prefix),
                    format!("{}{}", prefix, label.name),
                );
            }
        }
    }
    Ok(())
}
