//! Lexical and encoding rules: malformed tokens found while lexing.

use super::context::{Emitter, FileContext};
use super::registry::RuleDef;
use super::types::{Category, Severity};
use crate::error::{LexErrorKind, RuleEvaluationError};

pub(super) static RULES: &[RuleDef] = &[
    RuleDef::new(
        "LEX.UNTERMINATED_STRING",
        Category::Lexical,
        Severity::Error,
        "String literal runs to the end of the line",
        check_unterminated_string,
    ),
    RuleDef::new(
        "LEX.UNTERMINATED_CHAR",
        Category::Lexical,
        Severity::Error,
        "Character literal runs to the end of the line",
        check_unterminated_char,
    ),
    RuleDef::new(
        "LEX.UNTERMINATED_COMMENT",
        Category::Lexical,
        Severity::Error,
        "Block comment is never closed",
        check_unterminated_comment,
    ),
    RuleDef::new(
        "LEX.UNTERMINATED_CONTINUATION",
        Category::Lexical,
        Severity::Error,
        "Line continuation at end of file",
        check_unterminated_continuation,
    ),
    RuleDef::new(
        "LEX.INVALID_CHARACTER",
        Category::Lexical,
        Severity::Error,
        "Character that is not part of the C source character set",
        check_invalid_character,
    ),
    RuleDef::new(
        "ENCODING.NON_ASCII",
        Category::Encoding,
        Severity::Warning,
        "Source must be plain ASCII",
        check_non_ascii,
    ),
];

fn report(ctx: &FileContext<'_>, out: &mut Emitter, kind: LexErrorKind) {
    for err in ctx.source().lex_errors().iter().filter(|e| e.kind == kind) {
        let message = match kind {
            LexErrorKind::NonAscii => format!("{} ({} bytes)", kind, err.span.len()),
            LexErrorKind::InvalidCharacter => format!(
                "{} {:?}",
                kind,
                String::from_utf8_lossy(ctx.source().slice(&err.span))
            ),
            _ => kind.to_string(),
        };
        out.emit(err.span, message);
    }
}

fn check_unterminated_string(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    report(ctx, out, LexErrorKind::UnterminatedString);
    Ok(())
}

fn check_unterminated_char(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    report(ctx, out, LexErrorKind::UnterminatedChar);
    Ok(())
}

fn check_unterminated_comment(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    report(ctx, out, LexErrorKind::UnterminatedComment);
    Ok(())
}

fn check_unterminated_continuation(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    report(ctx, out, LexErrorKind::UnterminatedContinuation);
    Ok(())
}

fn check_invalid_character(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    report(ctx, out, LexErrorKind::InvalidCharacter);
    Ok(())
}

fn check_non_ascii(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    report(ctx, out, LexErrorKind::NonAscii);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::detect::test_support::run_rule;

    #[test]
    fn test_unterminated_comment_reported() {
        let diags = run_rule("LEX.UNTERMINATED_COMMENT", "int x;\n/* open\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line(), 2);
    }

    #[test]
    fn test_non_ascii_counts_bytes() {
        let diags = run_rule("ENCODING.NON_ASCII", "/* na\u{ef}ve */\nint x;\n");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("2 bytes"));
    }

    #[test]
    fn test_invalid_character_quoted() {
        let diags = run_rule("LEX.INVALID_CHARACTER", "int a = 1 @ 2;\n");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("\"@\""));
        assert_eq!(diags[0].column(), 11);
    }

    #[test]
    fn test_clean_input_has_no_lex_findings() {
        let src = "int x = 'a';\nchar *p_s = \"ok\";\n";
        for id in ["LEX.UNTERMINATED_STRING", "LEX.UNTERMINATED_CHAR"] {
            assert!(run_rule(id, src).is_empty());
        }
    }
}
