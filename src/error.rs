//! Error taxonomy for the checker.
//!
//! Lexer and structure errors are recovered where they occur and surfaced as
//! diagnostics; configuration errors are fatal before any file is analyzed.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::analysis::Span;

/// Kind of malformed input found by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LexErrorKind {
    UnterminatedString,
    UnterminatedChar,
    UnterminatedComment,
    UnterminatedContinuation,
    NonAscii,
    InvalidCharacter,
}

impl LexErrorKind {
    /// Rule id under which this error is reported.
    pub fn rule_id(&self) -> &'static str {
        match self {
            LexErrorKind::UnterminatedString => "LEX.UNTERMINATED_STRING",
            LexErrorKind::UnterminatedChar => "LEX.UNTERMINATED_CHAR",
            LexErrorKind::UnterminatedComment => "LEX.UNTERMINATED_COMMENT",
            LexErrorKind::UnterminatedContinuation => "LEX.UNTERMINATED_CONTINUATION",
            LexErrorKind::NonAscii => "ENCODING.NON_ASCII",
            LexErrorKind::InvalidCharacter => "LEX.INVALID_CHARACTER",
        }
    }
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexErrorKind::UnterminatedString => write!(f, "unterminated string literal"),
            LexErrorKind::UnterminatedChar => write!(f, "unterminated character literal"),
            LexErrorKind::UnterminatedComment => write!(f, "unterminated block comment"),
            LexErrorKind::UnterminatedContinuation => {
                write!(f, "line continuation at end of file")
            }
            LexErrorKind::NonAscii => write!(f, "non-ASCII bytes in source"),
            LexErrorKind::InvalidCharacter => write!(f, "invalid character in source"),
        }
    }
}

/// A malformed token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {span}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

/// Kind of delimiter imbalance found by the structural builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureErrorKind {
    /// A closing delimiter with no matching opener.
    UnmatchedClose(char),
    /// An opening delimiter that is never closed.
    UnclosedOpen(char),
    /// A closing delimiter that does not match the innermost opener.
    MismatchedClose { expected: char, found: char },
}

impl fmt::Display for StructureErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureErrorKind::UnmatchedClose(c) => write!(f, "unmatched closing '{}'", c),
            StructureErrorKind::UnclosedOpen(c) => write!(f, "unclosed '{}'", c),
            StructureErrorKind::MismatchedClose { expected, found } => {
                write!(f, "expected '{}' but found '{}'", expected, found)
            }
        }
    }
}

/// An unbalanced delimiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {span}")]
pub struct StructureError {
    pub kind: StructureErrorKind,
    pub span: Span,
}

/// An evaluator hit a tree shape it cannot handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rule {rule_id} failed: {reason}")]
pub struct RuleEvaluationError {
    pub rule_id: String,
    pub reason: String,
    pub span: Option<Span>,
}

impl RuleEvaluationError {
    pub fn new(rule_id: &str, reason: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            reason: reason.into(),
            span: None,
        }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

/// Configuration error. Fatal: the run stops before analyzing any file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown rule id {0:?}")]
    UnknownRule(String),

    #[error("invalid setting {value:?} for rule {rule}: expected error, warning, info or off")]
    InvalidSeverity { rule: String, value: String },

    #[error("invalid suppression pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid excluded_paths pattern {pattern:?}: {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Kind of problem with suppression directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppressionErrorKind {
    /// A range start with no matching end.
    Unterminated,
    /// A range end with no open range.
    UnmatchedEnd,
    /// A directive names a rule id that does not exist.
    UnknownRule(String),
}

impl SuppressionErrorKind {
    pub fn rule_id(&self) -> &'static str {
        match self {
            SuppressionErrorKind::Unterminated => "SUPPRESSION.UNTERMINATED",
            SuppressionErrorKind::UnmatchedEnd => "SUPPRESSION.UNMATCHED_END",
            SuppressionErrorKind::UnknownRule(_) => "SUPPRESSION.UNKNOWN_RULE",
        }
    }
}

impl fmt::Display for SuppressionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuppressionErrorKind::Unterminated => {
                write!(f, "suppression range is never closed; it suppresses nothing")
            }
            SuppressionErrorKind::UnmatchedEnd => {
                write!(f, "suppression range end has no matching start")
            }
            SuppressionErrorKind::UnknownRule(id) => {
                write!(f, "suppression names unknown rule {:?}", id)
            }
        }
    }
}

/// A malformed suppression directive or range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {span}")]
pub struct SuppressionError {
    pub kind: SuppressionErrorKind,
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_error_rule_ids() {
        assert_eq!(
            LexErrorKind::UnterminatedComment.rule_id(),
            "LEX.UNTERMINATED_COMMENT"
        );
        assert_eq!(LexErrorKind::NonAscii.rule_id(), "ENCODING.NON_ASCII");
    }

    #[test]
    fn test_error_display() {
        let err = StructureError {
            kind: StructureErrorKind::MismatchedClose {
                expected: ')',
                found: ']',
            },
            span: Span::default(),
        };
        assert!(err.to_string().contains("expected ')' but found ']'"));

        let err = RuleEvaluationError::new("NAMING.TYPE_CASE", "no alias");
        assert_eq!(err.to_string(), "rule NAMING.TYPE_CASE failed: no alias");
    }
}
