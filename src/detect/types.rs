//! Core types for check results.

use serde::{Deserialize, Serialize};

use crate::analysis::Span;

/// Severity levels for diagnostics, ordered `Info < Warning < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" | "warn" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// Rule categories. The category is the part of a rule id before the dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Lexical,
    Encoding,
    Naming,
    Whitespace,
    Structure,
    Comments,
    Keywords,
    Documentation,
    Suppression,
    Engine,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Lexical,
        Category::Encoding,
        Category::Naming,
        Category::Whitespace,
        Category::Structure,
        Category::Comments,
        Category::Keywords,
        Category::Documentation,
        Category::Suppression,
        Category::Engine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Lexical => "lexical",
            Category::Encoding => "encoding",
            Category::Naming => "naming",
            Category::Whitespace => "whitespace",
            Category::Structure => "structure",
            Category::Comments => "comments",
            Category::Keywords => "keywords",
            Category::Documentation => "documentation",
            Category::Suppression => "suppression",
            Category::Engine => "engine",
        }
    }

    /// Rule id prefix, e.g. `NAMING`.
    pub fn prefix(&self) -> &'static str {
        match self {
            Category::Lexical => "LEX",
            Category::Encoding => "ENCODING",
            Category::Naming => "NAMING",
            Category::Whitespace => "WHITESPACE",
            Category::Structure => "STRUCTURE",
            Category::Comments => "COMMENTS",
            Category::Keywords => "KEYWORDS",
            Category::Documentation => "DOCUMENTATION",
            Category::Suppression => "SUPPRESSION",
            Category::Engine => "ENGINE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == lower || c.prefix().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub rule_id: String,
    pub category: Category,
    pub severity: Severity,
    pub file: String,
    pub span: Span,
    pub message: String,
    /// Suggested replacement text, when the rule knows one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl Diagnostic {
    pub fn line(&self) -> usize {
        self.span.start_line
    }

    pub fn column(&self) -> usize {
        self.span.start_col
    }

    /// Create a unique key for this diagnostic (for deduplication/comparison).
    pub fn key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.rule_id, self.file, self.span.start_byte, self.span.end_byte
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order_and_parse() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert_eq!("ERROR".parse::<Severity>().unwrap(), Severity::Error);
        assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warning);
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(Category::parse("naming"), Some(Category::Naming));
        assert_eq!(Category::parse("LEX"), Some(Category::Lexical));
        assert_eq!(Category::parse("Whitespace"), Some(Category::Whitespace));
        assert_eq!(Category::parse("style"), None);
    }

    #[test]
    fn test_diagnostic_serializes() {
        let diag = Diagnostic {
            rule_id: "NAMING.TYPE_CASE".to_string(),
            category: Category::Naming,
            severity: Severity::Warning,
            file: "a.c".to_string(),
            span: Span::default(),
            message: "bad".to_string(),
            fix: None,
        };
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"severity\":\"warning\""));
        assert!(json.contains("\"category\":\"naming\""));
        assert!(!json.contains("fix"));
    }
}
