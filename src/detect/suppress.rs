//! Inline suppression of diagnostics via comments.
//!
//! Supports suppression comments like:
//! - `/* cstylecheck:ignore-next-line NAMING.VARIABLE_LENGTH - loop index */`
//! - `// cstylecheck:ignore WHITESPACE.TAB` (same line beside code, else next line)
//! - `/* cstylecheck:disable STRUCTURE.* */` ... `/* cstylecheck:enable STRUCTURE.* */`
//! - `/* cstylecheck:ignore-file */`
//!
//! A directive without rule ids applies to every rule. Ids may name one
//! rule, a whole category (`NAMING.*`) or everything (`*`).

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::registry::RuleRegistry;
use super::types::Diagnostic;
use crate::analysis::{SourceFile, Span, TokenKind};
use crate::error::{ConfigError, SuppressionError, SuppressionErrorKind};

/// Marker used when the configuration does not set one.
pub const DEFAULT_MARKER: &str = "cstylecheck";

lazy_static! {
    static ref DEFAULT_PATTERN: Regex = Regex::new(&directive_pattern(DEFAULT_MARKER)).unwrap();
}

fn directive_pattern(marker: &str) -> String {
    format!(
        r"(?m){}:(?P<directive>ignore-next-line|ignore-file|ignore|disable|enable)(?:[ \t]+(?P<rules>[A-Za-z_*][A-Za-z0-9_.*]*(?:[ \t]*,[ \t]*[A-Za-z_*][A-Za-z0-9_.*]*)*))?(?:[ \t]+-[ \t]*(?P<reason>.*?))?[ \t]*(?:\*/)?[ \t]*$",
        regex::escape(marker)
    )
}

/// What a directive asks for, as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectiveKind {
    /// `ignore`: the same line beside code, the next line otherwise.
    Ignore,
    IgnoreNextLine,
    IgnoreFile,
    /// Opens a range.
    Disable,
    /// Closes a range.
    Enable,
}

impl DirectiveKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "ignore" => Some(DirectiveKind::Ignore),
            "ignore-next-line" => Some(DirectiveKind::IgnoreNextLine),
            "ignore-file" => Some(DirectiveKind::IgnoreFile),
            "disable" => Some(DirectiveKind::Disable),
            "enable" => Some(DirectiveKind::Enable),
            _ => None,
        }
    }
}

/// A suppression comment found in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: DirectiveKind,
    /// Rule filters; empty means every rule.
    pub rules: Vec<String>,
    pub reason: Option<String>,
    /// Line the directive applies from.
    pub line: usize,
    pub span: Span,
}

/// How a resolved suppression applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuppressionType {
    /// Applies to the line of the directive
    Line,
    /// Applies to the line after the directive
    NextLine,
    /// Applies between a disable and its enable, inclusive
    Range,
    /// Applies to the entire file
    File,
}

/// A resolved suppression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suppression {
    /// Rule filters; empty means every rule.
    pub rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub file: String,
    pub first_line: usize,
    pub last_line: usize,
    pub suppression_type: SuppressionType,
    /// Where the directive that created this suppression was written.
    pub span: Span,
}

/// A diagnostic that was suppressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressedDiagnostic {
    pub diagnostic: Diagnostic,
    pub suppression: Suppression,
}

/// How suppression comments are recognized.
#[derive(Debug, Clone)]
pub struct SuppressionSyntax {
    pattern: Regex,
}

impl Default for SuppressionSyntax {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.clone(),
        }
    }
}

impl SuppressionSyntax {
    /// Default syntax with a different marker word.
    pub fn with_marker(marker: &str) -> Result<Self, ConfigError> {
        let marker = marker.trim();
        if marker.is_empty() || marker.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                field: "suppression.marker",
                reason: format!("{:?} must be a single non-empty word", marker),
            });
        }
        if marker == DEFAULT_MARKER {
            return Ok(Self::default());
        }
        let pattern = Regex::new(&directive_pattern(marker))
            .map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
        Ok(Self { pattern })
    }

    /// A full custom pattern. It must define a `directive` group; `rules`
    /// and `reason` groups are optional.
    pub fn with_pattern(pattern: &str) -> Result<Self, ConfigError> {
        let pattern = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
        if !pattern.capture_names().flatten().any(|n| n == "directive") {
            return Err(ConfigError::InvalidPattern(
                "pattern has no named group `directive`".to_string(),
            ));
        }
        Ok(Self { pattern })
    }

    /// Find directives inside the file's comments.
    pub fn parse(&self, source: &SourceFile) -> Vec<Directive> {
        let tokens = source.tokens();
        let mut directives = Vec::new();
        for (i, tok) in tokens.iter().enumerate() {
            if !tok.kind.is_comment() {
                continue;
            }
            let trailing = tokens[..i]
                .iter()
                .rev()
                .take_while(|t| t.kind != TokenKind::Newline)
                .any(|t| !t.kind.is_trivia() && !t.kind.is_comment());
            for caps in self.pattern.captures_iter(&tok.text) {
                let (Some(whole), Some(kind)) = (caps.get(0), caps.name("directive")) else {
                    continue;
                };
                let Some(kind) = DirectiveKind::parse(kind.as_str()) else {
                    debug!("ignoring unknown suppression directive {:?}", kind.as_str());
                    continue;
                };
                let rules = caps
                    .name("rules")
                    .map(|m| {
                        m.as_str()
                            .split([',', ' ', '\t'])
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                let reason = caps
                    .name("reason")
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|r| !r.is_empty());
                let base = tok.span.start_byte;
                let span = source.span_for(base + whole.start(), base + whole.end());
                let line = match kind {
                    DirectiveKind::Ignore if trailing => span.start_line,
                    DirectiveKind::Ignore | DirectiveKind::IgnoreNextLine => tok.span.end_line + 1,
                    _ => span.start_line,
                };
                directives.push(Directive {
                    kind,
                    rules,
                    reason,
                    line,
                    span,
                });
            }
        }
        directives
    }
}

fn normalized(rules: &[String]) -> Vec<String> {
    let mut rules = rules.to_vec();
    rules.sort();
    rules.dedup();
    rules
}

/// Turn directives into suppressions. Problems with the directives
/// themselves come back as errors; an unterminated range suppresses nothing.
pub fn resolve(
    directives: &[Directive],
    registry: &RuleRegistry,
    file: &str,
) -> (Vec<Suppression>, Vec<SuppressionError>) {
    let mut suppressions = Vec::new();
    let mut errors = Vec::new();
    let mut open: Vec<&Directive> = Vec::new();

    for directive in directives {
        for id in &directive.rules {
            if !registry.matches_filter(id) {
                errors.push(SuppressionError {
                    kind: SuppressionErrorKind::UnknownRule(id.clone()),
                    span: directive.span,
                });
            }
        }

        let single = |suppression_type, first_line, last_line| Suppression {
            rules: directive.rules.clone(),
            reason: directive.reason.clone(),
            file: file.to_string(),
            first_line,
            last_line,
            suppression_type,
            span: directive.span,
        };

        match directive.kind {
            DirectiveKind::Ignore if directive.line == directive.span.start_line => {
                suppressions.push(single(SuppressionType::Line, directive.line, directive.line));
            }
            DirectiveKind::Ignore | DirectiveKind::IgnoreNextLine => {
                suppressions.push(single(
                    SuppressionType::NextLine,
                    directive.line,
                    directive.line,
                ));
            }
            DirectiveKind::IgnoreFile => {
                suppressions.push(single(SuppressionType::File, 1, usize::MAX));
            }
            DirectiveKind::Disable => open.push(directive),
            DirectiveKind::Enable => {
                let closed: Vec<&Directive> = if directive.rules.is_empty() {
                    std::mem::take(&mut open)
                } else {
                    let key = normalized(&directive.rules);
                    match open.iter().rposition(|d| normalized(&d.rules) == key) {
                        Some(pos) => vec![open.remove(pos)],
                        None => Vec::new(),
                    }
                };
                if closed.is_empty() {
                    errors.push(SuppressionError {
                        kind: SuppressionErrorKind::UnmatchedEnd,
                        span: directive.span,
                    });
                }
                for start in closed {
                    suppressions.push(Suppression {
                        rules: start.rules.clone(),
                        reason: start.reason.clone(),
                        file: file.to_string(),
                        first_line: start.line,
                        last_line: directive.line,
                        suppression_type: SuppressionType::Range,
                        span: start.span,
                    });
                }
            }
        }
    }

    for start in open {
        errors.push(SuppressionError {
            kind: SuppressionErrorKind::Unterminated,
            span: start.span,
        });
    }
    errors.sort_by_key(|e| e.span.start_byte);
    (suppressions, errors)
}

/// Whether a rule filter names the rule.
pub fn rule_matches(filter: &str, rule_id: &str) -> bool {
    if filter == "*" {
        return true;
    }
    match filter.strip_suffix('*') {
        Some(prefix) => rule_id.starts_with(prefix),
        None => filter == rule_id,
    }
}

/// Check if a diagnostic matches a suppression.
pub fn matches_suppression(diagnostic: &Diagnostic, suppression: &Suppression) -> bool {
    if diagnostic.file != suppression.file {
        return false;
    }
    let rule_ok = suppression.rules.is_empty()
        || suppression
            .rules
            .iter()
            .any(|r| rule_matches(r, &diagnostic.rule_id));
    let line = diagnostic.line();
    rule_ok && line >= suppression.first_line && line <= suppression.last_line
}

/// Separate diagnostics into active and suppressed.
pub fn filter_suppressed(
    diagnostics: Vec<Diagnostic>,
    suppressions: &[Suppression],
) -> (Vec<Diagnostic>, Vec<SuppressedDiagnostic>) {
    if suppressions.is_empty() {
        return (diagnostics, Vec::new());
    }
    let mut active = Vec::new();
    let mut suppressed = Vec::new();
    for diagnostic in diagnostics {
        match suppressions
            .iter()
            .find(|s| matches_suppression(&diagnostic, s))
        {
            Some(suppression) => suppressed.push(SuppressedDiagnostic {
                diagnostic,
                suppression: suppression.clone(),
            }),
            None => active.push(diagnostic),
        }
    }
    (active, suppressed)
}

/// Report directive problems under their `SUPPRESSION.*` rules.
pub fn error_diagnostics(
    errors: &[SuppressionError],
    registry: &RuleRegistry,
    file: &str,
) -> Vec<Diagnostic> {
    errors
        .iter()
        .filter_map(|err| {
            let entry = registry.get(err.kind.rule_id()).filter(|e| e.enabled)?;
            Some(Diagnostic {
                rule_id: entry.def.id.to_string(),
                category: entry.def.category,
                severity: entry.severity,
                file: file.to_string(),
                span: err.span,
                message: err.kind.to_string(),
                fix: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Category, Severity};

    fn directives(src: &str) -> Vec<Directive> {
        let source = SourceFile::from_text("t.c", src);
        SuppressionSyntax::default().parse(&source)
    }

    fn diag(rule: &str, line: usize) -> Diagnostic {
        Diagnostic {
            rule_id: rule.to_string(),
            category: Category::Naming,
            severity: Severity::Warning,
            file: "t.c".to_string(),
            span: Span {
                start_line: line,
                start_col: 1,
                end_line: line,
                end_col: 2,
                ..Span::default()
            },
            message: "m".to_string(),
            fix: None,
        }
    }

    #[test]
    fn test_parse_directive_forms() {
        let src = "/* cstylecheck:ignore-file COMMENTS.* - generated */\nint x; // cstylecheck:ignore NAMING.VARIABLE_LENGTH\n// cstylecheck:ignore\nint y;\n/* cstylecheck:ignore-next-line NAMING.GLOBAL_PREFIX, NAMING.VARIABLE_LENGTH */\nint z;\n";
        let found = directives(src);
        assert_eq!(found.len(), 4);

        assert_eq!(found[0].kind, DirectiveKind::IgnoreFile);
        assert_eq!(found[0].rules, vec!["COMMENTS.*"]);
        assert_eq!(found[0].reason.as_deref(), Some("generated"));

        assert_eq!(found[1].kind, DirectiveKind::Ignore);
        assert_eq!(found[1].line, 2);

        assert_eq!(found[2].kind, DirectiveKind::Ignore);
        assert!(found[2].rules.is_empty());
        assert_eq!(found[2].line, 4);

        assert_eq!(found[3].kind, DirectiveKind::IgnoreNextLine);
        assert_eq!(found[3].rules.len(), 2);
        assert_eq!(found[3].line, 6);
    }

    #[test]
    fn test_directives_outside_comments_are_ignored() {
        let found = directives("char *p_s = \"cstylecheck:ignore-file\";\n");
        assert!(found.is_empty());
    }

    #[test]
    fn test_custom_marker_and_pattern() {
        let source = SourceFile::from_text("t.c", "/* lint:disable */\n/* lint:enable */\n");
        let syntax = SuppressionSyntax::with_marker("lint").unwrap();
        assert_eq!(syntax.parse(&source).len(), 2);

        let syntax =
            SuppressionSyntax::with_pattern(r"NOLINT\((?P<directive>ignore)(?: (?P<rules>\S+))?\)").unwrap();
        let source = SourceFile::from_text("t.c", "int x; /* NOLINT(ignore NAMING.*) */\n");
        let found = syntax.parse(&source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rules, vec!["NAMING.*"]);

        assert!(matches!(
            SuppressionSyntax::with_pattern(r"NOLINT"),
            Err(ConfigError::InvalidPattern(_))
        ));
        assert!(SuppressionSyntax::with_pattern(r"(").is_err());
        assert!(SuppressionSyntax::with_marker("two words").is_err());
    }

    #[test]
    fn test_range_round_trip() {
        let src = "int a;\n/* cstylecheck:disable NAMING.* */\nint b;\nint c;\n/* cstylecheck:enable NAMING.* */\nint d;\n";
        let registry = RuleRegistry::builtin();
        let (suppressions, errors) = resolve(&directives(src), &registry, "t.c");
        assert!(errors.is_empty());
        assert_eq!(suppressions.len(), 1);
        assert_eq!(suppressions[0].suppression_type, SuppressionType::Range);
        assert_eq!((suppressions[0].first_line, suppressions[0].last_line), (2, 5));

        let diags = vec![
            diag("NAMING.GLOBAL_PREFIX", 1),
            diag("NAMING.GLOBAL_PREFIX", 3),
            diag("WHITESPACE.TAB", 4),
            diag("NAMING.GLOBAL_PREFIX", 6),
        ];
        let (active, suppressed) = filter_suppressed(diags, &suppressions);
        let active_lines: Vec<usize> = active.iter().map(|d| d.line()).collect();
        assert_eq!(active_lines, vec![1, 4, 6]);
        assert_eq!(suppressed.len(), 1);
        assert_eq!(suppressed[0].diagnostic.line(), 3);
    }

    #[test]
    fn test_enable_closes_most_recent_matching_range() {
        let src = "/* cstylecheck:disable NAMING.* */\n/* cstylecheck:disable WHITESPACE.TAB */\nint a;\n/* cstylecheck:enable NAMING.* */\nint b;\n/* cstylecheck:enable */\n";
        let (suppressions, errors) = resolve(&directives(src), &RuleRegistry::builtin(), "t.c");
        assert!(errors.is_empty());
        let ranges: Vec<(Vec<String>, usize, usize)> = suppressions
            .iter()
            .map(|s| (s.rules.clone(), s.first_line, s.last_line))
            .collect();
        assert_eq!(
            ranges,
            vec![
                (vec!["NAMING.*".to_string()], 1, 4),
                (vec!["WHITESPACE.TAB".to_string()], 2, 6),
            ]
        );
    }

    #[test]
    fn test_unterminated_unmatched_and_unknown() {
        let src = "/* cstylecheck:enable */\n/* cstylecheck:ignore NAMING.NOPE */\nint a;\n/* cstylecheck:disable */\nint b;\n";
        let registry = RuleRegistry::builtin();
        let (suppressions, errors) = resolve(&directives(src), &registry, "t.c");
        let kinds: Vec<&SuppressionErrorKind> = errors.iter().map(|e| &e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &SuppressionErrorKind::UnmatchedEnd,
                &SuppressionErrorKind::UnknownRule("NAMING.NOPE".to_string()),
                &SuppressionErrorKind::Unterminated,
            ]
        );
        assert!(suppressions
            .iter()
            .all(|s| s.suppression_type != SuppressionType::Range));

        let diags = error_diagnostics(&errors, &registry, "t.c");
        let ids: Vec<&str> = diags.iter().map(|d| d.rule_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "SUPPRESSION.UNMATCHED_END",
                "SUPPRESSION.UNKNOWN_RULE",
                "SUPPRESSION.UNTERMINATED"
            ]
        );
    }

    #[test]
    fn test_rule_matches() {
        assert!(rule_matches("*", "NAMING.TYPE_CASE"));
        assert!(rule_matches("NAMING.*", "NAMING.TYPE_CASE"));
        assert!(!rule_matches("NAMING.*", "WHITESPACE.TAB"));
        assert!(rule_matches("WHITESPACE.TAB", "WHITESPACE.TAB"));
        assert!(!rule_matches("WHITESPACE.TAB", "WHITESPACE.TABS"));
    }

    #[test]
    fn test_file_suppression() {
        let src = "/* cstylecheck:ignore-file */\nint a;\n";
        let (suppressions, _) = resolve(&directives(src), &RuleRegistry::builtin(), "t.c");
        assert_eq!(suppressions[0].suppression_type, SuppressionType::File);
        assert!(matches_suppression(&diag("WHITESPACE.TAB", 900), &suppressions[0]));
        let mut other = diag("WHITESPACE.TAB", 2);
        other.file = "other.c".to_string();
        assert!(!matches_suppression(&other, &suppressions[0]));
    }
}
