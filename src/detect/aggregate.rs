//! Per-file aggregation and run summaries.

use serde::Serialize;
use std::time::Duration;

use super::suppress::SuppressedDiagnostic;
use super::types::{Diagnostic, Severity};
use crate::analysis::Encoding;

/// Remove exact duplicates (same rule and span) and put diagnostics in
/// report order: line, column, rule id, then end offset and message.
pub fn aggregate(mut diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    diagnostics.sort_by(|a, b| {
        (a.line(), a.column(), &a.rule_id, a.span.end_byte, &a.message).cmp(&(
            b.line(),
            b.column(),
            &b.rule_id,
            b.span.end_byte,
            &b.message,
        ))
    });
    diagnostics.dedup_by(|b, a| a.rule_id == b.rule_id && a.span == b.span);
    diagnostics
}

/// Result of checking one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    pub encoding: Encoding,
    pub lines: usize,
    pub diagnostics: Vec<Diagnostic>,
    /// Diagnostics removed by suppression directives.
    pub suppressed: Vec<SuppressedDiagnostic>,
}

impl FileReport {
    pub fn new(
        path: impl Into<String>,
        encoding: Encoding,
        lines: usize,
        diagnostics: Vec<Diagnostic>,
        mut suppressed: Vec<SuppressedDiagnostic>,
    ) -> Self {
        suppressed.sort_by(|a, b| {
            (a.diagnostic.line(), a.diagnostic.column(), &a.diagnostic.rule_id).cmp(&(
                b.diagnostic.line(),
                b.diagnostic.column(),
                &b.diagnostic.rule_id,
            ))
        });
        Self {
            path: path.into(),
            encoding,
            lines,
            diagnostics: aggregate(diagnostics),
            suppressed,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Totals across a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub files_analyzed: usize,
    pub files_cancelled: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub suppressed: usize,
    pub elapsed_ms: u128,
}

impl RunSummary {
    pub fn from_files(files: &[FileReport], files_cancelled: usize, elapsed: Duration) -> Self {
        let mut summary = Self {
            files_analyzed: files.len(),
            files_cancelled,
            elapsed_ms: elapsed.as_millis(),
            ..Self::default()
        };
        for file in files {
            summary.errors += file.count(Severity::Error);
            summary.warnings += file.count(Severity::Warning);
            summary.infos += file.count(Severity::Info);
            summary.suppressed += file.suppressed.len();
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.errors + self.warnings + self.infos
    }

    /// Number of diagnostics at or above `threshold`.
    pub fn count_at_or_above(&self, threshold: Severity) -> usize {
        match threshold {
            Severity::Error => self.errors,
            Severity::Warning => self.errors + self.warnings,
            Severity::Info => self.total(),
        }
    }
}

/// Result of a whole run, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub files: Vec<FileReport>,
    pub summary: RunSummary,
    /// Whether the run was cancelled before every file finished.
    pub cancelled: bool,
}

impl RunReport {
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.files.iter().flat_map(|f| f.diagnostics.iter())
    }

    pub fn has_findings_at(&self, threshold: Severity) -> bool {
        self.summary.count_at_or_above(threshold) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Span;
    use crate::detect::Category;

    fn diag(rule: &str, line: usize, col: usize, severity: Severity) -> Diagnostic {
        Diagnostic {
            rule_id: rule.to_string(),
            category: Category::Whitespace,
            severity,
            file: "a.c".to_string(),
            span: Span {
                start_byte: line * 100 + col,
                end_byte: line * 100 + col + 1,
                start_line: line,
                start_col: col,
                end_line: line,
                end_col: col + 1,
            },
            message: "m".to_string(),
            fix: None,
        }
    }

    #[test]
    fn test_aggregate_orders_and_dedups() {
        let raw = vec![
            diag("WHITESPACE.TAB", 3, 1, Severity::Warning),
            diag("NAMING.TYPE_CASE", 1, 5, Severity::Warning),
            diag("COMMENTS.NESTED", 1, 5, Severity::Warning),
            diag("WHITESPACE.TAB", 3, 1, Severity::Warning),
            diag("NAMING.TYPE_CASE", 1, 2, Severity::Warning),
        ];
        let out = aggregate(raw);
        let order: Vec<(usize, usize, &str)> = out
            .iter()
            .map(|d| (d.line(), d.column(), d.rule_id.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (1, 2, "NAMING.TYPE_CASE"),
                (1, 5, "COMMENTS.NESTED"),
                (1, 5, "NAMING.TYPE_CASE"),
                (3, 1, "WHITESPACE.TAB"),
            ]
        );
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let raw = vec![
            diag("WHITESPACE.TAB", 2, 1, Severity::Warning),
            diag("NAMING.TYPE_CASE", 1, 1, Severity::Error),
        ];
        let once = aggregate(raw);
        assert_eq!(aggregate(once.clone()), once);
    }

    #[test]
    fn test_summary_counts() {
        let files = vec![
            FileReport::new(
                "a.c",
                Encoding::Ascii,
                3,
                vec![
                    diag("A.X", 1, 1, Severity::Error),
                    diag("A.Y", 1, 1, Severity::Warning),
                ],
                Vec::new(),
            ),
            FileReport::new(
                "b.c",
                Encoding::Ascii,
                1,
                vec![diag("A.Z", 1, 1, Severity::Info)],
                Vec::new(),
            ),
        ];
        let summary = RunSummary::from_files(&files, 2, Duration::from_millis(5));
        assert_eq!(summary.files_analyzed, 2);
        assert_eq!(summary.files_cancelled, 2);
        assert_eq!((summary.errors, summary.warnings, summary.infos), (1, 1, 1));
        assert_eq!(summary.count_at_or_above(Severity::Error), 1);
        assert_eq!(summary.count_at_or_above(Severity::Warning), 2);
        assert_eq!(summary.count_at_or_above(Severity::Info), 3);
    }
}
