//! What a rule sees while it runs, and how it reports.

use log::warn;

use crate::analysis::{AnalyzedFile, FileFacts, SourceFile, Span, SyntaxTree, Token, TokenKind};

use super::registry::{RuleEntry, RuleParams};
use super::runner::CancellationToken;
use super::types::{Category, Diagnostic, Severity};

/// Read-only view of one analyzed file.
pub struct FileContext<'a> {
    pub file: &'a AnalyzedFile,
    pub params: &'a RuleParams,
    cancel: &'a CancellationToken,
}

impl<'a> FileContext<'a> {
    pub fn new(
        file: &'a AnalyzedFile,
        params: &'a RuleParams,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            file,
            params,
            cancel,
        }
    }

    pub fn source(&self) -> &'a SourceFile {
        &self.file.source
    }

    pub fn tokens(&self) -> &'a [Token] {
        self.file.source.tokens()
    }

    pub fn tree(&self) -> &'a SyntaxTree {
        &self.file.tree
    }

    pub fn facts(&self) -> &'a FileFacts {
        &self.file.facts
    }

    pub fn path(&self) -> &'a str {
        self.file.source.path()
    }

    /// Long-running rules poll this between units of work.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Previous code token before `index`.
    pub fn prev_code(&self, index: usize) -> Option<usize> {
        let tokens = self.tokens();
        (0..index).rev().find(|&i| tokens[i].kind.is_code())
    }

    /// Next code token after `index`.
    pub fn next_code(&self, index: usize) -> Option<usize> {
        let tokens = self.tokens();
        (index + 1..tokens.len()).find(|&i| tokens[i].kind.is_code())
    }

    /// Whether the token is the first non-blank token on its line.
    pub fn starts_line(&self, index: usize) -> bool {
        let tokens = self.tokens();
        for tok in tokens[..index].iter().rev() {
            match tok.kind {
                TokenKind::Whitespace => continue,
                TokenKind::Newline => return true,
                _ => return false,
            }
        }
        true
    }

    /// Whether only blanks, a comment or a line break follow on the line.
    pub fn ends_line(&self, index: usize) -> bool {
        let tokens = self.tokens();
        for tok in &tokens[index + 1..] {
            match tok.kind {
                TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment => {
                    continue
                }
                TokenKind::Newline => return true,
                _ => return false,
            }
        }
        true
    }
}

/// Collects diagnostics for one rule on one file.
#[derive(Debug)]
pub struct Emitter {
    rule_id: &'static str,
    category: Category,
    severity: Severity,
    file: String,
    file_len: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Emitter {
    pub fn new(entry: &RuleEntry, file: &str, file_len: usize) -> Self {
        Self {
            rule_id: entry.def.id,
            category: entry.def.category,
            severity: entry.severity,
            file: file.to_string(),
            file_len,
            diagnostics: Vec::new(),
        }
    }

    pub fn rule_id(&self) -> &'static str {
        self.rule_id
    }

    pub fn emit(&mut self, span: Span, message: impl Into<String>) {
        self.push(span, message.into(), None);
    }

    pub fn emit_with_fix(
        &mut self,
        span: Span,
        message: impl Into<String>,
        fix: impl Into<String>,
    ) {
        self.push(span, message.into(), Some(fix.into()));
    }

    fn push(&mut self, mut span: Span, message: String, fix: Option<String>) {
        if !span.within(self.file_len) {
            warn!("{}: span {:?} out of bounds in {}", self.rule_id, span, self.file);
            span.end_byte = span.end_byte.min(self.file_len);
            span.start_byte = span.start_byte.min(span.end_byte);
        }
        self.diagnostics.push(Diagnostic {
            rule_id: self.rule_id.to_string(),
            category: self.category,
            severity: self.severity,
            file: self.file.clone(),
            span,
            message,
            fix,
        });
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
