//! A source file with its token stream and line table.

use serde::Serialize;
use std::fmt;
use std::ops::Range;
use std::path::Path;

use super::lexer::tokenize;
use super::token::Token;
use super::Span;
use crate::error::LexError;

/// How the file's bytes decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    Ascii,
    Utf8,
    InvalidUtf8,
}

impl Encoding {
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.is_ascii() {
            Encoding::Ascii
        } else if std::str::from_utf8(bytes).is_ok() {
            Encoding::Utf8
        } else {
            Encoding::InvalidUtf8
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Ascii => write!(f, "ascii"),
            Encoding::Utf8 => write!(f, "utf-8"),
            Encoding::InvalidUtf8 => write!(f, "invalid utf-8"),
        }
    }
}

/// An immutable source file. Tokens are produced once, at construction.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: String,
    bytes: Vec<u8>,
    encoding: Encoding,
    tokens: Vec<Token>,
    lex_errors: Vec<LexError>,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        let lexed = tokenize(&bytes);
        let mut line_starts = vec![0];
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'\n' || (b == b'\r' && bytes.get(i + 1) != Some(&b'\n')) {
                line_starts.push(i + 1);
            }
        }
        Self {
            path: path.into(),
            encoding: Encoding::detect(&bytes),
            tokens: lexed.tokens,
            lex_errors: lexed.errors,
            line_starts,
            bytes,
        }
    }

    pub fn from_text(path: impl Into<String>, text: &str) -> Self {
        Self::new(path, text.as_bytes().to_vec())
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::new(path.display().to_string(), bytes))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn lex_errors(&self) -> &[LexError] {
        &self.lex_errors
    }

    /// Number of lines. A final line break does not start a new line.
    pub fn line_count(&self) -> usize {
        if self.bytes.is_empty() {
            return 0;
        }
        let n = self.line_starts.len();
        if self.line_starts[n - 1] == self.bytes.len() {
            n - 1
        } else {
            n
        }
    }

    /// Byte range of a 1-based line, without its terminator.
    pub fn line_range(&self, line: usize) -> Option<Range<usize>> {
        if line == 0 || line > self.line_starts.len() {
            return None;
        }
        let start = self.line_starts[line - 1];
        let mut end = self
            .line_starts
            .get(line)
            .copied()
            .unwrap_or(self.bytes.len());
        if end > start && self.bytes[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && self.bytes[end - 1] == b'\r' {
            end -= 1;
        }
        Some(start..end)
    }

    pub fn line_text(&self, line: usize) -> &[u8] {
        match self.line_range(line) {
            Some(range) => &self.bytes[range],
            None => &[],
        }
    }

    /// 1-based line and byte column of an offset.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.bytes.len());
        let idx = self.line_starts.partition_point(|&s| s <= offset) - 1;
        (idx + 1, offset - self.line_starts[idx] + 1)
    }

    /// Span for an arbitrary byte range.
    pub fn span_for(&self, start: usize, end: usize) -> Span {
        let end = end.min(self.bytes.len());
        let start = start.min(end);
        let (start_line, start_col) = self.position(start);
        let (end_line, end_col) = self.position(end);
        Span {
            start_byte: start,
            end_byte: end,
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Span of a whole line, without its terminator.
    pub fn line_span(&self, line: usize) -> Option<Span> {
        self.line_range(line).map(|r| self.span_for(r.start, r.end))
    }

    /// Zero-length span at the end of the file.
    pub fn eof_span(&self) -> Span {
        self.span_for(self.bytes.len(), self.bytes.len())
    }

    pub fn slice(&self, span: &Span) -> &[u8] {
        let end = span.end_byte.min(self.bytes.len());
        &self.bytes[span.start_byte.min(end)..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_table() {
        let file = SourceFile::from_text("a.c", "int a;\r\nint b;\n\nint c;");
        assert_eq!(file.line_count(), 4);
        assert_eq!(file.line_text(1), b"int a;");
        assert_eq!(file.line_text(3), b"");
        assert_eq!(file.line_text(4), b"int c;");
        assert!(file.line_range(9).is_none());
    }

    #[test]
    fn test_trailing_newline_not_counted() {
        let file = SourceFile::from_text("a.c", "x\ny\n");
        assert_eq!(file.line_count(), 2);
        assert_eq!(SourceFile::from_text("e.c", "").line_count(), 0);
    }

    #[test]
    fn test_span_for_matches_tokens() {
        let file = SourceFile::from_text("a.c", "int a;\n  float b;\n");
        for token in file.tokens() {
            let computed = file.span_for(token.span.start_byte, token.span.end_byte);
            assert_eq!(computed, token.span);
        }
    }

    #[test]
    fn test_encoding_detection() {
        assert_eq!(Encoding::detect(b"abc"), Encoding::Ascii);
        assert_eq!(Encoding::detect("\u{e9}".as_bytes()), Encoding::Utf8);
        assert_eq!(Encoding::detect(&[0x66, 0xff]), Encoding::InvalidUtf8);
    }
}
