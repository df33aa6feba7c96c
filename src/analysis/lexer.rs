//! Byte-oriented C lexer.
//!
//! Every input byte lands in exactly one token, so the token texts laid end
//! to end reproduce the file. Malformed input yields `TokenKind::Invalid`
//! tokens plus a matching `LexError`; lexing never stops early.

use super::token::{is_keyword, Token, TokenKind};
use super::Span;
use crate::error::{LexError, LexErrorKind};

const THREE_CHAR_OPS: [&str; 3] = ["<<=", ">>=", "..."];

const TWO_CHAR_OPS: [&str; 20] = [
    "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "*=", "/=", "%=", "+=",
    "-=", "&=", "^=", "|=", "##",
];

const ONE_CHAR_OPS: &[u8] = b"[](){}.&*+-~!/%<>^|?:;=,#";

/// Tokens and errors for one file.
#[derive(Debug, Clone, Default)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

/// Tokenize a whole file. Pure function of the input bytes.
pub fn tokenize(src: &[u8]) -> LexOutput {
    let mut lexer = Lexer {
        src,
        pos: 0,
        line: 1,
        col: 1,
        line_has_code: false,
        tokens: Vec::new(),
        errors: Vec::new(),
    };
    lexer.run();
    lexer.errors.sort_by_key(|e| e.span.start_byte);
    LexOutput {
        tokens: lexer.tokens,
        errors: lexer.errors,
    }
}

#[derive(Clone, Copy)]
struct Mark {
    pos: usize,
    line: usize,
    col: usize,
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
    /// A code token appeared since the last line break.
    line_has_code: bool,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

fn is_blank(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | 0x0B | 0x0C)
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

impl<'a> Lexer<'a> {
    fn run(&mut self) {
        while self.pos < self.src.len() {
            let m = self.mark();
            let b = self.src[self.pos];
            match b {
                b'\n' => {
                    self.bump();
                    self.push(TokenKind::Newline, m);
                }
                b'\r' => {
                    self.bump();
                    if self.peek(0) == Some(b'\n') {
                        self.bump();
                    }
                    self.push(TokenKind::Newline, m);
                }
                b if is_blank(b) => {
                    while self.peek(0).is_some_and(is_blank) {
                        self.bump();
                    }
                    self.push(TokenKind::Whitespace, m);
                }
                b'/' if self.peek(1) == Some(b'/') => self.line_comment(m),
                b'/' if self.peek(1) == Some(b'*') => self.block_comment(m),
                b'#' if !self.line_has_code => self.directive(m),
                b'"' | b'\'' => self.quoted(m, b),
                b'0'..=b'9' => self.number(m),
                b'.' if self.peek(1).is_some_and(|c| c.is_ascii_digit()) => self.number(m),
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.word(m),
                b'\\' => self.backslash(m),
                0x80..=0xFF => {
                    // Reported by scan_non_ascii, which also covers comments and literals.
                    while self.peek(0).is_some_and(|c| c >= 0x80) {
                        self.bump();
                    }
                    self.push(TokenKind::Invalid(LexErrorKind::NonAscii), m);
                }
                _ => self.punctuator(m),
            }
        }
        self.scan_non_ascii();
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) {
        let b = self.src[self.pos];
        self.pos += 1;
        match b {
            b'\n' => {
                self.line += 1;
                self.col = 1;
            }
            b'\r' if self.src.get(self.pos) != Some(&b'\n') => {
                self.line += 1;
                self.col = 1;
            }
            _ => self.col += 1,
        }
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    /// Consume one line break (`\n`, `\r\n` or `\r`) if present.
    fn bump_newline(&mut self) -> bool {
        match self.peek(0) {
            Some(b'\n') => {
                self.bump();
                true
            }
            Some(b'\r') => {
                self.bump();
                if self.peek(0) == Some(b'\n') {
                    self.bump();
                }
                true
            }
            _ => false,
        }
    }

    fn at_newline(&self, ahead: usize) -> bool {
        matches!(self.peek(ahead), Some(b'\n' | b'\r'))
    }

    fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            line: self.line,
            col: self.col,
        }
    }

    fn reset(&mut self, m: Mark) {
        self.pos = m.pos;
        self.line = m.line;
        self.col = m.col;
    }

    fn span_from(&self, m: Mark) -> Span {
        Span {
            start_byte: m.pos,
            end_byte: self.pos,
            start_line: m.line,
            start_col: m.col,
            end_line: self.line,
            end_col: self.col,
        }
    }

    fn push(&mut self, kind: TokenKind, m: Mark) {
        let span = self.span_from(m);
        let text = String::from_utf8_lossy(&self.src[m.pos..self.pos]).into_owned();
        match kind {
            TokenKind::Newline => self.line_has_code = false,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment => {}
            _ => self.line_has_code = true,
        }
        self.tokens.push(Token { kind, text, span });
    }

    fn push_invalid(&mut self, kind: LexErrorKind, m: Mark) {
        let span = self.span_from(m);
        self.errors.push(LexError { kind, span });
        self.push(TokenKind::Invalid(kind), m);
    }

    fn line_comment(&mut self, m: Mark) {
        while self.peek(0).is_some() && !self.at_newline(0) {
            self.bump();
        }
        self.push(TokenKind::LineComment, m);
    }

    fn block_comment(&mut self, m: Mark) {
        self.bump_n(2);
        loop {
            match self.peek(0) {
                None => {
                    self.push_invalid(LexErrorKind::UnterminatedComment, m);
                    return;
                }
                Some(b'*') if self.peek(1) == Some(b'/') => {
                    self.bump_n(2);
                    self.push(TokenKind::BlockComment, m);
                    return;
                }
                Some(_) => self.bump(),
            }
        }
    }

    /// A directive runs to the end of its logical line. It stops before a
    /// trailing comment and excludes trailing blanks.
    fn directive(&mut self, m: Mark) {
        self.bump();
        let mut end = self.mark();
        let mut quote: Option<u8> = None;
        loop {
            let Some(b) = self.peek(0) else { break };
            match b {
                b'\n' | b'\r' => break,
                b'\\' if self.at_newline(1) => {
                    let backslash = self.mark();
                    self.bump();
                    self.bump_newline();
                    end = self.mark();
                    if self.pos >= self.src.len() {
                        let span = Span {
                            end_byte: backslash.pos + 1,
                            end_line: backslash.line,
                            end_col: backslash.col + 1,
                            ..self.span_from(backslash)
                        };
                        self.errors.push(LexError {
                            kind: LexErrorKind::UnterminatedContinuation,
                            span,
                        });
                    }
                }
                b'\\' if self.pos + 1 == self.src.len() => {
                    let backslash = self.mark();
                    self.bump();
                    end = self.mark();
                    let span = self.span_from(backslash);
                    self.errors.push(LexError {
                        kind: LexErrorKind::UnterminatedContinuation,
                        span,
                    });
                }
                b'\\' if quote.is_some() => {
                    self.bump();
                    self.bump();
                    end = self.mark();
                }
                b'"' | b'\'' => {
                    quote = match quote {
                        Some(q) if q == b => None,
                        None => Some(b),
                        other => other,
                    };
                    self.bump();
                    end = self.mark();
                }
                b'/' if quote.is_none() && matches!(self.peek(1), Some(b'/' | b'*')) => break,
                b if is_blank(b) => self.bump(),
                _ => {
                    self.bump();
                    end = self.mark();
                }
            }
        }
        // Trailing blanks never contain a line break, so rewinding is safe.
        self.reset(end);
        self.push(TokenKind::Preprocessor, m);
    }

    /// String or character literal, starting at the opening quote. `m` may
    /// point earlier when the literal has an encoding prefix.
    fn quoted(&mut self, m: Mark, quote: u8) {
        self.bump();
        loop {
            match self.peek(0) {
                None | Some(b'\n') | Some(b'\r') => break,
                Some(b'\\') => {
                    self.bump();
                    if !self.bump_newline() && self.peek(0).is_some() {
                        self.bump();
                    }
                }
                Some(c) if c == quote => {
                    self.bump();
                    let kind = if quote == b'"' {
                        TokenKind::StringLiteral
                    } else {
                        TokenKind::CharLiteral
                    };
                    self.push(kind, m);
                    return;
                }
                Some(_) => self.bump(),
            }
        }
        let kind = if quote == b'"' {
            LexErrorKind::UnterminatedString
        } else {
            LexErrorKind::UnterminatedChar
        };
        self.push_invalid(kind, m);
    }

    fn number(&mut self, m: Mark) {
        let hex = self.src[self.pos] == b'0' && matches!(self.peek(1), Some(b'x' | b'X'));
        self.bump();
        while let Some(c) = self.peek(0) {
            let prev = self.src[self.pos - 1];
            let exponent_sign = matches!(c, b'+' | b'-')
                && if hex {
                    matches!(prev, b'p' | b'P')
                } else {
                    matches!(prev, b'e' | b'E')
                };
            if is_word_byte(c) || c == b'.' || exponent_sign {
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.src[m.pos..self.pos];
        let float = text.contains(&b'.')
            || if hex {
                text.iter().any(|c| matches!(c, b'p' | b'P'))
            } else {
                text.iter().any(|c| matches!(c, b'e' | b'E'))
            };
        let kind = if float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        };
        self.push(kind, m);
    }

    fn word(&mut self, m: Mark) {
        while self.peek(0).is_some_and(is_word_byte) {
            self.bump();
        }
        let word = &self.src[m.pos..self.pos];
        if matches!(word, b"L" | b"u" | b"U" | b"u8") {
            if let Some(q @ (b'"' | b'\'')) = self.peek(0) {
                self.quoted(m, q);
                return;
            }
        }
        let kind = match std::str::from_utf8(word) {
            Ok(w) if is_keyword(w) => TokenKind::Keyword,
            _ => TokenKind::Identifier,
        };
        self.push(kind, m);
    }

    /// A backslash outside a directive is only valid as a line splice.
    fn backslash(&mut self, m: Mark) {
        self.bump();
        if self.at_newline(0) {
            self.push(TokenKind::Whitespace, m);
        } else if self.peek(0).is_none() {
            self.push_invalid(LexErrorKind::UnterminatedContinuation, m);
        } else {
            self.push_invalid(LexErrorKind::InvalidCharacter, m);
        }
    }

    fn punctuator(&mut self, m: Mark) {
        let rest = &self.src[self.pos..];
        let len = if THREE_CHAR_OPS.iter().any(|op| rest.starts_with(op.as_bytes())) {
            3
        } else if TWO_CHAR_OPS.iter().any(|op| rest.starts_with(op.as_bytes())) {
            2
        } else if ONE_CHAR_OPS.contains(&rest[0]) {
            1
        } else {
            self.bump();
            self.push_invalid(LexErrorKind::InvalidCharacter, m);
            return;
        };
        self.bump_n(len);
        let kind = match &self.src[m.pos..self.pos] {
            b"(" | b")" | b"[" | b"]" | b"{" | b"}" | b";" | b"," | b"..." => {
                TokenKind::Punctuation
            }
            _ => TokenKind::Operator,
        };
        self.push(kind, m);
    }

    /// Report every maximal run of non-ASCII bytes, wherever it sits.
    fn scan_non_ascii(&mut self) {
        let src = self.src;
        let (mut line, mut col) = (1, 1);
        let mut i = 0;
        while i < src.len() {
            if src[i] >= 0x80 {
                let (start, start_col) = (i, col);
                while i < src.len() && src[i] >= 0x80 {
                    i += 1;
                    col += 1;
                }
                self.errors.push(LexError {
                    kind: LexErrorKind::NonAscii,
                    span: Span {
                        start_byte: start,
                        end_byte: i,
                        start_line: line,
                        start_col,
                        end_line: line,
                        end_col: col,
                    },
                });
                continue;
            }
            match src[i] {
                b'\n' => {
                    line += 1;
                    col = 1;
                }
                b'\r' if src.get(i + 1) != Some(&b'\n') => {
                    line += 1;
                    col = 1;
                }
                _ => col += 1,
            }
            i += 1;
        }
    }
}
