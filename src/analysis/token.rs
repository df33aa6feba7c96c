//! Token types produced by the lexer.

use phf::phf_set;
use serde::Serialize;

use super::Span;
use crate::error::LexErrorKind;

/// C99 keywords plus the C11 underscore keywords.
static KEYWORDS: phf::Set<&'static str> = phf_set! {
    "auto", "break", "case", "char", "const", "continue", "default", "do",
    "double", "else", "enum", "extern", "float", "for", "goto", "if",
    "inline", "int", "long", "register", "restrict", "return", "short",
    "signed", "sizeof", "static", "struct", "switch", "typedef", "union",
    "unsigned", "void", "volatile", "while", "_Bool", "_Complex",
    "_Imaginary", "_Alignas", "_Alignof", "_Atomic", "_Generic",
    "_Noreturn", "_Static_assert", "_Thread_local",
};

/// Keywords that can open a declaration.
static DECL_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "auto", "char", "const", "double", "enum", "extern", "float", "inline",
    "int", "long", "register", "restrict", "short", "signed", "static",
    "struct", "typedef", "union", "unsigned", "void", "volatile", "_Bool",
    "_Complex", "_Imaginary", "_Atomic", "_Noreturn", "_Thread_local",
};

/// Keywords that introduce a control statement with a body.
static CONTROL_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "if", "else", "for", "while", "do", "switch",
};

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(word)
}

pub fn is_declaration_keyword(word: &str) -> bool {
    DECL_KEYWORDS.contains(word)
}

pub fn is_control_keyword(word: &str) -> bool {
    CONTROL_KEYWORDS.contains(word)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    Identifier,
    Keyword,
    IntLiteral,
    FloatLiteral,
    CharLiteral,
    StringLiteral,
    /// Operators, including `.`, `->`, `?` and `:`.
    Operator,
    /// Brackets, braces, parentheses, `;`, `,` and `...`.
    Punctuation,
    LineComment,
    BlockComment,
    /// A whole preprocessor directive, continuation lines included.
    Preprocessor,
    Whitespace,
    Newline,
    /// Malformed input; the matching error is in the lexer's error list.
    Invalid(LexErrorKind),
}

impl TokenKind {
    /// Whitespace and line breaks.
    pub fn is_trivia(&self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Newline)
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, TokenKind::LineComment | TokenKind::BlockComment)
    }

    /// Tokens that take part in statements.
    pub fn is_code(&self) -> bool {
        !self.is_trivia()
            && !self.is_comment()
            && !matches!(self, TokenKind::Preprocessor | TokenKind::Invalid(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::IntLiteral
                | TokenKind::FloatLiteral
                | TokenKind::CharLiteral
                | TokenKind::StringLiteral
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text, lossily decoded when the bytes are not UTF-8.
    pub text: String,
    pub span: Span,
}

impl Token {
    /// Punctuation or operator with exactly this text.
    pub fn is_punct(&self, text: &str) -> bool {
        matches!(self.kind, TokenKind::Punctuation | TokenKind::Operator) && self.text == text
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == word
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    /// Identifier or keyword.
    pub fn is_word(&self) -> bool {
        matches!(self.kind, TokenKind::Identifier | TokenKind::Keyword)
    }

    pub fn line(&self) -> usize {
        self.span.start_line
    }
}
