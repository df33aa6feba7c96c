//! Source analysis: lexing, structure recovery and fact extraction.
//!
//! ```text
//! ┌─────────────┐     ┌──────────┐     ┌─────────────┐     ┌───────────┐
//! │ Source bytes│────▶│ Lexer    │────▶│ SyntaxTree  │────▶│ FileFacts │
//! └─────────────┘     │ (tokens) │     │ (structure) │     │ (names,   │
//!                     └──────────┘     └─────────────┘     │  sections)│
//!                                                          └───────────┘
//!                                                                │
//!                                                                ▼
//!                                                        ┌──────────────┐
//!                                                        │ AnalyzedFile │
//!                                                        └──────────────┘
//! ```
//!
//! Every stage is a pure function of its input and never fails: malformed
//! input is carried forward as `LexError`s and `StructureError`s.

mod context;
mod facts;
mod lexer;
mod source;
mod span;
mod token;
mod tree;

pub use context::AnalyzedFile;
pub use facts::{
    EnumConstantFact, FileFacts, FunctionFact, GotoFact, LabelFact, LineInfo, MacroFact,
    PrototypeFact, Section, SectionEntry, TagKind, TypeFact, VariableFact, VariableScope,
};
pub use lexer::{tokenize, LexOutput};
pub use source::{Encoding, SourceFile};
pub use span::Span;
pub use token::{is_control_keyword, is_declaration_keyword, is_keyword, Token, TokenKind};
pub use tree::{directive_name, NodeId, NodeKind, SyntaxNode, SyntaxTree, MAX_DEPTH};
