//! cstylecheck - C coding standard compliance checker.
//!
//! cstylecheck lexes C sources, recovers a shallow block structure, and
//! evaluates a corpus of naming, whitespace, structure, comment, keyword and
//! documentation rules over it. In-source comments can suppress findings.
//!
//! # Architecture
//!
//! - `analysis`: lexer, structural tree and per-file facts
//! - `detect`: rule registry, evaluators, suppression, aggregation, runner
//! - `config`: YAML/JSON configuration schema
//! - `report`: output formatting (pretty, JSON, SARIF)
//! - `error`: error taxonomy
//!
//! # Adding a Rule
//!
//! Add a `RuleDef` to the `RULES` table of the category module in
//! `src/detect/` and write its check function against `FileContext`.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod report;

pub use analysis::{AnalyzedFile, SourceFile, Span};
pub use config::Config;
pub use detect::{
    CancellationToken, Diagnostic, FileReport, RuleRegistry, RunReport, RunSummary, Runner,
    Severity, SourceInput,
};
pub use error::ConfigError;
