//! Rule evaluation over analyzed C files.

mod aggregate;
mod comments;
mod context;
mod documentation;
mod keywords;
mod lexical;
mod naming;
mod registry;
mod runner;
mod structure;
mod suppress;
mod types;
mod whitespace;

pub use aggregate::{aggregate, FileReport, RunReport, RunSummary};
pub use context::{Emitter, FileContext};
pub use registry::{
    builtin_rules, CheckFn, RuleDef, RuleEntry, RuleParams, RuleRegistry, RuleSetting,
};
pub use runner::{CancellationToken, Runner, SourceInput};
pub use suppress::{
    filter_suppressed, matches_suppression, resolve, rule_matches, Directive, DirectiveKind,
    SuppressedDiagnostic, Suppression, SuppressionSyntax, SuppressionType, DEFAULT_MARKER,
};
pub use types::{Category, Diagnostic, Severity};

#[cfg(test)]
pub(crate) mod test_support {
    use super::{CancellationToken, Diagnostic, Emitter, FileContext, RuleParams, RuleRegistry};
    use crate::analysis::AnalyzedFile;

    /// Run a single rule over `src` with default parameters.
    pub fn run_rule(id: &str, src: &str) -> Vec<Diagnostic> {
        run_rule_with(id, src, &RuleParams::default())
    }

    pub fn run_rule_with(id: &str, src: &str, params: &RuleParams) -> Vec<Diagnostic> {
        let file = AnalyzedFile::from_text("test.c", src);
        let registry = RuleRegistry::builtin();
        let entry = registry.get(id).unwrap_or_else(|| panic!("no rule {}", id));
        let check = entry.def.check.expect("rule has an evaluator");
        let cancel = CancellationToken::new();
        let ctx = FileContext::new(&file, params, &cancel);
        let mut emitter = Emitter::new(entry, file.path(), file.source.len());
        check(&ctx, &mut emitter).unwrap();
        let mut diagnostics = emitter.into_diagnostics();
        diagnostics.sort_by(|a, b| {
            (a.span.start_byte, &a.rule_id).cmp(&(b.span.start_byte, &b.rule_id))
        });
        diagnostics
    }
}
