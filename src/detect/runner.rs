//! Check runner that orchestrates rules over a batch of files.

use log::{debug, info, warn};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::aggregate::{FileReport, RunReport, RunSummary};
use super::context::{Emitter, FileContext};
use super::registry::{RuleEntry, RuleParams, RuleRegistry};
use super::suppress::{error_diagnostics, filter_suppressed, resolve, SuppressionSyntax};
use super::types::Diagnostic;
use crate::analysis::{AnalyzedFile, Span};
use crate::config::Config;
use crate::error::ConfigError;

/// Cooperative cancellation shared between the caller and the workers.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One file to check.
#[derive(Debug, Clone)]
pub struct SourceInput {
    pub path: String,
    pub content: Vec<u8>,
}

impl SourceInput {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            path: path.display().to_string(),
            content: std::fs::read(path)?,
        })
    }
}

/// Executes the enabled rules against a set of files.
pub struct Runner {
    registry: RuleRegistry,
    params: RuleParams,
    syntax: SuppressionSyntax,
    jobs: usize,
    parallel_rules: bool,
    cancel: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::with_registry(RuleRegistry::builtin(), RuleParams::default())
    }
}

impl Runner {
    /// Build a runner from a validated configuration.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let registry = RuleRegistry::with_overrides(&config.rule_overrides()?)?;
        Ok(Self::with_registry(registry, config.rule_params())
            .suppression_syntax(config.suppression.syntax()?)
            .jobs(config.jobs)
            .parallel_rules(config.parallel_rules))
    }

    pub fn with_registry(registry: RuleRegistry, params: RuleParams) -> Self {
        Self {
            registry,
            params,
            syntax: SuppressionSyntax::default(),
            jobs: 0,
            parallel_rules: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn suppression_syntax(mut self, syntax: SuppressionSyntax) -> Self {
        self.syntax = syntax;
        self
    }

    /// Number of worker threads; 0 uses every core.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Evaluate the rules of one file concurrently.
    pub fn parallel_rules(mut self, parallel: bool) -> Self {
        self.parallel_rules = parallel;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Check every input. Reports come back in input order; files cut
    /// short by cancellation are left out and counted.
    pub fn run(&self, inputs: Vec<SourceInput>) -> anyhow::Result<RunReport> {
        self.run_with_progress(inputs, |_| {})
    }

    /// Like [`Runner::run`], calling `progress` as each file finishes.
    pub fn run_with_progress<F>(
        &self,
        inputs: Vec<SourceInput>,
        progress: F,
    ) -> anyhow::Result<RunReport>
    where
        F: Fn(&str) + Sync,
    {
        let started = Instant::now();
        let total = inputs.len();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()?;

        let results: Vec<Option<FileReport>> = pool.install(|| {
            inputs
                .into_par_iter()
                .map(|input| {
                    let report = self.check_source(&input.path, input.content);
                    progress(&input.path);
                    report
                })
                .collect()
        });

        let files: Vec<FileReport> = results.into_iter().flatten().collect();
        let files_cancelled = total - files.len();
        let summary = RunSummary::from_files(&files, files_cancelled, started.elapsed());
        info!(
            "checked {} files ({} cancelled): {} errors, {} warnings, {} infos, {} suppressed in {} ms",
            summary.files_analyzed,
            summary.files_cancelled,
            summary.errors,
            summary.warnings,
            summary.infos,
            summary.suppressed,
            summary.elapsed_ms
        );
        Ok(RunReport {
            files,
            summary,
            cancelled: self.cancel.is_cancelled(),
        })
    }

    /// Check one file. Returns `None` when cancelled before it finished.
    pub fn check_source(&self, path: &str, bytes: Vec<u8>) -> Option<FileReport> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let file = AnalyzedFile::analyze(path, bytes);
        let ctx = FileContext::new(&file, &self.params, &self.cancel);
        let entries: Vec<&RuleEntry> = self.registry.evaluators().collect();

        let per_rule: Vec<Vec<Diagnostic>> = if self.parallel_rules {
            entries
                .par_iter()
                .map(|entry| self.evaluate(entry, &ctx))
                .collect()
        } else {
            let mut out = Vec::with_capacity(entries.len());
            for entry in &entries {
                if self.cancel.is_cancelled() {
                    break;
                }
                out.push(self.evaluate(entry, &ctx));
            }
            out
        };
        if self.cancel.is_cancelled() {
            debug!("discarding {}: run cancelled", path);
            return None;
        }

        let raw: Vec<Diagnostic> = per_rule.into_iter().flatten().collect();
        let directives = self.syntax.parse(&file.source);
        let (suppressions, errors) = resolve(&directives, &self.registry, path);
        let (mut active, suppressed) = filter_suppressed(raw, &suppressions);
        active.extend(error_diagnostics(&errors, &self.registry, path));

        Some(FileReport::new(
            path,
            file.source.encoding(),
            file.source.line_count(),
            active,
            suppressed,
        ))
    }

    /// Run one rule. A returned error or a panic stops the rule; what it
    /// reported before that is kept and an engine diagnostic is added.
    fn evaluate(&self, entry: &RuleEntry, ctx: &FileContext<'_>) -> Vec<Diagnostic> {
        let Some(check) = entry.def.check else {
            return Vec::new();
        };
        let started = Instant::now();
        let mut emitter = Emitter::new(entry, ctx.path(), ctx.source().len());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| check(ctx, &mut emitter)));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some((err.reason, err.span)),
            Err(payload) => Some((panic_message(payload.as_ref()), None)),
        };
        debug!(
            "{} on {}: {} diagnostics in {:?}",
            entry.def.id,
            ctx.path(),
            emitter.len(),
            started.elapsed()
        );

        let mut diagnostics = emitter.into_diagnostics();
        if let Some((reason, span)) = failure {
            warn!("rule {} failed on {}: {}", entry.def.id, ctx.path(), reason);
            diagnostics.extend(self.rule_failure(entry, ctx, &reason, span));
        }
        diagnostics
    }

    fn rule_failure(
        &self,
        failed: &RuleEntry,
        ctx: &FileContext<'_>,
        reason: &str,
        span: Option<Span>,
    ) -> Vec<Diagnostic> {
        let Some(engine) = self.registry.get("ENGINE.RULE_FAILURE").filter(|e| e.enabled) else {
            return Vec::new();
        };
        let mut emitter = Emitter::new(engine, ctx.path(), ctx.source().len());
        let span = span.unwrap_or_else(|| ctx.source().span_for(0, 0));
        emitter.emit(
            span,
            format!("rule {} could not evaluate this file: {}", failed.def.id, reason),
        );
        emitter.into_diagnostics()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked".to_string()
    }
}
