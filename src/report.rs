//! Output formatting for cstylecheck results.
//!
//! Supports three output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: the full run report for programmatic consumption
//! - SARIF: Static Analysis Results Interchange Format for IDE/CI integration

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

use crate::detect::{
    Diagnostic, FileReport, RuleRegistry, RunReport, RunSummary, Severity, SuppressedDiagnostic,
    SuppressionType,
};

/// What the report is about, beyond the diagnostics.
#[derive(Debug, Clone)]
pub struct ReportContext {
    /// Paths given on the command line.
    pub target: String,
    /// Configuration file in use, if any.
    pub config: Option<String>,
    pub fail_on: Severity,
}

impl ReportContext {
    pub fn passed(&self, report: &RunReport) -> bool {
        !report.has_findings_at(self.fail_on)
    }
}

// =============================================================================
// JSON Format
// =============================================================================

#[derive(Serialize)]
pub struct JsonReport<'a> {
    pub version: &'static str,
    pub path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<&'a str>,
    pub fail_on: Severity,
    pub passed: bool,
    pub cancelled: bool,
    pub summary: &'a RunSummary,
    pub files: &'a [FileReport],
}

/// Render the run report as pretty-printed JSON.
pub fn render_json(report: &RunReport, ctx: &ReportContext) -> anyhow::Result<String> {
    let json = JsonReport {
        version: env!("CARGO_PKG_VERSION"),
        path: &ctx.target,
        config: ctx.config.as_deref(),
        fail_on: ctx.fail_on,
        passed: ctx.passed(report),
        cancelled: report.cancelled,
        summary: &report.summary,
        files: &report.files,
    };
    Ok(serde_json::to_string_pretty(&json)?)
}

/// Write results in JSON format.
pub fn write_json(report: &RunReport, ctx: &ReportContext) -> anyhow::Result<()> {
    println!("{}", render_json(report, ctx)?);
    Ok(())
}

// =============================================================================
// SARIF Format
// =============================================================================

const SARIF_VERSION: &str = "2.1.0";
const SARIF_SCHEMA: &str = "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";
const TOOL_NAME: &str = "cstylecheck";
const INFO_URI: &str = "https://github.com/zen-systems/cstylecheck";

#[derive(Serialize)]
struct SarifReport {
    version: String,
    #[serde(rename = "$schema")]
    schema: String,
    runs: Vec<SarifRun>,
}

#[derive(Serialize)]
struct SarifRun {
    tool: SarifTool,
    results: Vec<SarifResult>,
}

#[derive(Serialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize)]
struct SarifDriver {
    name: String,
    version: String,
    #[serde(rename = "informationUri")]
    information_uri: String,
    rules: Vec<SarifRule>,
}

#[derive(Serialize)]
struct SarifRule {
    id: String,
    name: String,
    #[serde(rename = "shortDescription")]
    short_description: SarifMessage,
    #[serde(rename = "helpUri")]
    help_uri: String,
    #[serde(rename = "defaultConfiguration")]
    default_config: SarifRuleConfig,
    properties: SarifRuleProperties,
}

#[derive(Serialize)]
struct SarifRuleConfig {
    level: String,
}

#[derive(Serialize)]
struct SarifRuleProperties {
    category: String,
}

#[derive(Serialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: String,
    level: String,
    message: SarifMessage,
    locations: Vec<SarifLocation>,
}

#[derive(Serialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize)]
struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    physical_location: SarifPhysicalLocation,
}

#[derive(Serialize)]
struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    artifact_location: SarifArtifact,
    region: SarifRegion,
}

#[derive(Serialize)]
struct SarifArtifact {
    uri: String,
}

#[derive(Serialize)]
struct SarifRegion {
    #[serde(rename = "startLine")]
    start_line: usize,
    #[serde(rename = "startColumn")]
    start_column: usize,
    #[serde(rename = "endLine")]
    end_line: usize,
    #[serde(rename = "endColumn")]
    end_column: usize,
}

fn map_severity_to_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "note",
    }
}

/// `NAMING.TYPE_SUFFIX` -> `TypeSuffix`.
fn rule_name(rule_id: &str) -> String {
    let tail = rule_id.split_once('.').map_or(rule_id, |(_, t)| t);
    tail.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let lower = w.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn make_relative_path(file_path: &str, base_path: &Path) -> String {
    if base_path.to_string_lossy().is_empty() {
        return file_path.to_string();
    }

    let file = Path::new(file_path);

    // Single file scan: just the file name
    if file == base_path {
        return file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.to_string());
    }

    file.strip_prefix(base_path)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| file_path.replace('\\', "/"))
}

fn sarif_result(d: &Diagnostic, base_path: &Path) -> SarifResult {
    let mut text = d.message.clone();
    if let Some(fix) = &d.fix {
        text.push_str(&format!(" (suggested: {:?})", fix));
    }
    SarifResult {
        rule_id: d.rule_id.clone(),
        level: map_severity_to_level(d.severity).to_string(),
        message: SarifMessage { text },
        locations: vec![SarifLocation {
            physical_location: SarifPhysicalLocation {
                artifact_location: SarifArtifact {
                    uri: make_relative_path(&d.file, base_path),
                },
                region: SarifRegion {
                    start_line: d.span.start_line.max(1),
                    start_column: d.span.start_col.max(1),
                    end_line: d.span.end_line.max(1),
                    end_column: d.span.end_col.max(1),
                },
            },
        }],
    }
}

/// Render the run report as SARIF 2.1.0.
pub fn render_sarif(
    base_path: &Path,
    report: &RunReport,
    registry: &RuleRegistry,
) -> anyhow::Result<String> {
    let rule_ids: BTreeSet<&str> = report.diagnostics().map(|d| d.rule_id.as_str()).collect();

    let rules: Vec<SarifRule> = rule_ids
        .iter()
        .filter_map(|id| registry.get(id))
        .map(|entry| SarifRule {
            id: entry.def.id.to_string(),
            name: rule_name(entry.def.id),
            short_description: SarifMessage {
                text: entry.def.summary.to_string(),
            },
            help_uri: format!("{}#{}", INFO_URI, entry.def.id.to_lowercase().replace('.', "-")),
            default_config: SarifRuleConfig {
                level: map_severity_to_level(entry.severity).to_string(),
            },
            properties: SarifRuleProperties {
                category: entry.def.category.to_string(),
            },
        })
        .collect();

    let results: Vec<SarifResult> = report
        .diagnostics()
        .map(|d| sarif_result(d, base_path))
        .collect();

    let sarif = SarifReport {
        version: SARIF_VERSION.to_string(),
        schema: SARIF_SCHEMA.to_string(),
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: TOOL_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    information_uri: INFO_URI.to_string(),
                    rules,
                },
            },
            results,
        }],
    };

    Ok(serde_json::to_string_pretty(&sarif)?)
}

/// Write results in SARIF format.
pub fn write_sarif(
    base_path: &Path,
    report: &RunReport,
    registry: &RuleRegistry,
) -> anyhow::Result<()> {
    println!("{}", render_sarif(base_path, report, registry)?);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Progress bar shown while a large pretty-mode run is in flight.
pub fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    let template = "  {spinner} [{bar:30}] {pos}/{len} {wide_msg}";
    if let Ok(style) = ProgressStyle::with_template(template) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

/// Write results in pretty (human-readable) format.
pub fn write_pretty(report: &RunReport, ctx: &ReportContext, show_suppressed: bool) {
    // Header
    println!();
    print!("  ");
    print!("{}", "cstylecheck".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Checking: ".dimmed());
    println!("{}", ctx.target);
    print!("  {}", "Config:   ".dimmed());
    println!("{}", ctx.config.as_deref().unwrap_or("(defaults)"));
    println!();

    for file in report.files.iter().filter(|f| !f.is_clean()) {
        write_file(file);
        println!();
    }

    let suppressed: Vec<&SuppressedDiagnostic> =
        report.files.iter().flat_map(|f| f.suppressed.iter()).collect();
    if !suppressed.is_empty() {
        write_suppressed_summary(&suppressed, show_suppressed);
        println!();
    }

    write_final_status(report, ctx);
    println!();
}

fn write_file(file: &FileReport) {
    println!(
        "  {} {}",
        file.path.blue().bold(),
        format!("({})", file.diagnostics.len()).dimmed()
    );
    for d in &file.diagnostics {
        write_severity_tag(d.severity);
        print!("{:<9}", format!("{}:{}", d.line(), d.column()).dimmed());
        print!(" {:<34}", d.rule_id.dimmed());
        println!("{}", d.message);
        if let Some(fix) = &d.fix {
            println!("{:>28}{}", "", format!("suggested: {:?}", fix).green());
        }
    }
}

fn write_severity_tag(severity: Severity) {
    match severity {
        Severity::Error => print!("    {} ", "ERROR".red()),
        Severity::Warning => print!("    {} ", "WARN ".yellow()),
        Severity::Info => print!("    {} ", "INFO ".blue()),
    }
}

fn write_suppressed_summary(suppressed: &[&SuppressedDiagnostic], show_details: bool) {
    println!("  {} ({}):", "Suppressed".dimmed(), suppressed.len());

    if !show_details {
        println!("    {}", "(use --show-suppressed to see details)".dimmed());
        return;
    }

    println!();
    for sd in suppressed {
        let d = &sd.diagnostic;
        let s = &sd.suppression;

        print!("    {:<34}", d.rule_id.dimmed());
        print!("{}", d.file.blue());
        if s.suppression_type == SuppressionType::File {
            print!("{}", ":* (file)".dimmed());
        } else {
            print!("{}", format!(":{}", d.line()).dimmed());
        }
        println!();

        if let Some(reason) = &s.reason {
            println!("            {}", format!("reason: {:?}", reason).dimmed());
        }
    }
}

fn write_final_status(report: &RunReport, ctx: &ReportContext) {
    let s = &report.summary;
    print!(
        "  {} files, {} errors, {} warnings, {} infos",
        s.files_analyzed,
        s.errors.to_string().red(),
        s.warnings.to_string().yellow(),
        s.infos.to_string().blue()
    );
    if s.suppressed > 0 {
        print!("  {}", format!("({} suppressed)", s.suppressed).dimmed());
    }
    if report.cancelled {
        print!("  {}", format!("({} cancelled)", s.files_cancelled).yellow());
    }
    println!();

    print!("  {}", format!("Fail on: {}", ctx.fail_on).dimmed());
    print!("  ");
    if ctx.passed(report) {
        print!("{}", "✓ PASSED".green());
    } else {
        print!("{}", "✗ FAILED".red());
    }
    println!();
}
