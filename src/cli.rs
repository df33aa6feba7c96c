//! Command-line interface for cstylecheck.

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::detect::{Category, RuleRegistry, Runner, Severity, SourceInput};
use crate::report::{self, ReportContext};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Runs with at least this many files show a progress bar in pretty mode.
const PROGRESS_THRESHOLD: usize = 64;

/// Default configuration written by `init`.
const DEFAULT_TEMPLATE: &str = include_str!("templates/default.yaml");

/// C coding standard compliance checker.
///
/// Checks C sources against naming, whitespace, structure, comment and
/// documentation rules, honoring in-source suppression comments.
#[derive(Parser)]
#[command(name = "cstylecheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log debug output, including per-rule timings
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check C files against the coding standard
    #[command(visible_alias = "check")]
    Lint(LintArgs),
    /// Write a default configuration file
    Init(InitArgs),
    /// List the built-in rules
    Rules(RulesArgs),
}

/// Arguments for the lint command.
#[derive(Parser)]
pub struct LintArgs {
    /// Files or directories to check
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Path to configuration file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty, json, or sarif
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Lowest severity that fails the run: error, warning, or info
    #[arg(long)]
    pub fail_on: Option<String>,

    /// Show suppressed diagnostics in output
    #[arg(long)]
    pub show_suppressed: bool,

    /// Worker threads (0 = all cores)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = ".cstylecheck.yaml")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the rules command.
#[derive(Parser)]
pub struct RulesArgs {
    /// Only list rules in this category (e.g. naming or NAMING)
    #[arg(short, long)]
    pub category: Option<String>,
}

/// Collect files to check. Directories are walked for the configured
/// extensions; files named explicitly are always checked.
pub fn collect_files(paths: &[PathBuf], config: &Config) -> anyhow::Result<Vec<PathBuf>> {
    let exclusions = config.exclusions()?;
    let mut files = Vec::new();

    for root in paths {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                // Skip hidden directories below the root
                let name = e.file_name().to_string_lossy();
                !(e.depth() > 0 && e.file_type().is_dir() && name.starts_with('.'))
            });
        for entry in walker {
            let entry = entry.with_context(|| format!("cannot walk {}", root.display()))?;
            let path = entry.path();
            if !entry.file_type().is_file() || !config.has_checked_extension(path) {
                continue;
            }
            if exclusions.is_match(path) {
                debug!("excluded {}", path.display());
                continue;
            }
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Run the lint command.
pub fn run_lint(args: &LintArgs) -> anyhow::Result<i32> {
    // Validate format
    if args.format != "pretty" && args.format != "json" && args.format != "sarif" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty', 'json', or 'sarif'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let cwd = std::env::current_dir().context("cannot read the working directory")?;
    let (mut config, config_path) = match Config::load(args.config.as_deref(), &cwd) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: invalid configuration: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    if let Some(level) = &args.fail_on {
        match level.parse::<Severity>() {
            Ok(severity) => config.fail_on = severity,
            Err(e) => {
                eprintln!("Error: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }

    for path in &args.paths {
        if !path.exists() {
            eprintln!("Error: cannot access path {:?}", path);
            return Ok(EXIT_ERROR);
        }
    }

    let files = collect_files(&args.paths, &config)?;
    if files.is_empty() {
        eprintln!("Warning: no files to check");
        return Ok(EXIT_SUCCESS);
    }

    // Unreadable files are reported and skipped
    let mut inputs = Vec::with_capacity(files.len());
    let mut unreadable = 0;
    for path in &files {
        match SourceInput::load(path) {
            Ok(input) => inputs.push(input),
            Err(e) => {
                warn!("cannot read {}: {}", path.display(), e);
                eprintln!("Error: cannot read {}: {}", path.display(), e);
                unreadable += 1;
            }
        }
    }

    let runner = match Runner::new(&config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: invalid configuration: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let result = if args.format == "pretty" && inputs.len() >= PROGRESS_THRESHOLD {
        let bar = report::progress_bar(inputs.len());
        let result = runner.run_with_progress(inputs, |path| {
            bar.set_message(path.to_string());
            bar.inc(1);
        })?;
        bar.finish_and_clear();
        result
    } else {
        runner.run(inputs)?
    };

    let target = args
        .paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let ctx = ReportContext {
        target,
        config: config_path.map(|p| p.display().to_string()),
        fail_on: config.fail_on,
    };

    match args.format.as_str() {
        "json" => report::write_json(&result, &ctx)?,
        "sarif" => {
            let base = match args.paths.as_slice() {
                [single] if single.is_dir() => single.clone(),
                _ => PathBuf::new(),
            };
            report::write_sarif(&base, &result, runner.registry())?
        }
        _ => report::write_pretty(&result, &ctx, args.show_suppressed),
    }

    // Return appropriate exit code
    if unreadable > 0 {
        Ok(EXIT_ERROR)
    } else if ctx.passed(&result) {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    // Check if output already exists
    if args.output.exists() && !args.force {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Use --force to overwrite it or --output to choose another path");
        return Ok(EXIT_ERROR);
    }

    // Create output directory if needed
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, DEFAULT_TEMPLATE) {
        eprintln!("Error: failed to write configuration: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to customize for your project", args.output.display());
    println!("  2. Run: cstylecheck lint . --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}

/// Run the rules command.
pub fn run_rules(args: &RulesArgs) -> anyhow::Result<i32> {
    let category = match &args.category {
        Some(name) => match Category::parse(name) {
            Some(c) => Some(c),
            None => {
                eprintln!("Error: unknown category {:?}", name);
                let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
                eprintln!("Categories: {}", names.join(", "));
                return Ok(EXIT_ERROR);
            }
        },
        None => None,
    };

    let registry = RuleRegistry::builtin();
    for entry in registry
        .iter()
        .filter(|e| category.map_or(true, |c| e.def.category == c))
    {
        println!(
            "  {:<34} {:<14} {:<8} {}",
            entry.def.id,
            entry.def.category.as_str(),
            entry.severity.to_string(),
            entry.def.summary
        );
    }

    Ok(EXIT_SUCCESS)
}
