//! Configuration schema for cstylecheck.
//!
//! A configuration selects rules and their severities, sets the numeric
//! limits rules check against, and controls discovery and suppression
//! syntax. Every field has a default, so an empty file is valid.

use globset::{Glob, GlobSet, GlobSetBuilder};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::detect::{
    builtin_rules, RuleParams, RuleSetting, Severity, SuppressionSyntax, DEFAULT_MARKER,
};
use crate::error::ConfigError;

/// Configuration file names searched for in the working directory.
pub const DEFAULT_CONFIG_NAMES: &[&str] =
    &[".cstylecheck.yaml", "cstylecheck.yaml", "cstylecheck.json"];

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub max_line_length: usize,
    pub max_nesting_depth: usize,
    pub max_ternary_depth: usize,
    pub max_function_lines: usize,
    pub max_file_lines: usize,
    pub max_blank_lines: usize,
    pub indent_width: usize,
    pub min_variable_length: usize,
    /// Per-rule settings: `true`, `false`, `off` or a severity.
    pub rules: BTreeMap<String, RuleValue>,
    pub suppression: SuppressionConfig,
    /// File extensions checked when walking directories.
    pub extensions: Vec<String>,
    /// Glob patterns for paths to skip (e.g. "**/vendor/**").
    pub excluded_paths: Vec<String>,
    /// Lowest severity that fails the run.
    pub fail_on: Severity,
    /// Worker threads; 0 uses every core.
    pub jobs: usize,
    /// Evaluate the rules of one file concurrently.
    pub parallel_rules: bool,
}

impl Default for Config {
    fn default() -> Self {
        let params = RuleParams::default();
        Self {
            max_line_length: params.max_line_length,
            max_nesting_depth: params.max_nesting_depth,
            max_ternary_depth: params.max_ternary_depth,
            max_function_lines: params.max_function_lines,
            max_file_lines: params.max_file_lines,
            max_blank_lines: params.max_blank_lines,
            indent_width: params.indent_width,
            min_variable_length: params.min_variable_length,
            rules: BTreeMap::new(),
            suppression: SuppressionConfig::default(),
            extensions: vec!["c".to_string(), "h".to_string()],
            excluded_paths: Vec::new(),
            fail_on: Severity::Warning,
            jobs: 0,
            parallel_rules: false,
        }
    }
}

/// A rule's configured value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RuleValue {
    Enabled(bool),
    Setting(String),
}

/// How suppression comments are written.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SuppressionConfig {
    /// Word before the colon in `cstylecheck:ignore`.
    pub marker: String,
    /// Full regex replacing the default syntax. Needs a `directive` group.
    pub pattern: Option<String>,
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            pattern: None,
        }
    }
}

impl SuppressionConfig {
    pub fn syntax(&self) -> Result<SuppressionSyntax, ConfigError> {
        match &self.pattern {
            Some(pattern) => SuppressionSyntax::with_pattern(pattern),
            None => SuppressionSyntax::with_marker(&self.marker),
        }
    }
}

impl Config {
    /// Parse a configuration file. `.json` files are read as JSON, anything
    /// else as YAML.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(serde_json::from_str(&content)?)
        } else {
            Self::from_yaml(&content)
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Find a configuration file: the known names in `dir`, then the user
    /// configuration directory.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        for name in DEFAULT_CONFIG_NAMES {
            let path = dir.join(name);
            if path.is_file() {
                return Some(path);
            }
        }
        let user = directories::ProjectDirs::from("", "", "cstylecheck")?
            .config_dir()
            .join("config.yaml");
        user.is_file().then_some(user)
    }

    /// Load the explicit file if given, else a discovered one, else the
    /// defaults. The result is validated.
    pub fn load(
        explicit: Option<&Path>,
        dir: &Path,
    ) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = explicit.map(Path::to_path_buf).or_else(|| Self::discover(dir));
        let config = match &path {
            Some(p) => {
                debug!("loading configuration from {}", p.display());
                Self::parse_file(p)?
            }
            None => {
                debug!("no configuration file found, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok((config, path))
    }

    /// Check limits, rule ids and severities, the suppression syntax and
    /// the exclusion globs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_line_length", self.max_line_length),
            ("max_nesting_depth", self.max_nesting_depth),
            ("max_function_lines", self.max_function_lines),
            ("max_file_lines", self.max_file_lines),
            ("indent_width", self.indent_width),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "extensions",
                reason: "at least one extension is required".to_string(),
            });
        }
        self.rule_overrides()?;
        self.suppression.syntax()?;
        self.exclusions()?;
        Ok(())
    }

    pub fn rule_params(&self) -> RuleParams {
        RuleParams {
            max_line_length: self.max_line_length,
            max_nesting_depth: self.max_nesting_depth,
            max_ternary_depth: self.max_ternary_depth,
            max_function_lines: self.max_function_lines,
            max_file_lines: self.max_file_lines,
            max_blank_lines: self.max_blank_lines,
            indent_width: self.indent_width,
            min_variable_length: self.min_variable_length,
        }
    }

    /// Per-rule settings keyed by rule id.
    pub fn rule_overrides(&self) -> Result<BTreeMap<String, RuleSetting>, ConfigError> {
        let mut overrides = BTreeMap::new();
        for (id, value) in &self.rules {
            let def = builtin_rules()
                .iter()
                .find(|d| d.id == id.as_str())
                .ok_or_else(|| ConfigError::UnknownRule(id.clone()))?;
            let setting = match value {
                RuleValue::Enabled(true) => RuleSetting::Level(def.severity),
                RuleValue::Enabled(false) => RuleSetting::Off,
                RuleValue::Setting(s) => s.parse().map_err(|_| ConfigError::InvalidSeverity {
                    rule: id.clone(),
                    value: s.clone(),
                })?,
            };
            overrides.insert(id.clone(), setting);
        }
        Ok(overrides)
    }

    /// Compiled `excluded_paths`.
    pub fn exclusions(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidGlob {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|e| ConfigError::InvalidGlob {
            pattern: self.excluded_paths.join(", "),
            reason: e.to_string(),
        })
    }

    /// Whether the path has one of the configured extensions.
    pub fn has_checked_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.trim_start_matches('.') == ext))
    }
}
