//! Rule registry: the built-in rule corpus plus per-run overrides.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use super::context::{Emitter, FileContext};
use super::types::{Category, Severity};
use super::{comments, documentation, keywords, lexical, naming, structure, whitespace};
use crate::error::{ConfigError, RuleEvaluationError};

/// A rule evaluator. Reports through the emitter; returns an error only when
/// it meets a tree shape it cannot handle.
pub type CheckFn = fn(&FileContext<'_>, &mut Emitter) -> Result<(), RuleEvaluationError>;

/// Static description of a rule.
#[derive(Clone, Copy)]
pub struct RuleDef {
    pub id: &'static str,
    pub category: Category,
    pub severity: Severity,
    pub summary: &'static str,
    /// `None` for diagnostics the engine raises itself.
    pub check: Option<CheckFn>,
}

impl RuleDef {
    pub const fn new(
        id: &'static str,
        category: Category,
        severity: Severity,
        summary: &'static str,
        check: CheckFn,
    ) -> Self {
        Self {
            id,
            category,
            severity,
            summary,
            check: Some(check),
        }
    }

    pub const fn engine(
        id: &'static str,
        category: Category,
        severity: Severity,
        summary: &'static str,
    ) -> Self {
        Self {
            id,
            category,
            severity,
            summary,
            check: None,
        }
    }
}

impl fmt::Debug for RuleDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleDef")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("severity", &self.severity)
            .finish()
    }
}

/// Diagnostics raised by the engine rather than by an evaluator.
static ENGINE_RULES: &[RuleDef] = &[
    RuleDef::engine(
        "ENGINE.RULE_FAILURE",
        Category::Engine,
        Severity::Error,
        "A rule could not evaluate this file",
    ),
    RuleDef::engine(
        "SUPPRESSION.UNTERMINATED",
        Category::Suppression,
        Severity::Warning,
        "Suppression range start without a matching end",
    ),
    RuleDef::engine(
        "SUPPRESSION.UNMATCHED_END",
        Category::Suppression,
        Severity::Warning,
        "Suppression range end without a matching start",
    ),
    RuleDef::engine(
        "SUPPRESSION.UNKNOWN_RULE",
        Category::Suppression,
        Severity::Warning,
        "Suppression directive names a rule that does not exist",
    ),
];

/// Every built-in rule, grouped by the module that evaluates it.
static CORPUS: Lazy<Vec<RuleDef>> = Lazy::new(|| {
    [
        lexical::RULES,
        naming::RULES,
        whitespace::RULES,
        structure::RULES,
        comments::RULES,
        keywords::RULES,
        documentation::RULES,
        ENGINE_RULES,
    ]
    .into_iter()
    .flatten()
    .copied()
    .collect()
});

pub fn builtin_rules() -> &'static [RuleDef] {
    &CORPUS
}

/// Numeric limits used by rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleParams {
    pub max_line_length: usize,
    pub max_nesting_depth: usize,
    pub max_ternary_depth: usize,
    pub max_function_lines: usize,
    pub max_file_lines: usize,
    pub max_blank_lines: usize,
    pub indent_width: usize,
    pub min_variable_length: usize,
}

impl Default for RuleParams {
    fn default() -> Self {
        Self {
            max_line_length: 120,
            max_nesting_depth: 4,
            max_ternary_depth: 1,
            max_function_lines: 100,
            max_file_lines: 2000,
            max_blank_lines: 2,
            indent_width: 4,
            min_variable_length: 3,
        }
    }
}

/// A per-rule configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSetting {
    Off,
    Level(Severity),
}

impl FromStr for RuleSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" | "disabled" | "disable" | "none" | "false" => Ok(RuleSetting::Off),
            other => other.parse::<Severity>().map(RuleSetting::Level),
        }
    }
}

/// A rule with its effective settings for this run.
#[derive(Debug, Clone)]
pub struct RuleEntry {
    pub def: RuleDef,
    pub severity: Severity,
    pub enabled: bool,
}

/// Rule lookup by id and category.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    entries: Vec<RuleEntry>,
    index: HashMap<&'static str, usize>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RuleRegistry {
    pub fn builtin() -> Self {
        Self::from_defs(builtin_rules())
    }

    pub fn from_defs(defs: &[RuleDef]) -> Self {
        let entries: Vec<RuleEntry> = defs
            .iter()
            .map(|def| RuleEntry {
                def: *def,
                severity: def.severity,
                enabled: true,
            })
            .collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.def.id, i))
            .collect();
        Self { entries, index }
    }

    /// Built-in rules with configured severities and disabled rules applied.
    pub fn with_overrides(overrides: &BTreeMap<String, RuleSetting>) -> Result<Self, ConfigError> {
        let mut registry = Self::builtin();
        for (id, setting) in overrides {
            let i = *registry
                .index
                .get(id.as_str())
                .ok_or_else(|| ConfigError::UnknownRule(id.clone()))?;
            let entry = &mut registry.entries[i];
            match setting {
                RuleSetting::Off => entry.enabled = false,
                RuleSetting::Level(severity) => {
                    entry.enabled = true;
                    entry.severity = *severity;
                }
            }
        }
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&RuleEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.get(id).is_some_and(|e| e.enabled)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleEntry> {
        self.entries.iter()
    }

    /// Enabled rules that have an evaluator.
    pub fn evaluators(&self) -> impl Iterator<Item = &RuleEntry> {
        self.entries
            .iter()
            .filter(|e| e.enabled && e.def.check.is_some())
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &RuleEntry> {
        self.entries
            .iter()
            .filter(move |e| e.def.category == category)
    }

    /// Whether a suppression filter (`*`, `CAT.*` or an exact id) names at
    /// least one registered rule.
    pub fn matches_filter(&self, filter: &str) -> bool {
        if filter == "*" {
            return true;
        }
        match filter.strip_suffix('*') {
            Some(prefix) => self.entries.iter().any(|e| e.def.id.starts_with(prefix)),
            None => self.contains(filter),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_rule_ids_are_unique() {
        let mut seen = HashSet::new();
        for def in builtin_rules() {
            assert!(seen.insert(def.id), "duplicate rule id {}", def.id);
        }
    }

    #[test]
    fn test_rule_ids_carry_category_prefix() {
        for def in builtin_rules() {
            let (prefix, rest) = def.id.split_once('.').expect("id has a dot");
            assert_eq!(prefix, def.category.prefix(), "{}", def.id);
            assert!(!rest.is_empty());
            assert_eq!(rest, rest.to_uppercase());
        }
    }

    #[test]
    fn test_every_category_module_contributes() {
        let registry = RuleRegistry::builtin();
        for category in [
            Category::Lexical,
            Category::Encoding,
            Category::Naming,
            Category::Whitespace,
            Category::Structure,
            Category::Comments,
            Category::Keywords,
            Category::Documentation,
        ] {
            assert!(
                registry.by_category(category).any(|e| e.def.check.is_some()),
                "no evaluator for {}",
                category
            );
        }
    }

    #[test]
    fn test_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert("NAMING.VARIABLE_LENGTH".to_string(), RuleSetting::Off);
        overrides.insert(
            "WHITESPACE.TAB".to_string(),
            RuleSetting::Level(Severity::Error),
        );
        let registry = RuleRegistry::with_overrides(&overrides).unwrap();
        assert!(!registry.is_enabled("NAMING.VARIABLE_LENGTH"));
        assert_eq!(
            registry.get("WHITESPACE.TAB").unwrap().severity,
            Severity::Error
        );
        assert!(registry
            .evaluators()
            .all(|e| e.def.id != "NAMING.VARIABLE_LENGTH"));
    }

    #[test]
    fn test_unknown_override_is_rejected() {
        let mut overrides = BTreeMap::new();
        overrides.insert("NAMING.NOPE".to_string(), RuleSetting::Off);
        let err = RuleRegistry::with_overrides(&overrides).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRule(id) if id == "NAMING.NOPE"));
    }

    #[test]
    fn test_filters() {
        let registry = RuleRegistry::builtin();
        assert!(registry.matches_filter("*"));
        assert!(registry.matches_filter("NAMING.*"));
        assert!(registry.matches_filter("WHITESPACE.TAB"));
        assert!(!registry.matches_filter("BOGUS.*"));
        assert!(!registry.matches_filter("WHITESPACE.TABS"));
    }

    #[test]
    fn test_rule_setting_parse() {
        assert_eq!("off".parse::<RuleSetting>().unwrap(), RuleSetting::Off);
        assert_eq!(
            "Info".parse::<RuleSetting>().unwrap(),
            RuleSetting::Level(Severity::Info)
        );
        assert!("loud".parse::<RuleSetting>().is_err());
    }
}
