//! Integration tests for the full checking pipeline.
//!
//! These tests run the engine end to end, from raw bytes to aggregated
//! file reports, against inline sources and the testdata fixtures.

use std::path::PathBuf;

use cstylecheck::config::Config;
use cstylecheck::detect::{
    FileReport, Runner, Severity, SourceInput, SuppressionSyntax, SuppressionType,
};

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn fixture(name: &str) -> SourceInput {
    SourceInput::load(&testdata_path().join(name)).expect("fixture should load")
}

fn check(src: &str) -> FileReport {
    Runner::default()
        .check_source("inline.c", src.as_bytes().to_vec())
        .expect("not cancelled")
}

fn rule_hits<'a>(report: &'a FileReport, rule: &str) -> Vec<(usize, usize)> {
    report
        .diagnostics
        .iter()
        .filter(|d| d.rule_id == rule)
        .map(|d| (d.line(), d.column()))
        .collect()
}

#[test]
fn test_clean_fixture_has_no_diagnostics() {
    let input = fixture("clean.c");
    let report = Runner::default().check_source(&input.path, input.content).unwrap();
    assert!(report.is_clean(), "{:#?}", report.diagnostics);
    assert!(report.suppressed.is_empty());
}

#[test]
fn test_violations_fixture() {
    let input = fixture("violations.c");
    let report = Runner::default().check_source(&input.path, input.content).unwrap();
    let ids: Vec<&str> = report.diagnostics.iter().map(|d| d.rule_id.as_str()).collect();
    for expected in [
        "NAMING.TYPE_SUFFIX",
        "NAMING.TYPE_CASE",
        "NAMING.FUNCTION_CASE",
        "WHITESPACE.MULTIPLE_SPACES",
        "WHITESPACE.KEYWORD_SPACING",
        "STRUCTURE.SWITCH_DEFAULT",
        "STRUCTURE.TERNARY_NESTING",
        "STRUCTURE.BRACES_REQUIRED",
        "COMMENTS.CAPITALIZATION",
    ] {
        assert!(ids.contains(&expected), "missing {} in {:?}", expected, ids);
    }
}

#[test]
fn test_spans_stay_in_bounds() {
    for name in ["clean.c", "violations.c", "suppressed.c", "unterminated.c"] {
        let input = fixture(name);
        let len = input.content.len();
        let report = Runner::default().check_source(&input.path, input.content).unwrap();
        for d in &report.diagnostics {
            assert!(d.span.within(len), "{} {:?} out of bounds in {}", d.rule_id, d.span, name);
            assert!(d.span.start_line >= 1 && d.span.start_col >= 1);
        }
    }
}

#[test]
fn test_checking_is_idempotent() {
    let input = fixture("violations.c");
    let runner = Runner::default();
    let first = runner.check_source(&input.path, input.content.clone()).unwrap();
    let second = runner.check_source(&input.path, input.content).unwrap();
    assert_eq!(first.diagnostics, second.diagnostics);

    let keys: Vec<String> = first.diagnostics.iter().map(|d| d.key()).collect();
    let mut unique = keys.clone();
    unique.dedup();
    assert_eq!(keys.len(), unique.len());
}

#[test]
fn test_suppression_round_trip() {
    let input = fixture("suppressed.c");
    let plain = Runner::default()
        .suppression_syntax(SuppressionSyntax::with_marker("unused-marker").unwrap())
        .check_source(&input.path, input.content.clone())
        .unwrap();
    let report = Runner::default().check_source(&input.path, input.content).unwrap();

    // Nothing is lost: active plus suppressed is the unsuppressed set.
    let mut recombined: Vec<_> = report
        .diagnostics
        .iter()
        .cloned()
        .chain(report.suppressed.iter().map(|s| s.diagnostic.clone()))
        .collect();
    recombined.sort_by_key(|d| (d.line(), d.column(), d.rule_id.clone()));
    let mut expected = plain.diagnostics.clone();
    expected.sort_by_key(|d| (d.line(), d.column(), d.rule_id.clone()));
    assert_eq!(recombined, expected);

    assert_eq!(report.suppressed.len(), 3);
    for s in &report.suppressed {
        assert_eq!(s.diagnostic.rule_id, "NAMING.VARIABLE_CASE");
        let line = s.diagnostic.line();
        match s.suppression.suppression_type {
            SuppressionType::Range => assert!((3..=6).contains(&line)),
            SuppressionType::Line => assert_eq!(line, 7),
            other => panic!("unexpected suppression {:?}", other),
        }
    }
    assert_eq!(rule_hits(&report, "NAMING.VARIABLE_CASE"), vec![(8, 5)]);
}

#[test]
fn test_double_space_fires_at_column_eight() {
    let double = check("uint8_t  x;\n");
    assert_eq!(rule_hits(&double, "WHITESPACE.MULTIPLE_SPACES"), vec![(1, 8)]);

    let single = check("uint8_t x;\n");
    assert!(rule_hits(&single, "WHITESPACE.MULTIPLE_SPACES").is_empty());
}

#[test]
fn test_missing_default_fires_once_at_switch() {
    let src = "void f(int value)\n{\n    switch (value)\n    {\n    case 1:\n        break;\n    }\n}\n";
    let report = check(src);
    assert_eq!(rule_hits(&report, "STRUCTURE.SWITCH_DEFAULT"), vec![(3, 5)]);

    let with_default = src.replace("        break;\n", "        break;\n    default:\n        break;\n");
    assert!(rule_hits(&check(&with_default), "STRUCTURE.SWITCH_DEFAULT").is_empty());
}

#[test]
fn test_type_name_case() {
    let bad = check("typedef int myType_t;\n");
    assert!(bad.diagnostics.iter().any(|d| d.rule_id.starts_with("NAMING.")
        && d.fix.as_deref() == Some("my_type_t")));

    let good = check("typedef int my_type_t;\n");
    assert!(good.diagnostics.iter().all(|d| !d.rule_id.starts_with("NAMING.")));
}

#[test]
fn test_nested_ternary() {
    let nested = check("int g_val = a ? b : c ? d : e;\n");
    assert_eq!(rule_hits(&nested, "STRUCTURE.TERNARY_NESTING").len(), 1);

    let single = check("int g_val = a ? b : c;\n");
    assert!(rule_hits(&single, "STRUCTURE.TERNARY_NESTING").is_empty());
}

#[test]
fn test_unterminated_comment_gives_partial_report() {
    let input = fixture("unterminated.c");
    let report = Runner::default().check_source(&input.path, input.content).unwrap();
    let lex: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.rule_id == "LEX.UNTERMINATED_COMMENT")
        .collect();
    assert_eq!(lex.len(), 1);
    assert_eq!(lex[0].line(), 3);
    assert_eq!(lex[0].severity, Severity::Error);
    // Findings before the broken comment are still reported.
    assert_eq!(rule_hits(&report, "WHITESPACE.MULTIPLE_SPACES"), vec![(2, 4)]);
}

#[test]
fn test_config_overrides() {
    let config = Config::parse_file(testdata_path().join("test-config.yaml")).unwrap();
    config.validate().unwrap();
    let runner = Runner::new(&config).unwrap();
    assert!(!runner.registry().is_enabled("DOCUMENTATION.SECTION_ORDER"));

    let report = runner
        .run(vec![fixture("violations.c"), fixture("unterminated.c")])
        .unwrap();
    assert_eq!(report.files.len(), 2);
    assert!(report.files[0].path.ends_with("violations.c"));
    assert!(report
        .diagnostics()
        .filter(|d| d.rule_id == "WHITESPACE.MULTIPLE_SPACES")
        .all(|d| d.severity == Severity::Error));
    assert!(report
        .diagnostics()
        .all(|d| d.rule_id != "DOCUMENTATION.SECTION_ORDER"));
    assert!(report.has_findings_at(config.fail_on));
}
