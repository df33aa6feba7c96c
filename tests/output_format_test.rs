//! Tests for the JSON and SARIF output formats.
//!
//! These tests check the structure of rendered reports as consumers see
//! them, by parsing the output back as generic JSON.

use std::path::{Path, PathBuf};

use cstylecheck::detect::{RuleRegistry, RunReport, Runner, Severity, SourceInput};
use cstylecheck::report::{self, ReportContext};
use serde_json::Value;

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn run_fixtures() -> RunReport {
    let inputs: Vec<SourceInput> = ["clean.c", "violations.c", "suppressed.c"]
        .iter()
        .map(|name| SourceInput::load(&testdata_path().join(name)).expect("fixture should load"))
        .collect();
    Runner::default().run(inputs).expect("run should succeed")
}

fn context(fail_on: Severity) -> ReportContext {
    ReportContext {
        target: "testdata".to_string(),
        config: None,
        fail_on,
    }
}

#[test]
fn test_json_structure() {
    let result = run_fixtures();
    let rendered = report::render_json(&result, &context(Severity::Error)).unwrap();
    let json: Value = serde_json::from_str(&rendered).unwrap();

    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["path"], "testdata");
    assert!(json.get("config").is_none());
    assert_eq!(json["fail_on"], "error");
    assert_eq!(json["cancelled"], false);
    assert_eq!(json["summary"]["files_analyzed"], 3);
    assert_eq!(json["summary"]["suppressed"], 3);

    let files = json["files"].as_array().unwrap();
    assert_eq!(files.len(), 3);
    assert!(files[0]["path"].as_str().unwrap().ends_with("clean.c"));
    assert_eq!(files[0]["diagnostics"].as_array().unwrap().len(), 0);
    assert_eq!(files[0]["encoding"], "ascii");

    let first = &files[1]["diagnostics"][0];
    for key in ["rule_id", "category", "severity", "file", "span", "message"] {
        assert!(first.get(key).is_some(), "diagnostic has no {}", key);
    }
    assert!(first["span"]["start_line"].as_u64().unwrap() >= 1);

    let suppressed = files[2]["suppressed"].as_array().unwrap();
    assert_eq!(suppressed.len(), 3);
    assert_eq!(suppressed[0]["suppression"]["suppression_type"], "range");
    assert_eq!(suppressed[0]["suppression"]["reason"], "legacy names");
}

#[test]
fn test_json_passed_follows_threshold() {
    let result = run_fixtures();
    let summary = &result.summary;
    assert!(summary.warnings > 0);

    let rendered = report::render_json(&result, &context(Severity::Info)).unwrap();
    let strict: Value = serde_json::from_str(&rendered).unwrap();
    assert_eq!(strict["passed"], false);

    let ctx = context(Severity::Error);
    assert_eq!(ctx.passed(&result), summary.errors == 0);
}

#[test]
fn test_sarif_structure() {
    let result = run_fixtures();
    let registry = RuleRegistry::builtin();
    let sarif: Value =
        serde_json::from_str(&report::render_sarif(&testdata_path(), &result, &registry).unwrap())
            .unwrap();

    assert_eq!(sarif["version"], "2.1.0");
    assert!(sarif["$schema"].as_str().unwrap().contains("sarif-schema-2.1.0"));

    let run = &sarif["runs"][0];
    assert_eq!(run["tool"]["driver"]["name"], "cstylecheck");

    let rules = run["tool"]["driver"]["rules"].as_array().unwrap();
    let rule_ids: Vec<&str> = rules.iter().map(|r| r["id"].as_str().unwrap()).collect();
    let mut sorted = rule_ids.clone();
    sorted.sort();
    assert_eq!(rule_ids, sorted);
    let suffix = rules
        .iter()
        .find(|r| r["id"] == "NAMING.TYPE_SUFFIX")
        .expect("rule metadata for NAMING.TYPE_SUFFIX");
    assert_eq!(suffix["name"], "TypeSuffix");
    assert_eq!(suffix["defaultConfiguration"]["level"], "warning");
    assert_eq!(suffix["properties"]["category"], "naming");

    let results = run["results"].as_array().unwrap();
    assert_eq!(results.len(), result.summary.total());
    for r in results {
        let location = &r["locations"][0]["physicalLocation"];
        let uri = location["artifactLocation"]["uri"].as_str().unwrap();
        assert!(!Path::new(uri).is_absolute(), "{} should be relative", uri);
        let region = &location["region"];
        for key in ["startLine", "startColumn", "endLine", "endColumn"] {
            assert!(region[key].as_u64().unwrap() >= 1, "{} missing", key);
        }
        assert!(rule_ids.contains(&r["ruleId"].as_str().unwrap()));
        assert!(["error", "warning", "note"].contains(&r["level"].as_str().unwrap()));
    }
}
