mod common;

use undercov::convert::{self, RawCoverageReport, ReportFormat};
use undercov::model::LineStatus;

#[test]
fn convert_sample_report() {
    let coverage = undercov::convert::istanbul::convert(common::ISTANBUL_REPORT).unwrap();

    // README.md has no statement map.
    assert_eq!(coverage.files.len(), 2);
    assert!(coverage.summary.is_none());

    let app = &coverage.files["/build/src/app.js"];
    assert_eq!(app.line(1), Some(LineStatus::Hit(1)));
    assert_eq!(app.line(2), Some(LineStatus::Hit(4)));
    // The nested statement on line 3 never ran; the enclosing hit doesn't hide it.
    assert_eq!(app.line(3), Some(LineStatus::Missed));
    assert_eq!(app.line(4), Some(LineStatus::Hit(4)));
    assert_eq!(app.line(5), None);
    // One arm of the conditional expression never ran.
    assert_eq!(app.line(6), Some(LineStatus::Partial));

    // Four statements plus one function, four of them hit.
    assert_eq!(app.total_statements, 5);
    assert_eq!(app.statements_hit, 4);
    // The "if" branch is left out of the branch totals.
    assert_eq!(app.total_branches, 2);
    assert_eq!(app.branches_hit, 1);
    assert!((app.statement_coverage - 80.0).abs() < 1e-9);
    assert!((app.branch_coverage - 50.0).abs() < 1e-9);
    assert!((app.overall_coverage - 500.0 / 7.0).abs() < 1e-9);

    let util = &coverage.files["/build/src/util.js"];
    assert_eq!(util.line(1), Some(LineStatus::Missed));
    assert_eq!(util.overall_coverage, 0.0);
}

#[test]
fn normalized_contract_json() {
    let coverage = undercov::convert::istanbul::convert(common::ISTANBUL_REPORT).unwrap();
    let value = serde_json::to_value(&coverage).unwrap();

    assert_eq!(value.as_object().unwrap().len(), 2);
    let app = &value["/build/src/app.js"];
    assert_eq!(app["1"], 1);
    assert_eq!(app["3"], 0);
    assert_eq!(app["6"], -1);
    assert_eq!(app["branchCoverage"], 50.0);
    assert!(app.get("totalStatements").is_none());
    assert!(value.get("summary").is_none());
}

#[test]
fn convert_through_format_dispatch() {
    let raw = RawCoverageReport {
        format: ReportFormat::Json,
        url: "https://cov.acme.dev/main/coverage-final.json".to_string(),
        body: common::ISTANBUL_REPORT.to_vec(),
    };
    let coverage = convert::convert(&raw).unwrap();
    assert!(coverage.lookup("/build/", "src/app.js").is_some());
    assert!(coverage.lookup("", "src/app.js").is_none());
}

#[test]
fn truncated_report_is_an_error() {
    let input = &common::ISTANBUL_REPORT[..200];
    assert!(undercov::convert::istanbul::convert(input).is_err());
}
