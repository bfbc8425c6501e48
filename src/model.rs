//! Uniform in-memory representation of coverage data, independent of the
//! report format. Converters produce a `NormalizedCoverage`, the coordinator
//! caches it, and renderers read it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

/// Compute a coverage rate, returning 0.0 when the total is zero.
#[must_use]
pub fn rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// Same as [`rate`], scaled to 0–100.
#[must_use]
pub fn percentage(covered: u64, total: u64) -> f64 {
    rate(covered, total) * 100.0
}

/// Identifies what to fetch coverage for: a branch name or pull-request id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CoverageReference(String);

impl CoverageReference {
    /// Returns `None` for an empty (or all-whitespace) reference.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoverageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coverage state of a single line.
///
/// Serializes to the integer contract renderers expect: `0` missed,
/// the hit count when hit, `-1` partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    Missed,
    Hit(u64),
    /// Executed, but a branch on this line was never taken.
    Partial,
}

impl LineStatus {
    #[must_use]
    pub fn from_hits(hits: u64) -> Self {
        if hits == 0 {
            LineStatus::Missed
        } else {
            LineStatus::Hit(hits)
        }
    }

    #[must_use]
    pub fn as_i64(self) -> i64 {
        match self {
            LineStatus::Missed => 0,
            LineStatus::Hit(hits) => i64::try_from(hits).unwrap_or(i64::MAX),
            LineStatus::Partial => -1,
        }
    }

    #[must_use]
    pub fn kind(self) -> LineKind {
        match self {
            LineStatus::Missed => LineKind::Missed,
            LineStatus::Hit(_) => LineKind::Hit,
            LineStatus::Partial => LineKind::Partial,
        }
    }
}

impl Serialize for LineStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

/// Display class of a line, as painted by renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Missed,
    Hit,
    Partial,
}

impl LineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineKind::Missed => "missed",
            LineKind::Hit => "hit",
            LineKind::Partial => "partial",
        }
    }
}

/// Coverage for one source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCoverage {
    /// 1-based line number → status.
    #[serde(flatten)]
    pub lines: BTreeMap<u32, LineStatus>,
    #[serde(skip)]
    pub total_statements: u64,
    #[serde(skip)]
    pub statements_hit: u64,
    #[serde(skip)]
    pub total_branches: u64,
    #[serde(skip)]
    pub branches_hit: u64,
    pub statement_coverage: f64,
    pub branch_coverage: f64,
    pub overall_coverage: f64,
}

impl FileCoverage {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn line(&self, number: u32) -> Option<LineStatus> {
        self.lines.get(&number).copied()
    }

    /// Derive the three percentages from the tallies.
    pub fn compute_percentages(&mut self) {
        self.statement_coverage = percentage(self.statements_hit, self.total_statements);
        self.branch_coverage = percentage(self.branches_hit, self.total_branches);
        self.overall_coverage = percentage(
            self.statements_hit.saturating_add(self.branches_hit),
            self.total_statements.saturating_add(self.total_branches),
        );
    }

    /// Line numbers with the given display class, ascending.
    #[must_use]
    pub fn lines_of_kind(&self, kind: LineKind) -> Vec<u32> {
        self.lines
            .iter()
            .filter(|(_, status)| status.kind() == kind)
            .map(|(&number, _)| number)
            .collect()
    }
}

/// Package-level rates, copied verbatim from a Cobertura document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSummary {
    pub name: String,
    pub line_rate: Option<f64>,
    pub branch_rate: Option<f64>,
}

/// Document-level aggregates, copied verbatim from a Cobertura `<coverage>`
/// root. Never recomputed from the per-file data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub line_rate: Option<f64>,
    pub branch_rate: Option<f64>,
    pub lines_covered: Option<u64>,
    pub branches_covered: Option<u64>,
    pub lines_valid: Option<u64>,
    pub branches_valid: Option<u64>,
    pub packages: Vec<PackageSummary>,
}

/// File path → coverage, as produced by a converter. Serializes as the bare
/// path map; the document summary stays out of the JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedCoverage {
    pub files: BTreeMap<String, FileCoverage>,
    #[serde(skip)]
    pub summary: Option<ReportSummary>,
}

impl NormalizedCoverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the coverage for a path as the host shows it. Report paths carry
    /// the repository's `pathPrefix`, host paths don't.
    #[must_use]
    pub fn lookup(&self, path_prefix: &str, host_path: &str) -> Option<&FileCoverage> {
        self.files.get(&format!("{path_prefix}{host_path}"))
    }
}

/// What the renderer receives for a reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    Available(NormalizedCoverage),
    /// Nothing to show; every failure path ends here.
    Empty,
}

impl Overlay {
    #[must_use]
    pub fn coverage(&self) -> Option<&NormalizedCoverage> {
        match self {
            Overlay::Available(coverage) => Some(coverage),
            Overlay::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Overlay::Empty)
    }
}
