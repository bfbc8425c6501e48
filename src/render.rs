//! Text rendering of overlays, plus the display helpers any renderer needs.

use std::fmt::Write;
use std::sync::Mutex;

use crate::host::{RenderContext, Renderer};
use crate::model::{FileCoverage, LineKind, NormalizedCoverage, Overlay};
use crate::page::PageType;

/// Coverage badge thresholds, as a percentage.
const HIGH_THRESHOLD: f64 = 80.0;
const MEDIUM_THRESHOLD: f64 = 60.0;

/// Report file name that sits next to the per-file HTML pages.
const JSON_REPORT_NAME: &str = "coverage-final.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageBadge {
    High,
    Medium,
    Low,
}

impl CoverageBadge {
    #[must_use]
    pub fn for_percentage(pct: f64) -> Self {
        if pct >= HIGH_THRESHOLD {
            CoverageBadge::High
        } else if pct >= MEDIUM_THRESHOLD {
            CoverageBadge::Medium
        } else {
            CoverageBadge::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageBadge::High => "high",
            CoverageBadge::Medium => "med",
            CoverageBadge::Low => "low",
        }
    }
}

/// Hit ratio for display: "100" when fully hit, two decimals when partly
/// hit, "0" otherwise.
#[must_use]
pub fn ratio(hit: u64, total: u64) -> String {
    if hit >= total {
        "100".to_string()
    } else if hit > 0 {
        format!("{:.2}", hit as f64 / total as f64 * 100.0)
    } else {
        "0".to_string()
    }
}

/// Link to the HTML report page for a file, assuming the server publishes
/// it next to the JSON report.
#[must_use]
pub fn report_link(report_url: &str, file_path: &str) -> String {
    format!("{}{file_path}.html", report_url.replace(JSON_REPORT_NAME, ""))
}

/// Coalesce sorted line numbers into ranges.
#[must_use]
pub fn coalesce_ranges(lines: &[u32]) -> Vec<(u32, u32)> {
    let mut ranges: Vec<(u32, u32)> = Vec::new();
    for &line in lines {
        match ranges.last_mut() {
            Some((_, end)) if line == *end + 1 => *end = line,
            _ => ranges.push((line, line)),
        }
    }
    ranges
}

/// Format sorted line numbers as compact ranges, e.g. "1-3, 7, 9-10".
#[must_use]
pub fn format_line_ranges(lines: &[u32]) -> String {
    coalesce_ranges(lines)
        .iter()
        .map(|&(s, e)| {
            if s == e {
                format!("{s}")
            } else {
                format!("{s}-{e}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render an overlay as text. Pure; [`TextRenderer`] collects its output.
#[must_use]
pub fn render_text(overlay: &Overlay, context: &RenderContext) -> String {
    let mut out = String::new();
    let coverage = match overlay {
        Overlay::Available(coverage) => coverage,
        Overlay::Empty => {
            writeln!(out, "No coverage available for '{}'.", context.reference).unwrap();
            return out;
        }
    };

    match context.page_type {
        None | Some(PageType::Tree) => {
            if context.filetree_coverage_enabled {
                render_tree(&mut out, coverage, context);
            }
        }
        Some(PageType::Blob) => {
            let path = context.location.repo_path();
            match coverage.lookup(&context.repo.path_prefix, &path) {
                Some(file) => render_file(&mut out, &path, file, context),
                None => writeln!(out, "No coverage for '{path}'.").unwrap(),
            }
        }
        Some(PageType::Pull) => {
            for (report_path, file) in &coverage.files {
                let path = report_path
                    .strip_prefix(context.repo.path_prefix.as_str())
                    .unwrap_or(report_path);
                render_file(&mut out, path, file, context);
            }
        }
        Some(PageType::Commit | PageType::Compare | PageType::Blame) => {}
    }
    out
}

/// Per-file percentages for the directory shown on a tree page.
fn render_tree(out: &mut String, coverage: &NormalizedCoverage, context: &RenderContext) {
    let dir = context.location.repo_path();
    let prefix = if dir.is_empty() {
        context.repo.path_prefix.clone()
    } else {
        format!("{}{}/", context.repo.path_prefix, dir)
    };

    writeln!(out, "{:<60} {:>8} {:>6}", "FILE", "COVERAGE", "").unwrap();
    writeln!(out, "{}", "-".repeat(76)).unwrap();
    for (report_path, file) in &coverage.files {
        let Some(relative) = report_path.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let badge = CoverageBadge::for_percentage(file.overall_coverage);
        writeln!(
            out,
            "{:<60} {:>7.2}% {:>6}",
            relative,
            file.overall_coverage,
            badge.as_str()
        )
        .unwrap();
    }
}

/// Summary line, report link, and missed/partial line ranges for one file.
fn render_file(out: &mut String, path: &str, file: &FileCoverage, context: &RenderContext) {
    let template = context.repo.url_template(context.page_type);
    let report_url = crate::fetch::coverage_url(&context.repo, context.page_type, &context.reference);
    writeln!(
        out,
        "{path}  {:.2}% (statements {}%, branches {}%)",
        file.overall_coverage,
        ratio(file.statements_hit, file.total_statements),
        ratio(file.branches_hit, file.total_branches),
    )
    .unwrap();
    if !template.is_empty() {
        writeln!(out, "  report: {}", report_link(&report_url, path)).unwrap();
    }

    let missed = file.lines_of_kind(LineKind::Missed);
    if !missed.is_empty() {
        writeln!(out, "  missed: {}", format_line_ranges(&missed)).unwrap();
    }
    let partial = file.lines_of_kind(LineKind::Partial);
    if !partial.is_empty() {
        writeln!(out, "  partial: {}", format_line_ranges(&partial)).unwrap();
    }
}

/// Renderer that keeps the text it renders.
#[derive(Debug, Default)]
pub struct TextRenderer {
    output: Mutex<String>,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything rendered so far, leaving the buffer empty.
    pub fn take_output(&self) -> String {
        std::mem::take(&mut *self.output.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl Renderer for TextRenderer {
    fn visualize_overlay(&self, overlay: &Overlay, context: &RenderContext) {
        let text = render_text(overlay, context);
        self.output
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_str(&text);
    }
}
