/// Converter for Istanbul / NYC `coverage-final.json` reports.
///
/// Reference: https://github.com/istanbuljs/istanbuljs
///
/// The format is a JSON object keyed by file path. Each value contains:
///   - `statementMap`: `{ "0": { "start": { "line": 1, "column": 0 }, "end": { "line": 1, "column": 30 } }, ... }`
///   - `s`:            `{ "0": 5, "1": 0, ... }`: hit counts per statement
///   - `fnMap`:        `{ "0": { "name": "foo", "decl": ..., "loc": { "start": ..., "end": ... } }, ... }`
///   - `f`:            `{ "0": 3, ... }`: hit counts per function
///   - `branchMap`:    `{ "0": { "loc": ..., "type": "if", "locations": [...] }, ... }`
///   - `b`:            `{ "0": [5, 0], ... }`: hit counts per branch arm
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::de::IgnoredAny;
use serde_json::{Map, Value};
use tracing::debug;

use super::Converter;
use crate::error::{Result, UndercovError};
use crate::model::{FileCoverage, LineStatus, NormalizedCoverage};

/// Most lines a single statement, function or branch location may cover.
pub const MAX_SPAN_LINES: u32 = 100_000;

/// Istanbul JSON converter.
pub struct IstanbulConverter;

impl Converter for IstanbulConverter {
    fn convert(&self, input: &[u8]) -> Result<NormalizedCoverage> {
        convert(input)
    }
}

/// Convert Istanbul JSON from raw bytes.
pub fn convert(input: &[u8]) -> Result<NormalizedCoverage> {
    let mut coverage = NormalizedCoverage::new();
    if input.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(coverage);
    }

    // Walk the top-level object entry by entry so only one file's raw
    // report is held as a `Value` at a time.
    let mut deser = serde_json::Deserializer::from_slice(input);
    let visitor = ReportVisitor {
        files: &mut coverage.files,
    };
    let converted = serde::Deserializer::deserialize_map(&mut deser, visitor)?;
    deser.end()?;
    converted?;

    Ok(coverage)
}

/// Serde visitor over the top-level `{ path: entry }` map.
struct ReportVisitor<'a> {
    files: &'a mut BTreeMap<String, FileCoverage>,
}

impl<'de, 'a> serde::de::Visitor<'de> for ReportVisitor<'a> {
    /// Syntax errors abort deserialization; a bad file entry is reported
    /// once the whole document has been read.
    type Value = Result<()>;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("an Istanbul JSON object")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Result<()>, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut error = None;
        while let Some(file_path) = map.next_key::<String>()? {
            if error.is_some() {
                map.next_value::<IgnoredAny>()?;
                continue;
            }
            let entry: Value = map.next_value()?;
            match convert_file(&file_path, &entry) {
                Ok(Some(file)) => {
                    self.files.insert(file_path, file);
                }
                Ok(None) => debug!(file = %file_path, "no statement map, skipping"),
                Err(e) => error = Some(e),
            }
        }
        Ok(error.map_or(Ok(()), Err))
    }
}

/// Convert one file entry. Returns `None` for files without a
/// `statementMap`, which were not instrumented.
fn convert_file(file_path: &str, entry: &Value) -> Result<Option<FileCoverage>> {
    let Some(statement_map) = entry.get("statementMap").and_then(Value::as_object) else {
        return Ok(None);
    };
    let mut file = FileCoverage::new();

    // ── Statements and functions → lines ──────────────────────────
    let s = entry.get("s").and_then(Value::as_object);
    for (idx, location) in statement_map {
        let hits = counter(s, idx);
        if let Some(range) = line_range(location) {
            mark_range(&mut file.lines, checked_span(file_path, range)?, hits);
        }
        tally(&mut file.total_statements, &mut file.statements_hit, hits);
    }

    if let Some(fn_map) = entry.get("fnMap").and_then(Value::as_object) {
        let f = entry.get("f").and_then(Value::as_object);
        for (idx, function) in fn_map {
            let hits = counter(f, idx);
            let range = function
                .get("loc")
                .and_then(line_range)
                .or_else(|| function.get("decl").and_then(line_range));
            if let Some(range) = range {
                mark_range(&mut file.lines, checked_span(file_path, range)?, hits);
            }
            tally(&mut file.total_statements, &mut file.statements_hit, hits);
        }
    }

    // ── Branches → partial lines ──────────────────────────────────
    if let Some(branch_map) = entry.get("branchMap").and_then(Value::as_object) {
        let b = entry.get("b").and_then(Value::as_object);
        for (idx, branch) in branch_map {
            // `if` branches are left out of partial detection.
            if branch.get("type").and_then(Value::as_str) == Some("if") {
                continue;
            }

            let counts = b
                .and_then(|b| b.get(idx.as_str()))
                .and_then(Value::as_array);
            let locations = branch
                .get("locations")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for (arm, location) in locations.iter().enumerate() {
                let hits = counts
                    .and_then(|c| c.get(arm))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                // Implicit arms (e.g. a missing `else`) may carry an empty
                // location; fall back to the branch's own span.
                let range = line_range(location).or_else(|| branch.get("loc").and_then(line_range));
                if hits == 0 {
                    if let Some(range) = range {
                        downgrade_range(&mut file.lines, checked_span(file_path, range)?);
                    }
                }
                tally(&mut file.total_branches, &mut file.branches_hit, hits);
            }
        }
    }

    file.compute_percentages();
    Ok(Some(file))
}

fn counter(counts: Option<&Map<String, Value>>, idx: &str) -> u64 {
    counts
        .and_then(|c| c.get(idx))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

fn tally(total: &mut u64, hit: &mut u64, hits: u64) {
    *total += 1;
    if hits > 0 {
        *hit += 1;
    }
}

/// Inclusive `[start.line, end.line]` of a location. A missing end line
/// means a single-line location.
fn line_range(location: &Value) -> Option<(u32, u32)> {
    let line_of = |key: &str| {
        location
            .get(key)
            .and_then(|p| p.get("line"))
            .and_then(Value::as_u64)
            .and_then(|l| u32::try_from(l).ok())
    };
    let start = line_of("start")?;
    let end = line_of("end").unwrap_or(start).max(start);
    Some((start, end))
}

/// Reject locations longer than any real source construct; every line of a
/// range becomes a map entry.
fn checked_span(file_path: &str, (start, end): (u32, u32)) -> Result<(u32, u32)> {
    if end - start >= MAX_SPAN_LINES {
        return Err(UndercovError::Parse(format!(
            "{file_path}: location spans lines {start}-{end}, limit is {MAX_SPAN_LINES}"
        )));
    }
    Ok((start, end))
}

/// Record `hits` on every line of the range. A line that was missed once
/// stays missed; among hits the highest count is kept.
fn mark_range(lines: &mut BTreeMap<u32, LineStatus>, (start, end): (u32, u32), hits: u64) {
    for line in start..=end {
        match lines.entry(line) {
            Entry::Vacant(e) => {
                e.insert(LineStatus::from_hits(hits));
            }
            Entry::Occupied(mut e) => {
                let merged = match (*e.get(), hits) {
                    (LineStatus::Missed, _) | (_, 0) => LineStatus::Missed,
                    (LineStatus::Hit(prev), hits) => LineStatus::Hit(prev.max(hits)),
                    (LineStatus::Partial, _) => LineStatus::Partial,
                };
                e.insert(merged);
            }
        }
    }
}

/// Downgrade hit lines in the range to partial. Missed lines stay missed.
fn downgrade_range(lines: &mut BTreeMap<u32, LineStatus>, (start, end): (u32, u32)) {
    for line in start..=end {
        if let Some(status) = lines.get_mut(&line) {
            if matches!(status, LineStatus::Hit(_)) {
                *status = LineStatus::Partial;
            }
        }
    }
}
