/// Converter for Cobertura XML coverage reports.
///
/// Cobertura XML structure:
///   <coverage line-rate="..." branch-rate="..." lines-covered="..." lines-valid="..."
///             branches-covered="..." branches-valid="...">
///     <packages>
///       <package name="..." line-rate="..." branch-rate="...">
///         <classes>
///           <class name="..." filename="...">
///             <methods>
///               <method name="...">
///                 <lines><line number="..." hits="..." .../></lines>
///               </method>
///             </methods>
///             <lines>
///               <line number="..." hits="..." branch="true|false"
///                     condition-coverage="50% (1/2)" />
///             </lines>
///           </class>
///         </classes>
///       </package>
///     </packages>
///   </coverage>
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::str;
use std::sync::LazyLock;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use regex::Regex;

/// Pre-compiled regex for condition-coverage attributes like "75% (3/4)".
static BRANCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+)/(\d+)\)").expect("valid branch regex"));

use super::Converter;
use crate::error::{Result, UndercovError};
use crate::model::*;

pub struct CoberturaConverter;

impl Converter for CoberturaConverter {
    fn convert(&self, input: &[u8]) -> Result<NormalizedCoverage> {
        convert(input)
    }
}

/// A `<line>` as read, before the per-file statuses are derived.
#[derive(Debug, Clone, Copy)]
struct LineRecord {
    hits: u64,
    /// `(taken, total)` from `condition-coverage` on branch lines.
    conditions: Option<(u64, u64)>,
}

pub fn convert(input: &[u8]) -> Result<NormalizedCoverage> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut summary = ReportSummary::default();

    // Several <class> elements may share a filename; their lines accumulate.
    let mut files: BTreeMap<String, BTreeMap<u32, LineRecord>> = BTreeMap::new();
    let mut current_file: Option<String> = None;

    let branch_re = &*BRANCH_RE;

    loop {
        let event = reader.read_event_into(&mut buf);
        let is_start_event = matches!(&event, Ok(Event::Start(_)));
        match event {
            Err(source) => {
                return Err(UndercovError::Xml {
                    source,
                    position: reader.buffer_position(),
                })
            }
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let local_name = e.name();
                let local = local_name.as_ref().to_vec();

                match local.as_slice() {
                    b"coverage" => {
                        let attrs = attr_map(e);
                        summary.line_rate = parse_attr(&attrs, "line-rate");
                        summary.branch_rate = parse_attr(&attrs, "branch-rate");
                        summary.lines_covered = parse_attr(&attrs, "lines-covered");
                        summary.branches_covered = parse_attr(&attrs, "branches-covered");
                        summary.lines_valid = parse_attr(&attrs, "lines-valid");
                        summary.branches_valid = parse_attr(&attrs, "branches-valid");
                    }
                    b"package" => {
                        let attrs = attr_map(e);
                        summary.packages.push(PackageSummary {
                            name: attrs.get("name").cloned().unwrap_or_default(),
                            line_rate: parse_attr(&attrs, "line-rate"),
                            branch_rate: parse_attr(&attrs, "branch-rate"),
                        });
                    }
                    b"class" => {
                        let attrs = attr_map(e);
                        if let Some(filename) = attrs.get("filename") {
                            files.entry(filename.clone()).or_default();
                            // A self-closing <class/> has no lines and no End event.
                            if is_start_event {
                                current_file = Some(filename.clone());
                            }
                        }
                    }
                    b"line" => {
                        if let Some(lines) = current_file.as_ref().and_then(|f| files.get_mut(f)) {
                            record_line(lines, &attr_map(e), branch_re);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"class" {
                    current_file = None;
                }
            }
            _ => {}
        }
        buf.clear();
    }

    let files = files
        .into_iter()
        .map(|(path, lines)| (path, file_coverage(&lines)))
        .collect();

    Ok(NormalizedCoverage {
        files,
        summary: Some(summary),
    })
}

/// Record one `<line>` into its file's line table.
fn record_line(lines: &mut BTreeMap<u32, LineRecord>, attrs: &HashMap<String, String>, branch_re: &Regex) {
    let Some(line_number) = attrs.get("number").and_then(|n| n.parse::<u32>().ok()) else {
        return;
    };
    let hits = attrs
        .get("hits")
        .and_then(|h| h.parse::<u64>().ok())
        .unwrap_or(0);

    let is_branch = attrs.get("branch").map(|v| v == "true").unwrap_or(false);
    let conditions: Option<(u64, u64)> = if is_branch {
        attrs
            .get("condition-coverage")
            .and_then(|cond| branch_re.captures(cond))
            .and_then(|caps| Some((caps[1].parse().ok()?, caps[2].parse().ok()?)))
    } else {
        None
    };

    // Lines may appear both under <method><lines> and <class><lines>: keep
    // the max hit count and the first condition coverage seen so branches
    // count once.
    lines
        .entry(line_number)
        .and_modify(|record| {
            record.hits = record.hits.max(hits);
            record.conditions = record.conditions.or(conditions);
        })
        .or_insert(LineRecord { hits, conditions });
}

/// Derive line statuses and percentages for one file.
fn file_coverage(lines: &BTreeMap<u32, LineRecord>) -> FileCoverage {
    let mut file = FileCoverage::new();

    for (&number, record) in lines {
        let status = match record.conditions {
            Some((taken, total)) if taken != total && record.hits > 0 => LineStatus::Partial,
            _ => LineStatus::from_hits(record.hits),
        };
        file.lines.insert(number, status);

        file.total_statements += 1;
        if record.hits > 0 {
            file.statements_hit += 1;
        }
        // Condition counts come straight from the document and may be huge.
        if let Some((taken, total)) = record.conditions {
            file.total_branches = file.total_branches.saturating_add(total);
            file.branches_hit = file.branches_hit.saturating_add(taken.min(total));
        }
    }

    file.compute_percentages();
    file
}

fn parse_attr<T: str::FromStr>(attrs: &HashMap<String, String>, key: &str) -> Option<T> {
    attrs.get(key).and_then(|v| v.trim().parse().ok())
}

/// Extract attributes from an XML element into a HashMap.
fn attr_map(e: &quick_xml::events::BytesStart) -> HashMap<String, String> {
    e.attributes()
        .filter_map(|a| {
            let attr = a.ok()?;
            let key = str::from_utf8(attr.key.local_name().into_inner())
                .ok()?
                .to_string();
            let value = attr.unescape_value().ok()?.to_string();
            Some((key, value))
        })
        .collect()
}
