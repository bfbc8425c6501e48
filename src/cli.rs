//! Command handler functions for the undercov CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::config::{Preferences, PreferencesStore, RepoConfig};
use crate::convert::{self, RawCoverageReport, ReportFormat};
use crate::github::GithubReferences;
use crate::host::{ConfigDiscovery, Host, Navigator, Notice, Notifier, PermissionBroker};
use crate::http::HttpClient;
use crate::overlay::{self, RefreshOutcome};
use crate::render::{ratio, TextRenderer};

/// Grants permission only to origins listed on the command line.
struct AllowList {
    origins: Vec<String>,
}

#[async_trait]
impl PermissionBroker for AllowList {
    async fn request_permission(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.origins
            .iter()
            .any(|allowed| allowed.trim_end_matches('/') == origin)
    }
}

#[derive(Default)]
struct CollectedNotices(Mutex<Vec<Notice>>);

impl Notifier for CollectedNotices {
    fn notify(&self, notice: Notice) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).push(notice);
    }
}

/// A page that never changes; navigation is only recorded.
struct FixedPage {
    url: String,
    navigated: Mutex<Option<String>>,
}

impl Navigator for FixedPage {
    fn current_url(&self) -> String {
        self.url.clone()
    }

    fn navigate(&self, url: &str) {
        *self.navigated.lock().unwrap_or_else(|e| e.into_inner()) = Some(url.to_string());
    }
}

struct LogDiscovery;

impl ConfigDiscovery for LogDiscovery {
    fn config_discoverable(&self, repo_name: &str) {
        info!(repo = %repo_name, "repository can be configured");
    }
}

/// Run one page view against `page_url` and describe what it showed.
pub async fn cmd_overlay(
    preferences: Preferences,
    http: Arc<dyn HttpClient>,
    page_url: &str,
    branch: Option<String>,
    allow_origins: Vec<String>,
) -> Result<String> {
    if !preferences.overlay_enabled {
        return Ok("Overlay is disabled in preferences.\n".to_string());
    }

    let notices = Arc::new(CollectedNotices::default());
    let renderer = Arc::new(TextRenderer::new());
    let host = Host {
        http,
        permissions: Arc::new(AllowList {
            origins: allow_origins,
        }),
        notifier: notices.clone(),
        navigator: Arc::new(FixedPage {
            url: page_url.to_string(),
            navigated: Mutex::new(None),
        }),
        references: Arc::new(GithubReferences::new(branch)),
        discovery: Arc::new(LogDiscovery),
        renderer: renderer.clone(),
    };

    let Some(coordinator) = overlay::bootstrap(preferences, host) else {
        return Ok(format!("Not a supported page: {page_url}\n"));
    };

    let mut out = String::new();
    match coordinator.refresh().await {
        RefreshOutcome::AlreadyRefreshing => {
            writeln!(out, "A refresh is already in progress.").unwrap();
        }
        RefreshOutcome::NoReference => {
            writeln!(out, "No branch or pull request found on {page_url}").unwrap();
        }
        RefreshOutcome::ConfigMissing { repo_name } => {
            writeln!(
                out,
                "Repository '{repo_name}' is not configured. \
                 Add it with `undercov config add-repo {repo_name} --branch-url <template>`."
            )
            .unwrap();
        }
        RefreshOutcome::Redirected { url } => {
            writeln!(out, "Redirecting to {url}").unwrap();
        }
        RefreshOutcome::Delivered {
            reference, failure, ..
        } => {
            out.push_str(&renderer.take_output());
            if let Some(kind) = failure {
                writeln!(out, "Coverage for '{reference}' unavailable: {kind}").unwrap();
            }
        }
    }

    for notice in notices.0.lock().unwrap_or_else(|e| e.into_inner()).iter() {
        writeln!(out, "[{}] {}", notice.title, notice.message).unwrap();
    }
    Ok(out)
}

/// Convert a report file offline and summarize it per file.
pub fn cmd_convert(file: &Path, format: &str, json: bool) -> Result<String> {
    let format: ReportFormat = format.parse()?;
    let body = std::fs::read(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let raw = RawCoverageReport {
        format,
        url: file.display().to_string(),
        body,
    };
    let coverage = convert::convert(&raw)
        .with_context(|| format!("Failed to convert {} as {format}", file.display()))?;

    if json {
        let mut out = serde_json::to_string_pretty(&coverage)?;
        out.push('\n');
        return Ok(out);
    }

    if coverage.files.is_empty() {
        return Ok(format!("No files in {}\n", file.display()));
    }

    let mut out = String::new();
    writeln!(
        out,
        "{:<60} {:>8} {:>8} {:>8}",
        "FILE", "STMTS", "BRANCHES", "OVERALL"
    )
    .unwrap();
    writeln!(out, "{}", "-".repeat(88)).unwrap();
    for (path, f) in &coverage.files {
        writeln!(
            out,
            "{:<60} {:>7}% {:>7}% {:>7.2}%",
            path,
            ratio(f.statements_hit, f.total_statements),
            ratio(f.branches_hit, f.total_branches),
            f.overall_coverage
        )
        .unwrap();
    }
    // Cobertura carries document totals; they are reported as given.
    if let Some(summary) = &coverage.summary {
        if let (Some(covered), Some(valid)) = (summary.lines_covered, summary.lines_valid) {
            writeln!(
                out,
                "Lines:      {covered}/{valid} ({:.1}%)",
                summary.line_rate.unwrap_or_default() * 100.0
            )
            .unwrap();
        }
        if let (Some(covered), Some(valid)) = (summary.branches_covered, summary.branches_valid) {
            if valid > 0 {
                writeln!(
                    out,
                    "Branches:   {covered}/{valid} ({:.1}%)",
                    summary.branch_rate.unwrap_or_default() * 100.0
                )
                .unwrap();
            }
        }
    }
    Ok(out)
}

pub fn cmd_config_show(store: &dyn PreferencesStore) -> Result<String> {
    let preferences = store.load_options()?;
    let mut out = serde_json::to_string_pretty(&preferences)?;
    out.push('\n');
    Ok(out)
}

pub fn cmd_config_add_repo(store: &dyn PreferencesStore, repo: RepoConfig) -> Result<String> {
    if repo.repo_name.split('/').filter(|s| !s.is_empty()).count() != 2 {
        anyhow::bail!("Repository name must be 'owner/repo', got '{}'", repo.repo_name);
    }
    let mut preferences = store.load_options()?;
    let replaced = preferences.repo(&repo.repo_name).is_some();
    let name = repo.repo_name.clone();
    preferences.upsert_repo(repo);
    store.save_options(&preferences)?;
    Ok(if replaced {
        format!("Updated repository '{name}'\n")
    } else {
        format!("Added repository '{name}'\n")
    })
}
