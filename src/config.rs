//! User preferences: global flags plus one `RepoConfig` per repository.
//!
//! Preferences are read once per page view. The on-disk layout follows the
//! option keys the settings page stores (camelCase), with the same defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::convert::ReportFormat;
use crate::error::Result;
use crate::page::PageType;

/// Per-repository coverage settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepoConfig {
    /// `owner/repo`.
    pub repo_name: String,
    /// Report URL for branch pages; `$1` is replaced with the branch.
    pub branch_url_template: String,
    /// Report URL for pull-request pages; `$1` is replaced with the PR id.
    pub pr_url_template: String,
    /// Prefix report paths carry that the host's file paths don't.
    pub path_prefix: String,
    pub github_path_prefix: String,
    /// Re-authentication URL; `$1` is replaced with the current page URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url_template: Option<String>,
    pub filetype: ReportFormat,
}

impl RepoConfig {
    /// The report URL template that applies to a page type.
    pub fn url_template(&self, page_type: Option<PageType>) -> &str {
        match page_type {
            Some(PageType::Pull) => &self.pr_url_template,
            _ => &self.branch_url_template,
        }
    }

    /// The auth template, if one is configured. The settings page stores an
    /// empty string when the field is left blank.
    pub fn auth_template(&self) -> Option<&str> {
        self.auth_url_template
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}

/// Global flags and repository settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub overlay_enabled: bool,
    pub debug_enabled: bool,
    pub filetree_coverage_enabled: bool,
    /// Page URL to use instead of the real one while debugging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_url: Option<String>,
    pub repos: Vec<RepoConfig>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            overlay_enabled: true,
            debug_enabled: false,
            filetree_coverage_enabled: true,
            debug_url: None,
            repos: Vec::new(),
        }
    }
}

impl Preferences {
    /// Look up the settings for `owner/repo`.
    pub fn repo(&self, repo_name: &str) -> Option<&RepoConfig> {
        self.repos.iter().find(|r| r.repo_name == repo_name)
    }

    /// Replace the settings for the same repository, or append them.
    pub fn upsert_repo(&mut self, repo: RepoConfig) {
        match self.repos.iter_mut().find(|r| r.repo_name == repo.repo_name) {
            Some(existing) => *existing = repo,
            None => self.repos.push(repo),
        }
    }
}

/// Where preferences are loaded from and saved to.
pub trait PreferencesStore {
    fn load_options(&self) -> Result<Preferences>;

    fn save_options(&self, preferences: &Preferences) -> Result<()>;
}

/// Preferences kept in a JSON file. A missing file reads as the defaults.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferencesStore for JsonFileStore {
    fn load_options(&self) -> Result<Preferences> {
        if !self.path.exists() {
            return Ok(Preferences::default());
        }
        let content = std::fs::read(&self.path)?;
        Ok(serde_json::from_slice(&content)?)
    }

    fn save_options(&self, preferences: &Preferences) -> Result<()> {
        let mut content = serde_json::to_vec_pretty(preferences)?;
        content.push(b'\n');
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}
