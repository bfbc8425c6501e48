//! The page being overlaid: its URL and what kind of page it is.
use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Result, UndercovError};

/// Kinds of repository pages, from the path segment after `owner/repo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Blob,
    Compare,
    Pull,
    Commit,
    Blame,
    Tree,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Blob => "blob",
            PageType::Compare => "compare",
            PageType::Pull => "pull",
            PageType::Commit => "commit",
            PageType::Blame => "blame",
            PageType::Tree => "tree",
        }
    }
}

impl FromStr for PageType {
    type Err = UndercovError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "blob" => Ok(PageType::Blob),
            "compare" => Ok(PageType::Compare),
            "pull" => Ok(PageType::Pull),
            "commit" => Ok(PageType::Commit),
            "blame" => Ok(PageType::Blame),
            "tree" => Ok(PageType::Tree),
            _ => Err(UndercovError::Parse(format!("Unknown page type: '{s}'"))),
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed page URL of the form `<host>/<owner>/<repo>/<page>/<ref>/<path...>`.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLocation {
    url: Url,
    segments: Vec<String>,
}

impl PageLocation {
    /// Parse a page URL. Query and fragment are not part of the segments.
    pub fn parse(url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        let segments = url
            .path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        Ok(Self { url, segments })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// `owner/repo`, when the URL points into a repository.
    pub fn repo_name(&self) -> Option<String> {
        match self.segments.as_slice() {
            [owner, repo, ..] => Some(format!("{owner}/{repo}")),
            _ => None,
        }
    }

    /// `None` on a repository's root page, or for page kinds not listed in
    /// [`PageType`].
    pub fn page_type(&self) -> Option<PageType> {
        self.segments.get(2).and_then(|s| s.parse().ok())
    }

    /// True for `<host>/<owner>/<repo>` with nothing after it.
    pub fn is_repo_root(&self) -> bool {
        self.segments.len() == 2
    }

    /// The branch, commit or pull-request segment.
    pub fn ref_segment(&self) -> Option<&str> {
        self.segments.get(3).map(String::as_str)
    }

    /// Path inside the repository on blob and tree pages; empty when absent.
    pub fn repo_path(&self) -> String {
        self.segments.get(4..).map(|s| s.join("/")).unwrap_or_default()
    }
}
