//! GitHub specifics: which pages carry a coverage reference, and where a
//! repository advertises its configuration file.

use tracing::debug;
use url::Url;

use crate::host::{AcquiredReference, ReferenceAcquirer};
use crate::model::CoverageReference;
use crate::page::{PageLocation, PageType};

const GITHUB_HOST: &str = "github.com";

/// Marker in a file name that identifies an undercov configuration file.
const CONFIG_FILE_MARKER: &str = "undercov";

/// The overlay only runs on GitHub pages.
pub fn is_supported_host(url: &str) -> bool {
    match Url::parse(url) {
        Ok(url) => url.scheme() == "https" && url.host_str() == Some(GITHUB_HOST),
        Err(_) => false,
    }
}

/// Resolves references from GitHub page URLs.
#[derive(Debug, Clone, Default)]
pub struct GithubReferences {
    /// Branch shown in the branch selector of a repository's root page,
    /// which the URL doesn't carry.
    pub selected_branch: Option<String>,
}

impl GithubReferences {
    pub fn new(selected_branch: Option<String>) -> Self {
        Self { selected_branch }
    }
}

impl ReferenceAcquirer for GithubReferences {
    fn acquire_reference(&self, location: &PageLocation) -> Option<AcquiredReference> {
        let repo_name = location.repo_name()?;
        let page_type = location.page_type();
        debug!(page = ?page_type, repo = %repo_name, "acquiring reference");

        let reference = match page_type {
            Some(PageType::Commit | PageType::Blob | PageType::Tree | PageType::Pull) => {
                location.ref_segment().map(str::to_string)
            }
            None if location.is_repo_root() => self.selected_branch.clone(),
            _ => None,
        }?;

        Some(AcquiredReference {
            repo_name,
            reference: CoverageReference::new(reference)?,
        })
    }
}

/// Find a configuration file among file-tree links and return its raw link.
///
/// Links look like `/owner/repo/blob/main/.undercov.json`; the raw link
/// replaces `blob` with `raw`.
pub fn find_config_link<'a, I>(hrefs: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    hrefs
        .into_iter()
        .filter(|href| href.contains("blob"))
        .find(|href| {
            href.rsplit('/')
                .next()
                .is_some_and(|name| name.contains(CONFIG_FILE_MARKER))
        })
        .map(raw_link)
}

fn raw_link(href: &str) -> String {
    let mut split: Vec<&str> = href.split('/').collect();
    if split.len() > 3 {
        split[3] = "raw";
    }
    split.join("/")
}
