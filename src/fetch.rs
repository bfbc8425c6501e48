//! Coverage retrieval with its recovery flows.
//!
//! A fetch never fails to its caller. Every response is classified into an
//! [`Attempt`]: data, a recoverable condition (missing host permission, or
//! an authentication wall), or a fatal one. Recovery is bounded: a granted
//! permission buys exactly one retry, and authentication redirects at most
//! once per page, tracked by a marker flag on the page URL.

use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::config::RepoConfig;
use crate::convert::RawCoverageReport;
use crate::error::FailureKind;
use crate::host::{Navigator, Notice, Notifier, PermissionBroker};
use crate::http::{HttpClient, HttpResponse, STATUS_UNREACHABLE};
use crate::model::CoverageReference;
use crate::page::PageType;

/// Query flag appended to the page URL before an auth redirect. Seeing it on
/// the way back means the redirect already happened once.
pub const AUTH_MARKER: &str = "undercov_auth";

/// Placeholder substituted in URL templates.
const PLACEHOLDER: &str = "$1";

/// How a fetch ended.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Report(RawCoverageReport),
    Empty(FailureKind),
    /// The browser was sent to the auth page; the flow ends here.
    Redirected { url: String },
}

/// Classification of a single response.
#[derive(Debug)]
enum Attempt {
    Ok(Vec<u8>),
    Recoverable(Recovery),
    Fatal(FailureKind),
}

#[derive(Debug)]
enum Recovery {
    /// Status 0: ask for host permission, then retry.
    Permission,
    /// 403 with an auth template configured.
    Authentication,
}

fn classify(response: HttpResponse, repo: &RepoConfig) -> Attempt {
    let status = response.status;
    match status {
        _ if response.is_success() => Attempt::Ok(response.body),
        STATUS_UNREACHABLE => Attempt::Recoverable(Recovery::Permission),
        403 if repo.auth_template().is_some() => Attempt::Recoverable(Recovery::Authentication),
        status => Attempt::Fatal(FailureKind::ServerError(status)),
    }
}

/// Replace every `$1` in a template.
pub fn substitute(template: &str, value: &str) -> String {
    template.replace(PLACEHOLDER, value)
}

/// The report URL for a reference on a page type.
pub fn coverage_url(
    repo: &RepoConfig,
    page_type: Option<PageType>,
    reference: &CoverageReference,
) -> String {
    substitute(repo.url_template(page_type), reference.as_str())
}

/// `scheme://host[:port]` of a URL, if it has one.
pub fn origin_of(url: &str) -> Option<String> {
    let origin = Url::parse(url).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

pub fn has_auth_marker(page_url: &str) -> bool {
    match Url::parse(page_url) {
        Ok(url) => url.query_pairs().any(|(key, _)| key == AUTH_MARKER),
        Err(_) => page_url.contains(AUTH_MARKER),
    }
}

pub fn with_auth_marker(page_url: &str) -> String {
    match Url::parse(page_url) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(AUTH_MARKER, "1");
            url.to_string()
        }
        Err(_) => {
            let separator = if page_url.contains('?') { '&' } else { '?' };
            format!("{page_url}{separator}{AUTH_MARKER}=1")
        }
    }
}

/// Retrieves raw coverage reports for references.
pub struct Fetcher {
    http: Arc<dyn HttpClient>,
    permissions: Arc<dyn PermissionBroker>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl Fetcher {
    pub fn new(
        http: Arc<dyn HttpClient>,
        permissions: Arc<dyn PermissionBroker>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            http,
            permissions,
            notifier,
            navigator,
        }
    }

    /// Fetch the report for `reference`. `repo` is `None` when the active
    /// repository has no settings, which short-circuits without a request.
    /// `page_url` is the page being overlaid; authentication returns to it.
    pub async fn fetch(
        &self,
        reference: &CoverageReference,
        page_type: Option<PageType>,
        repo: Option<&RepoConfig>,
        page_url: &str,
    ) -> FetchOutcome {
        let Some(repo) = repo else {
            warn!(%reference, "no repository configuration, not fetching");
            return FetchOutcome::Empty(FailureKind::ConfigMissing);
        };

        let url = coverage_url(repo, page_type, reference);
        if url.trim().is_empty() {
            warn!(repo = %repo.repo_name, page = ?page_type, "no report URL template configured");
            return FetchOutcome::Empty(FailureKind::ConfigMissing);
        }
        debug!(%url, "retrieving coverage");

        let mut permission_requested = false;
        loop {
            let response = self.http.get(&url).await;
            match classify(response, repo) {
                Attempt::Ok(body) => {
                    debug!(%url, bytes = body.len(), "coverage retrieved");
                    return FetchOutcome::Report(RawCoverageReport {
                        format: repo.filetype,
                        url,
                        body,
                    });
                }
                Attempt::Recoverable(Recovery::Permission) if !permission_requested => {
                    permission_requested = true;
                    if !self.request_permission(&url).await {
                        return FetchOutcome::Empty(FailureKind::NetworkUnreachable);
                    }
                    debug!(%url, "permission granted, retrying once");
                }
                Attempt::Recoverable(Recovery::Permission) => {
                    warn!(%url, "coverage server still unreachable after permission grant");
                    return FetchOutcome::Empty(FailureKind::NetworkUnreachable);
                }
                Attempt::Recoverable(Recovery::Authentication) => {
                    return self.authenticate(repo, page_url);
                }
                Attempt::Fatal(kind) => {
                    warn!(%url, error = %kind, "coverage request failed");
                    return FetchOutcome::Empty(kind);
                }
            }
        }
    }

    async fn request_permission(&self, url: &str) -> bool {
        let Some(origin) = origin_of(url) else {
            warn!(%url, "report URL has no origin to request permission for");
            return false;
        };
        info!(%origin, "requesting host permission");
        let granted = self.permissions.request_permission(&origin).await;
        if !granted {
            info!(%origin, "host permission denied");
        }
        granted
    }

    /// Redirect to the auth page once; if the page already carries the
    /// marker, report the failure instead.
    fn authenticate(&self, repo: &RepoConfig, page_url: &str) -> FetchOutcome {
        let Some(template) = repo.auth_template() else {
            return FetchOutcome::Empty(FailureKind::ServerError(403));
        };

        if has_auth_marker(page_url) {
            warn!(page = %page_url, "still unauthorized after redirect");
            self.notifier.notify(Notice::persistent(format!(
                "Could not authenticate with the coverage server for {}. \
                 Coverage is unavailable on this page.",
                repo.repo_name
            )));
            return FetchOutcome::Empty(FailureKind::AuthRequired);
        }

        let target = substitute(template, &with_auth_marker(page_url));
        info!(%target, "redirecting to authenticate");
        self.notifier.notify(Notice::transient(format!(
            "Redirecting to authenticate with the coverage server for {}.",
            repo.repo_name
        )));
        self.navigator.navigate(&target);
        FetchOutcome::Redirected { url: target }
    }
}
