//! The overlay refresh coordinator: one per page view.
//!
//! `refresh()` runs acquire reference → reuse or fetch → convert → render.
//! The coordinator's state is `Idle` or `Refreshing`; a refresh requested
//! while another is outstanding is dropped, not queued, since the next
//! navigation event triggers a fresh one anyway.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::cache::CoverageCache;
use crate::config::{Preferences, RepoConfig};
use crate::convert;
use crate::error::FailureKind;
use crate::fetch::{FetchOutcome, Fetcher};
use crate::github;
use crate::host::{Host, RenderContext};
use crate::model::{CoverageReference, Overlay};
use crate::page::PageLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// What a call to [`OverlayCoordinator::refresh`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Another refresh was in flight; this one did nothing.
    AlreadyRefreshing,
    /// The page has no reference to fetch coverage for.
    NoReference,
    /// The repository has no settings; discovery was signalled instead.
    ConfigMissing { repo_name: String },
    /// The browser is being sent to authenticate.
    Redirected { url: String },
    /// The renderer received an overlay.
    Delivered {
        reference: CoverageReference,
        overlay: Arc<Overlay>,
        /// Served from the cache, without a fetch.
        cached: bool,
        /// Why the overlay is empty, when it was fetched just now and is.
        failure: Option<FailureKind>,
    },
}

/// Resets the state to `Idle` when the refresh ends, however it ends.
struct RefreshGuard<'a> {
    state: &'a Mutex<RefreshState>,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        *lock(self.state) = RefreshState::Idle;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct OverlayCoordinator {
    preferences: Preferences,
    host: Host,
    fetcher: Fetcher,
    state: Mutex<RefreshState>,
    cache: Mutex<CoverageCache>,
}

impl OverlayCoordinator {
    pub fn new(preferences: Preferences, host: Host) -> Self {
        let fetcher = Fetcher::new(
            Arc::clone(&host.http),
            Arc::clone(&host.permissions),
            Arc::clone(&host.notifier),
            Arc::clone(&host.navigator),
        );
        Self {
            preferences,
            host,
            fetcher,
            state: Mutex::new(RefreshState::Idle),
            cache: Mutex::new(CoverageCache::new()),
        }
    }

    pub fn state(&self) -> RefreshState {
        *lock(&self.state)
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Number of references with a cached overlay.
    pub fn cached_references(&self) -> usize {
        lock(&self.cache).len()
    }

    /// The URL the page view is working against.
    fn page_url(&self) -> String {
        self.preferences
            .debug_url
            .clone()
            .unwrap_or_else(|| self.host.navigator.current_url())
    }

    /// Bring the overlay up to date with the current page.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(_guard) = self.begin_refresh() else {
            debug!("refresh already in progress");
            return RefreshOutcome::AlreadyRefreshing;
        };
        self.run_refresh().await
    }

    fn begin_refresh(&self) -> Option<RefreshGuard<'_>> {
        let mut state = lock(&self.state);
        if *state == RefreshState::Refreshing {
            return None;
        }
        *state = RefreshState::Refreshing;
        Some(RefreshGuard { state: &self.state })
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        let page_url = self.page_url();
        let location = match PageLocation::parse(&page_url) {
            Ok(location) => location,
            Err(e) => {
                warn!(url = %page_url, error = %e, "cannot parse page URL");
                return RefreshOutcome::NoReference;
            }
        };

        let Some(acquired) = self.host.references.acquire_reference(&location) else {
            debug!(url = %page_url, "no reference on this page");
            return RefreshOutcome::NoReference;
        };
        let reference = acquired.reference;

        let Some(repo) = self.preferences.repo(&acquired.repo_name).cloned() else {
            info!(repo = %acquired.repo_name, "repository not configured");
            self.host.discovery.config_discoverable(&acquired.repo_name);
            return RefreshOutcome::ConfigMissing {
                repo_name: acquired.repo_name,
            };
        };

        let cached = lock(&self.cache).get(&reference);
        let (overlay, cached, failure) = match cached {
            Some(overlay) => {
                debug!(%reference, "using cached coverage");
                (overlay, true, None)
            }
            None => match self.acquire(&reference, &location, &repo, &page_url).await {
                Ok((overlay, failure)) => (overlay, false, failure),
                Err(url) => return RefreshOutcome::Redirected { url },
            },
        };

        let context = RenderContext {
            page_type: location.page_type(),
            location,
            repo,
            reference: reference.clone(),
            filetree_coverage_enabled: self.preferences.filetree_coverage_enabled,
        };
        debug!(%reference, empty = overlay.is_empty(), "visualizing overlay");
        self.host.renderer.visualize_overlay(&overlay, &context);

        RefreshOutcome::Delivered {
            reference,
            overlay,
            cached,
            failure,
        }
    }

    /// Fetch and convert, then cache the result. `Err` carries the auth
    /// redirect target, which is not cached.
    async fn acquire(
        &self,
        reference: &CoverageReference,
        location: &PageLocation,
        repo: &RepoConfig,
        page_url: &str,
    ) -> Result<(Arc<Overlay>, Option<FailureKind>), String> {
        let outcome = self
            .fetcher
            .fetch(reference, location.page_type(), Some(repo), page_url)
            .await;

        let (overlay, failure) = match outcome {
            FetchOutcome::Report(raw) => match convert::convert(&raw) {
                Ok(coverage) => {
                    debug!(%reference, files = coverage.files.len(), "coverage converted");
                    (Overlay::Available(coverage), None)
                }
                Err(e) => {
                    warn!(%reference, url = %raw.url, format = %raw.format, error = %e, "cannot convert coverage report");
                    (Overlay::Empty, Some(FailureKind::MalformedReport))
                }
            },
            FetchOutcome::Empty(kind) => (Overlay::Empty, Some(kind)),
            FetchOutcome::Redirected { url } => return Err(url),
        };

        let overlay = lock(&self.cache).put(reference.clone(), overlay);
        Ok((overlay, failure))
    }
}

/// Start a page view. Returns `None` when the overlay is switched off or the
/// page is not on a supported host.
pub fn bootstrap(preferences: Preferences, host: Host) -> Option<OverlayCoordinator> {
    if !preferences.overlay_enabled {
        info!("overlay disabled in preferences");
        return None;
    }
    let url = preferences
        .debug_url
        .clone()
        .unwrap_or_else(|| host.navigator.current_url());
    if !github::is_supported_host(&url) {
        debug!(%url, "unsupported host");
        return None;
    }
    Some(OverlayCoordinator::new(preferences, host))
}
