//! Capabilities the pipeline needs from its host environment.
//!
//! The pipeline never paints, prompts or navigates on its own; each of those
//! is one of the traits below, implemented per host (a browser extension, the
//! CLI, or test fakes).

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RepoConfig;
use crate::http::HttpClient;
use crate::model::{CoverageReference, Overlay};
use crate::page::{PageLocation, PageType};

/// Grants access to a coverage server's origin.
#[async_trait]
pub trait PermissionBroker: Send + Sync {
    /// Ask for host permission on `origin`. One request, one answer.
    async fn request_permission(&self, origin: &str) -> bool;
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
    /// Stays on screen until dismissed.
    pub persistent: bool,
}

impl Notice {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            title: "undercov".to_string(),
            message: message.into(),
            persistent: false,
        }
    }

    pub fn persistent(message: impl Into<String>) -> Self {
        Self {
            persistent: true,
            ..Self::transient(message)
        }
    }
}

/// Fire-and-forget notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// The browser location.
pub trait Navigator: Send + Sync {
    fn current_url(&self) -> String;

    /// Leave the current page. Ends the current flow.
    fn navigate(&self, url: &str);
}

/// A reference resolved from the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredReference {
    /// `owner/repo`, used to look up the repository's settings.
    pub repo_name: String,
    pub reference: CoverageReference,
}

/// Page-type-specific reference resolution.
pub trait ReferenceAcquirer: Send + Sync {
    /// `None` when the page has no applicable reference.
    fn acquire_reference(&self, location: &PageLocation) -> Option<AcquiredReference>;
}

/// Told when a repository has no settings, so the host can look for a
/// configuration file on the page instead.
pub trait ConfigDiscovery: Send + Sync {
    fn config_discoverable(&self, repo_name: &str);
}

/// What a renderer needs besides the coverage itself.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub location: PageLocation,
    pub page_type: Option<PageType>,
    pub repo: RepoConfig,
    pub reference: CoverageReference,
    pub filetree_coverage_enabled: bool,
}

/// Paints an overlay. Owns all presentation.
pub trait Renderer: Send + Sync {
    fn visualize_overlay(&self, overlay: &Overlay, context: &RenderContext);
}

/// Every collaborator a page view talks to.
#[derive(Clone)]
pub struct Host {
    pub http: Arc<dyn HttpClient>,
    pub permissions: Arc<dyn PermissionBroker>,
    pub notifier: Arc<dyn Notifier>,
    pub navigator: Arc<dyn Navigator>,
    pub references: Arc<dyn ReferenceAcquirer>,
    pub discovery: Arc<dyn ConfigDiscovery>,
    pub renderer: Arc<dyn Renderer>,
}
