#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use undercov::config::{Preferences, RepoConfig};
use undercov::fetch::Fetcher;
use undercov::github::GithubReferences;
use undercov::host::{
    ConfigDiscovery, Host, Navigator, Notice, Notifier, PermissionBroker, RenderContext, Renderer,
};
use undercov::http::{HttpClient, HttpResponse};
use undercov::model::Overlay;

pub const ISTANBUL_REPORT: &[u8] = include_bytes!("../fixtures/sample_istanbul.json");
pub const COBERTURA_REPORT: &[u8] = include_bytes!("../fixtures/sample_cobertura.xml");

pub const REPO: &str = "acme/widgets";
pub const BRANCH_URL: &str = "https://cov.acme.dev/$1/coverage-final.json";
pub const PR_URL: &str = "https://cov.acme.dev/pr/$1/coverage-final.json";
pub const AUTH_URL: &str = "https://cov.acme.dev/login?next=$1";

pub fn repo_config() -> RepoConfig {
    RepoConfig {
        repo_name: REPO.to_string(),
        branch_url_template: BRANCH_URL.to_string(),
        pr_url_template: PR_URL.to_string(),
        path_prefix: "/build/".to_string(),
        auth_url_template: Some(AUTH_URL.to_string()),
        ..Default::default()
    }
}

pub fn preferences() -> Preferences {
    let mut preferences = Preferences::default();
    preferences.upsert_repo(repo_config());
    preferences
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

/// Serves queued responses in order, then status 0 forever.
#[derive(Default)]
pub struct FakeHttp {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<String>>,
    yields: bool,
}

impl FakeHttp {
    pub fn new(responses: impl IntoIterator<Item = HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            ..Default::default()
        })
    }

    /// Like `new`, but every request suspends once before answering.
    pub fn yielding(responses: impl IntoIterator<Item = HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            yields: true,
            ..Default::default()
        })
    }

    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn get(&self, url: &str) -> HttpResponse {
        lock(&self.requests).push(url.to_string());
        if self.yields {
            tokio::task::yield_now().await;
        }
        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(HttpResponse::unreachable)
    }
}

pub struct FakePermissions {
    grant: bool,
    requests: Mutex<Vec<String>>,
}

impl FakePermissions {
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl PermissionBroker for FakePermissions {
    async fn request_permission(&self, origin: &str) -> bool {
        lock(&self.requests).push(origin.to_string());
        self.grant
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        lock(&self.notices).push(notice);
    }
}

pub struct FakeNavigator {
    url: Mutex<String>,
    navigations: Mutex<Vec<String>>,
}

impl FakeNavigator {
    /// Simulates the user moving to another page.
    pub fn set_url(&self, url: &str) {
        *lock(&self.url) = url.to_string();
    }

    pub fn navigations(&self) -> Vec<String> {
        lock(&self.navigations).clone()
    }
}

impl Navigator for FakeNavigator {
    fn current_url(&self) -> String {
        lock(&self.url).clone()
    }

    fn navigate(&self, url: &str) {
        lock(&self.navigations).push(url.to_string());
    }
}

#[derive(Default)]
pub struct RecordingDiscovery {
    repos: Mutex<Vec<String>>,
}

impl RecordingDiscovery {
    pub fn repos(&self) -> Vec<String> {
        lock(&self.repos).clone()
    }
}

impl ConfigDiscovery for RecordingDiscovery {
    fn config_discoverable(&self, repo_name: &str) {
        lock(&self.repos).push(repo_name.to_string());
    }
}

#[derive(Default)]
pub struct RecordingRenderer {
    renders: Mutex<Vec<(Overlay, RenderContext)>>,
}

impl RecordingRenderer {
    pub fn renders(&self) -> Vec<(Overlay, RenderContext)> {
        lock(&self.renders).clone()
    }
}

impl Renderer for RecordingRenderer {
    fn visualize_overlay(&self, overlay: &Overlay, context: &RenderContext) {
        lock(&self.renders).push((overlay.clone(), context.clone()));
    }
}

/// One fake per collaborator, kept around for inspection.
pub struct Fakes {
    pub http: Arc<FakeHttp>,
    pub permissions: Arc<FakePermissions>,
    pub notifier: Arc<RecordingNotifier>,
    pub navigator: Arc<FakeNavigator>,
    pub discovery: Arc<RecordingDiscovery>,
    pub renderer: Arc<RecordingRenderer>,
    pub branch: Option<String>,
}

impl Fakes {
    pub fn new(page_url: &str, http: Arc<FakeHttp>, grant_permission: bool) -> Self {
        Self {
            http,
            permissions: Arc::new(FakePermissions {
                grant: grant_permission,
                requests: Mutex::new(Vec::new()),
            }),
            notifier: Arc::new(RecordingNotifier::default()),
            navigator: Arc::new(FakeNavigator {
                url: Mutex::new(page_url.to_string()),
                navigations: Mutex::new(Vec::new()),
            }),
            discovery: Arc::new(RecordingDiscovery::default()),
            renderer: Arc::new(RecordingRenderer::default()),
            branch: None,
        }
    }

    pub fn host(&self) -> Host {
        Host {
            http: self.http.clone(),
            permissions: self.permissions.clone(),
            notifier: self.notifier.clone(),
            navigator: self.navigator.clone(),
            references: Arc::new(GithubReferences::new(self.branch.clone())),
            discovery: self.discovery.clone(),
            renderer: self.renderer.clone(),
        }
    }

    pub fn fetcher(&self) -> Fetcher {
        Fetcher::new(
            self.http.clone(),
            self.permissions.clone(),
            self.notifier.clone(),
            self.navigator.clone(),
        )
    }
}
