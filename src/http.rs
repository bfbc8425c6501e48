//! HTTP access to coverage servers.

use std::io::Read;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

/// Status used for responses that never arrived: no connectivity, a refused
/// connection, or a request the host blocked.
pub const STATUS_UNREACHABLE: u16 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn unreachable() -> Self {
        Self::new(STATUS_UNREACHABLE, Vec::new())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues GET requests. Never fails: transport failures come back as
/// [`STATUS_UNREACHABLE`].
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> HttpResponse;
}

/// Blocking `ureq` agent, driven from the blocking thread pool.
#[derive(Clone)]
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("undercov/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for UreqClient {
    async fn get(&self, url: &str) -> HttpResponse {
        let agent = self.agent.clone();
        let url = url.to_string();
        match tokio::task::spawn_blocking(move || get_blocking(&agent, &url)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "request task failed");
                HttpResponse::unreachable()
            }
        }
    }
}

fn get_blocking(agent: &ureq::Agent, url: &str) -> HttpResponse {
    let resp = agent
        .get(url)
        .set("Accept", "application/json, application/xml, text/xml")
        .call();
    match resp {
        Ok(resp) => {
            let status = resp.status();
            let mut body = Vec::new();
            match resp.into_reader().read_to_end(&mut body) {
                Ok(_) => HttpResponse { status, body },
                Err(e) => {
                    warn!(%url, error = %e, "failed to read response body");
                    HttpResponse::unreachable()
                }
            }
        }
        Err(ureq::Error::Status(code, resp)) => {
            let body = resp.into_string().unwrap_or_default();
            debug!(%url, status = code, "coverage server returned an error");
            HttpResponse::new(code, body)
        }
        Err(ureq::Error::Transport(e)) => {
            debug!(%url, error = %e, "request did not reach the server");
            HttpResponse::unreachable()
        }
    }
}
