use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UndercovError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parse error at position {position}: {source}")]
    Xml {
        source: quick_xml::Error,
        position: usize,
    },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown coverage format: '{0}'. Supported: json, cobertura")]
    UnknownFormat(String),
}

pub type Result<T> = std::result::Result<T, UndercovError>;

/// Why a coverage lookup ended without data.
///
/// These never surface as errors: the fetcher and the coordinator absorb them
/// and hand the renderer an empty overlay instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No repository configuration for the active repository.
    ConfigMissing,
    /// Status 0: no connectivity or no host permission.
    NetworkUnreachable,
    /// 403 with an auth template, after the one redirect was spent.
    AuthRequired,
    /// Any other non-2xx status.
    ServerError(u16),
    /// The report could not be converted.
    MalformedReport,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::ConfigMissing => f.write_str("no repository configuration"),
            FailureKind::NetworkUnreachable => f.write_str("coverage server unreachable"),
            FailureKind::AuthRequired => f.write_str("authentication required"),
            FailureKind::ServerError(status) => write!(f, "server error (HTTP {status})"),
            FailureKind::MalformedReport => f.write_str("malformed coverage report"),
        }
    }
}
