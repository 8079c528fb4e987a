//! Error taxonomy for the fetch pipeline.
//!
//! `IrisError` is the internal, pipeline-facing error type. Every terminal
//! instance carries a `kind` that matches the wire-level taxonomy a
//! `FetchResult.error` field exposes, plus whether the kind is retryable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type IrisResult<T> = Result<T, IrisError>;

/// The closed set of error kinds a `FetchResult` can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    DnsError,
    ConnectionError,
    SslError,
    BlockedByRobotsTxt,
    RateLimited,
    UnsupportedContentType,
    InvalidUrl,
    HttpError,
    ContentTooLarge,
    BrowserError,
}

impl ErrorKind {
    /// Whether the fetch loop should retry an attempt that failed this way.
    ///
    /// `HttpError` is retryable only for the upstream 502/503/504 triad;
    /// callers constructing `ErrorInfo::http_error` pass the status in so
    /// `ErrorInfo::retryable` can special-case it.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::DnsError
                | ErrorKind::ConnectionError
                | ErrorKind::RateLimited
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::DnsError => "dns_error",
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::SslError => "ssl_error",
            ErrorKind::BlockedByRobotsTxt => "blocked_by_robots_txt",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::UnsupportedContentType => "unsupported_content_type",
            ErrorKind::InvalidUrl => "invalid_url",
            ErrorKind::HttpError => "http_error",
            ErrorKind::ContentTooLarge => "content_too_large",
            ErrorKind::BrowserError => "browser_error",
        }
    }
}

/// Wire-shape of the `error` field on `FetchResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.is_retryable(),
            http_status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// `http_error` is retryable only for 502/503/504; every other kind
    /// takes its retryability straight from `ErrorKind`.
    pub fn http_error(status: u16, message: impl Into<String>) -> Self {
        let retryable = matches!(status, 502 | 503 | 504);
        Self {
            kind: ErrorKind::HttpError,
            message: message.into(),
            retryable,
            http_status: Some(status),
        }
    }
}

/// Internal pipeline error. Converted to `ErrorInfo` at the point a
/// `FetchResult` is assembled; never serialized directly.
#[derive(Debug, Error)]
pub enum IrisError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("dns resolution failed: {0}")]
    Dns(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("tls/ssl handshake failed: {0}")]
    Ssl(String),

    #[error("blocked by robots.txt: {0}")]
    RobotsBlocked(String),

    #[error("navigation or wait deadline exceeded")]
    Timeout,

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("upstream http error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("content exceeds max_content_length")]
    ContentTooLarge,

    #[error("browser or extraction failure: {0}")]
    Browser(String),

    #[error("cache store error: {0}")]
    Cache(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl IrisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IrisError::InvalidUrl(_) | IrisError::Url(_) => ErrorKind::InvalidUrl,
            IrisError::Dns(_) => ErrorKind::DnsError,
            IrisError::Connection(_) => ErrorKind::ConnectionError,
            IrisError::Ssl(_) => ErrorKind::SslError,
            IrisError::RobotsBlocked(_) => ErrorKind::BlockedByRobotsTxt,
            IrisError::Timeout => ErrorKind::Timeout,
            IrisError::RateLimited(_) => ErrorKind::RateLimited,
            IrisError::UnsupportedContentType(_) => ErrorKind::UnsupportedContentType,
            IrisError::Http { .. } => ErrorKind::HttpError,
            IrisError::ContentTooLarge => ErrorKind::ContentTooLarge,
            IrisError::Browser(_) | IrisError::Json(_) | IrisError::Cache(_) => {
                ErrorKind::BrowserError
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            IrisError::Http { status, .. } => matches!(status, 502 | 503 | 504),
            other => other.kind().is_retryable(),
        }
    }

    /// Render as the wire-level `ErrorInfo` carried on a `FetchResult`.
    pub fn to_error_info(&self) -> ErrorInfo {
        let mut info = ErrorInfo::new(self.kind(), self.to_string());
        info.retryable = self.is_retryable();
        if let IrisError::Http { status, .. } = self {
            info = info.with_status(*status);
        }
        info
    }
}
