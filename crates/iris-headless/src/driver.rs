//! The boundary between the fetch pipeline and the headless browser.
//!
//! `PageDriver` is the trait the pipeline programs against. It demands
//! exactly what §1 calls out: navigate, wait, evaluate, screenshot, and
//! response headers/status — nothing about how those are obtained.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use iris_types::{ErrorInfo, ErrorKind};
use iris_types::model::WaitStrategy;

/// Result of navigating to a URL: everything the dispatcher needs to pick
/// a content-type handler, independent of how the page was retrieved.
#[derive(Debug, Clone)]
pub struct NavigationOutcome {
    pub final_url: String,
    pub status_code: u16,
    pub content_type: String,
    pub headers: BTreeMap<String, String>,
}

#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to `url`, applying `headers` as additional request headers.
    /// Returns once the driver has observed the main document response.
    async fn navigate(
        &mut self,
        url: &str,
        headers: &BTreeMap<String, String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<NavigationOutcome, DriverError>;

    /// Run the post-navigation wait strategy.
    async fn wait(
        &mut self,
        strategy: WaitStrategy,
        selector: Option<&str>,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    /// Serialized DOM of the current page, after any JS rendering.
    async fn html(&mut self) -> Result<String, DriverError>;

    /// Raw body bytes of the navigated resource, for non-HTML dispatch
    /// targets (pdf, json, plain text, image).
    async fn raw_bytes(&mut self) -> Result<Vec<u8>, DriverError>;

    /// Full-page PNG screenshot.
    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError>;
}

/// Error surfaced by a driver implementation, already classified into the
/// pipeline's error taxonomy.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DriverError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.kind, self.message.clone())
    }
}
