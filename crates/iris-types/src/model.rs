//! Request/response data model shared by the fetch pipeline and the HTTP surface.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ErrorInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    Load,
    DomContentLoaded,
    NetworkIdle,
    Selector,
    Timeout,
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Load
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,

    #[serde(default = "default_true")]
    pub extract_text: bool,
    #[serde(default = "default_true")]
    pub extract_metadata: bool,
    #[serde(default = "default_true")]
    pub extract_links: bool,
    #[serde(default)]
    pub screenshot: bool,
    #[serde(default = "default_true")]
    pub cache: bool,

    #[serde(default)]
    pub wait_strategy: WaitStrategy,
    #[serde(default)]
    pub wait_for_selector: Option<String>,
    #[serde(default)]
    pub wait_after_load_ms: Option<u64>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl FetchRequest {
    /// The flags that participate in the cache fingerprint, as a stable
    /// projection independent of struct field order.
    pub fn extract_flags(&self) -> ExtractFlags {
        ExtractFlags {
            extract_text: self.extract_text,
            extract_metadata: self.extract_metadata,
            extract_links: self.extract_links,
            screenshot: self.screenshot,
        }
    }

    /// §4.1 tie-break: an explicit selector always forces `selector` strategy.
    pub fn effective_wait_strategy(&self) -> WaitStrategy {
        if self.wait_for_selector.is_some() {
            WaitStrategy::Selector
        } else {
            self.wait_strategy
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractFlags {
    pub extract_text: bool,
    pub extract_metadata: bool,
    pub extract_links: bool,
    pub screenshot: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    pub text: String,
    pub rel: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_pages: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructuredData {
    pub json_ld: Vec<serde_json::Value>,
    pub microdata: Vec<serde_json::Value>,
    pub schema_org_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub url: String,
    pub status_code: u16,
    #[serde(default)]
    pub content_text: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub structured_data: StructuredData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_base64: Option<String>,
    pub elapsed_ms: u64,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl FetchResult {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Invariant from §3: truncate to the configured cap, never beyond it.
    pub fn truncate_content(&mut self, max_content_length: usize) {
        if self.content_text.len() > max_content_length {
            let mut end = max_content_length;
            while end > 0 && !self.content_text.is_char_boundary(end) {
                end -= 1;
            }
            self.content_text.truncate(end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_for_selector_forces_selector_strategy() {
        let mut req = FetchRequest {
            url: "https://example.com".into(),
            extract_text: true,
            extract_metadata: true,
            extract_links: true,
            screenshot: false,
            cache: true,
            wait_strategy: WaitStrategy::NetworkIdle,
            wait_for_selector: None,
            wait_after_load_ms: None,
            timeout_ms: None,
            headers: BTreeMap::new(),
        };
        assert_eq!(req.effective_wait_strategy(), WaitStrategy::NetworkIdle);

        req.wait_for_selector = Some(".article".into());
        assert_eq!(req.effective_wait_strategy(), WaitStrategy::Selector);
    }

    #[test]
    fn truncate_content_respects_char_boundaries() {
        let mut result = FetchResult {
            url: "https://example.com".into(),
            status_code: 200,
            content_text: "héllo world".into(),
            content_type: "text/html".into(),
            metadata: Metadata::default(),
            links: vec![],
            structured_data: StructuredData::default(),
            screenshot_base64: None,
            elapsed_ms: 0,
            cached: false,
            error: None,
        };
        result.truncate_content(2);
        assert!(result.content_text.len() <= 2);
        assert!(String::from_utf8(result.content_text.clone().into_bytes()).is_ok());
    }

    #[test]
    fn exact_length_body_is_untouched() {
        let mut result = FetchResult {
            url: "https://example.com".into(),
            status_code: 200,
            content_text: "12345".into(),
            content_type: "text/plain".into(),
            metadata: Metadata::default(),
            links: vec![],
            structured_data: StructuredData::default(),
            screenshot_base64: None,
            elapsed_ms: 0,
            cached: false,
            error: None,
        };
        result.truncate_content(5);
        assert_eq!(result.content_text, "12345");
    }
}
