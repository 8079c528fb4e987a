//! Plain HTTP client used once a navigation's content type turns out not to
//! be HTML. The headless browser is for rendering; non-HTML resources
//! (pdf, json, plain text, images) never need JS and are fetched directly.

use std::collections::BTreeMap;
use std::time::Duration;

use iris_types::{ErrorKind, IrisError, IrisResult};

pub struct RawFetchOutcome {
    pub final_url: String,
    pub status_code: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    pub async fn fetch(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> IrisResult<RawFetchOutcome> {
        let mut request = self.client.get(url).timeout(timeout);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(classify_reqwest_error)?;

        let final_url = response.url().to_string();
        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        if !response.status().is_success() {
            return Err(IrisError::Http {
                status: status_code,
                message: format!("upstream returned {status_code}"),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(classify_reqwest_error)?
            .to_vec();

        Ok(RawFetchOutcome {
            final_url,
            status_code,
            content_type,
            body,
        })
    }
}

fn classify_reqwest_error(error: reqwest::Error) -> IrisError {
    if error.is_timeout() {
        return IrisError::Timeout;
    }
    if error.is_connect() {
        return IrisError::Connection(error.to_string());
    }
    let message = error.to_string().to_ascii_lowercase();
    if message.contains("dns") {
        IrisError::Dns(error.to_string())
    } else if message.contains("certificate") || message.contains("tls") || message.contains("ssl")
    {
        IrisError::Ssl(error.to_string())
    } else {
        IrisError::Browser(error.to_string())
    }
}

/// Best-effort content-type classification used by the dispatcher.
pub fn is_html(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.contains("text/html") || lower.contains("application/xhtml+xml")
}

pub fn is_pdf(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("application/pdf")
}

pub fn error_kind_for_content_type(_content_type: &str) -> ErrorKind {
    ErrorKind::UnsupportedContentType
}
