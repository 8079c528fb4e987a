//! Cache key (fingerprint) generation for `ResponseCache`.
//!
//! The fingerprint is a SHA-256 digest over a canonical JSON document built
//! from a `BTreeMap`, so the digest is independent of field and header
//! insertion order. Keyed deterministically on
//! `{normalized_url, extract_flags, wait_config, custom_header_digest}`
//! per the cache-key contract.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};
use url::Url;

use crate::model::{ExtractFlags, FetchRequest, WaitStrategy};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
struct WaitConfig {
    strategy: WaitStrategy,
    selector: Option<String>,
    wait_after_load_ms: Option<u64>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
struct FingerprintInput {
    normalized_url: String,
    extract_flags: ExtractFlags,
    wait_config: WaitConfig,
    custom_header_digest: String,
}

/// Lowercase scheme/host, strip the default port for the scheme, drop the
/// fragment, and sort query parameters.
pub fn normalize_url(raw: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(raw)?;
    url.set_fragment(None);

    let scheme = url.scheme().to_ascii_lowercase();
    if let Some(host) = url.host_str() {
        let host = host.to_ascii_lowercase();
        let _ = url.set_host(Some(&host));
    }
    let default_port = match scheme.as_str() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    if url.port() == default_port {
        let _ = url.set_port(None);
    }

    if url.query().is_some() {
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort();
        let mut qp = url.query_pairs_mut();
        qp.clear();
        for (k, v) in &pairs {
            qp.append_pair(k, v);
        }
        drop(qp);
    }

    Ok(url.to_string())
}

/// Digest of the request's additional headers, order-independent because
/// `headers` is already a `BTreeMap`.
fn header_digest(headers: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (k, v) in headers {
        hasher.update(k.as_bytes());
        hasher.update(b":");
        hasher.update(v.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Compute the cache fingerprint (raw hex-encoded SHA-256) for a request.
pub fn fingerprint(req: &FetchRequest) -> Result<String, url::ParseError> {
    let input = FingerprintInput {
        normalized_url: normalize_url(&req.url)?,
        extract_flags: req.extract_flags(),
        wait_config: WaitConfig {
            strategy: req.effective_wait_strategy(),
            selector: req.wait_for_selector.clone(),
            wait_after_load_ms: req.wait_after_load_ms,
            timeout_ms: req.timeout_ms,
        },
        custom_header_digest: header_digest(&req.headers),
    };

    let canonical =
        serde_json::to_vec(&input).expect("FingerprintInput serialization cannot fail");

    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request(url: &str) -> FetchRequest {
        FetchRequest {
            url: url.to_string(),
            extract_text: true,
            extract_metadata: true,
            extract_links: true,
            screenshot: false,
            cache: true,
            wait_strategy: WaitStrategy::Load,
            wait_for_selector: None,
            wait_after_load_ms: None,
            timeout_ms: None,
            headers: BTreeMap::new(),
        }
    }

    #[test]
    fn normalize_strips_default_port_and_fragment() {
        let a = normalize_url("HTTPS://Example.com:443/path#frag").unwrap();
        let b = normalize_url("https://example.com/path").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn normalize_sorts_query_params() {
        let a = normalize_url("https://example.com/?b=2&a=1").unwrap();
        let b = normalize_url("https://example.com/?a=1&b=2").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_stable_under_header_reordering() {
        let mut req1 = base_request("https://example.com");
        req1.headers.insert("X-A".into(), "1".into());
        req1.headers.insert("X-B".into(), "2".into());

        let mut req2 = base_request("https://example.com");
        req2.headers.insert("X-B".into(), "2".into());
        req2.headers.insert("X-A".into(), "1".into());

        assert_eq!(fingerprint(&req1).unwrap(), fingerprint(&req2).unwrap());
    }

    #[test]
    fn screenshot_flag_changes_fingerprint() {
        let mut with_shot = base_request("https://example.com");
        with_shot.screenshot = true;
        let without_shot = base_request("https://example.com");

        assert_ne!(
            fingerprint(&with_shot).unwrap(),
            fingerprint(&without_shot).unwrap()
        );
    }

    #[test]
    fn selector_presence_changes_fingerprint_via_effective_strategy() {
        let mut with_selector = base_request("https://example.com");
        with_selector.wait_for_selector = Some(".article".into());
        let without_selector = base_request("https://example.com");

        assert_ne!(
            fingerprint(&with_selector).unwrap(),
            fingerprint(&without_selector).unwrap()
        );
    }

    #[test]
    fn differing_urls_produce_differing_fingerprints() {
        let a = base_request("https://example.com/a");
        let b = base_request("https://example.com/b");
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }
}
