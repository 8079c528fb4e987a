//! Exercises the full `Fetcher::fetch` orchestration path, including the
//! attempt loop and scheme validation. These need a live headless browser
//! (`Fetcher` always holds a real `BrowserPool`, even when a given request
//! never checks a page out of it) so they're `#[ignore]`d like the
//! browser-backed tests elsewhere in this workspace; run explicitly with
//! `cargo test -- --ignored` on a machine with Chromium installed.

use std::sync::Arc;
use std::time::Duration;

use iris_cache::ResponseCache;
use iris_fetch::{Fetcher, FetcherConfig, RetryConfig, RobotsConfig, RobotsPolicy};
use iris_headless::chromium::{BrowserPool, LauncherConfig};
use iris_types::model::FetchRequest;
use iris_types::ErrorKind;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn test_fetcher(retry: RetryConfig) -> Fetcher {
    let browser = Arc::new(
        BrowserPool::launch(LauncherConfig::default())
            .await
            .expect("failed to launch headless browser for test"),
    );
    let cache = Arc::new(ResponseCache::connect(None, Duration::from_secs(60)).await);
    let rate_limiter = Arc::new(iris_fetch::RateLimiter::new(Default::default(), None));
    let robots = Arc::new(RobotsPolicy::new(RobotsConfig {
        enabled: false,
        ..Default::default()
    }));

    Fetcher::new(
        FetcherConfig {
            retry,
            ..Default::default()
        },
        browser,
        cache,
        rate_limiter,
        robots,
    )
}

fn request_for(url: &str) -> FetchRequest {
    FetchRequest {
        url: url.to_string(),
        extract_text: true,
        extract_metadata: true,
        extract_links: true,
        screenshot: false,
        cache: false,
        wait_strategy: Default::default(),
        wait_for_selector: None,
        wait_after_load_ms: None,
        timeout_ms: None,
        headers: Default::default(),
    }
}

#[tokio::test]
#[ignore]
async fn non_http_scheme_is_rejected_before_any_network_io() {
    let fetcher = test_fetcher(RetryConfig::default()).await;
    let result = fetcher.fetch(&request_for("ftp://x")).await;

    assert!(result.is_error());
    let error = result.error.unwrap();
    assert_eq!(error.kind, ErrorKind::InvalidUrl);
    assert!(!error.retryable);
}

#[tokio::test]
#[ignore]
async fn succeeds_after_three_retryable_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("ok"),
        )
        .mount(&server)
        .await;

    let fetcher = test_fetcher(RetryConfig {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        jitter: false,
        ..Default::default()
    })
    .await;

    let url = format!("{}/flaky", server.uri());
    let result = fetcher.fetch(&request_for(&url)).await;

    assert!(!result.is_error(), "expected success, got {:?}", result.error);
    assert_eq!(result.content_text, "ok");
}
