//! The orchestrator: §4.1. Ties URL validation, robots/rate-limit gating,
//! the headless browser, content dispatch, retry/circuit-breaking, and the
//! response cache into a single `fetch` call that never returns `Err` —
//! every failure mode becomes a `FetchResult` carrying an `error`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use iris_cache::ResponseCache;
use iris_extraction::ContentExtractor;
use iris_headless::chromium::{encode_screenshot, BrowserPool, ChromiumDriver};
use iris_headless::driver::PageDriver;
use iris_pdf::PdfExtractor;
use iris_types::model::{FetchRequest, FetchResult, Metadata};
use iris_types::{fingerprint, ErrorKind, IrisError};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::circuit::{CircuitBreaker, CircuitBreakerConfig};
use crate::domain::registrable_domain;
use crate::http_client::{self, HttpClient};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::retry::RetryConfig;
use crate::robots::RobotsPolicy;

/// Batches larger than this are rejected by the HTTP surface, but the
/// orchestrator enforces it too so any caller gets the same guarantee.
pub const MAX_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub default_timeout: Duration,
    pub max_content_length: usize,
    pub max_concurrent_fetches: usize,
    pub default_cache_ttl: Duration,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub rate_limit: RateLimitConfig,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; iris/1.0; +https://example.invalid/bot)".into(),
            default_timeout: Duration::from_secs(30),
            max_content_length: 10 * 1024 * 1024,
            max_concurrent_fetches: 16,
            default_cache_ttl: Duration::from_secs(3600),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

pub struct Fetcher {
    config: FetcherConfig,
    browser: Arc<BrowserPool>,
    cache: Arc<ResponseCache>,
    rate_limiter: Arc<RateLimiter>,
    robots: Arc<RobotsPolicy>,
    http_client: HttpClient,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    concurrency: Arc<Semaphore>,
}

impl Fetcher {
    pub fn new(
        config: FetcherConfig,
        browser: Arc<BrowserPool>,
        cache: Arc<ResponseCache>,
        rate_limiter: Arc<RateLimiter>,
        robots: Arc<RobotsPolicy>,
    ) -> Self {
        let http_client = HttpClient::new(&config.user_agent);
        let concurrency = Arc::new(Semaphore::new(config.max_concurrent_fetches));
        Self {
            config,
            browser,
            cache,
            rate_limiter,
            robots,
            http_client,
            breakers: DashMap::new(),
            concurrency,
        }
    }

    fn breaker_for(&self, domain: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config.circuit_breaker.clone())))
            .clone()
    }

    pub async fn fetch(&self, request: &FetchRequest) -> FetchResult {
        let started = Instant::now();

        if let Err(e) = validate_scheme(&request.url) {
            return error_result(request, started, e);
        }

        let fingerprint = match fingerprint::fingerprint(request) {
            Ok(fp) => fp,
            Err(e) => return error_result(request, started, IrisError::Url(e)),
        };

        if request.cache {
            if let Some(mut cached) = self.cache.get(&fingerprint).await {
                cached.cached = true;
                return cached;
            }
        }

        let Some(domain) = registrable_domain(&request.url) else {
            return error_result(
                request,
                started,
                IrisError::InvalidUrl(request.url.clone()),
            );
        };

        if !self.robots.allowed(&request.url, &self.config.user_agent).await {
            return error_result(
                request,
                started,
                IrisError::RobotsBlocked(request.url.clone()),
            );
        }

        let _permit = match self.concurrency.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return error_result(
                    request,
                    started,
                    IrisError::Browser("fetcher shutting down".into()),
                )
            }
        };

        self.rate_limiter.acquire(&domain).await;

        let breaker = self.breaker_for(&domain);
        let mut result = self.attempt_loop(request, &breaker, started).await;

        if request.cache && !result.is_error() {
            self.cache
                .put(&fingerprint, &result, Some(self.config.default_cache_ttl))
                .await;
        }

        result.cached = false;
        result.elapsed_ms = started.elapsed().as_millis() as u64;
        result
    }

    async fn attempt_loop(
        &self,
        request: &FetchRequest,
        breaker: &CircuitBreaker,
        started: Instant,
    ) -> FetchResult {
        let max_retries = self.config.retry.max_retries;
        let mut last_error: Option<IrisError> = None;

        for attempt in 0..=max_retries {
            if !breaker.allow_request() {
                last_error = Some(IrisError::Connection(
                    "circuit breaker open for this domain".into(),
                ));
                break;
            }

            match self.attempt_once(request).await {
                Ok(result) => {
                    breaker.record_success();
                    return result;
                }
                Err(error) => {
                    breaker.record_failure();
                    let retryable = error.is_retryable();
                    debug!(attempt, retryable, error = %error, "fetch attempt failed");
                    last_error = Some(error);

                    if !retryable || attempt >= max_retries {
                        break;
                    }
                    tokio::time::sleep(self.config.retry.delay_for_attempt(attempt)).await;
                }
            }
        }

        error_result(
            request,
            started,
            last_error.unwrap_or(IrisError::Browser("exhausted attempts".into())),
        )
    }

    /// §4.1 step 6's dispatch table keys off the real response content-type,
    /// which `chromiumoxide`'s `Page::goto` doesn't surface directly. A
    /// cheap `HttpClient` probe determines the type before deciding whether
    /// a browser page is worth checking out at all — non-HTML resources
    /// never touch the browser pool.
    async fn attempt_once(&self, request: &FetchRequest) -> Result<FetchResult, IrisError> {
        let timeout = request
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.default_timeout);

        let probe = self
            .http_client
            .fetch(&request.url, &request.headers, timeout)
            .await?;

        if !http_client::is_html(&probe.content_type) {
            return self.extract_non_html(request, probe);
        }

        let checkout = self
            .browser
            .checkout()
            .await
            .map_err(|e| IrisError::Browser(e.message))?;
        let mut driver = ChromiumDriver::new(checkout);

        let navigation = driver
            .navigate(&request.url, &request.headers, &self.config.user_agent, timeout)
            .await
            .map_err(|e| driver_error_to_iris(&e))?;

        driver
            .wait(
                request.effective_wait_strategy(),
                request.wait_for_selector.as_deref(),
                timeout,
            )
            .await
            .map_err(|e| driver_error_to_iris(&e))?;

        if let Some(extra) = request.wait_after_load_ms {
            tokio::time::sleep(Duration::from_millis(extra)).await;
        }

        let html = driver.html().await.map_err(|e| driver_error_to_iris(&e))?;

        let extracted = ContentExtractor::extract(&html, &navigation.final_url, &request.extract_flags());

        let screenshot_base64 = if request.screenshot {
            let bytes = driver
                .screenshot()
                .await
                .map_err(|e| driver_error_to_iris(&e))?;
            Some(encode_screenshot(&bytes))
        } else {
            None
        };

        let mut result = FetchResult {
            url: navigation.final_url,
            status_code: navigation.status_code,
            content_text: extracted.text,
            content_type: probe.content_type,
            metadata: extracted.metadata,
            links: extracted.links,
            structured_data: extracted.structured_data,
            screenshot_base64,
            elapsed_ms: 0,
            cached: false,
            error: None,
        };
        result.truncate_content(self.config.max_content_length);
        Ok(result)
    }

    fn extract_non_html(
        &self,
        _request: &FetchRequest,
        outcome: http_client::RawFetchOutcome,
    ) -> Result<FetchResult, IrisError> {
        let content_type = outcome.content_type.clone();

        if outcome.body.len() > self.config.max_content_length * 4 {
            return Err(IrisError::ContentTooLarge);
        }

        let mut result = if http_client::is_pdf(&content_type) {
            let pdf = PdfExtractor::extract(&outcome.body)?;
            FetchResult {
                url: outcome.final_url,
                status_code: outcome.status_code,
                content_text: pdf.text,
                content_type,
                metadata: Metadata {
                    title: pdf.title,
                    author: pdf.author,
                    pdf_pages: Some(pdf.pdf_pages),
                    ..Default::default()
                },
                links: Vec::new(),
                structured_data: Default::default(),
                screenshot_base64: None,
                elapsed_ms: 0,
                cached: false,
                error: None,
            }
        } else if content_type.starts_with("text/") || content_type.contains("json") {
            let text = String::from_utf8_lossy(&outcome.body).into_owned();
            FetchResult {
                url: outcome.final_url,
                status_code: outcome.status_code,
                content_text: text,
                content_type,
                metadata: Default::default(),
                links: Vec::new(),
                structured_data: Default::default(),
                screenshot_base64: None,
                elapsed_ms: 0,
                cached: false,
                error: None,
            }
        } else {
            return Err(IrisError::UnsupportedContentType(content_type));
        };

        result.truncate_content(self.config.max_content_length);
        Ok(result)
    }

    /// Runs up to `MAX_BATCH_SIZE` requests concurrently. Requests against
    /// different domains never wait on each other; same-domain requests
    /// still serialize through that domain's rate limiter.
    pub async fn fetch_batch(&self, requests: &[FetchRequest]) -> Vec<FetchResult> {
        let truncated = &requests[..requests.len().min(MAX_BATCH_SIZE)];
        if truncated.len() < requests.len() {
            warn!(
                requested = requests.len(),
                used = truncated.len(),
                "batch exceeded max size, extra requests dropped"
            );
        }

        let futures = truncated.iter().map(|request| self.fetch(request));
        futures::future::join_all(futures).await
    }
}

/// §4.1 step 1: reject non-http(s) schemes before any cache lookup, robots
/// check, or network I/O. `url::Url::parse` happily accepts `ftp://`,
/// `file://`, etc., so this has to be checked explicitly rather than
/// inferred from parse failure.
fn validate_scheme(raw_url: &str) -> Result<(), IrisError> {
    let parsed = url::Url::parse(raw_url).map_err(|e| IrisError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(IrisError::InvalidUrl(format!(
            "unsupported scheme '{other}', only http/https are allowed"
        ))),
    }
}

fn driver_error_to_iris(error: &iris_headless::driver::DriverError) -> IrisError {
    match error.kind {
        ErrorKind::DnsError => IrisError::Dns(error.message.clone()),
        ErrorKind::SslError => IrisError::Ssl(error.message.clone()),
        ErrorKind::ConnectionError => IrisError::Connection(error.message.clone()),
        ErrorKind::Timeout => IrisError::Timeout,
        _ => IrisError::Browser(error.message.clone()),
    }
}

fn error_result(request: &FetchRequest, started: Instant, error: IrisError) -> FetchResult {
    FetchResult {
        url: request.url.clone(),
        status_code: 0,
        content_text: String::new(),
        content_type: String::new(),
        metadata: Default::default(),
        links: Vec::new(),
        structured_data: Default::default(),
        screenshot_base64: None,
        elapsed_ms: started.elapsed().as_millis() as u64,
        cached: false,
        error: Some(error.to_error_info()),
    }
}
