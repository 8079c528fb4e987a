//! Shared application state assembled at startup and handed to every handler.

use std::sync::Arc;
use std::time::Duration;

use iris_cache::ResponseCache;
use iris_fetch::{Fetcher, FetcherConfig, RetryConfig, RobotsConfig, RobotsPolicy};
use iris_headless::chromium::{BrowserPool, LauncherConfig};

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub fetcher: Arc<Fetcher>,
    pub cache: Arc<ResponseCache>,
    pub browser: Arc<BrowserPool>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let browser = Arc::new(
            BrowserPool::launch(LauncherConfig {
                headless: config.headless,
                user_agent: config.user_agent.clone(),
                max_concurrent_pages: config.max_concurrent_pages,
            })
            .await
            .map_err(|e| anyhow::anyhow!("failed to launch headless browser: {e}"))?,
        );

        let cache_url = config.cache_enabled.then(|| config.redis_url.clone()).flatten();
        let cache = Arc::new(ResponseCache::connect(cache_url.as_deref(), config.cache_ttl()).await);

        let rate_limiter = Arc::new(iris_fetch::RateLimiter::new(
            config.rate_limit(),
            config.redis_url.as_deref(),
        ));

        let robots = Arc::new(RobotsPolicy::new(RobotsConfig {
            enabled: config.respect_robots_txt,
            cache_ttl: Duration::from_secs(config.robots_txt_cache_ttl),
            user_agent: config.user_agent.clone(),
            ..Default::default()
        }));

        let fetcher_config = FetcherConfig {
            user_agent: config.user_agent.clone(),
            default_timeout: config.page_timeout(),
            max_content_length: config.max_content_length,
            max_concurrent_fetches: config.max_concurrent_pages,
            default_cache_ttl: config.cache_ttl(),
            retry: RetryConfig {
                max_retries: config.max_retries,
                ..Default::default()
            },
            ..Default::default()
        };

        let fetcher = Arc::new(Fetcher::new(
            fetcher_config,
            browser.clone(),
            cache.clone(),
            rate_limiter,
            robots,
        ));

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            cache,
            browser,
        })
    }
}
