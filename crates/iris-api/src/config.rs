//! Process configuration, loaded from `IRIS_*`-prefixed environment
//! variables per §6.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub browser_type: String,
    pub headless: bool,
    pub page_timeout_ms: u64,
    pub wait_after_load_ms: u64,
    pub max_concurrent_pages: usize,
    pub user_agent: String,
    pub max_content_length: usize,
    pub redis_url: Option<String>,
    pub cache_ttl_seconds: u64,
    pub cache_enabled: bool,
    pub min_delay_between_requests_ms: u64,
    pub rate_limit_burst: u32,
    pub respect_robots_txt: bool,
    pub robots_txt_cache_ttl: u64,
    pub max_retries: u32,
    pub testing_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            browser_type: "chromium".to_string(),
            headless: true,
            page_timeout_ms: 30_000,
            wait_after_load_ms: 0,
            max_concurrent_pages: 16,
            user_agent: "Mozilla/5.0 (compatible; iris/1.0; +https://example.invalid/bot)".into(),
            max_content_length: 10 * 1024 * 1024,
            redis_url: None,
            cache_ttl_seconds: 3600,
            cache_enabled: true,
            min_delay_between_requests_ms: 1000,
            rate_limit_burst: 5,
            respect_robots_txt: true,
            robots_txt_cache_ttl: 24 * 60 * 60,
            max_retries: 3,
            testing_mode: false,
        }
    }
}

impl Config {
    /// Reads `IRIS_*` variables over the defaults, leaving anything unset
    /// at its default value.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("IRIS_HOST") {
            config.host = v;
        }
        if let Ok(v) = std::env::var("IRIS_PORT") {
            config.port = v.parse()?;
        }
        if let Ok(v) = std::env::var("IRIS_LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("IRIS_BROWSER_TYPE") {
            config.browser_type = v;
        }
        if let Ok(v) = std::env::var("IRIS_HEADLESS") {
            config.headless = v.parse()?;
        }
        if let Ok(v) = std::env::var("IRIS_PAGE_TIMEOUT_MS") {
            config.page_timeout_ms = v.parse()?;
        }
        if let Ok(v) = std::env::var("IRIS_WAIT_AFTER_LOAD_MS") {
            config.wait_after_load_ms = v.parse()?;
        }
        if let Ok(v) = std::env::var("IRIS_MAX_CONCURRENT_PAGES") {
            config.max_concurrent_pages = v.parse()?;
        }
        if let Ok(v) = std::env::var("IRIS_USER_AGENT") {
            config.user_agent = v;
        }
        if let Ok(v) = std::env::var("IRIS_MAX_CONTENT_LENGTH") {
            config.max_content_length = v.parse()?;
        }
        if let Ok(v) = std::env::var("IRIS_REDIS_URL") {
            config.redis_url = Some(v);
        }
        if let Ok(v) = std::env::var("IRIS_CACHE_TTL_SECONDS") {
            config.cache_ttl_seconds = v.parse()?;
        }
        if let Ok(v) = std::env::var("IRIS_CACHE_ENABLED") {
            config.cache_enabled = v.parse()?;
        }
        if let Ok(v) = std::env::var("IRIS_MIN_DELAY_BETWEEN_REQUESTS_MS") {
            config.min_delay_between_requests_ms = v.parse()?;
        }
        if let Ok(v) = std::env::var("IRIS_RATE_LIMIT_BURST") {
            config.rate_limit_burst = v.parse()?;
        }
        if let Ok(v) = std::env::var("IRIS_RESPECT_ROBOTS_TXT") {
            config.respect_robots_txt = v.parse()?;
        }
        if let Ok(v) = std::env::var("IRIS_ROBOTS_TXT_CACHE_TTL") {
            config.robots_txt_cache_ttl = v.parse()?;
        }
        if let Ok(v) = std::env::var("IRIS_MAX_RETRIES") {
            config.max_retries = v.parse()?;
        }
        if let Ok(v) = std::env::var("IRIS_TESTING_MODE") {
            config.testing_mode = v.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.max_concurrent_pages > 0,
            "IRIS_MAX_CONCURRENT_PAGES must be positive"
        );
        anyhow::ensure!(
            self.max_content_length > 0,
            "IRIS_MAX_CONTENT_LENGTH must be positive"
        );
        anyhow::ensure!(
            self.min_delay_between_requests_ms > 0,
            "IRIS_MIN_DELAY_BETWEEN_REQUESTS_MS must be positive"
        );
        anyhow::ensure!(self.rate_limit_burst > 0, "IRIS_RATE_LIMIT_BURST must be positive");
        anyhow::ensure!(self.max_retries > 0, "IRIS_MAX_RETRIES must be positive");
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn rate_limit(&self) -> iris_fetch::RateLimitConfig {
        iris_fetch::RateLimitConfig::from_min_delay_ms(
            self.min_delay_between_requests_ms,
            self.rate_limit_burst,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let config = Config {
            max_concurrent_pages: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bind_addr_combines_host_and_port() {
        let config = Config::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }
}
