//! Robots.txt fetch/parse/cache: §4.7. Fails open on any fetch problem so
//! a flaky or misconfigured origin never blocks legitimate traffic.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use robotstxt::DefaultMatcher;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RobotsConfig {
    pub enabled: bool,
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
    pub user_agent: String,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            fetch_timeout: Duration::from_secs(5),
            user_agent: "iris".to_string(),
        }
    }
}

struct CachedRobots {
    body: String,
    fetched_at: Instant,
    ttl: Duration,
}

impl CachedRobots {
    fn is_expired(&self) -> bool {
        self.fetched_at.elapsed() > self.ttl
    }
}

pub struct RobotsPolicy {
    config: RobotsConfig,
    client: reqwest::Client,
    cache: DashMap<String, CachedRobots>,
}

impl RobotsPolicy {
    pub fn new(config: RobotsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            cache: DashMap::new(),
        }
    }

    /// `true` if the path is allowed for `user_agent` at the URL's origin.
    /// Fails open: any fetch/parse problem is treated as allowed.
    pub async fn allowed(&self, url: &str, user_agent: &str) -> bool {
        if !self.config.enabled {
            return true;
        }

        let Ok(parsed) = url::Url::parse(url) else {
            return true;
        };
        let origin = parsed.origin().ascii_serialization();
        let path = parsed[url::Position::BeforePath..].to_string();

        let body = self.robots_body(&origin).await;
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&body, user_agent, &path)
    }

    async fn robots_body(&self, origin: &str) -> String {
        if let Some(entry) = self.cache.get(origin) {
            if !entry.is_expired() {
                return entry.body.clone();
            }
        }

        let robots_url = format!("{origin}/robots.txt");
        let body = self.fetch_with_redirects(&robots_url, 2).await;

        let (body, ttl) = match body {
            Some(body) => (body, self.config.cache_ttl),
            None => {
                debug!(origin, "robots.txt fetch failed, failing open");
                // Allow-all sentinel with a shorter TTL so a flaky origin
                // isn't hammered on every request.
                ("".to_string(), Duration::from_secs(5 * 60))
            }
        };

        self.cache.insert(
            origin.to_string(),
            CachedRobots {
                body: body.clone(),
                fetched_at: Instant::now(),
                ttl,
            },
        );
        body
    }

    /// Resolves up to `redirects_left` `Location` hops, failing open (returning
    /// `None`) the moment a hop's scheme differs from the scheme the fetch
    /// started with — an `https` robots.txt redirecting to `http` (or any
    /// other scheme) is not followed.
    async fn fetch_with_redirects(&self, url: &str, redirects_left: u8) -> Option<String> {
        let current = url::Url::parse(url).ok()?;
        let original_scheme = current.scheme().to_string();
        self.follow_redirects(current, original_scheme, redirects_left).await
    }

    async fn follow_redirects(
        &self,
        current: url::Url,
        original_scheme: String,
        redirects_left: u8,
    ) -> Option<String> {
        let response = self.client.get(current.clone()).send().await.ok()?;

        if response.status().is_redirection() && redirects_left > 0 {
            let location = response.headers().get(reqwest::header::LOCATION)?;
            let location = location.to_str().ok()?;
            let resolved = current.join(location).ok()?;

            if resolved.scheme() != original_scheme {
                debug!(
                    from = %current,
                    to = %resolved,
                    "robots.txt redirect crossed schemes, failing open"
                );
                return None;
            }

            return Box::pin(self.follow_redirects(resolved, original_scheme, redirects_left - 1)).await;
        }

        if !response.status().is_success() {
            return None;
        }

        response.text().await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_policy_always_allows() {
        let policy = RobotsPolicy::new(RobotsConfig {
            enabled: false,
            ..Default::default()
        });
        assert!(policy.allowed("https://example.com/anything", "iris").await);
    }

    #[test]
    fn empty_body_allows_everything() {
        let mut matcher = DefaultMatcher::default();
        assert!(matcher.one_agent_allowed_by_robots("", "iris", "/secret"));
    }

    #[test]
    fn disallow_rule_blocks_matching_path() {
        let robots = "User-agent: *\nDisallow: /secret\n";
        let mut matcher = DefaultMatcher::default();
        assert!(!matcher.one_agent_allowed_by_robots(robots, "iris", "/secret"));
        assert!(matcher.one_agent_allowed_by_robots(robots, "iris", "/ok"));
    }

    #[test]
    fn cached_entry_respects_ttl() {
        let cache = CachedRobots {
            body: String::new(),
            fetched_at: Instant::now() - Duration::from_secs(10),
            ttl: Duration::from_secs(5),
        };
        assert!(cache.is_expired());
    }
}
