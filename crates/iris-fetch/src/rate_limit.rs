//! Per-domain token bucket rate limiting: §4.6.
//!
//! Bucket state lives in Redis when reachable: refill and decrement happen
//! inside a Lua script (`EVAL`) so the read-modify-write of `tokens` and
//! `refilled_at` is atomic across processes sharing the same key, mirroring
//! the in-process `Bucket` math below. On store failure the limiter falls
//! back to an in-process `DashMap` of buckets guarded implicitly by the
//! map's own sharded locks.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tracing::{debug, warn};

/// Refills and (if a token is available) decrements a per-domain bucket
/// stored as a Redis hash, in one atomic round trip. Returns
/// `{allowed, wait_ms}` where `wait_ms` is only meaningful when
/// `allowed == 0`. Mirrors `Bucket::try_acquire`'s refill-then-decrement
/// math exactly, just persisted in Redis instead of a local struct.
const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local rate = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

local tokens = tonumber(redis.call('HGET', key, 'tokens'))
local refilled_at = tonumber(redis.call('HGET', key, 'refilled_at'))

if tokens == nil then
  tokens = capacity
  refilled_at = now
end

local elapsed = now - refilled_at
if elapsed < 0 then
  elapsed = 0
end
tokens = tokens + elapsed * rate
if tokens > capacity then
  tokens = capacity
end

local allowed = 0
local wait_ms = 0
if tokens >= 1.0 then
  tokens = tokens - 1.0
  allowed = 1
else
  wait_ms = math.floor(((1.0 - tokens) / rate) * 1000 + 0.5)
end

redis.call('HSET', key, 'tokens', tostring(tokens), 'refilled_at', tostring(now))
redis.call('EXPIRE', key, math.ceil(capacity / rate) + 1)

return {allowed, wait_ms}
"#;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub burst_capacity: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 1.0,
            burst_capacity: 5.0,
        }
    }
}

impl RateLimitConfig {
    pub fn from_min_delay_ms(min_delay_ms: u64, burst: u32) -> Self {
        let min_delay_ms = min_delay_ms.max(1);
        Self {
            requests_per_second: 1000.0 / min_delay_ms as f64,
            burst_capacity: burst as f64,
        }
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    /// Refill, then either take a token or report how long to wait.
    fn try_acquire(&mut self, config: &RateLimitConfig) -> Result<(), Duration> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * config.requests_per_second)
            .min(config.burst_capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let wait = (1.0 - self.tokens) / config.requests_per_second;
            Err(Duration::from_secs_f64(wait))
        }
    }
}

/// In-process fallback bucket map, keyed by registrable domain.
struct LocalBuckets {
    buckets: DashMap<String, Bucket>,
}

impl LocalBuckets {
    fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    fn try_acquire(&self, domain: &str, config: &RateLimitConfig) -> Result<(), Duration> {
        let mut bucket = self
            .buckets
            .entry(domain.to_string())
            .or_insert_with(|| Bucket::new(config.burst_capacity));
        bucket.try_acquire(config)
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    redis: Option<redis::Client>,
    local: LocalBuckets,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, redis_url: Option<&str>) -> Self {
        let redis = redis_url.and_then(|url| redis::Client::open(url).ok());
        Self {
            config,
            redis,
            local: LocalBuckets::new(),
        }
    }

    /// Blocks the caller until a token is available for `domain`.
    pub async fn acquire(&self, domain: &str) {
        loop {
            let wait = match self.try_distributed(domain).await {
                Some(outcome) => outcome,
                None => self.local.try_acquire(domain, &self.config),
            };

            match wait {
                Ok(()) => return,
                Err(wait) => tokio::time::sleep(wait).await,
            }
        }
    }

    /// `Some(_)` means the distributed path was reachable and authoritative;
    /// `None` means to fall back to the in-process bucket.
    async fn try_distributed(&self, domain: &str) -> Option<Result<(), Duration>> {
        let client = self.redis.as_ref()?;
        let mut conn = match client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "rate-limit store unreachable, falling back to in-process bucket");
                return None;
            }
        };

        let key = format!("rate:bucket:{domain}");
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();

        let result: redis::RedisResult<(i64, i64)> = redis::Script::new(TOKEN_BUCKET_SCRIPT)
            .key(key.as_str())
            .arg(self.config.requests_per_second)
            .arg(self.config.burst_capacity)
            .arg(now)
            .invoke_async(&mut conn)
            .await;

        let (allowed, wait_ms) = match result {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "rate-limit token-bucket script failed, falling back to in-process bucket");
                return None;
            }
        };

        if allowed == 1 {
            Some(Ok(()))
        } else {
            debug!(domain, wait_ms, "distributed rate limit exceeded");
            Some(Err(Duration::from_millis(wait_ms.max(0) as u64)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_bucket_allows_immediate_acquire() {
        let config = RateLimitConfig {
            requests_per_second: 1.0,
            burst_capacity: 5.0,
        };
        let mut bucket = Bucket::new(config.burst_capacity);
        assert!(bucket.try_acquire(&config).is_ok());
    }

    #[test]
    fn exhausted_bucket_reports_wait_time() {
        let config = RateLimitConfig {
            requests_per_second: 1.0,
            burst_capacity: 1.0,
        };
        let mut bucket = Bucket::new(config.burst_capacity);
        assert!(bucket.try_acquire(&config).is_ok());
        let result = bucket.try_acquire(&config);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn in_process_fallback_serializes_domain_requests() {
        let limiter = RateLimiter::new(
            RateLimitConfig {
                requests_per_second: 1000.0,
                burst_capacity: 1.0,
            },
            None,
        );
        let start = Instant::now();
        limiter.acquire("example.com").await;
        limiter.acquire("example.com").await;
        // Burst of 1 forces the second acquire to wait for a refill.
        assert!(start.elapsed() > Duration::from_millis(0));
    }

    #[test]
    fn from_min_delay_converts_to_rate() {
        let config = RateLimitConfig::from_min_delay_ms(500, 10);
        assert_eq!(config.requests_per_second, 2.0);
        assert_eq!(config.burst_capacity, 10.0);
    }
}
