//! Response cache: §4.5.
//!
//! Fingerprint-keyed storage of `FetchResult`s with graceful degradation —
//! a store that is down makes every read a miss and every write a no-op,
//! never an error the caller has to handle.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use iris_types::FetchResult;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "fetch:cache:";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    result: FetchResult,
    inserted_at: i64,
    ttl_seconds: u64,
}

#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct ResponseCache {
    redis: Option<Arc<Mutex<redis::aio::MultiplexedConnection>>>,
    default_ttl: Duration,
    stats: Arc<Mutex<CacheStats>>,
}

impl ResponseCache {
    /// `redis_url` of `None`, or a connection failure, degrades to a
    /// cache that always misses on read and no-ops on write.
    pub async fn connect(redis_url: Option<&str>, default_ttl: Duration) -> Self {
        let redis = match redis_url {
            Some(url) => match connect_redis(url).await {
                Ok(conn) => Some(Arc::new(Mutex::new(conn))),
                Err(e) => {
                    warn!(error = %e, "failed to connect to cache store, degrading to no-op cache");
                    None
                }
            },
            None => None,
        };

        Self {
            redis,
            default_ttl,
            stats: Arc::new(Mutex::new(CacheStats::default())),
        }
    }

    pub fn is_up(&self) -> bool {
        self.redis.is_some()
    }

    pub async fn stats(&self) -> CacheStats {
        self.stats.lock().await.clone()
    }

    fn key(fingerprint: &str) -> String {
        format!("{KEY_PREFIX}{fingerprint}")
    }

    pub async fn get(&self, fingerprint: &str) -> Option<FetchResult> {
        let Some(redis) = &self.redis else {
            self.record_miss().await;
            return None;
        };

        let key = Self::key(fingerprint);
        let raw: Option<String> = {
            let mut conn = redis.lock().await;
            conn.get(&key).await.unwrap_or_else(|e| {
                warn!(error = %e, "cache read failed, treating as miss");
                None
            })
        };

        let Some(raw) = raw else {
            self.record_miss().await;
            return None;
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => {
                self.record_hit().await;
                Some(entry.result)
            }
            Err(e) => {
                warn!(error = %e, "cache entry failed to deserialize, treating as miss");
                self.record_miss().await;
                None
            }
        }
    }

    /// Never stores a result whose `error` is populated (§3 invariant).
    pub async fn put(&self, fingerprint: &str, result: &FetchResult, ttl: Option<Duration>) {
        if result.is_error() {
            debug!("refusing to cache a FetchResult carrying an error");
            return;
        }

        let Some(redis) = &self.redis else {
            return;
        };

        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry {
            result: result.clone(),
            inserted_at: Utc::now().timestamp(),
            ttl_seconds: ttl.as_secs(),
        };

        let serialized = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to serialize cache entry, skipping write");
                return;
            }
        };

        let key = Self::key(fingerprint);
        let mut conn = redis.lock().await;
        let result: redis::RedisResult<()> = conn
            .set_ex(&key, serialized, ttl.as_secs().max(1))
            .await;
        if let Err(e) = result {
            warn!(error = %e, "cache write failed, degrading silently");
        }
    }

    pub async fn invalidate(&self, fingerprint: &str) {
        let Some(redis) = &self.redis else {
            return;
        };
        let key = Self::key(fingerprint);
        let mut conn = redis.lock().await;
        let result: redis::RedisResult<()> = conn.del(&key).await;
        if let Err(e) = result {
            warn!(error = %e, "cache invalidate failed, degrading silently");
        }
    }

    async fn record_hit(&self) {
        self.stats.lock().await.hits += 1;
    }

    async fn record_miss(&self) {
        self.stats.lock().await.misses += 1;
    }
}

async fn connect_redis(url: &str) -> redis::RedisResult<redis::aio::MultiplexedConnection> {
    let client = redis::Client::open(url)?;
    client.get_multiplexed_async_connection().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_store_degrades_to_miss() {
        let cache = ResponseCache::connect(None, Duration::from_secs(60)).await;
        assert!(!cache.is_up());
        assert!(cache.get("anything").await.is_none());
        let stats = cache.stats().await;
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn put_is_a_silent_no_op_without_a_store() {
        let cache = ResponseCache::connect(None, Duration::from_secs(60)).await;
        let result = FetchResult {
            url: "https://example.com".into(),
            status_code: 200,
            content_text: "hi".into(),
            content_type: "text/html".into(),
            metadata: Default::default(),
            links: vec![],
            structured_data: Default::default(),
            screenshot_base64: None,
            elapsed_ms: 1,
            cached: false,
            error: None,
        };
        cache.put("fp", &result, None).await;
        assert!(cache.get("fp").await.is_none());
    }
}
