//! `GET /health` response contract.

use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BrowserHealth {
    pub up: bool,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize)]
pub struct CacheHealth {
    pub up: bool,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub browser: BrowserHealth,
    pub cache: CacheHealth,
    pub version: &'static str,
}

pub async fn check_health(state: &AppState) -> HealthResponse {
    let browser_up = state.browser.is_up();
    let cache_up = state.cache.is_up();
    let cache_stats = state.cache.stats().await;

    let status = if browser_up { "healthy" } else { "degraded" };

    HealthResponse {
        status,
        browser: BrowserHealth {
            up: browser_up,
            kind: state.config.browser_type.clone(),
        },
        cache: CacheHealth {
            up: cache_up,
            hits: cache_stats.hits,
            misses: cache_stats.misses,
        },
        version: env!("CARGO_PKG_VERSION"),
    }
}
