//! The fetch pipeline: URL validation, robots/rate-limit gating, the
//! headless-browser attempt loop, and the response cache, composed behind
//! `Fetcher`.

pub mod circuit;
pub mod domain;
pub mod fetcher;
pub mod http_client;
pub mod rate_limit;
pub mod retry;
pub mod robots;

pub use circuit::{CircuitBreaker, CircuitBreakerConfig, State as CircuitState};
pub use domain::{origin, registrable_domain};
pub use fetcher::{Fetcher, FetcherConfig, MAX_BATCH_SIZE};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use retry::RetryConfig;
pub use robots::{RobotsConfig, RobotsPolicy};
