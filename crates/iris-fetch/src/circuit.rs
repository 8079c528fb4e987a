//! Circuit breaker guarding the attempt loop against a host that is
//! consistently failing, so retries don't pile up against a dead upstream.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_cooldown: Duration,
    pub half_open_max_in_flight: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_cooldown: Duration::from_secs(30),
            half_open_max_in_flight: 3,
        }
    }
}

/// Injectable clock so cooldown transitions can be tested without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: AtomicU8,
    failure_count: AtomicU32,
    opened_at_millis: AtomicU64,
    half_open_gate: Semaphore,
    clock: Arc<dyn Clock>,
    epoch: Instant,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(RealClock))
    }

    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let half_open_max = config.half_open_max_in_flight;
        Self {
            config,
            state: AtomicU8::new(STATE_CLOSED),
            failure_count: AtomicU32::new(0),
            opened_at_millis: AtomicU64::new(0),
            half_open_gate: Semaphore::new(half_open_max),
            clock,
            epoch: Instant::now(),
        }
    }

    pub fn state(&self) -> State {
        self.maybe_transition_to_half_open();
        match self.state.load(Ordering::SeqCst) {
            STATE_OPEN => State::Open,
            STATE_HALF_OPEN => State::HalfOpen,
            _ => State::Closed,
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }

    fn maybe_transition_to_half_open(&self) {
        if self.state.load(Ordering::SeqCst) != STATE_OPEN {
            return;
        }
        let opened_at = self.opened_at_millis.load(Ordering::SeqCst);
        let elapsed = self.clock.now().saturating_duration_since(self.epoch);
        if elapsed.as_millis() as u64 >= opened_at + self.config.open_cooldown.as_millis() as u64 {
            let _ = self.state.compare_exchange(
                STATE_OPEN,
                STATE_HALF_OPEN,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
    }

    /// Whether a caller may attempt a call right now. `HalfOpen` callers
    /// must hold a trial permit, bounding how many probes run concurrently.
    pub fn allow_request(&self) -> bool {
        match self.state() {
            State::Closed => true,
            State::Open => false,
            State::HalfOpen => self.half_open_gate.try_acquire().is_ok(),
        }
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::SeqCst);
        self.state.store(STATE_CLOSED, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.config.failure_threshold {
            let elapsed = self.clock.now().saturating_duration_since(self.epoch);
            self.opened_at_millis
                .store(elapsed.as_millis() as u64, Ordering::SeqCst);
            self.state.store(STATE_OPEN, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct TestClock(Mutex<Instant>);

    impl TestClock {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(Instant::now())))
        }

        fn advance(&self, d: Duration) {
            let mut t = self.0.lock().unwrap();
            *t += d;
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            *self.0.lock().unwrap()
        }
    }

    #[test]
    fn opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 3,
            ..Default::default()
        });
        assert_eq!(breaker.state(), State::Closed);
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), State::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), State::Open);
    }

    #[test]
    fn transitions_to_half_open_after_cooldown() {
        let clock = TestClock::new();
        let breaker = CircuitBreaker::with_clock(
            CircuitBreakerConfig {
                failure_threshold: 1,
                open_cooldown: Duration::from_secs(10),
                ..Default::default()
            },
            clock.clone(),
        );
        breaker.record_failure();
        assert_eq!(breaker.state(), State::Open);

        clock.advance(Duration::from_secs(11));
        assert_eq!(breaker.state(), State::HalfOpen);
    }

    #[test]
    fn success_resets_to_closed() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        });
        breaker.record_failure();
        assert_eq!(breaker.state(), State::Open);
        breaker.record_success();
        assert_eq!(breaker.state(), State::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn open_circuit_denies_requests() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_cooldown: Duration::from_secs(3600),
            ..Default::default()
        });
        breaker.record_failure();
        assert!(!breaker.allow_request());
    }
}
