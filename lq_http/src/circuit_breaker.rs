use std::sync::OnceLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use crate::errors::HttpError;
use crate::errors::Result;

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests pass through
    Closed,
    /// Requests are rejected
    Open,
    /// Trial requests pass to probe recovery
    HalfOpen,
}

impl CircuitState {
    fn from_raw(raw: usize) -> Self {
        match raw {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failure ratio that opens the circuit (0.5 = 50%)
    pub failure_threshold: f64,

    /// Requests seen in the window before the circuit may open
    pub minimum_requests: usize,

    /// How long the circuit stays open before a trial request
    pub open_timeout: Duration,

    /// Successful trial requests needed to close again
    pub success_threshold: usize,

    /// Statistics window
    pub window_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 0.5,
            minimum_requests: 10,
            open_timeout: Duration::from_secs(30),
            success_threshold: 3,
            window_duration: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Opens quickly, used with the low latency client profile
    pub fn aggressive() -> Self {
        Self {
            failure_threshold: 0.3,
            minimum_requests: 5,
            open_timeout: Duration::from_secs(10),
            success_threshold: 5,
            window_duration: Duration::from_secs(30),
        }
    }

    /// Tolerates long maintenance windows
    pub fn conservative() -> Self {
        Self {
            failure_threshold: 0.7,
            minimum_requests: 20,
            open_timeout: Duration::from_secs(60),
            success_threshold: 2,
            window_duration: Duration::from_secs(120),
        }
    }
}

/// Circuit breaker guarding the exchange connection
///
/// Only transport failures and outage replies (maintenance, bans, bad
/// gateway pages) count as failures. Business rejections such as
/// insufficient funds mean the exchange is answering and count as
/// successes; errors raised before a request leaves the client are ignored.
pub struct CircuitBreaker {
    state: AtomicUsize,

    /// Nanos since process start when the circuit opened
    opened_at: AtomicU64,

    total_requests: AtomicUsize,

    failed_requests: AtomicUsize,

    half_open_successes: AtomicUsize,

    window_start: AtomicU64,

    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicUsize::new(CircuitState::Closed as usize),
            opened_at: AtomicU64::new(0),
            total_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            half_open_successes: AtomicUsize::new(0),
            window_start: AtomicU64::new(now_nanos()),
            config,
        }
    }

    /// Run `f` if the circuit allows it and record the outcome
    pub async fn call_async<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.check_allow()?;

        let result = f().await;
        self.record(&result);
        result
    }

    /// Record the outcome of a request that passed `check_allow`
    pub fn record<T>(&self, result: &Result<T>) {
        match result {
            Ok(_) => self.record_success(),
            Err(err) if err.trips_circuit() => self.record_failure(),
            Err(err) if err.is_exchange_reply() => self.record_success(),
            Err(_) => {}
        }
    }

    /// Admit or reject a request without running it
    pub fn check_allow(&self) -> Result<()> {
        self.reset_window_if_needed();

        match self.current_state() {
            CircuitState::Closed | CircuitState::HalfOpen => {
                self.total_requests.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            CircuitState::Open => {
                let opened_at = self.opened_at.load(Ordering::Acquire);
                let elapsed = Duration::from_nanos(now_nanos().saturating_sub(opened_at));

                if elapsed >= self.config.open_timeout {
                    tracing::info!(?elapsed, "circuit half-open, sending trial request");
                    self.set_state(CircuitState::HalfOpen);
                    self.half_open_successes.store(0, Ordering::Relaxed);
                    self.total_requests.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                } else {
                    Err(HttpError::CircuitBreakerOpen)
                }
            }
        }
    }

    pub fn record_success(&self) {
        if self.current_state() != CircuitState::HalfOpen {
            return;
        }

        let successes = self.half_open_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= self.config.success_threshold {
            tracing::info!(successes, "circuit closed");
            self.set_state(CircuitState::Closed);
            self.reset_statistics();
        }
    }

    pub fn record_failure(&self) {
        match self.current_state() {
            CircuitState::Closed => {
                let failed = self.failed_requests.fetch_add(1, Ordering::Relaxed) + 1;
                let total = self.total_requests.load(Ordering::Relaxed);

                if total >= self.config.minimum_requests && failed as f64 / total as f64 >= self.config.failure_threshold {
                    tracing::warn!(failed, total, "failure rate over threshold, opening circuit");
                    self.open_circuit();
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!("trial request failed, reopening circuit");
                self.open_circuit();
            }
            CircuitState::Open => {}
        }
    }

    pub fn current_state(&self) -> CircuitState {
        CircuitState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let failed_requests = self.failed_requests.load(Ordering::Relaxed);
        let failure_rate = if total_requests == 0 { 0.0 } else { failed_requests as f64 / total_requests as f64 };

        CircuitBreakerStats { state: self.current_state(), total_requests, failed_requests, failure_rate }
    }

    fn set_state(&self, state: CircuitState) {
        self.state.store(state as usize, Ordering::Release);
    }

    fn open_circuit(&self) {
        self.opened_at.store(now_nanos(), Ordering::Release);
        self.set_state(CircuitState::Open);
    }

    fn reset_statistics(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.failed_requests.store(0, Ordering::Relaxed);
        self.half_open_successes.store(0, Ordering::Relaxed);
        self.window_start.store(now_nanos(), Ordering::Relaxed);
    }

    fn reset_window_if_needed(&self) {
        let now = now_nanos();
        let window_start = self.window_start.load(Ordering::Relaxed);

        if Duration::from_nanos(now.saturating_sub(window_start)) < self.config.window_duration {
            return;
        }

        // Losing the race only delays the reset
        if self.window_start.compare_exchange(window_start, now, Ordering::Release, Ordering::Relaxed).is_ok() {
            self.total_requests.store(0, Ordering::Relaxed);
            self.failed_requests.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

fn now_nanos() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub total_requests: usize,
    pub failed_requests: usize,
    pub failure_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exceptions::ErrorKind;

    fn outage() -> HttpError {
        HttpError::Exchange { kind: ErrorKind::ExchangeNotAvailable, message: "503".into() }
    }

    fn rejection() -> HttpError {
        HttpError::Exchange { kind: ErrorKind::InvalidOrder, message: "LOT_SIZE".into() }
    }

    #[test]
    fn test_circuit_breaker_creation() {
        let cb = CircuitBreaker::new();
        assert_eq!(cb.current_state(), CircuitState::Closed);
        assert_eq!(cb.stats().failure_rate, 0.0);
    }

    #[tokio::test]
    async fn test_successful_requests() {
        let cb = CircuitBreaker::new();

        for _ in 0..10 {
            let result = cb.call_async(|| async { Ok::<_, HttpError>(42) }).await;
            assert_eq!(result.unwrap(), 42);
        }

        let stats = cb.stats();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.total_requests, 10);
        assert_eq!(stats.failed_requests, 0);
    }

    #[tokio::test]
    async fn test_outages_open_circuit() {
        let config = CircuitBreakerConfig { failure_threshold: 0.5, minimum_requests: 5, ..Default::default() };
        let cb = CircuitBreaker::with_config(config);

        for _ in 0..2 {
            let _ = cb.call_async(|| async { Ok::<_, HttpError>(()) }).await;
        }
        for _ in 0..2 {
            let _ = cb.call_async(|| async { Err::<(), _>(outage()) }).await;
        }

        // 4 requests, below the minimum
        assert_eq!(cb.current_state(), CircuitState::Closed);

        let _ = cb.call_async(|| async { Err::<(), _>(outage()) }).await;
        assert_eq!(cb.current_state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_rejections_keep_circuit_closed() {
        let config = CircuitBreakerConfig { failure_threshold: 0.5, minimum_requests: 2, ..Default::default() };
        let cb = CircuitBreaker::with_config(config);

        for _ in 0..10 {
            let _ = cb.call_async(|| async { Err::<(), _>(rejection()) }).await;
        }

        assert_eq!(cb.current_state(), CircuitState::Closed);
        assert_eq!(cb.stats().failed_requests, 0);
    }

    #[test]
    fn test_circuit_rejects_when_open() {
        let config = CircuitBreakerConfig { failure_threshold: 0.5, minimum_requests: 2, open_timeout: Duration::from_secs(3600), ..Default::default() };
        let cb = CircuitBreaker::with_config(config);

        for _ in 0..2 {
            cb.check_allow().unwrap();
            cb.record(&Err::<(), _>(outage()));
        }

        assert_eq!(cb.current_state(), CircuitState::Open);
        assert!(matches!(cb.check_allow(), Err(HttpError::CircuitBreakerOpen)));
    }

    #[test]
    fn test_half_open_recovery() {
        let config = CircuitBreakerConfig {
            failure_threshold: 0.5,
            minimum_requests: 1,
            open_timeout: Duration::ZERO,
            success_threshold: 2,
            ..Default::default()
        };
        let cb = CircuitBreaker::with_config(config);

        cb.check_allow().unwrap();
        cb.record_failure();
        assert_eq!(cb.current_state(), CircuitState::Open);

        cb.check_allow().unwrap();
        assert_eq!(cb.current_state(), CircuitState::HalfOpen);
        cb.record_success();
        cb.check_allow().unwrap();
        cb.record_success();

        assert_eq!(cb.current_state(), CircuitState::Closed);
        assert_eq!(cb.stats().total_requests, 0);
    }

    #[test]
    fn test_local_errors_are_not_recorded() {
        let cb = CircuitBreaker::with_config(CircuitBreakerConfig { minimum_requests: 1, ..Default::default() });

        cb.check_allow().unwrap();
        cb.record(&Err::<(), _>(HttpError::RateLimitExceeded));

        assert_eq!(cb.stats().failed_requests, 0);
        assert_eq!(cb.current_state(), CircuitState::Closed);
    }

    #[test]
    fn test_presets() {
        assert_eq!(CircuitBreakerConfig::aggressive().minimum_requests, 5);
        assert_eq!(CircuitBreakerConfig::conservative().failure_threshold, 0.7);
    }
}
