//! Circuit breaker guarding calls to the fundamentals provider.
//!
//! ```text
//! ┌─────────┐   failure_threshold   ┌────────┐
//! │ CLOSED  │ ────────────────────► │  OPEN  │
//! └─────────┘       exceeded        └────────┘
//!      ▲                                 │ reset_timeout
//!      │  success_threshold              ▼
//!      │  successes             ┌───────────┐
//!      └─────────────────────── │ HALF_OPEN │
//!                               └───────────┘
//! ```
//!
//! Half-open admits one trial request at a time. A failure while half-open
//! reopens the circuit immediately.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Current state of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - requests allowed
    Closed,
    /// Circuit tripped - requests blocked
    Open,
    /// Testing if the provider recovered
    HalfOpen,
}

/// Configuration for the circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Duration to keep circuit open before testing
    pub reset_timeout: Duration,
    /// Number of successful requests needed to close circuit from half-open
    pub success_threshold: u32,
    /// Name for logging purposes
    pub name: String,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 1,
            name: "default".to_string(),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Thread-safe circuit breaker; share it behind an `Arc`.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    /// Admit a request. While half-open only one trial is admitted until its
    /// outcome is recorded.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.lock();
        self.refresh(&mut inner);

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen if inner.trial_in_flight => false,
            CircuitState::HalfOpen => {
                inner.trial_in_flight = true;
                debug!("🔌 Circuit '{}' admitting a trial request", self.config.name);
                true
            }
        }
    }

    /// How long a caller should wait before asking again: the rest of the open
    /// period, or one reset window while a half-open trial is in flight
    pub fn retry_after(&self) -> Option<Duration> {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                Some(self.config.reset_timeout.saturating_sub(opened_at.elapsed()))
            }
            (CircuitState::HalfOpen, _) if inner.trial_in_flight => Some(self.config.reset_timeout),
            _ => None,
        }
    }

    /// Give back an admitted request whose outcome says nothing about provider health
    pub fn release(&self) {
        self.lock().trial_in_flight = false;
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.trial_in_flight = false;

        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.half_open_successes = 0;
                    inner.opened_at = None;
                    info!("🔌 Circuit '{}' closed, provider recovered", self.config.name);
                }
            }
            // A request admitted before the circuit opened; its success changes nothing
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.trial_in_flight = false;

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    self.open(&mut inner);
                }
            }
            CircuitState::HalfOpen => self.open(&mut inner),
            CircuitState::Open => {}
        }
    }

    fn open(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.half_open_successes = 0;
        warn!(
            "⚡ Circuit '{}' opened after {} consecutive failures, pausing for {:?}",
            self.config.name, inner.consecutive_failures, self.config.reset_timeout
        );
    }

    /// Move an open circuit to half-open once the reset timeout has elapsed
    fn refresh(&self, inner: &mut BreakerInner) {
        if inner.state == CircuitState::Open {
            let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
            if elapsed >= self.config.reset_timeout {
                inner.state = CircuitState::HalfOpen;
                inner.half_open_successes = 0;
                inner.trial_in_flight = false;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
