use std::sync::Mutex;
use std::time::{Duration, Instant};

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Tracks failures on the publish transport and short-circuits requests while
// the transport is unhealthy, so callers get an immediate unavailability
// error instead of piling work onto a dead channel.
//
// States:
// - Closed:   normal operation, requests pass through
// - Open:     too many failures, requests blocked immediately
// - HalfOpen: recovery timeout elapsed, probing requests allowed
//
// The publish path here is synchronous, so the breaker exposes a
// check/record API rather than wrapping a future.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Time to wait before allowing probe requests
    pub recovery_timeout: Duration,
    /// Successes needed to close the circuit from half-open
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

struct Inner {
    state: BreakerState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    config: BreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
            }),
            config,
        }
    }

    /// Whether a request may proceed. Transitions Open -> HalfOpen once the
    /// recovery timeout has elapsed.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|t| t.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);
                if elapsed {
                    tracing::info!("Circuit breaker transitioning to HalfOpen");
                    inner.state = BreakerState::HalfOpen;
                    inner.success_count = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    tracing::info!(
                        successes = inner.success_count,
                        "Circuit breaker closing"
                    );
                    inner.state = BreakerState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.last_failure = None;
                }
            }
            BreakerState::Closed => {
                inner.failure_count = 0;
            }
            BreakerState::Open => {
                tracing::warn!("Success recorded while circuit is open");
            }
        }
    }

    /// Record a failure. Returns true when this failure tripped the circuit
    /// open, so callers can count trips.
    pub fn record_failure(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        match inner.state {
            BreakerState::Closed => {
                if inner.failure_count >= self.config.failure_threshold {
                    tracing::warn!(
                        failures = inner.failure_count,
                        "Circuit breaker opening"
                    );
                    inner.state = BreakerState::Open;
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                tracing::warn!("Failure during half-open, reopening circuit");
                inner.state = BreakerState::Open;
                inner.success_count = 0;
                true
            }
            BreakerState::Open => false,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap().state
    }

    /// Manual reset, for ops tooling.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        tracing::info!("Circuit breaker manually reset");
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_failure = None;
    }
}

// ============================================================================
// Tests
// ============================================================================
