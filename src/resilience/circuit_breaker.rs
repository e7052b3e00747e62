//! Circuit breaker for endpoint protection.
//!
//! # States
//! - Closed: normal operation, calls pass through, failures counted
//! - Open: instance assumed down, calls fail fast
//! - Half-Open: a bounded number of trial calls test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures > failure_threshold within the interval
//! Open → Half-Open: after cooldown
//! Half-Open → Closed: max_requests consecutive trial successes
//! Half-Open → Open: any trial failure
//! ```
//!
//! # Design Decisions
//! - Per-endpoint circuit breaker (not global)
//! - Every state change starts a new generation; outcomes of calls admitted
//!   in an older generation are ignored
//! - Admission and its count share one critical section, so a burst at the
//!   Half-Open boundary never exceeds max_requests

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Numeric form exported as a gauge (0=closed, 1=half-open, 2=open).
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        f.write_str(name)
    }
}

/// Thresholds and timings for one breaker.
#[derive(Debug, Clone, Copy)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub interval: Duration,
    pub cooldown: Duration,
    pub max_requests: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self::from(&BreakerConfig::default())
    }
}

impl From<&BreakerConfig> for BreakerSettings {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            interval: config.interval(),
            cooldown: config.cooldown(),
            max_requests: config.max_requests.max(1),
        }
    }
}

/// Rolling counters, reset on every generation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub requests: u32,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    generation: u64,
    counts: Counts,
    /// End of the counting window (Closed) or of the cooldown (Open).
    expiry: Option<Instant>,
}

/// Failure-rate gate guarding one endpoint.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        let name = name.into();
        metrics::record_breaker_state(&name, CircuitState::Closed);
        Self {
            name,
            settings,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry: Instant::now().checked_add(settings.interval),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, after applying any elapsed timers.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        inner.state
    }

    /// Counters of the current generation.
    pub fn counts(&self) -> Counts {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        inner.counts
    }

    /// Ask for admission. The returned guard records the outcome; dropping it
    /// unrecorded gives a Half-Open trial slot back.
    pub fn acquire(&self) -> Option<Admission<'_>> {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());

        match inner.state {
            CircuitState::Open => return None,
            CircuitState::HalfOpen if inner.counts.requests >= self.settings.max_requests => return None,
            _ => {}
        }

        inner.counts.requests += 1;
        Some(Admission {
            breaker: self,
            generation: inner.generation,
            settled: false,
        })
    }

    /// Admission check that keeps its slot until `record_result` is called.
    pub fn allow(&self) -> bool {
        self.acquire().map(Admission::detach).is_some()
    }

    /// Record an outcome against the current generation.
    pub fn record_result(&self, success: bool) {
        let mut inner = self.lock();
        let now = Instant::now();
        self.refresh(&mut inner, now);
        let generation = inner.generation;
        self.apply(&mut inner, generation, success, now);
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, generation: u64, success: bool) {
        let mut inner = self.lock();
        let now = Instant::now();
        self.refresh(&mut inner, now);
        self.apply(&mut inner, generation, success, now);
    }

    fn release(&self, generation: u64) {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        if inner.generation == generation {
            inner.counts.requests = inner.counts.requests.saturating_sub(1);
        }
    }

    fn apply(&self, inner: &mut BreakerInner, generation: u64, success: bool, now: Instant) {
        if inner.generation != generation {
            return;
        }

        if success {
            inner.counts.consecutive_failures = 0;
            inner.counts.consecutive_successes += 1;
            if inner.state == CircuitState::HalfOpen
                && inner.counts.consecutive_successes >= self.settings.max_requests
            {
                self.transition(inner, CircuitState::Closed, now);
            }
        } else {
            inner.counts.consecutive_successes = 0;
            inner.counts.consecutive_failures += 1;
            match inner.state {
                CircuitState::Closed
                    if inner.counts.consecutive_failures > self.settings.failure_threshold =>
                {
                    self.transition(inner, CircuitState::Open, now);
                }
                CircuitState::HalfOpen => self.transition(inner, CircuitState::Open, now),
                _ => {}
            }
        }
    }

    /// Apply elapsed timers: roll the Closed window, end the Open cooldown.
    fn refresh(&self, inner: &mut BreakerInner, now: Instant) {
        let expired = inner.expiry.is_some_and(|expiry| expiry <= now);
        if !expired {
            return;
        }
        match inner.state {
            CircuitState::Closed => self.new_generation(inner, now),
            CircuitState::Open => self.transition(inner, CircuitState::HalfOpen, now),
            CircuitState::HalfOpen => {}
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState, now: Instant) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        self.new_generation(inner, now);

        match to {
            CircuitState::Open => tracing::warn!(
                endpoint = %self.name,
                from = %from,
                cooldown_ms = self.settings.cooldown.as_millis() as u64,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(endpoint = %self.name, from = %from, to = %to, "Circuit breaker state changed"),
        }
        metrics::record_breaker_state(&self.name, to);
    }

    fn new_generation(&self, inner: &mut BreakerInner, now: Instant) {
        inner.generation += 1;
        inner.counts = Counts::default();
        // An unrepresentable expiry never fires.
        inner.expiry = match inner.state {
            CircuitState::Closed => now.checked_add(self.settings.interval),
            CircuitState::Open => now.checked_add(self.settings.cooldown),
            CircuitState::HalfOpen => None,
        };
    }
}

impl Drop for CircuitBreaker {
    fn drop(&mut self) {
        metrics::clear_breaker_state(&self.name);
    }
}

/// Admission granted by a breaker for one call.
#[derive(Debug)]
#[must_use = "dropping an admission without recording it discards the outcome"]
pub struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Admission<'_> {
    /// Report the outcome of the admitted call.
    pub fn record(mut self, success: bool) {
        self.settled = true;
        self.breaker.settle(self.generation, success);
    }

    /// Keep the slot without recording anything.
    fn detach(mut self) {
        self.settled = true;
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release(self.generation);
        }
    }
}
