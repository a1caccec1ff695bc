//! Fault tolerance for calls to external services: retry with exponential
//! backoff and jitter, a circuit breaker, and a concurrency bulkhead.

use crate::error::{PaymentError, Result};
use rand::Rng;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Retry strategy: `initial_backoff * 2^attempt` plus up to half of that as
/// random jitter, for at most `max_retries` extra attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given 0-based attempt failed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let backoff = self.initial_backoff.saturating_mul(2u32.saturating_pow(attempt));
        let max_jitter = (backoff / 2).as_millis() as u64;
        let jitter = if max_jitter > 0 {
            rand::thread_rng().gen_range(0..max_jitter)
        } else {
            0
        };
        backoff + Duration::from_millis(jitter)
    }

    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_retries => return Err(err),
                Err(err) => {
                    let wait = self.delay_for_attempt(attempt);
                    tracing::debug!(attempt, ?wait, error = %err, "retrying after failure");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// Trial calls admitted while half-open.
    pub max_half_open: u32,
    /// Counting window while closed.
    pub interval: Duration,
    /// Time spent open before probing again.
    pub open_timeout: Duration,
    pub min_requests: u32,
    pub failure_ratio: f64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            max_half_open: 3,
            interval: Duration::from_secs(30),
            open_timeout: Duration::from_secs(10),
            min_requests: 5,
            failure_ratio: 0.6,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    requests: u32,
    failures: u32,
    consecutive_successes: u32,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    counts: Counts,
    window_start: Instant,
    opened_at: Instant,
    /// Bumped whenever `counts` is reset, so stale admissions can be told apart.
    generation: u64,
}

impl Inner {
    fn reset_counts(&mut self) {
        self.counts = Counts::default();
        self.generation += 1;
    }
}

/// One admitted call. Dropped without [`finish`](Self::finish), it hands its
/// slot back so a cancelled trial cannot wedge the breaker half-open.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    finished: bool,
}

impl Admission<'_> {
    fn finish(mut self, success: bool) {
        self.finished = true;
        self.breaker.record(success);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.breaker.release(self.generation);
        }
    }
}

/// Closed → open when the window holds at least `min_requests` calls with a
/// failure ratio of `failure_ratio` or more; open → half-open after
/// `open_timeout`; half-open → closed after `max_half_open` straight
/// successes, or back to open on the first failure.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: &'static str,
    settings: BreakerSettings,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(service: &'static str, settings: BreakerSettings) -> Self {
        let now = Instant::now();
        Self {
            service,
            settings,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                counts: Counts::default(),
                window_start: now,
                opened_at: now,
                generation: 0,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        self.refresh(&mut inner, Instant::now());
        inner.state
    }

    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let admission = self.admit()?;
        let outcome = op().await;
        admission.finish(outcome.is_ok());
        outcome
    }

    fn refresh(&self, inner: &mut Inner, now: Instant) {
        match inner.state {
            BreakerState::Open if now.duration_since(inner.opened_at) >= self.settings.open_timeout => {
                inner.state = BreakerState::HalfOpen;
                inner.reset_counts();
                tracing::info!(service = self.service, "circuit breaker half-open");
            }
            BreakerState::Closed if now.duration_since(inner.window_start) >= self.settings.interval => {
                inner.reset_counts();
                inner.window_start = now;
            }
            _ => {}
        }
    }

    fn admit(&self) -> Result<Admission<'_>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        self.refresh(&mut inner, Instant::now());
        match inner.state {
            BreakerState::Open => Err(PaymentError::CircuitOpen {
                service: self.service,
            }),
            BreakerState::HalfOpen if inner.counts.requests >= self.settings.max_half_open => {
                Err(PaymentError::CircuitOpen {
                    service: self.service,
                })
            }
            _ => {
                inner.counts.requests += 1;
                Ok(Admission {
                    breaker: self,
                    generation: inner.generation,
                    finished: false,
                })
            }
        }
    }

    fn release(&self, generation: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.generation == generation {
            inner.counts.requests = inner.counts.requests.saturating_sub(1);
        }
    }

    fn record(&self, success: bool) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if success {
            inner.counts.consecutive_successes += 1;
            if inner.state == BreakerState::HalfOpen
                && inner.counts.consecutive_successes >= self.settings.max_half_open
            {
                inner.state = BreakerState::Closed;
                inner.reset_counts();
                inner.window_start = now;
                tracing::info!(service = self.service, "circuit breaker closed");
            }
            return;
        }

        inner.counts.failures += 1;
        inner.counts.consecutive_successes = 0;
        let trip = match inner.state {
            BreakerState::HalfOpen => true,
            BreakerState::Closed => {
                let counts = inner.counts;
                counts.requests >= self.settings.min_requests
                    && f64::from(counts.failures) / f64::from(counts.requests)
                        >= self.settings.failure_ratio
            }
            BreakerState::Open => false,
        };
        if trip {
            inner.state = BreakerState::Open;
            inner.opened_at = now;
            inner.reset_counts();
            tracing::warn!(service = self.service, "circuit breaker open");
        }
    }
}

/// Breaker around retry, behind a bulkhead. One exhausted retry sequence
/// counts as a single breaker failure.
#[derive(Clone)]
pub struct Resilience {
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    bulkhead: Arc<Semaphore>,
}

impl Resilience {
    pub fn new(
        service: &'static str,
        breaker: BreakerSettings,
        retry: RetryPolicy,
        max_concurrency: usize,
    ) -> Self {
        Self {
            breaker: Arc::new(CircuitBreaker::new(service, breaker)),
            retry,
            bulkhead: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _permit = self
            .bulkhead
            .acquire()
            .await
            .map_err(|err| PaymentError::Internal(Box::new(err)))?;
        self.breaker.call(|| self.retry.run(op)).await
    }
}
