//! Failure isolation for the automation steps.
//!
//! # States
//! - Closed: operations run; consecutive failures are counted.
//! - Open: operations are rejected until the cooldown expires.
//! - Half-open: operations run again; enough successes close the breaker,
//!   any failure reopens it.
//!
//! ```text
//! Closed → Open: failures >= max_failures
//! Open → HalfOpen: reset_timeout elapsed since the last failure
//! HalfOpen → Closed: successes >= half_open_success_threshold
//! HalfOpen → Open: failures >= max_failures
//! ```
//!
//! An operation that returns a non-successful value without erroring is
//! booked as a failure, but its value is still handed back to the caller.

use std::future::Future;
use std::sync::Mutex;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::BreakerConfig;
use crate::{OvexError, Result};

/// Values the breaker can judge as success or failure.
pub trait Outcome {
    fn is_success(&self) -> bool;
}

impl Outcome for bool {
    fn is_success(&self) -> bool {
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerMetrics {
    pub module_name: String,
    pub state: BreakerState,
    pub failures: u32,
    pub max_failures: u32,
    pub success_count: u32,
    pub time_since_last_failure_ms: Option<u64>,
    pub is_available: bool,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failures: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

pub struct CircuitBreaker {
    module: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(module: impl Into<String>, config: BreakerConfig) -> Self {
        let module = module.into();
        debug!(
            module = %module,
            max_failures = config.max_failures,
            reset_timeout_ms = config.reset_timeout.as_millis() as u64,
            "circuit breaker initialised"
        );
        Self {
            module,
            config,
            inner: Mutex::new(Inner { state: BreakerState::Closed, failures: 0, success_count: 0, last_failure: None }),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cooldown_elapsed(&self, inner: &Inner) -> bool {
        inner
            .last_failure
            .is_none_or(|at| at.elapsed() >= self.config.reset_timeout)
    }

    /// Moves Open to HalfOpen once the cooldown has expired; errors while still open.
    fn admit(&self, operation: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.state == BreakerState::Open && self.cooldown_elapsed(&inner) {
            inner.state = BreakerState::HalfOpen;
            info!(module = %self.module, "circuit breaker half-open");
        }

        if inner.state == BreakerState::Open {
            debug!(module = %self.module, operation, "circuit breaker open, rejecting");
            return Err(OvexError::CircuitOpen { module: self.module.clone() });
        }

        debug!(module = %self.module, operation, state = ?inner.state, "executing");
        Ok(())
    }

    /// Runs `operation` under the breaker.
    ///
    /// Errors are booked as failures and returned. Non-successful values are
    /// booked as failures and returned as `Ok`.
    pub async fn execute<T, F, Fut>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        T: Outcome + std::fmt::Debug,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.admit(operation_name)?;

        let started = Instant::now();
        match operation().await {
            Ok(value) => {
                debug!(
                    module = %self.module,
                    operation = operation_name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    result = ?value,
                    "operation finished"
                );
                if value.is_success() {
                    self.on_success();
                } else {
                    self.on_failure(&format!("operation returned {:?}", value));
                }
                Ok(value)
            }
            Err(e) => {
                warn!(module = %self.module, operation = operation_name, error = %e, "operation failed");
                self.on_failure(&e.to_string());
                Err(e)
            }
        }
    }

    /// Runs `operation` up to `max_retries + 1` times, `retry_delay` apart.
    ///
    /// Stops at the first success, and immediately when the breaker is open.
    /// The last non-successful value or error is returned.
    pub async fn execute_with_retry<T, F, Fut>(&self, operation_name: &str, max_retries: u32, mut operation: F) -> Result<T>
    where
        T: Outcome + std::fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = max_retries + 1;
        let mut attempt = 1;

        loop {
            debug!(module = %self.module, operation = operation_name, attempt, attempts, "attempt");

            match self.execute(operation_name, &mut operation).await {
                Ok(value) if value.is_success() => return Ok(value),
                Ok(value) => {
                    if attempt >= attempts || self.state() == BreakerState::Open {
                        return Ok(value);
                    }
                    debug!(module = %self.module, operation = operation_name, "soft failure, retrying");
                }
                Err(e) => {
                    if self.state() == BreakerState::Open {
                        debug!(module = %self.module, "circuit breaker open, stopping retries");
                        return Err(e);
                    }
                    if attempt >= attempts {
                        warn!(module = %self.module, operation = operation_name, attempt, "giving up");
                        return Err(e);
                    }
                }
            }

            attempt += 1;
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.half_open_success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.failures = 0;
                    inner.success_count = 0;
                    info!(module = %self.module, "circuit breaker closed");
                }
            }
            BreakerState::Closed => {
                if inner.failures > 0 {
                    debug!(module = %self.module, failures = inner.failures, "success resets failure count");
                    inner.failures = 0;
                }
            }
            BreakerState::Open => {}
        }
    }

    fn on_failure(&self, reason: &str) {
        let mut inner = self.lock();
        inner.failures += 1;
        inner.last_failure = Some(Instant::now());

        debug!(module = %self.module, failures = inner.failures, max = self.config.max_failures, reason, "failure");

        if inner.failures >= self.config.max_failures {
            inner.state = BreakerState::Open;
            inner.success_count = 0;
            warn!(module = %self.module, "circuit breaker opened");
        }
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn is_available(&self) -> bool {
        let inner = self.lock();
        inner.state != BreakerState::Open || self.cooldown_elapsed(&inner)
    }

    pub fn reset(&self) {
        let mut inner = self.lock();
        let previous = inner.state;
        *inner = Inner { state: BreakerState::Closed, failures: 0, success_count: 0, last_failure: None };
        info!(module = %self.module, ?previous, "circuit breaker reset");
    }

    pub fn metrics(&self) -> BreakerMetrics {
        let inner = self.lock();
        BreakerMetrics {
            module_name: self.module.clone(),
            state: inner.state,
            failures: inner.failures,
            max_failures: self.config.max_failures,
            success_count: inner.success_count,
            time_since_last_failure_ms: inner.last_failure.map(|at| at.elapsed().as_millis() as u64),
            is_available: inner.state != BreakerState::Open || self.cooldown_elapsed(&inner),
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("module", &self.module)
            .field("state", &self.state())
            .finish()
    }
}
