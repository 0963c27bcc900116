//! Circuit breaker pattern for vendor API resilience.
//!
//! This module implements a circuit breaker that protects the sync pipeline
//! from a failing breed vendor, and a [`FallbackGuard`] that turns every
//! refused or failed call into an explicit fallback value.
//!
//! # Circuit States
//!
//! ```text
//! CLOSED (healthy) --[N failures in window]--> OPEN (rejecting) --[timeout]--> HALF_OPEN (one probe)
//!                                                                                   |
//!                                                 <--[failure]--                    |
//!                                                                                   |
//! CLOSED <-------------------------------------[success]----------------------------+
//! ```
//!
//! # Example
//!
//! ```ignore
//! use petreg_core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, FallbackGuard};
//!
//! let cb = CircuitBreaker::new("cat", CircuitBreakerConfig::default());
//! let guard = FallbackGuard::new(cb, |_reason| Vec::new());
//!
//! let outcome = guard.call(|| client.fetch_all()).await;
//! if outcome.is_fallback() {
//!     // vendor unreachable, an empty list was substituted
//! }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::AppError;

/// Current state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed - requests flow normally.
    Closed,
    /// Circuit is open - requests are rejected immediately.
    Open,
    /// Circuit is half-open - a single trial request is allowed.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failures inside `failure_window` that open the circuit.
    pub failure_threshold: u32,

    /// Sliding window over which failures are counted.
    pub failure_window: Duration,

    /// Time to wait before transitioning from Open to Half-Open.
    pub recovery_timeout: Duration,

    /// Upper bound on a single guarded call. Elapsing counts as a failure.
    pub call_timeout: Duration,

    /// When rate limit (429) is detected, multiply recovery_timeout by this factor.
    pub rate_limit_backoff_multiplier: f32,

    /// Maximum recovery timeout after rate limit backoffs.
    pub max_recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            recovery_timeout: Duration::from_secs(30),
            call_timeout: Duration::from_secs(20),
            rate_limit_backoff_multiplier: 2.0,
            max_recovery_timeout: Duration::from_secs(300), // 5 minutes
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates config from environment variables with fallback to defaults.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies `CB_*` environment variables on top of this config.
    ///
    /// Recognized: `CB_FAILURE_THRESHOLD`, `CB_FAILURE_WINDOW_SECS`,
    /// `CB_RECOVERY_TIMEOUT_SECS`, `CB_CALL_TIMEOUT_SECS`.
    pub fn with_env_overrides(mut self) -> Self {
        fn env_u64(key: &str) -> Option<u64> {
            std::env::var(key).ok().and_then(|v| v.parse().ok())
        }

        if let Some(v) = std::env::var("CB_FAILURE_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.failure_threshold = v;
        }
        if let Some(v) = env_u64("CB_FAILURE_WINDOW_SECS") {
            self.failure_window = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("CB_RECOVERY_TIMEOUT_SECS") {
            self.recovery_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("CB_CALL_TIMEOUT_SECS") {
            self.call_timeout = Duration::from_secs(v);
        }
        self
    }
}

/// Internal state tracking for the circuit breaker.
#[derive(Debug)]
struct CircuitBreakerInner {
    state: CircuitState,
    /// Timestamps of tripping failures while closed, oldest first.
    failures: VecDeque<Instant>,
    last_failure_time: Option<Instant>,
    opened_at: Option<Instant>,
    last_error_message: Option<String>,
    current_recovery_timeout: Duration,
    probe_in_flight: bool,
}

impl CircuitBreakerInner {
    fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            failures: VecDeque::new(),
            last_failure_time: None,
            opened_at: None,
            last_error_message: None,
            current_recovery_timeout: config.recovery_timeout,
            probe_in_flight: false,
        }
    }

    fn prune(&mut self, window: Duration) {
        while let Some(oldest) = self.failures.front() {
            if oldest.elapsed() > window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    fn remaining_open(&self) -> Duration {
        self.opened_at
            .map(|t| self.current_recovery_timeout.saturating_sub(t.elapsed()))
            .unwrap_or(self.current_recovery_timeout)
    }

    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
    }
}

/// Statistics about circuit breaker state for monitoring.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    /// Name of the circuit breaker.
    pub name: String,
    /// Current state.
    pub state: CircuitState,
    /// Failures counted in the current window.
    pub failure_count: u32,
    /// Last error message if any.
    pub last_error: Option<String>,
    /// Time until circuit may transition to half-open (if currently open).
    pub time_until_half_open: Option<Duration>,
}

/// Error type for circuit breaker operations.
#[derive(Debug)]
pub enum CircuitBreakerError {
    /// Circuit is open (or its single half-open probe is busy) - the request
    /// was rejected without calling the service.
    Open {
        /// Name of the circuit breaker.
        name: String,
        /// Time until the circuit may transition to half-open.
        retry_after: Duration,
    },
    /// The inner operation failed.
    Inner(AppError),
}

impl fmt::Display for CircuitBreakerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitBreakerError::Open { name, retry_after } => {
                write!(
                    f,
                    "Circuit breaker '{}' is open. Retry after {} seconds.",
                    name,
                    retry_after.as_secs()
                )
            }
            CircuitBreakerError::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CircuitBreakerError {}

/// Releases the half-open probe slot when the trial call ends or is dropped.
struct ProbePermit {
    inner: Arc<Mutex<CircuitBreakerInner>>,
}

impl Drop for ProbePermit {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.probe_in_flight = false;
    }
}

/// Thread-safe circuit breaker for protecting vendor API calls.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<CircuitBreakerInner>>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker with the given name and configuration.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let inner = CircuitBreakerInner::new(&config);
        Self {
            name: name.into(),
            config,
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns the name of this circuit breaker.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration this breaker was built with.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, CircuitBreakerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the current state of the circuit.
    ///
    /// Note: This also handles lazy state transitions from Open to HalfOpen
    /// when the recovery timeout has elapsed.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.maybe_transition_to_half_open(&mut inner);
        inner.state
    }

    /// Returns circuit breaker statistics for monitoring.
    pub fn stats(&self) -> CircuitBreakerStats {
        let mut inner = self.lock();
        self.maybe_transition_to_half_open(&mut inner);
        if inner.state == CircuitState::Closed {
            inner.prune(self.config.failure_window);
        }

        let time_until_half_open = if inner.state == CircuitState::Open {
            Some(inner.remaining_open())
        } else {
            None
        };

        CircuitBreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failures.len() as u32,
            last_error: inner.last_error_message.clone(),
            time_until_half_open,
        }
    }

    /// Executes the given operation through the circuit breaker.
    ///
    /// - If circuit is Closed: executes operation, tracks success/failure
    /// - If circuit is Open: returns `CircuitBreakerError::Open` immediately
    ///   without calling `operation`
    /// - If circuit is HalfOpen: executes operation as the single probe and
    ///   transitions based on the result; concurrent callers are rejected
    ///
    /// The operation is bounded by `call_timeout`.
    pub async fn call<F, T, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let _probe = self.admit()?;

        let result = match tokio::time::timeout(self.config.call_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(self.config.call_timeout.as_secs())),
        };

        match &result {
            Ok(_) => self.record_success(),
            Err(e) if e.should_trip_circuit() => self.record_failure(e),
            Err(e) => self.record_failed_trial(e),
        }

        result.map_err(CircuitBreakerError::Inner)
    }

    /// Decides whether a call may proceed, reserving the probe slot when half-open.
    fn admit(&self) -> Result<Option<ProbePermit>, CircuitBreakerError> {
        let mut inner = self.lock();
        self.maybe_transition_to_half_open(&mut inner);

        match inner.state {
            CircuitState::Closed => Ok(None),
            CircuitState::Open => Err(CircuitBreakerError::Open {
                name: self.name.clone(),
                retry_after: inner.remaining_open(),
            }),
            CircuitState::HalfOpen if inner.probe_in_flight => Err(CircuitBreakerError::Open {
                name: self.name.clone(),
                retry_after: Duration::ZERO,
            }),
            CircuitState::HalfOpen => {
                inner.probe_in_flight = true;
                Ok(Some(ProbePermit {
                    inner: Arc::clone(&self.inner),
                }))
            }
        }
    }

    /// Records a successful operation.
    pub fn record_success(&self) {
        let mut inner = self.lock();

        match inner.state {
            CircuitState::HalfOpen => {
                tracing::info!(circuit = %self.name, "Circuit breaker closing after successful probe");
                inner.state = CircuitState::Closed;
                inner.failures.clear();
                inner.opened_at = None;
                inner.last_error_message = None;
                inner.current_recovery_timeout = self.config.recovery_timeout;
            }
            CircuitState::Closed => {
                inner.failures.clear();
            }
            CircuitState::Open => {}
        }
    }

    /// Records a failed operation.
    pub fn record_failure(&self, error: &AppError) {
        let mut inner = self.lock();
        let is_rate_limit = matches!(error, AppError::RateLimitExceeded);
        let now = Instant::now();

        inner.last_failure_time = Some(now);
        inner.last_error_message = Some(error.to_string());

        match inner.state {
            CircuitState::Closed => {
                inner.failures.push_back(now);
                inner.prune(self.config.failure_window);

                let failures = inner.failures.len() as u32;
                if failures >= self.config.failure_threshold {
                    tracing::warn!(
                        circuit = %self.name,
                        failures,
                        error = %error,
                        "Circuit breaker opening after {} failures",
                        failures
                    );
                    if is_rate_limit {
                        self.extend_recovery_timeout(&mut inner);
                    }
                    inner.open();
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!(
                    circuit = %self.name,
                    error = %error,
                    "Circuit breaker probe failed, returning to open state"
                );
                if is_rate_limit {
                    self.extend_recovery_timeout(&mut inner);
                }
                inner.open();
            }
            CircuitState::Open => {}
        }
    }

    /// Reopens a half-open circuit after a trial that failed with a non-tripping error.
    ///
    /// Such errors are not counted while closed, but any failed trial ends the half-open window.
    fn record_failed_trial(&self, error: &AppError) {
        let mut inner = self.lock();
        if inner.state != CircuitState::HalfOpen {
            return;
        }

        tracing::warn!(
            circuit = %self.name,
            error = %error,
            "Circuit breaker trial call failed, returning to open state"
        );
        inner.last_failure_time = Some(Instant::now());
        inner.last_error_message = Some(error.to_string());
        inner.open();
    }

    /// Manually resets the circuit breaker to closed state.
    pub fn reset(&self) {
        let mut inner = self.lock();
        tracing::info!(circuit = %self.name, "Circuit breaker manually reset");
        inner.state = CircuitState::Closed;
        inner.failures.clear();
        inner.last_failure_time = None;
        inner.opened_at = None;
        inner.last_error_message = None;
        inner.current_recovery_timeout = self.config.recovery_timeout;
    }

    fn extend_recovery_timeout(&self, inner: &mut CircuitBreakerInner) {
        inner.current_recovery_timeout = std::cmp::min(
            Duration::from_secs_f32(
                inner.current_recovery_timeout.as_secs_f32()
                    * self.config.rate_limit_backoff_multiplier,
            ),
            self.config.max_recovery_timeout,
        );
        tracing::info!(
            circuit = %self.name,
            recovery_timeout_secs = inner.current_recovery_timeout.as_secs(),
            "Extended recovery timeout due to rate limit"
        );
    }

    /// Check if we should transition from Open to HalfOpen.
    fn maybe_transition_to_half_open(&self, inner: &mut CircuitBreakerInner) {
        if inner.state == CircuitState::Open
            && inner
                .opened_at
                .is_some_and(|t| t.elapsed() >= inner.current_recovery_timeout)
        {
            tracing::info!(
                circuit = %self.name,
                "Circuit breaker transitioning to half-open state"
            );
            inner.state = CircuitState::HalfOpen;
        }
    }
}

// =============================================================================
// Fallback Guard
// =============================================================================

/// Why a guarded call produced the fallback value instead of a live result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The circuit refused the call; the operation was not invoked.
    CircuitOpen { retry_after: Duration },
    /// The operation ran and failed (or timed out).
    Failed { error: String },
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::CircuitOpen { retry_after } => {
                write!(f, "circuit open (retry after {}s)", retry_after.as_secs())
            }
            FallbackReason::Failed { error } => write!(f, "call failed: {}", error),
        }
    }
}

/// Result of a call through a [`FallbackGuard`].
#[derive(Debug, Clone, PartialEq)]
pub enum Guarded<T> {
    /// The operation answered.
    Live(T),
    /// The fallback value was substituted.
    Fallback { value: T, reason: FallbackReason },
}

impl<T> Guarded<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Guarded::Fallback { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            Guarded::Live(value) | Guarded::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Guarded::Live(value) | Guarded::Fallback { value, .. } => value,
        }
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            Guarded::Live(_) => None,
            Guarded::Fallback { reason, .. } => Some(reason),
        }
    }
}

type FallbackFn<T> = Arc<dyn Fn(&FallbackReason) -> T + Send + Sync>;

/// A circuit breaker paired with an explicit fallback function.
///
/// The fallback has the same result type as the wrapped operation and is
/// invoked whenever the breaker refuses the call or the call fails. Errors
/// never reach the caller; the [`Guarded`] variant tells them apart from a
/// live answer.
pub struct FallbackGuard<T> {
    breaker: CircuitBreaker,
    fallback: FallbackFn<T>,
}

impl<T> Clone for FallbackGuard<T> {
    fn clone(&self) -> Self {
        Self {
            breaker: self.breaker.clone(),
            fallback: Arc::clone(&self.fallback),
        }
    }
}

impl<T> FallbackGuard<T> {
    /// Creates a guard around `breaker` that substitutes `fallback(reason)`.
    pub fn new<F>(breaker: CircuitBreaker, fallback: F) -> Self
    where
        F: Fn(&FallbackReason) -> T + Send + Sync + 'static,
    {
        Self {
            breaker,
            fallback: Arc::new(fallback),
        }
    }

    /// The underlying breaker, for stats and manual resets.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Runs `operation` through the breaker, substituting the fallback on refusal or failure.
    pub async fn call<F, Fut>(&self, operation: F) -> Guarded<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        match self.breaker.call(operation).await {
            Ok(value) => Guarded::Live(value),
            Err(err) => {
                let reason = match err {
                    CircuitBreakerError::Open { retry_after, .. } => {
                        FallbackReason::CircuitOpen { retry_after }
                    }
                    CircuitBreakerError::Inner(e) => FallbackReason::Failed {
                        error: e.to_string(),
                    },
                };
                Guarded::Fallback {
                    value: (self.fallback)(&reason),
                    reason,
                }
            }
        }
    }
}

impl<T: Default> FallbackGuard<T> {
    /// Creates a guard whose fallback is `T::default()` (an empty list for `Vec`).
    pub fn with_default(breaker: CircuitBreaker) -> Self {
        Self::new(breaker, |_| T::default())
    }
}
