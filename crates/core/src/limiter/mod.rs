//! Token-bucket rate limiting with adaptive backoff.
//!
//! One [`TokenBucketLimiter`] paces calls to one upstream endpoint. Tokens
//! refill continuously at `rate_per_minute / 60` per second up to `burst`.
//! After consecutive failures the wait for an empty bucket is stretched by
//! `min(32, 2^failures)`; a success resets it.
//!
//! [`EndpointLimiterRegistry`] owns one limiter per endpoint name.

mod registry;

pub use registry::{EndpointLimiterRegistry, LimiterDefaults};

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Upper bound for the backoff multiplier.
pub const MAX_BACKOFF: f64 = 32.0;

/// Limiter statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LimiterStats {
    pub rate_per_minute: u32,
    pub total_requests: u64,
    pub total_waits: u64,
    /// Seconds spent waiting for tokens.
    pub total_wait_time: f64,
    pub average_wait_time: f64,
    pub current_backoff: f64,
    pub consecutive_failures: u32,
    /// Tokens as of the last refill.
    pub tokens_available: f64,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    consecutive_failures: u32,
    backoff_multiplier: f64,
    total_requests: u64,
    total_waits: u64,
    total_wait_time: Duration,
}

impl BucketState {
    fn full(burst: f64) -> Self {
        Self {
            tokens: burst,
            last_refill: Instant::now(),
            consecutive_failures: 0,
            backoff_multiplier: 1.0,
            total_requests: 0,
            total_waits: 0,
            total_wait_time: Duration::ZERO,
        }
    }
}

/// Rate limiter for one endpoint.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    rate_per_minute: u32,
    burst: f64,
    adaptive: bool,
    state: Mutex<BucketState>,
    /// Held by the caller currently waiting for a token, so waiters are served in order.
    turnstile: tokio::sync::Mutex<()>,
}

impl TokenBucketLimiter {
    /// Create a limiter with a full bucket. Zero rate or burst are raised to 1.
    pub fn new(rate_per_minute: u32, burst: u32, adaptive: bool) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate_per_minute: rate_per_minute.max(1),
            burst,
            adaptive,
            state: Mutex::new(BucketState::full(burst)),
            turnstile: tokio::sync::Mutex::new(()),
        }
    }

    pub fn rate_per_minute(&self) -> u32 {
        self.rate_per_minute
    }

    fn seconds_per_token(&self) -> f64 {
        60.0 / f64::from(self.rate_per_minute)
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until a token is available and take it.
    ///
    /// Dropping the returned future while it waits takes no token.
    pub async fn acquire(&self) {
        let _turn = self.turnstile.lock().await;

        let wait = {
            let mut state = self.lock();
            let now = Instant::now();
            let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
            state.tokens = (state.tokens + elapsed / self.seconds_per_token()).min(self.burst);
            state.last_refill = now;

            if state.tokens >= 1.0 {
                state.tokens -= 1.0;
                state.total_requests += 1;
                return;
            }

            let backoff = if self.adaptive { state.backoff_multiplier } else { 1.0 };
            Duration::from_secs_f64((1.0 - state.tokens) * self.seconds_per_token() * backoff)
        };

        tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limit: waiting for token");
        tokio::time::sleep(wait).await;

        let mut state = self.lock();
        // The wait paid for exactly one token. A reset during the wait may have refilled past it.
        state.tokens = state.tokens.max(1.0) - 1.0;
        state.last_refill = Instant::now();
        state.total_requests += 1;
        state.total_waits += 1;
        state.total_wait_time += wait;
    }

    /// Reset backoff after a successful upstream call.
    pub fn record_success(&self) {
        let mut state = self.lock();
        if state.consecutive_failures > 0 {
            tracing::debug!("Request successful, resetting backoff");
        }
        state.consecutive_failures = 0;
        state.backoff_multiplier = 1.0;
    }

    /// Widen backoff after a failed upstream call.
    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.backoff_multiplier = backoff_for(state.consecutive_failures);
        tracing::warn!(
            backoff = state.backoff_multiplier,
            consecutive_failures = state.consecutive_failures,
            "Request failed, backoff increased"
        );
    }

    pub fn get_statistics(&self) -> LimiterStats {
        let state = self.lock();
        let total_wait_time = state.total_wait_time.as_secs_f64();
        LimiterStats {
            rate_per_minute: self.rate_per_minute,
            total_requests: state.total_requests,
            total_waits: state.total_waits,
            total_wait_time,
            average_wait_time: if state.total_waits > 0 { total_wait_time / state.total_waits as f64 } else { 0.0 },
            current_backoff: state.backoff_multiplier,
            consecutive_failures: state.consecutive_failures,
            tokens_available: state.tokens,
        }
    }

    /// Refill the bucket and clear failure state.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.tokens = self.burst;
        state.last_refill = Instant::now();
        state.consecutive_failures = 0;
        state.backoff_multiplier = 1.0;
    }
}

/// `min(32, 2^failures)`.
fn backoff_for(failures: u32) -> f64 {
    2f64.powi(failures.min(16) as i32).min(MAX_BACKOFF)
}
