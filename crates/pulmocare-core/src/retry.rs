//! Retry schedule for the upstream parse request.
//!
//! The network call lives with the client; this module only decides how long
//! to wait between attempts and which failures are worth retrying.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Error messages that will not go away on retry.
const PERMANENT_FAILURES: &[&str] = &["file not found", "permission denied"];

/// Exponential backoff with a cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 20_000,
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Wait before each retry, in order.
    pub fn delays(&self) -> Vec<Duration> {
        let mut delay = self.initial_delay_ms.min(self.max_delay_ms);
        let mut delays = Vec::new();

        for _ in 1..self.max_attempts {
            delays.push(Duration::from_millis(delay));
            delay = ((delay as f64 * self.factor) as u64).min(self.max_delay_ms);
        }

        delays
    }

    /// Whether the failure will recur no matter how often we retry.
    pub fn is_permanent(&self, message: &str) -> bool {
        let lower = message.to_lowercase();
        PERMANENT_FAILURES.iter().any(|p| lower.contains(p))
    }

    /// Whether to try again after `attempt` (1-based) failed with `message`.
    pub fn should_retry(&self, attempt: u32, message: &str) -> bool {
        attempt < self.max_attempts && !self.is_permanent(message)
    }

    /// Run `op` until it succeeds or the policy gives up.
    ///
    /// Entry point for Rust callers that own the upstream request. FFI clients
    /// drive their own loop with [`RetryPolicy::should_retry`] and
    /// [`RetryPolicy::delays`] instead. `sleep` is called with each backoff
    /// delay; tests pass a no-op.
    pub fn run<T, E, F, S>(&self, mut op: F, mut sleep: S) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
        S: FnMut(Duration),
    {
        let delays = self.delays();
        let mut attempt = 1;

        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let message = e.to_string();
                    if !self.should_retry(attempt, &message) {
                        warn!(attempt, error = %message, "giving up");
                        return Err(e);
                    }

                    let delay = delays[(attempt - 1) as usize];
                    warn!(attempt, max = self.max_attempts, ?delay, error = %message, "attempt failed, retrying");
                    sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}
