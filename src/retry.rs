//! Retry policy for the convergence loops (unban, flush).
//!
//! The loops retry until the remote IP set shows the desired state. How long
//! they keep trying is an explicit [`RetryPolicy`] value: an optional attempt
//! cap, an optional wall-clock deadline and an exponential backoff between
//! attempts. The default never gives up.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{WafError, WafResult};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (None = unbounded)
    pub max_attempts: Option<u32>,
    /// Delay after the first failed attempt
    pub initial_backoff: Duration,
    /// Upper bound for the delay between attempts
    pub max_backoff: Duration,
    /// Growth factor applied to the delay after each failed attempt
    pub multiplier: f64,
    /// Give up once this much time has passed since the first attempt
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            deadline: None,
        }
    }
}

impl RetryPolicy {
    /// Retry forever without sleeping. Handy for tests against a fake firewall.
    pub fn immediate() -> Self {
        Self {
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Delay to wait after `attempt` (1-based) failed to converge
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let nanos = (self.initial_backoff.as_nanos() as f64 * factor).round();
        if !nanos.is_finite() || nanos >= self.max_backoff.as_nanos() as f64 {
            self.max_backoff
        } else {
            Duration::from_nanos(nanos as u64)
        }
    }

    pub fn validate(&self) -> WafResult<()> {
        if self.max_attempts == Some(0) {
            return Err(WafError::Configuration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(WafError::Configuration(format!(
                "retry.multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        if self.max_backoff < self.initial_backoff {
            return Err(WafError::Configuration(
                "retry.max_backoff_ms must not be smaller than retry.initial_backoff_ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn start(&self, operation: impl Into<String>) -> RetryState<'_> {
        RetryState {
            policy: self,
            operation: operation.into(),
            attempts: 0,
            started: Instant::now(),
        }
    }
}

/// Attempt bookkeeping for one convergence loop
#[derive(Debug)]
pub struct RetryState<'a> {
    policy: &'a RetryPolicy,
    operation: String,
    attempts: u32,
    started: Instant,
}

impl RetryState<'_> {
    /// Register the start of an attempt.
    ///
    /// Sleeps for the backoff owed by the previous attempt, and returns
    /// `NotConverged` once the attempt cap or the deadline is reached.
    pub async fn begin_attempt(&mut self) -> WafResult<u32> {
        if let Some(max) = self.policy.max_attempts {
            if self.attempts >= max {
                return Err(self.not_converged());
            }
        }

        if self.attempts > 0 {
            let delay = self.policy.backoff_for(self.attempts);
            if let Some(deadline) = self.policy.deadline {
                if self.started.elapsed() + delay >= deadline {
                    return Err(self.not_converged());
                }
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        self.attempts += 1;
        Ok(self.attempts)
    }

    fn not_converged(&self) -> WafError {
        WafError::NotConverged {
            operation: self.operation.clone(),
            attempts: self.attempts,
        }
    }
}

/// Retry block of the YAML configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    pub deadline_secs: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            multiplier: policy.multiplier,
            deadline_secs: None,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
            multiplier: cfg.multiplier,
            deadline: cfg.deadline_secs.map(Duration::from_secs),
        }
    }
}
