//! Configuration types for conveyq.
//!
//! This module contains the runtime knobs of the queue: the retry delay, the
//! retry limit, the failure policy for limit-free configurations, and the
//! consumer's internal timings. The handler, fallback, and event sink are
//! collaborators rather than data and are supplied through
//! [`ConveyorBuilder`](crate::core::ConveyorBuilder).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for a [`Conveyor`](crate::core::Conveyor).
///
/// # Examples
///
/// ```rust
/// use conveyq::config::ConveyConfig;
/// use std::time::Duration;
///
/// // Use default configuration: single attempt, no delay, failures swallowed
/// let config = ConveyConfig::default();
///
/// // Bounded retries with a delay between attempts
/// let config = ConveyConfig::default()
///     .with_max_retries(5)
///     .with_retry_delay(Duration::from_millis(250));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConveyConfig {
    /// Minimum time between attempts of the same task. `None` disables the
    /// delay check and failed tasks become eligible again immediately.
    pub retry_delay: Option<Duration>,

    /// Maximum number of retries before a task is routed to the fallback
    /// handler (or dropped when no fallback is configured). `None` selects the
    /// single-attempt branch governed by [`failure_policy`](Self::failure_policy).
    pub max_retries: Option<u32>,

    /// What to do with a failed attempt when no retry limit is configured.
    pub failure_policy: FailurePolicy,

    /// How long the consumer sleeps after recirculating a task that is not yet
    /// eligible for re-delivery. Bounds the spin of the delay check; must be
    /// well below `retry_delay` for timely re-delivery.
    pub poll_interval: Duration,

    /// How long [`shutdown`](crate::core::Conveyor::shutdown) waits for the
    /// consumer to stop before aborting it.
    pub shutdown_timeout: Duration,
}

impl Default for ConveyConfig {
    fn default() -> Self {
        Self {
            retry_delay: None,
            max_retries: None,
            failure_policy: FailurePolicy::default(),
            poll_interval: Duration::from_millis(10),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ConveyConfig {
    /// Set the retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Set the maximum retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set the failure policy for limit-free configurations.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the recirculation poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.poll_interval.is_zero() {
            errors.push("Poll interval must be greater than zero".to_string());
        }

        if self.shutdown_timeout.is_zero() {
            errors.push("Shutdown timeout must be greater than zero".to_string());
        }

        if let Some(delay) = self.retry_delay {
            if !delay.is_zero() && self.poll_interval > delay {
                errors.push(
                    "Poll interval must not exceed the retry delay".to_string(),
                );
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// What happens to a failed attempt when no retry limit is configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Swallow the failure: the task is terminal after a single attempt.
    #[default]
    Swallow,

    /// Requeue the task and retry indefinitely until it succeeds.
    ///
    /// A task that never succeeds keeps the pending-work counter above zero,
    /// so [`wait`](crate::core::Conveyor::wait) will not return. That liveness
    /// risk is inherent to retry without a bound.
    Requeue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConveyConfig::default();
        assert!(config.retry_delay.is_none());
        assert!(config.max_retries.is_none());
        assert_eq!(config.failure_policy, FailurePolicy::Swallow);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builders() {
        let config = ConveyConfig::default()
            .with_max_retries(3)
            .with_retry_delay(Duration::from_millis(500))
            .with_failure_policy(FailurePolicy::Requeue)
            .with_poll_interval(Duration::from_millis(5))
            .with_shutdown_timeout(Duration::from_secs(5));

        assert_eq!(config.max_retries, Some(3));
        assert_eq!(config.retry_delay, Some(Duration::from_millis(500)));
        assert_eq!(config.failure_policy, FailurePolicy::Requeue);
        assert_eq!(config.poll_interval, Duration::from_millis(5));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ConveyConfig::default();
        assert!(config.validate().is_ok());

        config.poll_interval = Duration::ZERO;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("Poll interval")));

        config.poll_interval = Duration::from_secs(2);
        config.retry_delay = Some(Duration::from_millis(100));
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("retry delay")));
    }

    #[test]
    fn test_zero_retry_delay_is_accepted() {
        // An explicit zero delay means "always eligible", not "unconfigured".
        let config = ConveyConfig::default().with_retry_delay(Duration::ZERO);
        assert!(config.validate().is_ok());
    }
}
