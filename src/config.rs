//! Orchestrator timing configuration and the user-settings collaborator seam.

use std::time::Duration;

use crate::service::DeploymentMode;

/// Timing and retry parameters for the orchestrator.
///
/// Defaults match the production values; tests inject millisecond-scale
/// durations instead of mocking the clock.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on a single service start, including the readiness probe.
    pub startup_timeout: Duration,
    /// Interval between readiness probe attempts during start.
    pub health_poll_interval: Duration,
    /// Bound on a single probe invocation, distinct from `startup_timeout`.
    /// A non-responding probe must not hang the caller.
    pub probe_timeout: Duration,
    /// Period of the background health monitor loop.
    pub monitor_interval: Duration,
    /// Base delay for restart backoff; attempt n waits `restart_delay * 2^(n-1)`.
    pub restart_delay: Duration,
    /// Ceiling on the backoff delay.
    pub max_restart_delay: Duration,
    /// Restart attempts allowed before a service requires manual intervention.
    pub max_restart_attempts: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(30),
            health_poll_interval: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(5),
            monitor_interval: Duration::from_secs(30),
            restart_delay: Duration::from_secs(5),
            max_restart_delay: Duration::from_secs(60),
            max_restart_attempts: 3,
        }
    }
}

impl OrchestratorConfig {
    /// Backoff delay before restart attempt `attempt` (1-based), capped at
    /// `max_restart_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.restart_delay
            .saturating_mul(factor)
            .min(self.max_restart_delay)
    }
}

/// Read-only view of user-chosen deployment configuration.
///
/// Persistence of these settings lives outside the orchestrator; values
/// returned here are validated at write time, so a stored mode is either
/// trustworthy for the current platform or absent.
pub trait ModeSettings: Send + Sync {
    /// User's stored deployment mode preference for a service, if any.
    fn service_mode(&self, name: &str) -> Option<DeploymentMode>;

    /// User-configured URL for a supervised service, if any.
    fn service_url(&self, name: &str) -> Option<String>;
}

/// Settings source that has no stored preferences.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSettings;

impl ModeSettings for NoSettings {
    fn service_mode(&self, _name: &str) -> Option<DeploymentMode> {
        None
    }

    fn service_url(&self, _name: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let config = OrchestratorConfig {
            restart_delay: Duration::from_millis(5000),
            max_restart_delay: Duration::from_secs(60),
            ..Default::default()
        };
        assert_eq!(config.backoff_delay(1), Duration::from_millis(5000));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(10000));
        assert_eq!(config.backoff_delay(3), Duration::from_millis(20000));
    }

    #[test]
    fn backoff_is_capped() {
        let config = OrchestratorConfig {
            restart_delay: Duration::from_secs(5),
            max_restart_delay: Duration::from_secs(60),
            ..Default::default()
        };
        assert_eq!(config.backoff_delay(10), Duration::from_secs(60));
        // Large attempt counts must not overflow.
        assert_eq!(config.backoff_delay(u32::MAX), Duration::from_secs(60));
    }
}
