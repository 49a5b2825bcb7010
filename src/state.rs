use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::service::{DeploymentMode, InstanceHandle};

/// Lifecycle status of a service.
///
/// Transitions happen only through the orchestrator's transition function:
/// Stopped → Starting → Running → Stopping → Stopped, with Error reachable
/// from Starting, Running, or Stopping, and Restarting reachable from
/// Running or Error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
    Restarting,
    Error,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Starting => "starting",
            ServiceStatus::Running => "running",
            ServiceStatus::Stopping => "stopping",
            ServiceStatus::Restarting => "restarting",
            ServiceStatus::Error => "error",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ServiceStatus::Running)
    }

    /// States that indicate a lifecycle operation is mid-flight.
    pub fn is_transitioning(&self) -> bool {
        matches!(
            self,
            ServiceStatus::Starting | ServiceStatus::Stopping | ServiceStatus::Restarting
        )
    }
}

/// Mutable runtime state for one registered service.
///
/// Created at registration (status Stopped) and reused in place across
/// restarts; it lives until the process exits.
#[derive(Debug, Clone)]
pub struct ServiceRecord {
    pub status: ServiceStatus,
    pub restart_attempts: u32,
    pub last_health_check: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Resolved on each start; retained afterwards for status reporting.
    pub deployment_mode: Option<DeploymentMode>,
    pub started_at: Option<DateTime<Utc>>,
    /// Present iff the service is Starting, Running, or Restarting.
    pub instance: Option<InstanceHandle>,
}

impl Default for ServiceRecord {
    fn default() -> Self {
        Self {
            status: ServiceStatus::Stopped,
            restart_attempts: 0,
            last_health_check: None,
            last_error: None,
            deployment_mode: None,
            started_at: None,
            instance: None,
        }
    }
}

/// Per-service view returned by `status()`, the sole read surface for a
/// presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceReport {
    pub name: String,
    pub status: ServiceStatus,
    pub deployment_mode: Option<DeploymentMode>,
    pub restart_attempts: u32,
    pub last_health_check: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub uptime_secs: Option<u64>,
    pub url: Option<String>,
    pub supported_modes: Vec<DeploymentMode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_is_stopped() {
        let record = ServiceRecord::default();
        assert_eq!(record.status, ServiceStatus::Stopped);
        assert_eq!(record.restart_attempts, 0);
        assert!(record.instance.is_none());
    }

    #[test]
    fn status_predicates() {
        assert!(ServiceStatus::Running.is_running());
        assert!(!ServiceStatus::Starting.is_running());
        assert!(ServiceStatus::Starting.is_transitioning());
        assert!(ServiceStatus::Stopping.is_transitioning());
        assert!(ServiceStatus::Restarting.is_transitioning());
        assert!(!ServiceStatus::Error.is_transitioning());
    }

    #[test]
    fn status_as_str() {
        assert_eq!(ServiceStatus::Stopped.as_str(), "stopped");
        assert_eq!(ServiceStatus::Starting.as_str(), "starting");
        assert_eq!(ServiceStatus::Running.as_str(), "running");
        assert_eq!(ServiceStatus::Stopping.as_str(), "stopping");
        assert_eq!(ServiceStatus::Restarting.as_str(), "restarting");
        assert_eq!(ServiceStatus::Error.as_str(), "error");
    }
}
