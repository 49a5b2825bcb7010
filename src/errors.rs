use thiserror::Error;

fn format_last_error(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!(" (last error: {})", e),
        None => String::new(),
    }
}

/// Errors produced by the orchestrator.
///
/// Variants carry plain strings rather than source errors so the enum stays
/// `Clone`: the `start_all` result flows through a shared future and every
/// concurrent caller receives its own copy of the outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Dependency cycle detected involving service: {0}")]
    DependencyCycle(String),

    #[error("Missing dependency for service {service}: {dependency}")]
    MissingDependency { service: String, dependency: String },

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Service {0} is busy with another lifecycle operation")]
    ServiceBusy(String),

    #[error("Service {service} has no supported deployment modes")]
    NoSupportedModes { service: String },

    #[error("Failed to start service {service}: {message}")]
    StartupFailed { service: String, message: String },

    #[error("Service {service} did not become healthy within {timeout:?}{}", format_last_error(.last_error))]
    HealthCheckTimeout {
        service: String,
        timeout: std::time::Duration,
        last_error: Option<String>,
    },

    #[error("Health check failed for service {service}: {message}")]
    HealthCheckFailed { service: String, message: String },

    #[error(
        "Service {service} exhausted restart attempts ({attempts}), manual intervention required"
    )]
    RestartExhausted { service: String, attempts: u32 },

    #[error("Failed to stop service {service}: {message}")]
    StopFailed { service: String, message: String },

    #[error("Shutdown completed with failures: {}", failures.join("; "))]
    ShutdownFailed { failures: Vec<String> },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
