//! harbormaster: service orchestration for a desktop application's
//! auxiliary backend services.
//!
//! Services are registered once at startup with a [`ServiceDefinition`],
//! then driven through a lifecycle state machine by the
//! [`ServiceOrchestrator`]: dependency-ordered startup, health-gated
//! readiness, periodic monitoring with bounded-backoff recovery, and
//! reverse-ordered shutdown. Each service runs either *managed* (the
//! orchestrator owns its container/process via a registered strategy) or
//! *supervised* (externally operated, only health-polled).
//!
//! The crate exposes state and lifecycle events; it implements no service
//! protocol, manages no container images, and ships no UI.

pub mod config;
pub mod deps;
pub mod errors;
pub mod events;
pub mod health;
pub mod modes;
pub mod orchestrator;
pub mod registry;
pub mod service;
pub mod state;

pub use config::{ModeSettings, NoSettings, OrchestratorConfig};
pub use errors::{OrchestratorError, Result};
pub use events::{EventMessage, OrchestratorEvent};
pub use orchestrator::ServiceOrchestrator;
pub use service::{
    DeploymentMode, HealthProbe, InstanceHandle, InstanceKind, LifecycleStrategy, ManagedStrategy,
    ServiceDefinition, ServiceDefinitionBuilder,
};
pub use state::{ServiceReport, ServiceRecord, ServiceStatus};
