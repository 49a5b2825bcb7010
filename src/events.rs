//! Lifecycle events broadcast to external listeners.
//!
//! State transitions and lifecycle milestones are published on a
//! multi-consumer broadcast channel so the controller stays decoupled from
//! presentation code. Listeners subscribe for a receiver; a send with no
//! live receivers is not an error.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::service::DeploymentMode;
use crate::state::ServiceStatus;

/// Lifecycle events emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorEvent {
    /// A service definition was registered.
    ServiceRegistered { name: String },
    /// A record's lifecycle status changed.
    ServiceStateChanged {
        name: String,
        previous: ServiceStatus,
        current: ServiceStatus,
    },
    /// A service reached Running.
    ServiceStarted {
        name: String,
        deployment_mode: DeploymentMode,
    },
    /// A service reached Stopped.
    ServiceStopped { name: String },
    /// A running service's health probe failed.
    ServiceUnhealthy { name: String, message: String },
    /// The startup sequence completed.
    AllServicesStarted,
    /// The shutdown sequence completed.
    AllServicesStopped,
    /// A service failed during the startup sequence.
    StartupFailed { name: String, message: String },
}

impl OrchestratorEvent {
    /// Get a string representation of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorEvent::ServiceRegistered { .. } => "service-registered",
            OrchestratorEvent::ServiceStateChanged { .. } => "service-state-changed",
            OrchestratorEvent::ServiceStarted { .. } => "service-started",
            OrchestratorEvent::ServiceStopped { .. } => "service-stopped",
            OrchestratorEvent::ServiceUnhealthy { .. } => "service-unhealthy",
            OrchestratorEvent::AllServicesStarted => "all-services-started",
            OrchestratorEvent::AllServicesStopped => "all-services-stopped",
            OrchestratorEvent::StartupFailed { .. } => "startup-failed",
        }
    }
}

/// Event message delivered to subscribers.
#[derive(Debug, Clone)]
pub struct EventMessage {
    /// The event that occurred
    pub event: OrchestratorEvent,
    /// Timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl EventMessage {
    /// Create a new event message with the current timestamp
    pub fn new(event: OrchestratorEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }
}

/// Channel capacity; slow subscribers past this lag see `RecvError::Lagged`.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Broadcast channel for orchestrator events.
#[derive(Clone)]
pub struct EventChannel {
    tx: broadcast::Sender<EventMessage>,
}

impl EventChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventMessage> {
        self.tx.subscribe()
    }

    /// Emit an event. Delivery is best-effort: with no subscribers the
    /// message is dropped.
    pub fn emit(&self, event: OrchestratorEvent) {
        let _ = self.tx.send(EventMessage::new(event));
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
