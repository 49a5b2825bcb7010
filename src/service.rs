//! Service definitions and the strategy seams for managed-mode backends.
//!
//! The orchestrator never talks to a container runtime or spawns a process
//! itself. Collaborators supply a [`LifecycleStrategy`] (start/stop) and a
//! [`HealthProbe`] (readiness oracle) per service; both are treated as
//! opaque.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// How a service's runtime instance is owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// The orchestrator starts, stops, and owns the instance (container or
    /// local process).
    Managed,
    /// The service runs outside the orchestrator's control; only its health
    /// endpoint is polled.
    Supervised,
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::Managed => "managed",
            DeploymentMode::Supervised => "supervised",
        }
    }
}

/// Start/stop backend for a managed service.
///
/// Implemented by the container-runtime and process-spawning collaborators.
/// `stop` defaults to a no-op for backends whose instances wind down on
/// their own.
#[async_trait]
pub trait LifecycleStrategy: Send + Sync {
    /// Start the service and return a handle to the created instance.
    async fn start(&self, definition: &ServiceDefinition) -> Result<InstanceHandle>;

    /// Stop the instance previously returned by `start`.
    async fn stop(&self, _definition: &ServiceDefinition, _instance: &InstanceHandle) -> Result<()> {
        Ok(())
    }
}

/// Readiness/health oracle for one service.
///
/// What "healthy" means (an HTTP 200 with a parsed success field, a TCP
/// handshake, a container inspect) is the implementor's business. Every
/// invocation is bounded by the orchestrator's probe timeout, so a hung
/// probe cannot stall the monitor loop.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<bool>;
}

/// Managed-mode strategy, tagged by what backs the instance.
///
/// The tag is resolved once at registration time; the lifecycle controller
/// never inspects definition fields to guess which backend applies.
#[derive(Clone)]
pub enum ManagedStrategy {
    /// Backed by a container runtime client.
    Container(Arc<dyn LifecycleStrategy>),
    /// Backed by a locally spawned process.
    Process(Arc<dyn LifecycleStrategy>),
    /// Custom start/stop supplied at registration.
    Custom(Arc<dyn LifecycleStrategy>),
}

impl ManagedStrategy {
    pub fn container(backend: Arc<dyn LifecycleStrategy>) -> Self {
        ManagedStrategy::Container(backend)
    }

    pub fn process(backend: Arc<dyn LifecycleStrategy>) -> Self {
        ManagedStrategy::Process(backend)
    }

    pub fn custom(backend: Arc<dyn LifecycleStrategy>) -> Self {
        ManagedStrategy::Custom(backend)
    }

    pub fn backend(&self) -> &Arc<dyn LifecycleStrategy> {
        match self {
            ManagedStrategy::Container(b)
            | ManagedStrategy::Process(b)
            | ManagedStrategy::Custom(b) => b,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ManagedStrategy::Container(_) => "container",
            ManagedStrategy::Process(_) => "process",
            ManagedStrategy::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for ManagedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ManagedStrategy").field(&self.kind()).finish()
    }
}

/// What a live instance is backed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceKind {
    /// Container reference from the runtime client.
    Container { id: String },
    /// Locally spawned process.
    Process { pid: u32 },
    /// Connection descriptor for an externally operated service.
    Supervised { url: String },
    /// Backend-specific handle the orchestrator cannot interpret further.
    Opaque { label: String },
}

/// Opaque handle to a running instance, created on start and cleared on stop.
///
/// Strategies may attach a resolved URL (reported through `status()`) and an
/// instance-level health probe, which takes precedence over the
/// definition-level default.
#[derive(Clone)]
pub struct InstanceHandle {
    pub kind: InstanceKind,
    url: Option<String>,
    probe: Option<Arc<dyn HealthProbe>>,
}

impl InstanceHandle {
    pub fn container(id: impl Into<String>) -> Self {
        Self::new(InstanceKind::Container { id: id.into() })
    }

    pub fn process(pid: u32) -> Self {
        Self::new(InstanceKind::Process { pid })
    }

    pub fn supervised(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            kind: InstanceKind::Supervised { url: url.clone() },
            url: Some(url),
            probe: None,
        }
    }

    pub fn opaque(label: impl Into<String>) -> Self {
        Self::new(InstanceKind::Opaque { label: label.into() })
    }

    fn new(kind: InstanceKind) -> Self {
        Self {
            kind,
            url: None,
            probe: None,
        }
    }

    /// Attach the URL at which the instance is reachable.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Attach an instance-level probe, overriding the definition's default.
    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn probe(&self) -> Option<&Arc<dyn HealthProbe>> {
        self.probe.as_ref()
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceHandle")
            .field("kind", &self.kind)
            .field("url", &self.url)
            .field("probe", &self.probe.is_some())
            .finish()
    }
}

/// Immutable definition of a service, supplied once at registration.
#[derive(Clone)]
pub struct ServiceDefinition {
    /// Unique key for the service.
    pub name: String,
    /// A critical service's startup failure aborts the whole sequence.
    pub critical: bool,
    /// Names of services that must be running before this one starts.
    pub depends_on: Vec<String>,
    /// Whether the monitor loop may restart this service when its probe
    /// fails (managed mode only).
    pub auto_restart: bool,
    /// Deployment modes the current platform can run, supplied by the
    /// composition root. Never empty for a registrable definition.
    pub supported_modes: Vec<DeploymentMode>,
    /// Managed-mode start/stop backend.
    pub strategy: Option<ManagedStrategy>,
    /// Definition-level health probe; an instance-level probe overrides it.
    pub health_probe: Option<Arc<dyn HealthProbe>>,
    /// Health endpoint path for supervised mode (metadata for probe
    /// collaborators).
    pub health_endpoint: Option<String>,
    /// Default URL reported when neither the instance nor the user
    /// configuration resolves one.
    pub fallback_url: Option<String>,
}

impl ServiceDefinition {
    pub fn builder(name: impl Into<String>) -> ServiceDefinitionBuilder {
        ServiceDefinitionBuilder {
            definition: ServiceDefinition {
                name: name.into(),
                critical: false,
                depends_on: Vec::new(),
                auto_restart: false,
                supported_modes: vec![DeploymentMode::Managed, DeploymentMode::Supervised],
                strategy: None,
                health_probe: None,
                health_endpoint: None,
                fallback_url: None,
            },
        }
    }
}

impl fmt::Debug for ServiceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("name", &self.name)
            .field("critical", &self.critical)
            .field("depends_on", &self.depends_on)
            .field("auto_restart", &self.auto_restart)
            .field("supported_modes", &self.supported_modes)
            .field("strategy", &self.strategy)
            .field("health_probe", &self.health_probe.is_some())
            .field("health_endpoint", &self.health_endpoint)
            .field("fallback_url", &self.fallback_url)
            .finish()
    }
}

/// Builder for [`ServiceDefinition`].
pub struct ServiceDefinitionBuilder {
    definition: ServiceDefinition,
}

impl ServiceDefinitionBuilder {
    pub fn critical(mut self, critical: bool) -> Self {
        self.definition.critical = critical;
        self
    }

    pub fn depends_on(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.definition.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn auto_restart(mut self, auto_restart: bool) -> Self {
        self.definition.auto_restart = auto_restart;
        self
    }

    pub fn supported_modes(mut self, modes: impl IntoIterator<Item = DeploymentMode>) -> Self {
        self.definition.supported_modes = modes.into_iter().collect();
        self
    }

    pub fn strategy(mut self, strategy: ManagedStrategy) -> Self {
        self.definition.strategy = Some(strategy);
        self
    }

    pub fn health_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.definition.health_probe = Some(probe);
        self
    }

    pub fn health_endpoint(mut self, path: impl Into<String>) -> Self {
        self.definition.health_endpoint = Some(path.into());
        self
    }

    pub fn fallback_url(mut self, url: impl Into<String>) -> Self {
        self.definition.fallback_url = Some(url.into());
        self
    }

    pub fn build(self) -> ServiceDefinition {
        self.definition
    }
}
