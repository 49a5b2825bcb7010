//! Service orchestration for lifecycle management.
//!
//! This module provides the centralized `ServiceOrchestrator` that drives
//! every service through its lifecycle state machine: start/stop/restart of
//! single services, dependency-ordered startup and shutdown of the whole
//! set, and recovery driven by the health monitor. Mode-specific work is
//! delegated to the strategies registered with each definition; the
//! orchestrator owns only the records and the transitions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{ModeSettings, OrchestratorConfig};
use crate::deps::{get_start_order, get_stop_order};
use crate::errors::{OrchestratorError, Result};
use crate::events::{EventChannel, EventMessage, OrchestratorEvent};
use crate::health::{run_probe, spawn_monitor, wait_for_healthy};
use crate::modes::resolve_mode;
use crate::registry::{ServiceEntry, ServiceRegistry};
use crate::service::{DeploymentMode, InstanceHandle, ServiceDefinition};
use crate::state::{ServiceRecord, ServiceReport, ServiceStatus};

/// In-flight `start_all` sequence, shared so concurrent callers await the
/// same result instead of starting a duplicate sequence.
type SharedStartAll = Shared<BoxFuture<'static, Result<()>>>;

/// Coordinator for service lifecycle operations.
///
/// Owns the registry, the event channel, the shutting-down flag, and the
/// health monitor task. Constructed once at the composition root and shared
/// behind an `Arc`; everything that needs status is handed the same
/// instance.
pub struct ServiceOrchestrator {
    config: OrchestratorConfig,
    registry: ServiceRegistry,
    settings: Arc<dyn ModeSettings>,
    events: EventChannel,
    shutting_down: AtomicBool,
    monitor_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    start_all_task: tokio::sync::Mutex<Option<SharedStartAll>>,
}

impl ServiceOrchestrator {
    pub fn new(config: OrchestratorConfig, settings: Arc<dyn ModeSettings>) -> Self {
        Self {
            config,
            registry: ServiceRegistry::new(),
            settings,
            events: EventChannel::new(),
            shutting_down: AtomicBool::new(false),
            monitor_task: parking_lot::Mutex::new(None),
            start_all_task: tokio::sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub(crate) fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EventMessage> {
        self.events.subscribe()
    }

    /// Register a service definition and return a snapshot of its runtime
    /// record. Idempotent per name (last registration wins, keeping the
    /// existing record); rejected while that service is mid-transition.
    pub fn register(&self, definition: ServiceDefinition) -> Result<ServiceRecord> {
        if definition.supported_modes.is_empty() {
            return Err(OrchestratorError::NoSupportedModes {
                service: definition.name.clone(),
            });
        }

        let name = definition.name.clone();
        let entry = self.registry.register(definition)?;
        info!("Registered service {}", name);
        self.events
            .emit(OrchestratorEvent::ServiceRegistered { name });
        Ok(entry.record())
    }

    /// Start a single service and gate on its readiness probe.
    ///
    /// No-op when already running. Serialized per name: a concurrent
    /// operation targeting the same service waits its turn.
    pub async fn start(&self, name: &str) -> Result<()> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| OrchestratorError::ServiceNotFound(name.to_string()))?;
        let _op = entry.op_lock.lock().await;
        self.start_locked(&entry).await
    }

    async fn start_locked(&self, entry: &Arc<ServiceEntry>) -> Result<()> {
        let name = entry.definition.name.clone();

        if entry.with_record(|r| r.status.is_running()) {
            debug!("Service {} is already running", name);
            return Ok(());
        }

        let mode = resolve_mode(&entry.definition, self.settings.as_ref())?;
        entry.with_record(|r| r.deployment_mode = Some(mode));
        self.transition(entry, ServiceStatus::Starting);
        info!("Starting service {} in {} mode", name, mode.as_str());

        let instance = match self.obtain_instance(&entry.definition, mode).await {
            Ok(instance) => instance,
            Err(e) => return Err(self.fail_service(entry, e)),
        };

        // Instance-level probe overrides the definition-level default.
        let probe = instance
            .probe()
            .cloned()
            .or_else(|| entry.definition.health_probe.clone());
        entry.with_record(|r| r.instance = Some(instance));

        if let Err(e) = wait_for_healthy(&name, probe, self.config.startup_timeout, &self.config).await
        {
            self.teardown_instance(entry).await;
            entry.with_record(|r| r.instance = None);
            return Err(self.fail_service(entry, e));
        }

        let now = Utc::now();
        entry.with_record(|r| {
            r.restart_attempts = 0;
            r.last_error = None;
            r.started_at = Some(now);
            r.last_health_check = Some(now);
        });
        self.transition(entry, ServiceStatus::Running);
        self.events.emit(OrchestratorEvent::ServiceStarted {
            name: name.clone(),
            deployment_mode: mode,
        });
        info!("Service {} started", name);
        Ok(())
    }

    /// Obtain an instance handle for the resolved mode. Managed services go
    /// through their registered strategy; supervised services get a
    /// connection descriptor for the configured URL.
    async fn obtain_instance(
        &self,
        definition: &ServiceDefinition,
        mode: DeploymentMode,
    ) -> Result<InstanceHandle> {
        match mode {
            DeploymentMode::Managed => {
                let strategy = definition.strategy.as_ref().ok_or_else(|| {
                    OrchestratorError::StartupFailed {
                        service: definition.name.clone(),
                        message: "no managed strategy registered".to_string(),
                    }
                })?;
                strategy
                    .backend()
                    .start(definition)
                    .await
                    .map_err(|e| match e {
                        e @ OrchestratorError::StartupFailed { .. } => e,
                        other => OrchestratorError::StartupFailed {
                            service: definition.name.clone(),
                            message: other.to_string(),
                        },
                    })
            }
            DeploymentMode::Supervised => {
                let url = self
                    .settings
                    .service_url(&definition.name)
                    .or_else(|| definition.fallback_url.clone())
                    .ok_or_else(|| OrchestratorError::StartupFailed {
                        service: definition.name.clone(),
                        message: "no URL configured for supervised service".to_string(),
                    })?;
                Ok(InstanceHandle::supervised(url))
            }
        }
    }

    /// Best-effort teardown of an instance whose start did not complete.
    async fn teardown_instance(&self, entry: &Arc<ServiceEntry>) {
        let instance = entry.with_record(|r| r.instance.clone());
        let Some(instance) = instance else { return };

        let mode = entry.with_record(|r| r.deployment_mode);
        if mode == Some(DeploymentMode::Managed) {
            if let Some(strategy) = entry.definition.strategy.as_ref() {
                if let Err(e) = strategy.backend().stop(&entry.definition, &instance).await {
                    warn!(
                        "Cleanup stop for {} failed: {}",
                        entry.definition.name, e
                    );
                }
            }
        }
    }

    /// Record a failure on the service and move it to Error.
    fn fail_service(&self, entry: &Arc<ServiceEntry>, error: OrchestratorError) -> OrchestratorError {
        entry.with_record(|r| r.last_error = Some(error.to_string()));
        self.transition(entry, ServiceStatus::Error);
        error
    }

    /// Stop a single service. No-op when already stopped.
    pub async fn stop(&self, name: &str) -> Result<()> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| OrchestratorError::ServiceNotFound(name.to_string()))?;
        let _op = entry.op_lock.lock().await;
        self.stop_locked(&entry).await
    }

    async fn stop_locked(&self, entry: &Arc<ServiceEntry>) -> Result<()> {
        let name = entry.definition.name.clone();

        if entry.with_record(|r| r.status == ServiceStatus::Stopped) {
            debug!("Service {} is already stopped", name);
            return Ok(());
        }

        self.transition(entry, ServiceStatus::Stopping);
        info!("Stopping service {}", name);

        let instance = entry.with_record(|r| r.instance.clone());
        if let Some(instance) = instance {
            // Supervised instances are only connection descriptors; the
            // orchestrator has no authority to stop the real process.
            let mode = entry.with_record(|r| r.deployment_mode);
            if mode == Some(DeploymentMode::Managed) {
                if let Some(strategy) = entry.definition.strategy.as_ref() {
                    if let Err(e) = strategy.backend().stop(&entry.definition, &instance).await {
                        // The handle is cleared on every exit from Stopping;
                        // only Starting, Running, and Restarting carry one.
                        entry.with_record(|r| {
                            r.instance = None;
                            r.started_at = None;
                        });
                        return Err(self.fail_service(
                            entry,
                            OrchestratorError::StopFailed {
                                service: name,
                                message: e.to_string(),
                            },
                        ));
                    }
                }
            }
        }

        entry.with_record(|r| {
            r.instance = None;
            r.started_at = None;
        });
        self.transition(entry, ServiceStatus::Stopped);
        self.events
            .emit(OrchestratorEvent::ServiceStopped { name: name.clone() });
        info!("Service {} stopped", name);
        Ok(())
    }

    /// Restart a service with exponential backoff.
    ///
    /// Fails fast with `RestartExhausted` once the attempt ceiling is
    /// reached, without touching the service. Attempt n waits
    /// `restart_delay * 2^(n-1)` (capped) between stop and start.
    pub async fn restart(&self, name: &str) -> Result<()> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| OrchestratorError::ServiceNotFound(name.to_string()))?;
        let _op = entry.op_lock.lock().await;
        self.restart_locked(&entry).await
    }

    async fn restart_locked(&self, entry: &Arc<ServiceEntry>) -> Result<()> {
        let name = entry.definition.name.clone();

        let attempts = entry.with_record(|r| r.restart_attempts);
        if attempts >= self.config.max_restart_attempts {
            return Err(OrchestratorError::RestartExhausted {
                service: name,
                attempts,
            });
        }

        let attempt = attempts + 1;
        entry.with_record(|r| r.restart_attempts = attempt);
        self.transition(entry, ServiceStatus::Restarting);
        info!(
            "Restarting service {} (attempt {}/{})",
            name, attempt, self.config.max_restart_attempts
        );

        // Stop phase: the instance is taken before the backoff wait so it is
        // cleared even if the strategy has no stop action.
        let instance = entry.with_record(|r| r.instance.take());
        if let Some(instance) = instance {
            let mode = entry.with_record(|r| r.deployment_mode);
            if mode == Some(DeploymentMode::Managed) {
                if let Some(strategy) = entry.definition.strategy.as_ref() {
                    if let Err(e) = strategy.backend().stop(&entry.definition, &instance).await {
                        return Err(self.fail_service(
                            entry,
                            OrchestratorError::StopFailed {
                                service: name,
                                message: e.to_string(),
                            },
                        ));
                    }
                }
            }
        }
        entry.with_record(|r| r.started_at = None);

        let delay = self.config.backoff_delay(attempt);
        debug!(
            "Waiting {:?} before restart attempt {} of {}",
            delay, attempt, name
        );
        sleep(delay).await;

        self.start_locked(entry).await
    }

    /// Start every registered service in dependency order.
    ///
    /// Idempotent under concurrent calls: a second invocation while a
    /// sequence is in flight awaits the same result. A non-critical
    /// failure is recorded and the sequence continues; a critical failure
    /// aborts it. After a completed sequence the health monitor is
    /// (re)started exactly once.
    pub async fn start_all(self: &Arc<Self>) -> Result<()> {
        let shared = {
            let mut guard = self.start_all_task.lock().await;
            match guard.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let this = Arc::clone(self);
                    let fut: SharedStartAll =
                        async move { this.run_startup_sequence().await }.boxed().shared();
                    *guard = Some(fut.clone());
                    fut
                }
            }
        };

        let result = shared.await;

        // Clear the slot once the sequence has settled so a later call can
        // run a fresh sequence.
        let mut guard = self.start_all_task.lock().await;
        if guard.as_ref().map_or(false, |f| f.peek().is_some()) {
            *guard = None;
        }

        result
    }

    async fn run_startup_sequence(self: Arc<Self>) -> Result<()> {
        let order = get_start_order(&self.registry.dependency_map())?;
        info!("Starting {} services in dependency order", order.len());

        for name in &order {
            if let Err(e) = self.start(name).await {
                self.events.emit(OrchestratorEvent::StartupFailed {
                    name: name.clone(),
                    message: e.to_string(),
                });

                let critical = self
                    .registry
                    .get(name)
                    .map_or(false, |entry| entry.definition.critical);
                if critical {
                    error!(
                        "Critical service {} failed to start, aborting startup: {}",
                        name, e
                    );
                    return Err(e);
                }
                warn!(
                    "Non-critical service {} failed to start, continuing: {}",
                    name, e
                );
            }
        }

        self.restart_monitor();
        self.events.emit(OrchestratorEvent::AllServicesStarted);
        info!("Startup sequence complete");
        Ok(())
    }

    fn restart_monitor(self: &Arc<Self>) {
        let mut guard = self.monitor_task.lock();
        if let Some(handle) = guard.take() {
            handle.abort();
        }
        *guard = Some(spawn_monitor(self));
    }

    /// Stop every service in reverse dependency order.
    ///
    /// All stops run concurrently and every outcome is collected; a single
    /// failure never blocks the stopping of sibling services. The
    /// shutting-down flag suppresses monitor recovery for the duration.
    pub async fn stop_all(&self) -> Result<()> {
        self.shutting_down.store(true, Ordering::SeqCst);
        if let Some(handle) = self.monitor_task.lock().take() {
            handle.abort();
        }

        let order = match get_stop_order(&self.registry.dependency_map()) {
            Ok(order) => order,
            Err(e) => {
                self.shutting_down.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        info!("Stopping {} services", order.len());

        let stops = order.iter().map(|name| async move {
            let result = self.stop(name).await;
            (name.clone(), result)
        });
        let results = join_all(stops).await;

        let failures: Vec<String> = results
            .into_iter()
            .filter_map(|(name, result)| result.err().map(|e| format!("{}: {}", name, e)))
            .collect();

        self.events.emit(OrchestratorEvent::AllServicesStopped);
        self.shutting_down.store(false, Ordering::SeqCst);

        if failures.is_empty() {
            info!("All services stopped");
            Ok(())
        } else {
            Err(OrchestratorError::ShutdownFailed { failures })
        }
    }

    /// One monitor pass: probe every running service once.
    ///
    /// Errors here have no synchronous caller; they are captured on the
    /// record and surfaced via events and `status()` only.
    pub(crate) async fn health_pass(&self) {
        for entry in self.registry.entries() {
            if !entry.with_record(|r| r.status.is_running()) {
                continue;
            }

            let probe = entry
                .with_record(|r| r.instance.as_ref().and_then(|i| i.probe().cloned()))
                .or_else(|| entry.definition.health_probe.clone());
            // No probe means no opinion; the service stays presumed healthy.
            let Some(probe) = probe else { continue };

            let name = entry.definition.name.clone();
            let result = run_probe(&probe, self.config.probe_timeout).await;

            let message = match result {
                Ok(true) => {
                    entry.with_record(|r| r.last_health_check = Some(Utc::now()));
                    debug!("Health check passed for {}", name);
                    continue;
                }
                Ok(false) => "health probe reported unhealthy".to_string(),
                Err(message) => message,
            };

            // A lifecycle operation may have completed while the probe was
            // in flight. Recheck under the op lock: a probe result for a
            // service that is no longer running is stale and must not move
            // it to Error or restart it.
            let _op = entry.op_lock.lock().await;
            if !entry.with_record(|r| r.status.is_running()) {
                debug!("Discarding stale probe result for {}", name);
                continue;
            }
            entry.with_record(|r| r.last_health_check = Some(Utc::now()));

            warn!("Health check failed for {}: {}", name, message);
            entry.with_record(|r| r.last_error = Some(message.clone()));
            self.events.emit(OrchestratorEvent::ServiceUnhealthy {
                name: name.clone(),
                message,
            });

            if self.is_shutting_down() {
                continue;
            }

            let mode = entry.with_record(|r| r.deployment_mode);
            match mode {
                Some(DeploymentMode::Managed) if entry.definition.auto_restart => {
                    info!("Triggering automatic restart of {}", name);
                    if let Err(e) = self.restart_locked(&entry).await {
                        error!("Automatic restart of {} failed: {}", name, e);
                        entry.with_record(|r| r.last_error = Some(e.to_string()));
                    }
                }
                Some(DeploymentMode::Supervised) => {
                    // Externally owned process: no authority to remediate.
                    entry.with_record(|r| {
                        r.last_error = Some(format!(
                            "Service {} is unhealthy; it is externally operated and requires manual intervention",
                            name
                        ));
                    });
                    self.transition(&entry, ServiceStatus::Error);
                }
                _ => {
                    // Managed without auto-restart: surface the failure and
                    // leave recovery to the operator.
                    self.transition(&entry, ServiceStatus::Error);
                }
            }
        }
    }

    /// Per-service status snapshot, sorted by name. The sole read surface
    /// for a presentation layer.
    pub fn status(&self) -> Vec<ServiceReport> {
        let mut entries = self.registry.entries();
        entries.sort_by(|a, b| a.definition.name.cmp(&b.definition.name));

        entries
            .iter()
            .map(|entry| {
                let record = entry.record();
                let definition = &entry.definition;

                let url = match record.deployment_mode {
                    Some(DeploymentMode::Supervised) => self
                        .settings
                        .service_url(&definition.name)
                        .or_else(|| {
                            record
                                .instance
                                .as_ref()
                                .and_then(|i| i.url().map(String::from))
                        })
                        .or_else(|| definition.fallback_url.clone()),
                    Some(DeploymentMode::Managed) => record
                        .instance
                        .as_ref()
                        .and_then(|i| i.url().map(String::from))
                        .or_else(|| definition.fallback_url.clone()),
                    None => definition.fallback_url.clone(),
                };

                let uptime_secs = match (record.status.is_running(), record.started_at) {
                    (true, Some(started_at)) => {
                        Some((Utc::now() - started_at).num_seconds().max(0) as u64)
                    }
                    _ => None,
                };

                ServiceReport {
                    name: definition.name.clone(),
                    status: record.status,
                    deployment_mode: record.deployment_mode,
                    restart_attempts: record.restart_attempts,
                    last_health_check: record.last_health_check,
                    last_error: record.last_error,
                    uptime_secs,
                    url,
                    supported_modes: definition.supported_modes.clone(),
                }
            })
            .collect()
    }

    /// The single writer gate for lifecycle status. Emits a state-changed
    /// event for every effective transition.
    fn transition(&self, entry: &Arc<ServiceEntry>, next: ServiceStatus) {
        let previous = entry.with_record(|r| std::mem::replace(&mut r.status, next));
        if previous != next {
            debug!(
                "Service {}: {} -> {}",
                entry.definition.name,
                previous.as_str(),
                next.as_str()
            );
            self.events.emit(OrchestratorEvent::ServiceStateChanged {
                name: entry.definition.name.clone(),
                previous,
                current: next,
            });
        }
    }
}
