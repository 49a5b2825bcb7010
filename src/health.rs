//! Health monitoring: the readiness gate used during start and the
//! recurring monitor loop that feeds recovery.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::config::OrchestratorConfig;
use crate::errors::{OrchestratorError, Result};
use crate::orchestrator::ServiceOrchestrator;
use crate::service::HealthProbe;

/// Run a single probe invocation, bounded by its own timeout so a
/// non-responding probe cannot hang the caller.
pub(crate) async fn run_probe(
    probe: &Arc<dyn HealthProbe>,
    probe_timeout: Duration,
) -> std::result::Result<bool, String> {
    match timeout(probe_timeout, probe.check()).await {
        Ok(Ok(healthy)) => Ok(healthy),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("probe timed out after {:?}", probe_timeout)),
    }
}

/// Poll a service's readiness probe until it reports healthy or
/// `startup_timeout` elapses.
///
/// A service without a probe is assumed ready immediately; that assumption
/// is logged because it usually means the registration forgot one.
pub async fn wait_for_healthy(
    name: &str,
    probe: Option<Arc<dyn HealthProbe>>,
    startup_timeout: Duration,
    config: &OrchestratorConfig,
) -> Result<()> {
    let Some(probe) = probe else {
        warn!(
            "No health probe defined for service {}, assuming ready",
            name
        );
        return Ok(());
    };

    let deadline = Instant::now() + startup_timeout;
    let mut last_error: Option<String> = None;

    loop {
        match run_probe(&probe, config.probe_timeout).await {
            Ok(true) => {
                debug!("Service {} reported healthy", name);
                return Ok(());
            }
            Ok(false) => {
                debug!("Service {} not healthy yet", name);
            }
            Err(message) => {
                debug!("Health probe error for {}: {}", name, message);
                last_error = Some(message);
            }
        }

        if Instant::now() >= deadline {
            return Err(OrchestratorError::HealthCheckTimeout {
                service: name.to_string(),
                timeout: startup_timeout,
                last_error,
            });
        }

        sleep(config.health_poll_interval).await;
    }
}

/// Spawn the recurring health monitor task.
///
/// Each tick probes every running service once; probe failures feed back
/// into the orchestrator's recovery path. The task holds only a weak
/// reference, so dropping the orchestrator ends the loop.
pub(crate) fn spawn_monitor(
    orchestrator: &Arc<ServiceOrchestrator>,
) -> tokio::task::JoinHandle<()> {
    let weak = Arc::downgrade(orchestrator);
    tokio::spawn(async move {
        monitor_loop(weak).await;
    })
}

async fn monitor_loop(orchestrator: std::sync::Weak<ServiceOrchestrator>) {
    let interval = match orchestrator.upgrade() {
        Some(o) => o.config().monitor_interval,
        None => return,
    };
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; services were just health-gated
    // during start, so skip it.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(orchestrator) = orchestrator.upgrade() else {
            return;
        };

        if orchestrator.is_shutting_down() {
            debug!("Monitor tick skipped: shutdown in progress");
            continue;
        }

        orchestrator.health_pass().await;
    }
}

#[cfg(test)]
mod tests;
