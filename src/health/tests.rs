use super::*;
use crate::errors::OrchestratorError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};

fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        health_poll_interval: Duration::from_millis(10),
        probe_timeout: Duration::from_millis(50),
        ..Default::default()
    }
}

struct AlwaysHealthy;

#[async_trait]
impl HealthProbe for AlwaysHealthy {
    async fn check(&self) -> crate::errors::Result<bool> {
        Ok(true)
    }
}

struct NeverHealthy;

#[async_trait]
impl HealthProbe for NeverHealthy {
    async fn check(&self) -> crate::errors::Result<bool> {
        Ok(false)
    }
}

/// Reports unhealthy until it has been asked `threshold` times.
struct HealthyAfter {
    threshold: u32,
    calls: AtomicU32,
}

impl HealthyAfter {
    fn new(threshold: u32) -> Self {
        Self {
            threshold,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl HealthProbe for HealthyAfter {
    async fn check(&self) -> crate::errors::Result<bool> {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(calls >= self.threshold)
    }
}

struct Erroring;

#[async_trait]
impl HealthProbe for Erroring {
    async fn check(&self) -> crate::errors::Result<bool> {
        Err(OrchestratorError::Internal("connection refused".to_string()))
    }
}

struct Hanging;

#[async_trait]
impl HealthProbe for Hanging {
    async fn check(&self) -> crate::errors::Result<bool> {
        sleep(Duration::from_secs(3600)).await;
        Ok(true)
    }
}

#[tokio::test]
async fn no_probe_is_assumed_ready_immediately() {
    let config = fast_config();
    let start = std::time::Instant::now();
    wait_for_healthy("svc", None, Duration::from_secs(30), &config)
        .await
        .unwrap();
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[tokio::test]
async fn healthy_probe_resolves_on_first_poll() {
    let config = fast_config();
    wait_for_healthy(
        "svc",
        Some(Arc::new(AlwaysHealthy)),
        Duration::from_secs(1),
        &config,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn probe_becoming_healthy_after_several_polls_succeeds() {
    let config = fast_config();
    wait_for_healthy(
        "svc",
        Some(Arc::new(HealthyAfter::new(3))),
        Duration::from_secs(1),
        &config,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn never_healthy_probe_times_out_with_service_and_timeout() {
    let config = fast_config();
    let timeout = Duration::from_millis(100);
    let result = wait_for_healthy("svc", Some(Arc::new(NeverHealthy)), timeout, &config).await;

    match result {
        Err(OrchestratorError::HealthCheckTimeout {
            service,
            timeout: reported,
            last_error,
        }) => {
            assert_eq!(service, "svc");
            assert_eq!(reported, timeout);
            // The probe answered (unhealthy) rather than erroring.
            assert!(last_error.is_none());
        }
        other => panic!("expected HealthCheckTimeout, got {:?}", other),
    }
}

#[tokio::test]
async fn timeout_error_carries_last_probe_error() {
    let config = fast_config();
    let result = wait_for_healthy(
        "svc",
        Some(Arc::new(Erroring)),
        Duration::from_millis(50),
        &config,
    )
    .await;

    match result {
        Err(OrchestratorError::HealthCheckTimeout { last_error, .. }) => {
            let last_error = last_error.expect("last probe error should be recorded");
            assert!(last_error.contains("connection refused"));
        }
        other => panic!("expected HealthCheckTimeout, got {:?}", other),
    }
}

#[tokio::test]
async fn hanging_probe_is_bounded_by_probe_timeout() {
    let config = fast_config();
    let start = std::time::Instant::now();
    let result = wait_for_healthy(
        "svc",
        Some(Arc::new(Hanging)),
        Duration::from_millis(120),
        &config,
    )
    .await;

    assert!(matches!(
        result,
        Err(OrchestratorError::HealthCheckTimeout { .. })
    ));
    // Each probe invocation is cut off at probe_timeout (50ms); the overall
    // wait must resolve shortly after the 120ms deadline, not hang.
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn run_probe_reports_probe_timeout_as_error() {
    let result = run_probe(
        &(Arc::new(Hanging) as Arc<dyn HealthProbe>),
        Duration::from_millis(20),
    )
    .await;
    let message = result.unwrap_err();
    assert!(message.contains("timed out"));
}
