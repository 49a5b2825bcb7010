use super::*;

#[tokio::test]
async fn test_event_channel() {
    let channel = EventChannel::new();
    let mut rx = channel.subscribe();

    channel.emit(OrchestratorEvent::AllServicesStarted);

    let received = rx.recv().await.unwrap();
    assert_eq!(received.event, OrchestratorEvent::AllServicesStarted);
}

#[tokio::test]
async fn test_multiple_subscribers_see_every_event() {
    let channel = EventChannel::new();
    let mut rx1 = channel.subscribe();
    let mut rx2 = channel.subscribe();

    channel.emit(OrchestratorEvent::ServiceStopped {
        name: "api".to_string(),
    });

    assert_eq!(
        rx1.recv().await.unwrap().event,
        OrchestratorEvent::ServiceStopped {
            name: "api".to_string()
        }
    );
    assert_eq!(
        rx2.recv().await.unwrap().event,
        OrchestratorEvent::ServiceStopped {
            name: "api".to_string()
        }
    );
}

#[test]
fn test_emit_without_subscribers_does_not_panic() {
    let channel = EventChannel::new();
    channel.emit(OrchestratorEvent::AllServicesStopped);
}

#[test]
fn test_event_as_str() {
    use crate::service::DeploymentMode;
    use crate::state::ServiceStatus;

    assert_eq!(
        OrchestratorEvent::ServiceRegistered {
            name: "a".to_string()
        }
        .as_str(),
        "service-registered"
    );
    assert_eq!(
        OrchestratorEvent::ServiceStateChanged {
            name: "a".to_string(),
            previous: ServiceStatus::Stopped,
            current: ServiceStatus::Starting,
        }
        .as_str(),
        "service-state-changed"
    );
    assert_eq!(
        OrchestratorEvent::ServiceStarted {
            name: "a".to_string(),
            deployment_mode: DeploymentMode::Managed,
        }
        .as_str(),
        "service-started"
    );
    assert_eq!(
        OrchestratorEvent::ServiceStopped {
            name: "a".to_string()
        }
        .as_str(),
        "service-stopped"
    );
    assert_eq!(
        OrchestratorEvent::ServiceUnhealthy {
            name: "a".to_string(),
            message: "probe failed".to_string(),
        }
        .as_str(),
        "service-unhealthy"
    );
    assert_eq!(
        OrchestratorEvent::AllServicesStarted.as_str(),
        "all-services-started"
    );
    assert_eq!(
        OrchestratorEvent::AllServicesStopped.as_str(),
        "all-services-stopped"
    );
    assert_eq!(
        OrchestratorEvent::StartupFailed {
            name: "a".to_string(),
            message: "boom".to_string(),
        }
        .as_str(),
        "startup-failed"
    );
}
