//! End-to-end drift scenarios through the public API: measure, classify,
//! converge against the mock runtime.

use std::sync::Arc;

use drift_control::controller::converge;
use drift_control::reconcile::{classify, Deviation};
use drift_control::state::{ContainerStatus, ObservedState};
use drift_control::test_utils::{make_desired, make_desired_with_fallback, MockRuntime, MockUI};

async fn measure(runtime: &MockRuntime, name: &str) -> ObservedState {
    ObservedState::measure(runtime, name).await.unwrap()
}

/// Scenario: no container exists. One cycle must create the instance with
/// the desired image and port mapping.
#[tokio::test]
async fn test_missing_container_is_created() {
    let runtime = Arc::new(MockRuntime::new());
    let desired = make_desired("critical-service", "nginx:1.25", 8080, 80);
    let mut ui = MockUI::new();

    let observed = measure(&runtime, "critical-service").await;
    let deviation = classify(&desired, &observed);
    assert_eq!(deviation, Some(Deviation::Missing));

    converge(runtime.as_ref(), &desired, &observed, &mut ui)
        .await
        .unwrap();

    let container = runtime.container().unwrap();
    assert_eq!(container.image, "nginx:1.25");
    assert_eq!(container.container_port, 80);
    assert_eq!(container.host_port, 8080);
    assert_eq!(container.status, "running");
    assert!(ui.has_event("healed:8080"));

    // Next cycle sees a converged system
    let observed = measure(&runtime, "critical-service").await;
    assert_eq!(classify(&desired, &observed), None);
}

/// Scenario: a container with the wrong image version is running. It must
/// be torn down and recreated with the desired image.
#[tokio::test]
async fn test_image_drift_is_healed_by_recreate() {
    let runtime = Arc::new(MockRuntime::new());
    runtime.deploy("critical-service", "nginx:1.24", 80, 8080);
    let desired = make_desired("critical-service", "nginx:1.25", 8080, 80);
    let mut ui = MockUI::new();

    let observed = measure(&runtime, "critical-service").await;
    assert_eq!(
        classify(&desired, &observed),
        Some(Deviation::ImageMismatch {
            actual_tags: vec!["nginx:1.24".to_string()],
        })
    );

    converge(runtime.as_ref(), &desired, &observed, &mut ui)
        .await
        .unwrap();

    // Old instance was stopped and removed, not patched in place
    assert_eq!(runtime.stop_calls(), vec!["critical-service".to_string()]);
    assert!(runtime
        .remove_calls()
        .contains(&("critical-service".to_string(), false)));
    assert_eq!(runtime.container().unwrap().image, "nginx:1.25");
}

/// Scenario: the primary port is taken by a foreign process. The instance
/// must come up on the fallback port, and that binding counts as converged.
#[tokio::test]
async fn test_busy_primary_port_falls_back() {
    let runtime = Arc::new(MockRuntime::new().with_busy_port(8080));
    let desired = make_desired_with_fallback("critical-service", "nginx:1.25", 8080, 8081, 80);
    let mut ui = MockUI::new();

    let observed = measure(&runtime, "critical-service").await;
    converge(runtime.as_ref(), &desired, &observed, &mut ui)
        .await
        .unwrap();

    let container = runtime.container().unwrap();
    assert_eq!(container.host_port, 8081);
    assert!(ui.has_event("port_busy:8080:8081"));
    assert!(ui.has_event("healed:8081"));

    // The fallback binding is an accepted end state, not drift
    let observed = measure(&runtime, "critical-service").await;
    assert_eq!(classify(&desired, &observed), None);
}

/// A stopped container is status drift and gets recreated running.
#[tokio::test]
async fn test_stopped_container_is_restarted() {
    let runtime = Arc::new(MockRuntime::new());
    runtime.deploy("critical-service", "nginx:1.25", 80, 8080);
    runtime.set_status("exited");
    let desired = make_desired("critical-service", "nginx:1.25", 8080, 80);
    let mut ui = MockUI::new();

    let observed = measure(&runtime, "critical-service").await;
    assert_eq!(
        classify(&desired, &observed),
        Some(Deviation::StatusMismatch {
            actual: ContainerStatus::Exited,
        })
    );

    converge(runtime.as_ref(), &desired, &observed, &mut ui)
        .await
        .unwrap();

    assert_eq!(runtime.container().unwrap().status, "running");
}

/// A rogue deployment drifts in both image and port. Image wins the
/// classification and the recreate heals both at once.
#[tokio::test]
async fn test_rogue_deployment_is_healed() {
    let runtime = Arc::new(MockRuntime::new());
    runtime.deploy("critical-service", "httpd:alpine", 80, 9999);
    let desired = make_desired("critical-service", "nginx:1.25", 8080, 80);
    let mut ui = MockUI::new();

    let observed = measure(&runtime, "critical-service").await;
    assert_eq!(
        classify(&desired, &observed),
        Some(Deviation::ImageMismatch {
            actual_tags: vec!["httpd:alpine".to_string()],
        })
    );

    converge(runtime.as_ref(), &desired, &observed, &mut ui)
        .await
        .unwrap();

    let container = runtime.container().unwrap();
    assert_eq!(container.image, "nginx:1.25");
    assert_eq!(container.host_port, 8080);

    let observed = measure(&runtime, "critical-service").await;
    assert_eq!(classify(&desired, &observed), None);
}

/// Both candidate ports busy: the error propagates and the system is left
/// without a half-configured instance.
#[tokio::test]
async fn test_all_ports_busy_leaves_clean_state() {
    let runtime = Arc::new(MockRuntime::new().with_busy_port(8080).with_busy_port(8081));
    let desired = make_desired_with_fallback("critical-service", "nginx:1.25", 8080, 8081, 80);
    let mut ui = MockUI::new();

    let observed = measure(&runtime, "critical-service").await;
    let err = converge(runtime.as_ref(), &desired, &observed, &mut ui)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("port is already allocated"));
    assert!(runtime.container().is_none());
    // Exactly two attempts, never a third candidate
    assert_eq!(runtime.run_calls().len(), 2);
}

/// An unpullable image aborts the cycle before the old instance would be
/// replaced by nothing. The error is recoverable, not fatal.
#[tokio::test]
async fn test_unknown_image_error_is_recoverable() {
    let runtime = Arc::new(MockRuntime::new().with_missing_image("ghost:1.0"));
    let desired = make_desired("critical-service", "ghost:1.0", 8080, 80);
    let mut ui = MockUI::new();

    let observed = measure(&runtime, "critical-service").await;
    let err = converge(runtime.as_ref(), &desired, &observed, &mut ui)
        .await
        .unwrap_err();

    assert!(!err.is_fatal());
    assert!(runtime.run_calls().is_empty());
}
