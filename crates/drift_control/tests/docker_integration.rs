//! Integration tests against a real Docker daemon.
//!
//! These tests require Docker to be running and will create/destroy containers.
//!
//! Run with:
//! ```sh
//! cargo test --package drift-control --test docker_integration -- --ignored --test-threads=1
//! ```
//!
//! Note: Tests must run sequentially (--test-threads=1) because they bind
//! host ports and share container names.

use std::process::Command;

use drift_control::controller::converge;
use drift_control::state::ObservedState;
use drift_control::test_utils::{make_desired, MockUI};
use drift_control::{ContainerRuntime, DockerCli};

/// Check if Docker is available
fn docker_available() -> bool {
    Command::new("docker")
        .args(["info"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Unique container name per test run so stale leftovers never collide
fn test_name(suffix: &str) -> String {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis();
    format!("drift-test-{}-{}", suffix, id)
}

async fn remove_container(runtime: &DockerCli, name: &str) {
    let _ = runtime.remove(name, true).await;
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_inspect_absent_container_is_none() {
    if !docker_available() {
        eprintln!("Docker not available, skipping test");
        return;
    }

    let runtime = DockerCli::new(None);
    let snapshot = runtime.inspect(&test_name("absent")).await.unwrap();
    assert!(snapshot.is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_run_inspect_remove_cycle() {
    if !docker_available() {
        eprintln!("Docker not available, skipping test");
        return;
    }

    let runtime = DockerCli::new(None);
    let name = test_name("cycle");

    runtime.pull("nginx:alpine").await.unwrap();
    runtime
        .run_detached("nginx:alpine", &name, 80, 18080)
        .await
        .unwrap();

    let snapshot = runtime.inspect(&name).await.unwrap().unwrap();
    assert_eq!(snapshot.status, "running");
    assert_eq!(snapshot.ports.get("80/tcp"), Some(&vec![18080]));

    runtime.stop(&name).await.unwrap();
    let snapshot = runtime.inspect(&name).await.unwrap().unwrap();
    assert_ne!(snapshot.status, "running");

    runtime.remove(&name, false).await.unwrap();
    assert!(runtime.inspect(&name).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_lifecycle_ops_tolerate_absent_container() {
    if !docker_available() {
        eprintln!("Docker not available, skipping test");
        return;
    }

    let runtime = DockerCli::new(None);
    let name = test_name("gone");

    // Absence is success for every teardown operation
    runtime.stop(&name).await.unwrap();
    runtime.kill(&name).await.unwrap();
    runtime.remove(&name, true).await.unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_converge_provisions_real_container() {
    if !docker_available() {
        eprintln!("Docker not available, skipping test");
        return;
    }

    let runtime = DockerCli::new(None);
    let name = test_name("converge");
    let desired = make_desired(&name, "nginx:alpine", 18081, 80);
    let mut ui = MockUI::new();

    let observed = ObservedState::measure(&runtime, &name).await.unwrap();
    converge(&runtime, &desired, &observed, &mut ui)
        .await
        .unwrap();

    let observed = ObservedState::measure(&runtime, &name).await.unwrap();
    assert!(observed.is_present());
    assert!(ui.has_event("healed:18081"));

    remove_container(&runtime, &name).await;
}
