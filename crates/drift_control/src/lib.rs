use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

pub mod chaos;
pub mod controller;
pub mod reconcile;
pub mod state;
pub mod status;

pub use drift_config::{AppSettings, DesiredState, DriftConfigError, WorkloadStatus};

use status::{ContainerSnapshot, InspectEntry};

#[derive(Debug, Error)]
pub enum DriftControlError {
    #[error("Failed to execute docker: {0}")]
    Execution(#[from] std::io::Error),

    #[error("Docker command failed: {0}")]
    CommandFailed(String),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Setpoint error: {0}")]
    Config(#[from] DriftConfigError),
}

impl DriftControlError {
    /// Nur Setpoint-Fehler beenden den Control Loop. Alles andere wird am
    /// Loop-Boundary geloggt und im nächsten Zyklus erneut versucht.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

// ============================================================================
// ContainerRuntime Trait - abstrahiert die Container-Runtime für Tests
// ============================================================================

/// Trait für Container-Runtime-Operationen.
/// Ermöglicht Mocking für Tests.
///
/// "Container existiert nicht" gilt bei `stop`, `remove` und `kill` als
/// Erfolg: der Chaos-Agent kann den Container jederzeit entfernt haben.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Liefert einen Snapshot des benannten Containers, oder None wenn er
    /// nicht existiert
    async fn inspect(&self, name: &str) -> Result<Option<ContainerSnapshot>, DriftControlError>;

    /// Zieht ein Image aus der Registry
    async fn pull(&self, image: &str) -> Result<(), DriftControlError>;

    /// Startet einen neuen Container im Hintergrund mit einem Port-Mapping
    async fn run_detached(
        &self,
        image: &str,
        name: &str,
        container_port: u16,
        host_port: u16,
    ) -> Result<(), DriftControlError>;

    /// Stoppt einen Container kooperativ (SIGTERM)
    async fn stop(&self, name: &str) -> Result<(), DriftControlError>;

    /// Entfernt einen Container
    async fn remove(&self, name: &str, force: bool) -> Result<(), DriftControlError>;

    /// Beendet einen Container hart (SIGKILL)
    async fn kill(&self, name: &str) -> Result<(), DriftControlError>;
}

// ============================================================================
// DockerCli - Echte Runtime-Implementierung über das docker CLI
// ============================================================================

/// Echte Container-Runtime über das `docker` CLI.
pub struct DockerCli {
    bin_path: PathBuf,
    /// Optionaler Remote-Endpoint (`docker -H`)
    host: Option<String>,
}

impl DockerCli {
    pub fn new(host: Option<String>) -> Self {
        Self {
            bin_path: PathBuf::from("docker"),
            host,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin_path);
        if let Some(host) = &self.host {
            cmd.args(["-H", host]);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd
    }

    async fn output(&self, args: &[&str]) -> Result<std::process::Output, DriftControlError> {
        let output = self.command().args(args).output().await?;
        Ok(output)
    }

    /// Liefert die RepoTags eines Images (best effort, leer bei Fehlern).
    async fn image_tags(&self, image_id: &str) -> Vec<String> {
        let output = self
            .output(&["image", "inspect", "--format", "{{json .RepoTags}}", image_id])
            .await;

        match output {
            Ok(out) if out.status.success() => {
                let stdout = String::from_utf8_lossy(&out.stdout);
                serde_json::from_str(stdout.trim()).unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }
}

/// Prüft ob eine docker-Fehlermeldung "Ziel existiert nicht" bedeutet.
fn is_absent_message(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no such container") || lower.contains("no such object")
}

/// Fehlermeldungen mit denen docker pull ein unauffindbares Image meldet.
const IMAGE_NOT_FOUND_SIGNATURES: [&str; 4] = [
    "not found",
    "manifest unknown",
    "repository does not exist",
    "pull access denied",
];

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn inspect(&self, name: &str) -> Result<Option<ContainerSnapshot>, DriftControlError> {
        let output = self
            .output(&["inspect", "--type", "container", "--format", "{{json .}}", name])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_absent_message(&stderr) {
                return Ok(None);
            }
            return Err(DriftControlError::CommandFailed(format!(
                "Failed to inspect '{}': {}",
                name,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let entry: InspectEntry = serde_json::from_str(stdout.trim()).map_err(|e| {
            DriftControlError::CommandFailed(format!("Unparseable inspect output for '{}': {}", name, e))
        })?;

        let tags = self.image_tags(&entry.image).await;
        Ok(Some(ContainerSnapshot::from_inspect(entry, tags)))
    }

    async fn pull(&self, image: &str) -> Result<(), DriftControlError> {
        let output = self.output(&["pull", image]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lower = stderr.to_lowercase();
            if IMAGE_NOT_FOUND_SIGNATURES.iter().any(|sig| lower.contains(sig)) {
                return Err(DriftControlError::ImageNotFound(image.to_string()));
            }
            return Err(DriftControlError::CommandFailed(format!(
                "Failed to pull '{}': {}",
                image,
                stderr.trim()
            )));
        }

        Ok(())
    }

    async fn run_detached(
        &self,
        image: &str,
        name: &str,
        container_port: u16,
        host_port: u16,
    ) -> Result<(), DriftControlError> {
        let port_map = format!("{}:{}", host_port, container_port);
        let output = self
            .output(&["run", "-d", "--name", name, "-p", &port_map, image])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DriftControlError::CommandFailed(format!(
                "Failed to run '{}': {}",
                name,
                stderr.trim()
            )));
        }

        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<(), DriftControlError> {
        let output = self.output(&["stop", name]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !is_absent_message(&stderr) {
                return Err(DriftControlError::CommandFailed(format!(
                    "Failed to stop '{}': {}",
                    name,
                    stderr.trim()
                )));
            }
        }

        Ok(())
    }

    async fn remove(&self, name: &str, force: bool) -> Result<(), DriftControlError> {
        let output = if force {
            self.output(&["rm", "-f", name]).await?
        } else {
            self.output(&["rm", name]).await?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !is_absent_message(&stderr) {
                return Err(DriftControlError::CommandFailed(format!(
                    "Failed to remove '{}': {}",
                    name,
                    stderr.trim()
                )));
            }
        }

        Ok(())
    }

    async fn kill(&self, name: &str) -> Result<(), DriftControlError> {
        let output = self.output(&["kill", name]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // "is not running" kann passieren wenn der Controller gerade
            // selbst aufgeräumt hat
            if !is_absent_message(&stderr) && !stderr.to_lowercase().contains("is not running") {
                return Err(DriftControlError::CommandFailed(format!(
                    "Failed to kill '{}': {}",
                    name,
                    stderr.trim()
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// ControlUI Trait - abstrahiert die Status-Ausgabe pro Zyklus
// ============================================================================

/// Trait für die Status-Narration des Control Loops.
/// Ermöglicht einheitliche Logik für Headless-Betrieb und Tests.
pub trait ControlUI: Send {
    /// Zyklus ohne Abweichung
    fn on_stable(&mut self, app_name: &str);

    /// Abweichung erkannt, Konvergenz beginnt
    fn on_drift(&mut self, reason: &str);

    /// Bestehende Instanz wird gestoppt und entfernt
    fn on_teardown(&mut self, name: &str);

    /// Pull fehlgeschlagen, lokaler Image-Cache wird verwendet
    fn on_pull_warning(&mut self, image: &str);

    /// Neue Instanz wird auf dem angegebenen Port provisioniert
    fn on_provisioning(&mut self, port: u16);

    /// Primärer Port belegt, Fallback wird versucht
    fn on_port_busy(&mut self, port: u16, fallback: u16);

    /// Konvergenz erfolgreich, Instanz läuft auf dem Port
    fn on_healed(&mut self, port: u16);

    /// Zyklus fehlgeschlagen (wird im nächsten Poll erneut versucht)
    fn on_cycle_error(&mut self, msg: &str);

    /// Shutdown-Signal empfangen
    fn on_shutdown(&mut self);

    /// Cleanup beim Shutdown ausgeführt
    fn on_cleanup(&mut self, was_present: bool);
}

// ============================================================================
// HeadlessUI - Einfache println!-basierte Ausgabe
// ============================================================================

/// Headless UI implementation using println!
pub struct HeadlessUI;

impl ControlUI for HeadlessUI {
    fn on_stable(&mut self, app_name: &str) {
        println!("System stable: {}", app_name);
    }

    fn on_drift(&mut self, reason: &str) {
        println!("DRIFT DETECTED: {}", reason);
        println!("Actuator: initiating convergence sequence...");
    }

    fn on_teardown(&mut self, name: &str) {
        println!("  Stopping and removing container '{}'...", name);
    }

    fn on_pull_warning(&mut self, image: &str) {
        println!("  Warning: could not pull '{}', trying local cache...", image);
    }

    fn on_provisioning(&mut self, port: u16) {
        println!("  Provisioning new instance on port {}...", port);
    }

    fn on_port_busy(&mut self, port: u16, fallback: u16) {
        println!("  Port {} busy, attempting fallback to {}...", port, fallback);
    }

    fn on_healed(&mut self, port: u16) {
        println!("SYSTEM HEALED: state converged on port {}", port);
    }

    fn on_cycle_error(&mut self, msg: &str) {
        eprintln!("Cycle failed: {}", msg);
    }

    fn on_shutdown(&mut self) {
        println!("\nShutdown signal received, cleaning up...");
    }

    fn on_cleanup(&mut self, was_present: bool) {
        if was_present {
            println!("Cleanup complete.");
        } else {
            println!("Container already gone.");
        }
    }
}

// ============================================================================
// Test Utilities - exportiert für Integrationstests
// ============================================================================

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Mutex;

    /// Mock UI für Tests - zeichnet alle Events auf
    #[derive(Default)]
    pub struct MockUI {
        pub events: Vec<String>,
    }

    impl MockUI {
        pub fn new() -> Self {
            Self::default()
        }

        /// Prüft ob ein Event mit dem Prefix aufgezeichnet wurde
        pub fn has_event(&self, prefix: &str) -> bool {
            self.events.iter().any(|e| e.starts_with(prefix))
        }

        /// Zählt Events mit dem Prefix
        pub fn count_events(&self, prefix: &str) -> usize {
            self.events.iter().filter(|e| e.starts_with(prefix)).count()
        }
    }

    impl ControlUI for MockUI {
        fn on_stable(&mut self, app_name: &str) {
            self.events.push(format!("stable:{}", app_name));
        }
        fn on_drift(&mut self, reason: &str) {
            self.events.push(format!("drift:{}", reason));
        }
        fn on_teardown(&mut self, name: &str) {
            self.events.push(format!("teardown:{}", name));
        }
        fn on_pull_warning(&mut self, image: &str) {
            self.events.push(format!("pull_warning:{}", image));
        }
        fn on_provisioning(&mut self, port: u16) {
            self.events.push(format!("provisioning:{}", port));
        }
        fn on_port_busy(&mut self, port: u16, fallback: u16) {
            self.events.push(format!("port_busy:{}:{}", port, fallback));
        }
        fn on_healed(&mut self, port: u16) {
            self.events.push(format!("healed:{}", port));
        }
        fn on_cycle_error(&mut self, msg: &str) {
            self.events.push(format!("cycle_error:{}", msg));
        }
        fn on_shutdown(&mut self) {
            self.events.push("shutdown".to_string());
        }
        fn on_cleanup(&mut self, was_present: bool) {
            self.events.push(format!("cleanup:{}", was_present));
        }
    }

    /// Ein Container wie ihn die Mock-Runtime führt.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct MockContainer {
        pub name: String,
        pub image: String,
        pub container_port: u16,
        pub host_port: u16,
        pub status: String,
    }

    #[derive(Default)]
    struct MockState {
        container: Option<MockContainer>,
        busy_ports: HashSet<u16>,
        missing_images: HashSet<String>,
        unreachable_registry: bool,
        pull_calls: Vec<String>,
        run_calls: Vec<(String, u16)>,
        stop_calls: Vec<String>,
        remove_calls: Vec<(String, bool)>,
        kill_calls: Vec<String>,
    }

    /// Mock Container-Runtime für Tests.
    ///
    /// Führt höchstens einen benannten Container und simuliert belegte
    /// Host-Ports sowie unauffindbare Images.
    #[derive(Default)]
    pub struct MockRuntime {
        state: Mutex<MockState>,
    }

    impl MockRuntime {
        pub fn new() -> Self {
            Self::default()
        }

        /// Markiert einen Host-Port als bereits belegt
        pub fn with_busy_port(self, port: u16) -> Self {
            self.state.lock().unwrap().busy_ports.insert(port);
            self
        }

        /// Markiert ein Image als nirgends auffindbar
        pub fn with_missing_image(self, image: &str) -> Self {
            self.state.lock().unwrap().missing_images.insert(image.to_string());
            self
        }

        /// Simuliert eine nicht erreichbare Registry (pull schlägt fehl,
        /// Image ist aber lokal vorhanden)
        pub fn with_unreachable_registry(self) -> Self {
            self.state.lock().unwrap().unreachable_registry = true;
            self
        }

        /// Setzt den laufenden Container direkt (out-of-band Mutation)
        pub fn deploy(&self, name: &str, image: &str, container_port: u16, host_port: u16) {
            self.state.lock().unwrap().container = Some(MockContainer {
                name: name.to_string(),
                image: image.to_string(),
                container_port,
                host_port,
                status: "running".to_string(),
            });
        }

        /// Setzt den Status des Containers (z.B. "exited")
        pub fn set_status(&self, status: &str) {
            if let Some(container) = self.state.lock().unwrap().container.as_mut() {
                container.status = status.to_string();
            }
        }

        pub fn container(&self) -> Option<MockContainer> {
            self.state.lock().unwrap().container.clone()
        }

        pub fn pull_calls(&self) -> Vec<String> {
            self.state.lock().unwrap().pull_calls.clone()
        }

        /// (image, host_port) jedes run-Versuchs
        pub fn run_calls(&self) -> Vec<(String, u16)> {
            self.state.lock().unwrap().run_calls.clone()
        }

        pub fn stop_calls(&self) -> Vec<String> {
            self.state.lock().unwrap().stop_calls.clone()
        }

        pub fn remove_calls(&self) -> Vec<(String, bool)> {
            self.state.lock().unwrap().remove_calls.clone()
        }

        pub fn kill_calls(&self) -> Vec<String> {
            self.state.lock().unwrap().kill_calls.clone()
        }
    }

    #[async_trait]
    impl ContainerRuntime for MockRuntime {
        async fn inspect(&self, name: &str) -> Result<Option<ContainerSnapshot>, DriftControlError> {
            let state = self.state.lock().unwrap();
            let container = match &state.container {
                Some(c) if c.name == name => c,
                _ => return Ok(None),
            };

            let mut ports = BTreeMap::new();
            ports.insert(
                format!("{}/tcp", container.container_port),
                vec![container.host_port],
            );

            Ok(Some(ContainerSnapshot {
                status: container.status.clone(),
                image_tags: vec![container.image.clone()],
                ports,
            }))
        }

        async fn pull(&self, image: &str) -> Result<(), DriftControlError> {
            let mut state = self.state.lock().unwrap();
            state.pull_calls.push(image.to_string());

            if state.missing_images.contains(image) {
                return Err(DriftControlError::ImageNotFound(image.to_string()));
            }
            if state.unreachable_registry {
                return Err(DriftControlError::CommandFailed(
                    "network timeout while contacting registry".to_string(),
                ));
            }
            Ok(())
        }

        async fn run_detached(
            &self,
            image: &str,
            name: &str,
            container_port: u16,
            host_port: u16,
        ) -> Result<(), DriftControlError> {
            let mut state = self.state.lock().unwrap();
            state.run_calls.push((image.to_string(), host_port));

            if state.container.is_some() {
                return Err(DriftControlError::CommandFailed(format!(
                    "Conflict. The container name \"/{}\" is already in use",
                    name
                )));
            }
            if state.busy_ports.contains(&host_port) {
                return Err(DriftControlError::CommandFailed(format!(
                    "driver failed programming external connectivity: \
                     Bind for 0.0.0.0:{} failed: port is already allocated",
                    host_port
                )));
            }

            state.container = Some(MockContainer {
                name: name.to_string(),
                image: image.to_string(),
                container_port,
                host_port,
                status: "running".to_string(),
            });
            Ok(())
        }

        async fn stop(&self, name: &str) -> Result<(), DriftControlError> {
            let mut state = self.state.lock().unwrap();
            state.stop_calls.push(name.to_string());

            if let Some(container) = state.container.as_mut() {
                if container.name == name {
                    container.status = "exited".to_string();
                }
            }
            Ok(())
        }

        async fn remove(&self, name: &str, force: bool) -> Result<(), DriftControlError> {
            let mut state = self.state.lock().unwrap();
            state.remove_calls.push((name.to_string(), force));

            let matches = state
                .container
                .as_ref()
                .map(|c| c.name == name)
                .unwrap_or(false);

            if matches {
                let running = state.container.as_ref().unwrap().status == "running";
                if running && !force {
                    return Err(DriftControlError::CommandFailed(format!(
                        "cannot remove running container '{}'",
                        name
                    )));
                }
                state.container = None;
            }
            Ok(())
        }

        async fn kill(&self, name: &str) -> Result<(), DriftControlError> {
            let mut state = self.state.lock().unwrap();
            state.kill_calls.push(name.to_string());

            if let Some(container) = state.container.as_mut() {
                if container.name == name {
                    container.status = "exited".to_string();
                }
            }
            Ok(())
        }
    }

    /// Erstellt einen Test-Setpoint
    pub fn make_desired(app_name: &str, image: &str, host_port: u16, container_port: u16) -> DesiredState {
        DesiredState {
            app_name: app_name.to_string(),
            image: drift_config::normalize_image_tag(image),
            status: WorkloadStatus::Running,
            host_port,
            fallback_host_port: None,
            container_port,
        }
    }

    /// Erstellt einen Test-Setpoint mit Fallback-Port
    pub fn make_desired_with_fallback(
        app_name: &str,
        image: &str,
        host_port: u16,
        fallback_host_port: u16,
        container_port: u16,
    ) -> DesiredState {
        DesiredState {
            fallback_host_port: Some(fallback_host_port),
            ..make_desired(app_name, image, host_port, container_port)
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
