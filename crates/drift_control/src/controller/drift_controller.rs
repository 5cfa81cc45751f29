//! DriftController - Der Feedback Control Loop
//!
//! Der Controller implementiert den Operator Pattern Loop:
//! 1. Setpoint frisch von der Platte laden
//! 2. Ist-Zustand messen (ObservedState)
//! 3. Abweichung klassifizieren (classify)
//! 4. Bei Abweichung korrigieren (converge)
//! 5. Unterbrechbar warten, dann wiederholen
//!
//! Nicht-fatale Fehler eines Zyklus werden am Loop-Boundary geloggt und im
//! nächsten Poll erneut versucht - höchstens ein Versuch pro Zyklus, kein
//! Backoff. Nur Setpoint-Fehler beenden den Prozess.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use drift_config::{AppSettings, DesiredState};
use tokio::time::sleep;

use crate::controller::actuator::converge;
use crate::reconcile::classify;
use crate::state::{ControllerState, ObservedState};
use crate::{ContainerRuntime, ControlUI, DriftControlError};

/// Laufzeit-Optionen des Control Loops.
#[derive(Debug, Clone)]
pub struct ControlOptions {
    /// Pfad zum Setpoint-Dokument
    pub config_file: PathBuf,
    /// Zeit zwischen zwei Zyklen
    pub polling_interval: Duration,
    /// Scheibengröße des unterbrechbaren Wartens
    pub control_interval: Duration,
}

impl From<&AppSettings> for ControlOptions {
    fn from(settings: &AppSettings) -> Self {
        Self {
            config_file: settings.config_file.clone(),
            polling_interval: settings.polling_interval,
            control_interval: settings.control_interval,
        }
    }
}

/// Geteiltes Shutdown-Flag für den Controller.
///
/// `request()` ist idempotent; beide Prozess-Signale (SIGINT, SIGTERM)
/// laufen auf dasselbe Flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fordert den Shutdown an. Weitere Aufrufe sind no-ops.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Der Drift-Controller hält einen Workload auf seinem Setpoint.
pub struct DriftController<R: ContainerRuntime, U: ControlUI> {
    runtime: Arc<R>,
    options: ControlOptions,
    ui: U,
    state: ControllerState,
    shutdown: ShutdownSignal,
    /// Name aus dem zuletzt erfolgreich geladenen Setpoint (für Cleanup)
    last_app_name: Option<String>,
}

impl<R: ContainerRuntime, U: ControlUI> DriftController<R, U> {
    pub fn new(runtime: Arc<R>, options: ControlOptions, ui: U) -> Self {
        Self {
            runtime,
            options,
            ui,
            state: ControllerState::new(),
            shutdown: ShutdownSignal::new(),
            last_app_name: None,
        }
    }

    /// Handle mit dem Signal-Handler den Shutdown anfordern können.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Führt den Control Loop aus bis zum Shutdown-Signal oder einem
    /// fatalen Setpoint-Fehler.
    pub async fn run(mut self) -> Result<(), DriftControlError> {
        while !self.shutdown.is_requested() {
            self.state.start_cycle();

            if let Err(err) = self.cycle().await {
                if err.is_fatal() {
                    self.cleanup().await;
                    self.state.stop();
                    return Err(err);
                }
                self.ui.on_cycle_error(&err.to_string());
            }

            self.state.waiting();
            self.interruptible_wait().await;
        }

        self.ui.on_shutdown();
        self.cleanup().await;
        self.state.stop();
        Ok(())
    }

    /// Ein Zyklus: laden, messen, klassifizieren, korrigieren.
    async fn cycle(&mut self) -> Result<(), DriftControlError> {
        let desired = DesiredState::load(&self.options.config_file)?;
        self.last_app_name = Some(desired.app_name.clone());

        let observed = ObservedState::measure(self.runtime.as_ref(), &desired.app_name).await?;
        self.state.classifying();

        match classify(&desired, &observed) {
            Some(deviation) => {
                self.state.actuating();
                self.ui.on_drift(&deviation.to_string());
                converge(self.runtime.as_ref(), &desired, &observed, &mut self.ui).await?;
            }
            None => self.ui.on_stable(&desired.app_name),
        }

        Ok(())
    }

    /// Wartet das Polling-Intervall in kleinen Scheiben, damit ein
    /// Shutdown innerhalb einer Scheibe greift statt erst am Intervallende.
    async fn interruptible_wait(&self) {
        let slice = self.options.control_interval.max(Duration::from_millis(1));
        let steps = (self.options.polling_interval.as_millis() / slice.as_millis()).max(1);

        for _ in 0..steps {
            if self.shutdown.is_requested() {
                break;
            }
            sleep(slice).await;
        }
    }

    /// Entfernt die verwaltete Instanz beim Shutdown (best effort).
    /// "Bereits weg" gilt als Erfolg.
    async fn cleanup(&mut self) {
        let name = match self.last_app_name.take() {
            Some(name) => name,
            None => return,
        };

        let was_present = self
            .runtime
            .inspect(&name)
            .await
            .ok()
            .flatten()
            .is_some();

        let _ = self.runtime.stop(&name).await;
        let _ = self.runtime.remove(&name, true).await;
        self.ui.on_cleanup(was_present);
    }
}
