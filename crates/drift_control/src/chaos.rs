//! Chaos Agent - Injiziert Fehler um die Recovery-Pfade des Controllers
//! zu testen
//!
//! Läuft als eigenständiger sequentieller Prozess ohne Koordination mit
//! dem Control Loop: die einzige Verbindung ist der geteilte Container in
//! der Runtime. Der Controller weiß nicht wer eine Abweichung verursacht
//! hat - genau das macht ihn generisch resilient.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use tokio::time::sleep;

use crate::{ContainerRuntime, DriftControlError};

/// Untergrenze der zufälligen Wartezeit zwischen Attacken (Sekunden).
const MIN_LURK_SECS: u64 = 8;
/// Obergrenze der zufälligen Wartezeit zwischen Attacken (Sekunden).
const MAX_LURK_SECS: u64 = 15;

/// Container-Port den das Decoy-Image exponiert.
const ROGUE_CONTAINER_PORT: u16 = 80;

/// Die drei Attacken, je eine pro Abweichungskategorie des Controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaosAttack {
    /// Harter Kill (SIGKILL) einer laufenden Instanz
    Terminate,
    /// Kooperativer Stop (SIGTERM) einer laufenden Instanz
    GracefulStop,
    /// Ersetzt die Instanz durch ein Decoy-Image auf einem fremden Port
    RogueDeployment,
}

impl ChaosAttack {
    const ALL: [ChaosAttack; 3] = [
        ChaosAttack::Terminate,
        ChaosAttack::GracefulStop,
        ChaosAttack::RogueDeployment,
    ];
}

impl fmt::Display for ChaosAttack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate => write!(f, "terminate"),
            Self::GracefulStop => write!(f, "graceful-stop"),
            Self::RogueDeployment => write!(f, "rogue-deployment"),
        }
    }
}

/// Der Agent of Chaos.
///
/// Wählt auf zufälliger Kadenz eine Attacke und wendet sie direkt auf die
/// Runtime an, am Controller vorbei.
pub struct ChaosAgent<R: ContainerRuntime> {
    runtime: Arc<R>,
    target_name: String,
    rogue_image: String,
    rogue_port: u16,
}

impl<R: ContainerRuntime> ChaosAgent<R> {
    pub fn new(runtime: Arc<R>, target_name: String, rogue_image: String, rogue_port: u16) -> Self {
        Self {
            runtime,
            target_name,
            rogue_image,
            rogue_port,
        }
    }

    /// Endlosschleife: zufällig warten, zufällige Attacke anwenden.
    /// Attacken-Fehler werden geloggt und beenden den Agenten nie.
    pub async fn unleash(&self) -> Result<(), DriftControlError> {
        println!("Chaos agent active, target: {}", self.target_name);

        loop {
            let wait_secs = rand::thread_rng().gen_range(MIN_LURK_SECS..=MAX_LURK_SECS);
            println!("Lurking for {} seconds...", wait_secs);
            sleep(Duration::from_secs(wait_secs)).await;

            let attack = *ChaosAttack::ALL
                .choose(&mut rand::thread_rng())
                .unwrap_or(&ChaosAttack::Terminate);

            if let Err(err) = self.attack(attack).await {
                eprintln!("Attack {} failed: {}", attack, err);
            }
        }
    }

    /// Wendet genau eine Attacke an.
    pub async fn attack(&self, attack: ChaosAttack) -> Result<(), DriftControlError> {
        match attack {
            ChaosAttack::Terminate => self.attack_terminate().await,
            ChaosAttack::GracefulStop => self.attack_stop().await,
            ChaosAttack::RogueDeployment => self.attack_rogue_deployment().await,
        }
    }

    /// Harter Kill. No-op wenn die Instanz nicht läuft.
    async fn attack_terminate(&self) -> Result<(), DriftControlError> {
        if !self.target_is_running().await? {
            println!("Target already down, skipping attack");
            return Ok(());
        }

        println!("ATTACK: sending SIGKILL to {}", self.target_name);
        self.runtime.kill(&self.target_name).await
    }

    /// Kooperativer Stop. No-op wenn die Instanz nicht läuft.
    async fn attack_stop(&self) -> Result<(), DriftControlError> {
        if !self.target_is_running().await? {
            println!("Target already down, skipping attack");
            return Ok(());
        }

        println!("ATTACK: stopping {}", self.target_name);
        self.runtime.stop(&self.target_name).await
    }

    /// Konfigurationsdrift: ersetzt die Instanz durch das Decoy-Image
    /// unter demselben Namen auf dem Rogue-Port.
    async fn attack_rogue_deployment(&self) -> Result<(), DriftControlError> {
        println!("ATTACK: deploying rogue container (image drift)");

        // Entfernen darf fehlschlagen - der Controller kann die Instanz
        // gerade selbst ersetzt haben
        let _ = self.runtime.remove(&self.target_name, true).await;

        if self.runtime.pull(&self.rogue_image).await.is_err() {
            println!("Could not pull rogue image, trying local cache");
        }

        self.runtime
            .run_detached(
                &self.rogue_image,
                &self.target_name,
                ROGUE_CONTAINER_PORT,
                self.rogue_port,
            )
            .await?;

        println!("Deployed '{}' masquerading as {}", self.rogue_image, self.target_name);
        Ok(())
    }

    async fn target_is_running(&self) -> Result<bool, DriftControlError> {
        let snapshot = self.runtime.inspect(&self.target_name).await?;
        Ok(snapshot.map(|s| s.status == "running").unwrap_or(false))
    }
}
