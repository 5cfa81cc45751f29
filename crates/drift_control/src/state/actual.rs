//! Observed State - Was die Runtime tatsächlich meldet
//!
//! Der ObservedState wird in jedem Zyklus frisch von der Runtime gemessen
//! und nie über Zyklen hinweg gehalten: der Chaos-Agent kann den Container
//! jederzeit mutieren, der Snapshot ist ab Messung potentiell veraltet.

use std::collections::BTreeMap;
use std::fmt;

use crate::status::ContainerSnapshot;
use crate::{ContainerRuntime, DriftControlError};

/// Der gemessene Zustand des Workloads, oder seine Abwesenheit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedState {
    /// Kein Container mit dem Namen existiert
    Absent,
    /// Container existiert mit diesem Zustand
    Present(ObservedWorkload),
}

impl ObservedState {
    /// Misst den aktuellen Zustand des benannten Workloads.
    pub async fn measure<R: ContainerRuntime + ?Sized>(
        runtime: &R,
        name: &str,
    ) -> Result<Self, DriftControlError> {
        let snapshot = runtime.inspect(name).await?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Erstellt einen ObservedState aus einem Runtime-Snapshot.
    pub fn from_snapshot(snapshot: Option<ContainerSnapshot>) -> Self {
        match snapshot {
            None => Self::Absent,
            Some(snapshot) => Self::Present(ObservedWorkload {
                status: ContainerStatus::parse(&snapshot.status),
                image_tags: snapshot.image_tags,
                ports: snapshot.ports,
            }),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// Ein existierender Container aus Sicht des Controllers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedWorkload {
    /// Lifecycle-Status des Containers
    pub status: ContainerStatus,
    /// Repo-Tags des laufenden Images
    pub image_tags: Vec<String>,
    /// Port-Bindings "containerPort/proto" -> gebundene Host-Ports
    pub ports: BTreeMap<String, Vec<u16>>,
}

impl ObservedWorkload {
    /// Der erste gebundene Host-Port für den Port-Key, falls vorhanden.
    pub fn first_host_port(&self, port_key: &str) -> Option<u16> {
        self.ports.get(port_key).and_then(|ports| ports.first().copied())
    }
}

/// Lifecycle-Status eines Containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Exited,
    Removing,
    Dead,
    /// Unbekannter Status-String
    Unknown(String),
}

impl ContainerStatus {
    /// Parst einen Status-String der Runtime.
    pub fn parse(s: &str) -> Self {
        match s {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "exited" => Self::Exited,
            "removing" => Self::Removing,
            "dead" => Self::Dead,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Restarting => write!(f, "restarting"),
            Self::Exited => write!(f, "exited"),
            Self::Removing => write!(f, "removing"),
            Self::Dead => write!(f, "dead"),
            Self::Unknown(s) => write!(f, "{}", s),
        }
    }
}
