//! Deviation - Das klassifizierte Fehlersignal eines Zyklus
//!
//! Eine Deviation ist die Ausgabe von classify() und benennt die eine
//! Abweichung die der Aktuator in diesem Zyklus korrigieren soll.

use std::fmt;

use crate::state::ContainerStatus;

/// Eine klassifizierte Abweichung zwischen Soll- und Ist-Zustand.
///
/// Pro Zyklus wird höchstens eine Abweichung gemeldet; die Reihenfolge der
/// Varianten entspricht der Prüf-Präzedenz in classify().
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deviation {
    /// Kein Container mit dem Namen existiert
    Missing,
    /// Container existiert, läuft aber nicht
    StatusMismatch {
        /// Der gemeldete Status
        actual: ContainerStatus,
    },
    /// Container läuft mit einem anderen Image
    ImageMismatch {
        /// Die Tags des tatsächlich laufenden Images
        actual_tags: Vec<String>,
    },
    /// Der Workload-Port ist auf keinen Host-Port gebunden
    PortUnbound {
        /// Der ungebundene Container-Port
        container_port: u16,
    },
    /// Der Workload-Port ist auf einen fremden Host-Port gebunden
    PortDrift {
        /// Der tatsächlich gebundene Host-Port
        actual_port: u16,
    },
}

impl fmt::Display for Deviation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "container missing (state: null)"),
            Self::StatusMismatch { actual } => {
                write!(f, "status deviation (actual: {} != desired: running)", actual)
            }
            Self::ImageMismatch { actual_tags } => {
                write!(f, "image mismatch (actual: {:?})", actual_tags)
            }
            Self::PortUnbound { container_port } => {
                write!(f, "port definition missing for {}", container_port)
            }
            Self::PortDrift { actual_port } => {
                write!(f, "port drift (actual: {})", actual_port)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_category() {
        assert_eq!(Deviation::Missing.to_string(), "container missing (state: null)");

        let status = Deviation::StatusMismatch {
            actual: ContainerStatus::Exited,
        };
        assert!(status.to_string().contains("exited"));

        let drift = Deviation::PortDrift { actual_port: 9090 };
        assert!(drift.to_string().contains("9090"));
    }
}
