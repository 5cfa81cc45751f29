//! Reconcile Module - Pure Function für die Abweichungs-Klassifikation
//!
//! Die classify() Funktion ist eine **pure function**:
//! - Keine Side Effects
//! - Deterministisch
//! - Perfekt testbar ohne Mocks

mod deviation;

pub use deviation::Deviation;

use drift_config::DesiredState;

use crate::state::ObservedState;

/// Klassifiziert die Abweichung zwischen Soll- und Ist-Zustand.
///
/// Total und deterministisch: für jedes Paar (desired, observed) gibt es
/// genau ein Ergebnis, `None` bedeutet konvergiert.
///
/// Die Prüfreihenfolge ist fest (first match wins): Präsenz vor Status,
/// Status vor Image, Image vor Port. Jede frühere Kategorie subsumiert die
/// Korrektur der späteren - ein neu erstellter Container korrigiert auch
/// Image und Port.
///
/// Ein Binding auf dem Fallback-Port ist ein akzeptierter konvergierter
/// Zustand, keine Abweichung.
///
/// Der Controller korrigiert nur in Richtung "running"; ein gewünschter
/// Status `stopped` wird akzeptiert wie vorgefunden (bewusstes Non-Goal).
pub fn classify(desired: &DesiredState, observed: &ObservedState) -> Option<Deviation> {
    let workload = match observed {
        ObservedState::Absent => return Some(Deviation::Missing),
        ObservedState::Present(workload) => workload,
    };

    if !workload.status.is_running() {
        return Some(Deviation::StatusMismatch {
            actual: workload.status.clone(),
        });
    }

    if !workload.image_tags.iter().any(|tag| tag == &desired.image) {
        return Some(Deviation::ImageMismatch {
            actual_tags: workload.image_tags.clone(),
        });
    }

    let port_key = desired.container_port_key();
    let mapped = match workload.first_host_port(&port_key) {
        Some(port) => port,
        None => {
            return Some(Deviation::PortUnbound {
                container_port: desired.container_port,
            })
        }
    };

    let is_primary = mapped == desired.host_port;
    let is_fallback = desired.fallback_host_port == Some(mapped);

    if is_primary || is_fallback {
        None
    } else {
        Some(Deviation::PortDrift { actual_port: mapped })
    }
}
