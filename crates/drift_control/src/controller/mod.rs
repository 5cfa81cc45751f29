//! Controller Module - Aktuator und Control Loop
//!
//! - `actuator`: führt die Korrektur für eine erkannte Abweichung aus
//! - `drift_controller`: der Feedback-Loop (messen, klassifizieren,
//!   korrigieren, warten)

mod actuator;
mod drift_controller;

pub use actuator::{converge, is_port_conflict, PORT_CONFLICT_SIGNATURES};
pub use drift_controller::{ControlOptions, DriftController, ShutdownSignal};
