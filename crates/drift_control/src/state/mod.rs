//! State-Typen für den Control Loop
//!
//! - `ObservedState`: Ist-Zustand, pro Zyklus von der Runtime gemessen
//! - `ControllerState`: Phase des Loops zwischen den Zyklen
//!
//! Der Soll-Zustand (`DesiredState`) kommt aus `drift_config` und wird pro
//! Zyklus neu von der Platte geladen.

mod actual;
mod controller;

pub use actual::{ContainerStatus, ObservedState, ObservedWorkload};
pub use controller::{ControllerState, LoopPhase};
