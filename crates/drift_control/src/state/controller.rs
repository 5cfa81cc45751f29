//! Controller State - Minimaler Zustand des Control Loops
//!
//! Hält nur die aktuelle Phase und einen Zykluszähler. Soll- und
//! Ist-Zustand werden bewusst nicht zwischen Zyklen gehalten.

/// Der Zustand des Drift-Controllers zwischen den Zyklen.
#[derive(Debug, Clone, Default)]
pub struct ControllerState {
    /// Die aktuelle Phase im Loop
    pub phase: LoopPhase,
    /// Anzahl der begonnenen Zyklen
    pub cycles: u64,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Beginnt einen neuen Zyklus mit der Messung.
    pub fn start_cycle(&mut self) {
        self.cycles += 1;
        self.phase = LoopPhase::Measuring;
    }

    /// Wechselt zur Klassifikation.
    pub fn classifying(&mut self) {
        self.phase = LoopPhase::Classifying;
    }

    /// Wechselt zur Aktuierung (Abweichung erkannt).
    pub fn actuating(&mut self) {
        self.phase = LoopPhase::Actuating;
    }

    /// Wechselt in die Wartephase zwischen den Zyklen.
    pub fn waiting(&mut self) {
        self.phase = LoopPhase::Waiting;
    }

    /// Terminaler Zustand, nur über das Shutdown-Signal erreichbar.
    pub fn stop(&mut self) {
        self.phase = LoopPhase::Stopped;
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == LoopPhase::Stopped
    }
}

/// Die Phase innerhalb eines Control-Zyklus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopPhase {
    /// Noch nicht gestartet
    #[default]
    Idle,
    /// Ist-Zustand wird gemessen
    Measuring,
    /// Abweichung wird berechnet
    Classifying,
    /// Korrektur wird ausgeführt
    Actuating,
    /// Warten bis zum nächsten Poll
    Waiting,
    /// Beendet (Shutdown)
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_state_starts_idle() {
        let state = ControllerState::new();
        assert_eq!(state.phase, LoopPhase::Idle);
        assert_eq!(state.cycles, 0);
    }

    #[test]
    fn test_cycle_counter_increments() {
        let mut state = ControllerState::new();
        state.start_cycle();
        state.waiting();
        state.start_cycle();

        assert_eq!(state.cycles, 2);
    }

    #[test]
    fn test_phase_transitions() {
        let mut state = ControllerState::new();

        state.start_cycle();
        assert_eq!(state.phase, LoopPhase::Measuring);

        state.classifying();
        assert_eq!(state.phase, LoopPhase::Classifying);

        state.actuating();
        assert_eq!(state.phase, LoopPhase::Actuating);

        state.waiting();
        assert_eq!(state.phase, LoopPhase::Waiting);

        state.stop();
        assert!(state.is_stopped());
    }

    #[test]
    fn test_stopped_is_terminal_flag() {
        let mut state = ControllerState::new();
        assert!(!state.is_stopped());

        state.stop();
        assert!(state.is_stopped());
    }
}
