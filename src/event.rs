// src/event.rs

use crate::technique::Phase;

/// Notifications emitted by the phase timer, in the order they happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Entered `phase` of `cycle` (1-based). `initial` marks the phase
    /// entered by `start()` itself.
    PhaseChanged {
        phase: Phase,
        cycle: u32,
        initial: bool,
    },

    /// Final phase of the final cycle finished. Fires once per run.
    Completed { cycles: u32 },
}
