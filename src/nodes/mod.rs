// src/nodes/mod.rs
//
// Signal sources for the session mix.

mod loop_player;
mod oscillators;
mod pan;

pub use loop_player::*;
pub use oscillators::*;
pub use pan::*;

// ═══════════════════════════════════════════════════════════════════
// Parameter IDs
// ═══════════════════════════════════════════════════════════════════

pub mod params {
    // Oscillator params
    pub const FREQ: u32 = 0;
}
