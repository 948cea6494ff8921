// Tone generators.

use std::f32::consts::TAU;

use crate::audio_buffer::AudioBuffer;
use crate::node::{Node, ProcessContext};

use super::params;

// ═══════════════════════════════════════════════════════════════════
// Sine Oscillator
// ═══════════════════════════════════════════════════════════════════

/// Continuous mono sine tone. Frequency changes take effect on the next
/// block without resetting phase, so retuning is click-free.
pub struct SineOsc {
    phase: f32,
    freq: f32,
    sample_rate: f32,
}

impl SineOsc {
    pub fn new(freq: f32) -> Self {
        Self {
            phase: 0.0,
            freq,
            sample_rate: 48_000.0,
        }
    }

    #[inline]
    pub fn frequency(&self) -> f32 {
        self.freq
    }
}

impl Default for SineOsc {
    fn default() -> Self {
        Self::new(440.0)
    }
}

impl Node for SineOsc {
    fn prepare(&mut self, sample_rate: f64, _max_block: usize) {
        self.sample_rate = sample_rate as f32;
    }

    fn process(&mut self, ctx: &ProcessContext, output: &mut AudioBuffer) -> bool {
        let inc = self.freq / self.sample_rate;

        let buf = output.channel_mut(0);
        for sample in buf.iter_mut().take(ctx.frames) {
            *sample = (self.phase * TAU).sin();
            self.phase = (self.phase + inc).fract();
        }

        false
    }

    fn num_channels(&self) -> usize {
        1
    }

    fn set_param(&mut self, param_id: u32, value: f32) {
        if param_id == params::FREQ {
            self.freq = value.max(0.0);
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}
