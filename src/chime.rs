// src/chime.rs
//
// One-shot transition chimes.

use log::{debug, warn};

use crate::config::ChimeConfig;
use crate::error::AudioError;
use crate::graph::Voice;
use crate::host::AudioGraphHost;
use crate::nodes::{Pan, SineOsc};
use crate::param::AudioParam;
use crate::technique::Phase;

const ATTACK_SECS: f64 = 0.1;
const LENGTH_SECS: f64 = 0.8;
const PEAK_SCALE: f32 = 0.3;
const TAIL_LEVEL: f32 = 0.001;

pub struct ChimeScheduler {
    host: AudioGraphHost,
    enabled: bool,
    volume: f32,
}

impl ChimeScheduler {
    pub fn new(host: AudioGraphHost, config: &ChimeConfig) -> Self {
        Self {
            host,
            enabled: config.enabled,
            volume: config.volume.clamp(0.0, 1.0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Fire-and-forget. The voice releases itself after the envelope.
    pub fn play_chime(&self, phase: Phase) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.try_play(phase) {
            warn!("chime for {} failed: {}", phase, e);
        }
    }

    fn try_play(&self, phase: Phase) -> Result<(), AudioError> {
        let context = self.host.acquire()?;
        let now = context.current_time();

        let mut gain = AudioParam::new(0.0);
        gain.linear_ramp_to(self.volume * PEAK_SCALE, now, now + ATTACK_SECS);
        gain.exponential_ramp_to(TAIL_LEVEL, now + ATTACK_SECS, now + LENGTH_SECS);

        let voice = Voice::new(
            Box::new(SineOsc::new(phase.chime_frequency())),
            gain,
            Pan::CENTER,
        )
        .with_stop_at(now + LENGTH_SECS);
        let id = context.add_voice(voice)?;
        debug!("chime {} ({} Hz) as voice {}", phase, phase.chime_frequency(), id);
        Ok(())
    }
}
