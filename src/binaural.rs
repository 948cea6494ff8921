// src/binaural.rs
//
// Binaural beat generator.
//
// Two sine voices share a carrier: the left ear hears the carrier, the
// right ear hears carrier + beat. The perceived beat is the difference.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::command::VoiceId;
use crate::config::BinauralConfig;
use crate::error::AudioError;
use crate::graph::Voice;
use crate::host::AudioGraphHost;
use crate::nodes::{Pan, SineOsc, params};
use crate::param::{AudioParam, Automation, Curve};

pub const DEFAULT_FADE_OUT: Duration = Duration::from_secs(2);

/// Target brainwave range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrainwavePreset {
    Delta,
    #[default]
    Theta,
    Alpha,
    Beta,
}

impl BrainwavePreset {
    pub const ALL: [BrainwavePreset; 4] = [
        BrainwavePreset::Delta,
        BrainwavePreset::Theta,
        BrainwavePreset::Alpha,
        BrainwavePreset::Beta,
    ];

    /// Beat frequency in Hz.
    pub fn beat_hz(&self) -> f32 {
        match self {
            BrainwavePreset::Delta => 2.0,
            BrainwavePreset::Theta => 6.0,
            BrainwavePreset::Alpha => 10.0,
            BrainwavePreset::Beta => 20.0,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BrainwavePreset::Delta => "Deep sleep & healing",
            BrainwavePreset::Theta => "Deep meditation",
            BrainwavePreset::Alpha => "Relaxation",
            BrainwavePreset::Beta => "Alert focus",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BrainwavePreset::Delta => "delta",
            BrainwavePreset::Theta => "theta",
            BrainwavePreset::Alpha => "alpha",
            BrainwavePreset::Beta => "beta",
        }
    }
}

impl fmt::Display for BrainwavePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrainwavePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BrainwavePreset::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown preset '{s}'"))
    }
}

/// Observable binaural settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinauralState {
    pub preset: BrainwavePreset,
    pub volume: f32,
    pub is_playing: bool,
}

#[derive(Debug, Clone, Copy)]
struct Pair {
    left: VoiceId,
    right: VoiceId,
}

pub struct BinauralGenerator {
    host: AudioGraphHost,
    state: BinauralState,
    enabled: bool,
    carrier_hz: f32,
    voices: Option<Pair>,
    /// Pair still ramping down after `fade_out`.
    fading: Option<Pair>,
}

impl BinauralGenerator {
    pub fn new(host: AudioGraphHost, config: &BinauralConfig) -> Self {
        Self {
            host,
            state: BinauralState {
                preset: config.preset,
                volume: config.volume.clamp(0.0, 1.0),
                is_playing: false,
            },
            enabled: config.enabled,
            carrier_hz: config.carrier_hz,
            voices: None,
            fading: None,
        }
    }

    pub fn state(&self) -> BinauralState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Label for a preset, e.g. for a picker.
    pub fn description(preset: BrainwavePreset) -> &'static str {
        preset.description()
    }

    #[inline]
    fn right_hz(&self) -> f32 {
        self.carrier_hz + self.state.preset.beat_hz()
    }

    /// Start both tones. No-op if already playing or disabled.
    pub fn start(&mut self) {
        if self.state.is_playing || !self.enabled {
            return;
        }
        if let Err(e) = self.try_start() {
            warn!("binaural tones unavailable: {}", e);
        }
    }

    fn try_start(&mut self) -> Result<(), AudioError> {
        let context = self.host.acquire()?;
        if let Some(old) = self.fading.take() {
            context.release(old.left);
            context.release(old.right);
        }

        let volume = self.state.volume;
        let left = context.add_voice(Voice::new(
            Box::new(SineOsc::new(self.carrier_hz)),
            AudioParam::new(volume),
            Pan::HARD_LEFT,
        ))?;
        let right = match context.add_voice(Voice::new(
            Box::new(SineOsc::new(self.right_hz())),
            AudioParam::new(volume),
            Pan::HARD_RIGHT,
        )) {
            Ok(id) => id,
            Err(e) => {
                context.remove(left);
                return Err(e);
            }
        };

        debug!(
            "binaural {} started: {} Hz / {} Hz",
            self.state.preset,
            self.carrier_hz,
            self.right_hz()
        );
        self.voices = Some(Pair { left, right });
        self.state.is_playing = true;
        Ok(())
    }

    /// Halt and release both tones immediately.
    pub fn stop(&mut self) {
        self.state.is_playing = false;
        let pairs = [self.voices.take(), self.fading.take()];
        let Some(context) = self.host.current() else {
            return;
        };
        for pair in pairs.into_iter().flatten() {
            context.remove(pair.left);
            context.remove(pair.right);
        }
    }

    /// Ramp both tones to silence, then release them.
    pub fn fade_out(&mut self, duration: Duration) {
        let (Some(pair), Some(context)) = (self.voices, self.host.current()) else {
            self.stop();
            return;
        };
        self.voices = None;
        self.state.is_playing = false;

        let now = context.current_time();
        let end = now + duration.as_secs_f64();
        for id in [pair.left, pair.right] {
            context.automate(
                id,
                Automation::RampFromCurrent {
                    target: 0.0,
                    start: now,
                    end,
                    curve: Curve::Linear,
                },
            );
            context.stop_at(id, end);
        }
        if let Some(previous) = self.fading.replace(pair) {
            context.release(previous.left);
            context.release(previous.right);
        }
    }

    /// Change the beat. Only the right tone is retuned, without a restart.
    pub fn set_frequency(&mut self, preset: BrainwavePreset) {
        self.state.preset = preset;
        if let (Some(pair), Some(context)) = (self.voices, self.host.current()) {
            context.set_param(pair.right, params::FREQ, self.right_hz());
        }
    }

    /// Clamp to [0, 1]; applied to both tones immediately.
    pub fn set_volume(&mut self, volume: f32) {
        self.state.volume = volume.clamp(0.0, 1.0);
        if let (Some(pair), Some(context)) = (self.voices, self.host.current()) {
            context.automate(pair.left, Automation::Set(self.state.volume));
            context.automate(pair.right, Automation::Set(self.state.volume));
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{NoOutput, OfflineOutput};

    const RATE: f64 = 8_000.0;

    fn generator() -> (BinauralGenerator, OfflineOutput) {
        let output = OfflineOutput::new();
        let host = AudioGraphHost::new(Box::new(output.clone()), RATE, 256);
        (BinauralGenerator::new(host, &BinauralConfig::default()), output)
    }

    /// Estimate a channel's frequency by counting rising zero crossings.
    fn frequency(interleaved: &[f32], channel: usize) -> f32 {
        let samples: Vec<f32> = interleaved.iter().skip(channel).step_by(2).copied().collect();
        let crossings = samples
            .windows(2)
            .filter(|w| w[0] <= 0.0 && w[1] > 0.0)
            .count();
        crossings as f32 * RATE as f32 / samples.len() as f32
    }

    #[test]
    fn defaults_are_theta_at_point_three() {
        let (tones, _) = generator();
        assert_eq!(tones.state().preset, BrainwavePreset::Theta);
        assert_eq!(tones.state().volume, 0.3);
        assert!(!tones.is_playing());
    }

    #[test]
    fn channels_carry_carrier_and_beat() {
        let (mut tones, output) = generator();
        tones.start();
        let out = output.render(RATE as usize);

        assert!((frequency(&out, 0) - 200.0).abs() <= 1.0);
        assert!((frequency(&out, 1) - 206.0).abs() <= 1.0);
    }

    #[test]
    fn second_start_is_a_no_op() {
        let (mut tones, output) = generator();
        tones.start();
        tones.start();
        output.render(64);

        assert!(tones.is_playing());
        assert_eq!(tones.host.current().unwrap().active_voices(), 2);
    }

    #[test]
    fn retune_changes_only_the_right_ear() {
        let (mut tones, output) = generator();
        tones.start();
        output.render(64);
        tones.set_frequency(BrainwavePreset::Beta);
        let out = output.render(RATE as usize);

        assert!((frequency(&out, 0) - 200.0).abs() <= 1.0);
        assert!((frequency(&out, 1) - 220.0).abs() <= 1.0);
        assert!(tones.is_playing());
    }

    #[test]
    fn stop_releases_immediately() {
        let (mut tones, output) = generator();
        tones.start();
        output.render(64);
        tones.stop();
        output.render(64);

        assert!(!tones.is_playing());
        assert_eq!(tones.host.current().unwrap().active_voices(), 0);
    }

    #[test]
    fn fade_out_ramps_then_releases() {
        let (mut tones, output) = generator();
        tones.start();
        output.render(64);
        tones.fade_out(Duration::from_millis(500));
        assert!(!tones.is_playing());

        output.render(RATE as usize / 4);
        let context = tones.host.current().unwrap();
        assert_eq!(context.active_voices(), 2);
        output.render(RATE as usize / 2);
        assert_eq!(context.active_voices(), 0);
    }

    #[test]
    fn restart_during_a_fade_ramps_the_old_pair_down() {
        let (mut tones, output) = generator();
        tones.start();
        output.render(64);
        tones.fade_out(Duration::from_millis(500));
        output.render(RATE as usize / 4);

        tones.start();
        let context = tones.host.current().unwrap();
        output.render(40); // 5 ms
        assert_eq!(context.active_voices(), 4);
        output.render(80);
        assert_eq!(context.active_voices(), 2);
        assert!(tones.is_playing());
    }

    #[test]
    fn fade_out_when_idle_degrades_to_stop() {
        let (mut tones, output) = generator();
        tones.fade_out(DEFAULT_FADE_OUT);
        assert!(!tones.is_playing());
        assert!(!output.is_attached());
    }

    #[test]
    fn volume_is_clamped_and_applied() {
        let (mut tones, output) = generator();
        tones.start();
        tones.set_volume(3.0);
        assert_eq!(tones.state().volume, 1.0);

        let out = output.render(RATE as usize / 10);
        let peak = out.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.95);

        tones.set_volume(-1.0);
        assert_eq!(tones.state().volume, 0.0);
    }

    #[test]
    fn disabled_generator_stays_silent() {
        let (mut tones, output) = generator();
        tones.set_enabled(false);
        tones.start();
        assert!(!tones.is_playing());
        assert!(!output.is_attached());
    }

    #[test]
    fn unavailable_output_is_not_fatal() {
        let host = AudioGraphHost::new(Box::new(NoOutput), RATE, 256);
        let mut tones = BinauralGenerator::new(host, &BinauralConfig::default());
        tones.start();
        assert!(!tones.is_playing());
    }

    #[test]
    fn descriptions_cover_every_preset() {
        assert_eq!(BinauralGenerator::description(BrainwavePreset::Alpha), "Relaxation");
        assert_eq!(BrainwavePreset::Delta.beat_hz(), 2.0);
        assert_eq!("BETA".parse::<BrainwavePreset>(), Ok(BrainwavePreset::Beta));
    }
}
