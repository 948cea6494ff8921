// src/nodes/loop_player.rs
//
// Loop Player Node - plays a decoded buffer on repeat.
//
// The buffer is shared (Arc) with the decode cache on the control side, so
// restarting the same ambient sound never copies sample data.

use std::sync::Arc;

use crate::assets::SoundId;
use crate::audio_buffer::AudioBuffer;
use crate::node::{Node, ProcessContext};

/// Decoded audio that can be handed to the audio thread.
#[derive(Debug, Clone)]
pub struct SharedAudioData {
    /// Which sound this buffer was decoded from.
    pub sound: SoundId,
    /// Sample rate of the audio.
    pub sample_rate: f64,
    /// Number of channels (1 = mono, 2 = stereo).
    pub channels: usize,
    /// Total number of frames.
    pub frames: usize,
    /// Interleaved sample data.
    pub samples: Arc<Vec<f32>>,
}

impl SharedAudioData {
    pub fn new(sound: SoundId, sample_rate: f64, channels: usize, samples: Vec<f32>) -> Self {
        let channels = channels.max(1);
        Self {
            sound,
            sample_rate,
            channels,
            frames: samples.len() / channels,
            samples: Arc::new(samples),
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.sample_rate
    }

    #[inline]
    fn sample(&self, frame: usize, ch: usize) -> f32 {
        let src_ch = ch % self.channels; // mono -> stereo
        self.samples
            .get(frame * self.channels + src_ch)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Stereo looping player with linear-interpolated rate conversion.
pub struct LoopPlayer {
    data: SharedAudioData,
    /// Fractional read position in source frames.
    position: f64,
    /// Source frames advanced per output frame.
    step: f64,
}

impl LoopPlayer {
    pub fn new(data: SharedAudioData) -> Self {
        Self {
            data,
            position: 0.0,
            step: 1.0,
        }
    }
}

impl Node for LoopPlayer {
    fn prepare(&mut self, sample_rate: f64, _max_block: usize) {
        self.step = self.data.sample_rate / sample_rate;
    }

    fn process(&mut self, ctx: &ProcessContext, output: &mut AudioBuffer) -> bool {
        let total = self.data.frames;
        if total == 0 {
            output.clear();
            return true;
        }

        let (left, right) = output.stereo_mut();
        for i in 0..ctx.frames {
            let index = self.position as usize;
            let frac = (self.position - index as f64) as f32;
            let next = (index + 1) % total;

            let l0 = self.data.sample(index, 0);
            let l1 = self.data.sample(next, 0);
            let r0 = self.data.sample(index, 1);
            let r1 = self.data.sample(next, 1);
            left[i] = l0 + (l1 - l0) * frac;
            right[i] = r0 + (r1 - r0) * frac;

            self.position += self.step;
            if self.position >= total as f64 {
                self.position %= total as f64;
            }
        }

        false
    }

    fn num_channels(&self) -> usize {
        2
    }

    fn set_param(&mut self, _param_id: u32, _value: f32) {}

    fn reset(&mut self) {
        self.position = 0.0;
    }
}
