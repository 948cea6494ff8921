// src/node.rs

use crate::audio_buffer::AudioBuffer;

/// Context passed to nodes during processing.
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext {
    /// Number of frames to process
    pub frames: usize,

    /// Sample rate
    pub sample_rate: f64,

    /// Absolute sample position of the first frame
    pub sample_pos: u64,
}

impl ProcessContext {
    pub fn new(frames: usize, sample_rate: f64, sample_pos: u64) -> Self {
        Self {
            frames,
            sample_rate,
            sample_pos,
        }
    }

    /// Context time in seconds at `frame` within this block.
    #[inline]
    pub fn time_at(&self, frame: usize) -> f64 {
        (self.sample_pos + frame as u64) as f64 / self.sample_rate
    }
}

/// Core signal source trait.
///
/// Nodes:
/// - do NOT know about scheduling or gain automation
/// - do NOT allocate while processing
/// - ONLY produce audio for the given context
pub trait Node: Send {
    /// Called once before the node is first rendered.
    fn prepare(&mut self, sample_rate: f64, max_block: usize);

    /// Produce `ctx.frames` frames into `output`.
    ///
    /// Returns `true` once the node has nothing more to play.
    fn process(&mut self, ctx: &ProcessContext, output: &mut AudioBuffer) -> bool;

    /// Number of output channels (1 or 2).
    fn num_channels(&self) -> usize;

    /// Set a parameter value.
    fn set_param(&mut self, param_id: u32, value: f32);

    /// Reset playback state.
    fn reset(&mut self) {}
}
