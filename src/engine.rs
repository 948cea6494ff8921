// src/engine.rs

use crate::audio_buffer::AudioBuffer;
use crate::command::Command;
use crate::graph::VoiceGraph;
use crate::node::ProcessContext;

/// Real-time mix engine.
///
/// This struct runs exclusively on the audio thread. It owns the voice
/// graph and the context clock: time only advances while running.
pub struct Engine {
    /// Voices currently in the mix
    graph: VoiceGraph,

    sample_rate: f64,

    /// Frames rendered while running
    sample_pos: u64,

    running: bool,
    closed: bool,

    /// Planar stereo block scratch
    block: Vec<f32>,
}

impl Engine {
    pub fn new(sample_rate: f64, max_block: usize) -> Self {
        let max_block = max_block.max(1);
        Self {
            graph: VoiceGraph::new(sample_rate, max_block),
            sample_rate,
            sample_pos: 0,
            running: false,
            closed: false,
            block: vec![0.0; 2 * max_block],
        }
    }

    /// Apply one control command.
    pub fn apply(&mut self, command: Command) {
        if self.closed {
            return;
        }
        match command {
            Command::AddVoice { id, voice } => self.graph.add(id, voice),
            Command::StopAt { id, time } => self.graph.stop_at(id, time),
            Command::Remove { id } => {
                self.graph.remove(id);
            }
            Command::Automate { id, automation } => self.graph.automate(id, automation),
            Command::SetParam {
                id,
                param_id,
                value,
            } => self.graph.set_param(id, param_id, value),
            Command::Suspend => self.running = false,
            Command::Resume => self.running = true,
            Command::Close => {
                self.running = false;
                self.closed = true;
                self.graph.clear();
            }
        }
    }

    /// Fill an interleaved stereo slice.
    ///
    /// While suspended or closed the output is silent and the clock holds.
    pub fn render(&mut self, out: &mut [f32]) {
        if !self.running {
            out.fill(0.0);
            return;
        }

        let max_block = self.graph.max_block();
        for chunk in out.chunks_mut(max_block * 2) {
            let frames = chunk.len() / 2;
            let mut block = AudioBuffer::new(&mut self.block[..frames * 2], 2);
            let ctx = ProcessContext::new(frames, self.sample_rate, self.sample_pos);
            self.graph.process(&ctx, &mut block);
            block.write_interleaved(chunk);
            self.sample_pos += frames as u64;
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn sample_position(&self) -> u64 {
        self.sample_pos
    }

    /// Context time in seconds.
    #[inline]
    pub fn current_time(&self) -> f64 {
        self.sample_pos as f64 / self.sample_rate
    }

    #[inline]
    pub fn active_voices(&self) -> usize {
        self.graph.len()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
