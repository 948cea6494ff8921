//! The session mix: a flat set of voices summed into one stereo bus.
//!
//! Each voice is a source [`Node`] followed by an automated gain and a pan
//! position. There is no routing between voices, so "the graph" for one
//! logical sound is exactly one voice.

use crate::{
    audio_buffer::AudioBuffer,
    command::VoiceId,
    node::{Node, ProcessContext},
    nodes::Pan,
    param::{Automation, AudioParam},
};

/// One playing sound.
pub struct Voice {
    node: Box<dyn Node>,
    gain: AudioParam,
    pan: Pan,
    /// Context time at which the voice is released.
    stop_at: Option<f64>,
}

impl Voice {
    pub fn new(node: Box<dyn Node>, gain: AudioParam, pan: Pan) -> Self {
        Self {
            node,
            gain,
            pan,
            stop_at: None,
        }
    }

    /// Release at `time` (context seconds). Used for one-shot sounds whose
    /// end is known up front.
    pub fn with_stop_at(mut self, time: f64) -> Self {
        self.stop_at = Some(time);
        self
    }
}

/// Storage for one voice's rendered source block.
struct Scratch {
    data: Vec<f32>,
}

impl Scratch {
    fn new(max_block: usize) -> Self {
        Self {
            data: vec![0.0; 2 * max_block],
        }
    }

    #[inline]
    fn as_buffer(&mut self, channels: usize, frames: usize) -> AudioBuffer<'_> {
        AudioBuffer {
            channels,
            frames,
            data: &mut self.data[..channels * frames],
        }
    }
}

pub struct VoiceGraph {
    voices: Vec<(VoiceId, Voice)>,
    scratch: Scratch,
    sample_rate: f64,
    max_block: usize,
}

impl VoiceGraph {
    pub fn new(sample_rate: f64, max_block: usize) -> Self {
        Self {
            voices: Vec::with_capacity(8),
            scratch: Scratch::new(max_block),
            sample_rate,
            max_block,
        }
    }

    #[inline]
    pub fn max_block(&self) -> usize {
        self.max_block
    }

    pub fn add(&mut self, id: VoiceId, mut voice: Voice) {
        voice.node.prepare(self.sample_rate, self.max_block);
        voice.node.reset();
        self.voices.push((id, voice));
    }

    pub fn remove(&mut self, id: VoiceId) -> bool {
        let before = self.voices.len();
        self.voices.retain(|(vid, _)| *vid != id);
        self.voices.len() != before
    }

    pub fn clear(&mut self) {
        self.voices.clear();
    }

    pub fn contains(&self, id: VoiceId) -> bool {
        self.voices.iter().any(|(vid, _)| *vid == id)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    fn voice_mut(&mut self, id: VoiceId) -> Option<&mut Voice> {
        self.voices
            .iter_mut()
            .find(|(vid, _)| *vid == id)
            .map(|(_, v)| v)
    }

    pub fn automate(&mut self, id: VoiceId, automation: Automation) {
        if let Some(voice) = self.voice_mut(id) {
            voice.gain.apply(automation);
        }
    }

    pub fn set_param(&mut self, id: VoiceId, param_id: u32, value: f32) {
        if let Some(voice) = self.voice_mut(id) {
            voice.node.set_param(param_id, value);
        }
    }

    pub fn stop_at(&mut self, id: VoiceId, time: f64) {
        if let Some(voice) = self.voice_mut(id) {
            voice.stop_at = Some(voice.stop_at.map_or(time, |t| t.min(time)));
        }
    }

    /// Render all voices into a stereo `output` (at most `max_block` frames).
    ///
    /// Voices past their stop time, or whose node has finished, are dropped.
    pub fn process(&mut self, ctx: &ProcessContext, output: &mut AudioBuffer) {
        output.clear();
        let frames = ctx.frames.min(self.max_block);
        let scratch = &mut self.scratch;

        self.voices.retain_mut(|(_, voice)| {
            let channels = voice.node.num_channels().clamp(1, 2);
            let mut src = scratch.as_buffer(channels, frames);
            src.clear();
            let finished = voice.node.process(ctx, &mut src);

            let (pan_l, pan_r) = voice.pan.gains();
            let (out_l, out_r) = output.stereo_mut();
            let mut released = false;

            for i in 0..frames {
                let t = ctx.time_at(i);
                if voice.stop_at.is_some_and(|stop| t >= stop) {
                    released = true;
                    break;
                }
                let g = voice.gain.value_at(t);
                if channels == 1 {
                    let s = src.data[i] * g;
                    out_l[i] += s * pan_l;
                    out_r[i] += s * pan_r;
                } else {
                    // Stereo sources keep their own image.
                    out_l[i] += src.data[i] * g;
                    out_r[i] += src.data[frames + i] * g;
                }
            }

            !(finished || released)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::SineOsc;

    struct Dc(f32);

    impl Node for Dc {
        fn prepare(&mut self, _sample_rate: f64, _max_block: usize) {}
        fn process(&mut self, ctx: &ProcessContext, output: &mut AudioBuffer) -> bool {
            output.channel_mut(0)[..ctx.frames].fill(self.0);
            false
        }
        fn num_channels(&self) -> usize {
            1
        }
        fn set_param(&mut self, _param_id: u32, _value: f32) {}
    }

    fn render(graph: &mut VoiceGraph, frames: usize, sample_pos: u64) -> Vec<f32> {
        let mut data = vec![0.0; frames * 2];
        let mut out = AudioBuffer::new(&mut data, 2);
        graph.process(&ProcessContext::new(frames, 100.0, sample_pos), &mut out);
        data
    }

    #[test]
    fn hard_pans_route_to_one_side() {
        let mut graph = VoiceGraph::new(100.0, 16);
        graph.add(1, Voice::new(Box::new(Dc(1.0)), AudioParam::new(0.5), Pan::HARD_LEFT));

        let data = render(&mut graph, 4, 0);
        assert_eq!(&data[..4], &[0.5; 4]);
        assert_eq!(&data[4..], &[0.0; 4]);
    }

    #[test]
    fn stop_time_releases_voice_mid_block() {
        let mut graph = VoiceGraph::new(100.0, 16);
        graph.add(
            7,
            Voice::new(Box::new(Dc(1.0)), AudioParam::new(1.0), Pan::HARD_RIGHT).with_stop_at(0.02),
        );

        let data = render(&mut graph, 4, 0);
        assert_eq!(&data[4..], &[1.0, 1.0, 0.0, 0.0]);
        assert!(graph.is_empty());
    }

    #[test]
    fn gain_automation_is_sample_timed() {
        let mut graph = VoiceGraph::new(100.0, 16);
        let mut gain = AudioParam::new(0.0);
        gain.linear_ramp_to(1.0, 0.0, 0.04);
        graph.add(3, Voice::new(Box::new(Dc(1.0)), gain, Pan::HARD_LEFT));

        let data = render(&mut graph, 5, 0);
        for (got, want) in data[..5].iter().zip([0.0, 0.25, 0.5, 0.75, 1.0]) {
            assert!((got - want).abs() < 1e-5, "{got} != {want}");
        }
    }

    #[test]
    fn params_reach_the_node() {
        let mut graph = VoiceGraph::new(48_000.0, 64);
        graph.add(2, Voice::new(Box::new(SineOsc::new(200.0)), AudioParam::new(1.0), Pan::CENTER));
        graph.set_param(2, crate::nodes::params::FREQ, 206.0);
        assert!(graph.contains(2));
        assert!(graph.remove(2));
        assert!(!graph.remove(2));
    }
}
