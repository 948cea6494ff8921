// src/audio_buffer.rs

/// Planar view over a block of samples: all of ch0, then all of ch1, ...
#[derive(Debug)]
pub struct AudioBuffer<'a> {
    pub channels: usize,
    pub frames: usize,
    pub data: &'a mut [f32],
}

impl<'a> AudioBuffer<'a> {
    /// Wrap existing planar data.
    #[inline]
    pub fn new(data: &'a mut [f32], channels: usize) -> Self {
        let frames = data.len() / channels.max(1);
        Self {
            channels,
            frames,
            data,
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        let start = ch * self.frames;
        &self.data[start..start + self.frames]
    }

    #[inline]
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        let start = ch * self.frames;
        &mut self.data[start..start + self.frames]
    }

    /// Both halves of a stereo buffer at once.
    #[inline]
    pub fn stereo_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        let frames = self.frames;
        let (left, rest) = self.data.split_at_mut(frames);
        (left, &mut rest[..frames])
    }

    /// Write the planar contents into an interleaved slice of the same shape.
    pub fn write_interleaved(&self, out: &mut [f32]) {
        for (frame, chunk) in out.chunks_mut(self.channels).take(self.frames).enumerate() {
            for (ch, sample) in chunk.iter_mut().enumerate() {
                *sample = self.data[ch * self.frames + frame];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaves_planar_channels() {
        let mut data = vec![1.0, 2.0, 3.0, -1.0, -2.0, -3.0];
        let buffer = AudioBuffer::new(&mut data, 2);
        assert_eq!(buffer.frames, 3);

        let mut out = vec![0.0; 6];
        buffer.write_interleaved(&mut out);
        assert_eq!(out, vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
    }

    #[test]
    fn stereo_halves_do_not_overlap() {
        let mut data = vec![0.0; 8];
        let mut buffer = AudioBuffer::new(&mut data, 2);
        let (left, right) = buffer.stereo_mut();
        left.fill(0.5);
        right.fill(-0.5);
        assert_eq!(buffer.channel(0), &[0.5; 4]);
        assert_eq!(buffer.channel(1), &[-0.5; 4]);
    }
}
