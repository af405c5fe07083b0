//! Interleaved PCM buffers.

/// Sample layout of a PCM stream. Samples are always `f32` interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Frame index at `secs`, rounded down.
    pub fn frame_at(&self, secs: f64) -> usize {
        // Nudge so decimal timestamps like 0.35 s land on their exact frame.
        (secs.max(0.0) * f64::from(self.sample_rate) + 1e-6).floor() as usize
    }

    /// Seconds covered by `frames` frames.
    pub fn secs_for(&self, frames: usize) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        frames as f64 / f64::from(self.sample_rate)
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::new(48_000, 2)
    }
}

/// A fully decoded track.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub format: AudioFormat,
    pub samples: Vec<f32>,
}

impl PcmBuffer {
    pub fn new(format: AudioFormat, samples: Vec<f32>) -> Self {
        Self { format, samples }
    }

    /// A silent buffer of `secs` seconds.
    pub fn silence(format: AudioFormat, secs: f64) -> Self {
        let frames = format.frame_at(secs);
        Self::new(format, vec![0.0; frames * usize::from(format.channels)])
    }

    pub fn frames(&self) -> usize {
        match self.format.channels {
            0 => 0,
            ch => self.samples.len() / usize::from(ch),
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.format.secs_for(self.frames())
    }

    /// Interleaved samples for frames `[start, end)`, clamped to the buffer.
    pub fn frame_range(&self, start: usize, end: usize) -> &[f32] {
        let ch = usize::from(self.format.channels);
        let end = end.min(self.frames());
        let start = start.min(end);
        &self.samples[start * ch..end * ch]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_duration() {
        let buf = PcmBuffer::silence(AudioFormat::new(1000, 2), 1.5);
        assert_eq!(buf.frames(), 1500);
        assert_eq!(buf.samples.len(), 3000);
        assert!((buf.duration_secs() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_frame_range_clamps() {
        let buf = PcmBuffer::new(AudioFormat::new(10, 1), (0..10).map(|v| v as f32).collect());
        assert_eq!(buf.frame_range(2, 4), &[2.0, 3.0]);
        assert_eq!(buf.frame_range(8, 50), &[8.0, 9.0]);
        assert!(buf.frame_range(12, 20).is_empty());
    }
}
