use tracing::warn;

use super::SampleSource;

/// In-memory PCM source — the decoded-media stand-in the host hands to the
/// engine once a track has been loaded and decoded elsewhere.
pub struct BufferSource {
    /// Interleaved stereo samples.
    samples: Vec<f32>,
    position: usize,
    volume: f32,
    looping: bool,
}

impl BufferSource {
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            position: 0,
            volume: 1.0,
            looping: false,
        }
    }

    /// Same as [`new`](Self::new) but wraps around at the end of the buffer.
    pub fn looping(samples: Vec<f32>) -> Self {
        Self {
            looping: true,
            ..Self::new(samples)
        }
    }

    /// Playback volume in [0, 1]. Out-of-range values are clamped.
    pub fn set_volume(&mut self, volume: f32) {
        if !(0.0..=1.0).contains(&volume) {
            warn!("volume {volume} out of range, clamping");
        }
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}

impl SampleSource for BufferSource {
    fn pull(&mut self, out: &mut [f32]) -> usize {
        let mut written = 0;
        while written < out.len() {
            if self.position >= self.samples.len() {
                if self.looping && !self.samples.is_empty() {
                    self.position = 0;
                } else {
                    break;
                }
            }
            let n = (out.len() - written).min(self.samples.len() - self.position);
            for i in 0..n {
                out[written + i] = self.samples[self.position + i] * self.volume;
            }
            self.position += n;
            written += n;
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_reports_short_reads() {
        let mut source = BufferSource::new(vec![0.5; 6]);
        let mut out = [0.0f32; 8];
        assert_eq!(source.pull(&mut out), 6);
        assert_eq!(out[5], 0.5);
        assert_eq!(out[6], 0.0);
        // Exhausted source yields nothing further.
        assert_eq!(source.pull(&mut out), 0);
    }

    #[test]
    fn looping_source_wraps() {
        let mut source = BufferSource::looping(vec![1.0, 2.0, 3.0, 4.0]);
        let mut out = [0.0f32; 6];
        assert_eq!(source.pull(&mut out), 6);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn volume_is_clamped_and_applied() {
        let mut source = BufferSource::new(vec![1.0, 1.0]);
        source.set_volume(2.5);
        assert_eq!(source.volume(), 1.0);
        source.set_volume(0.25);
        let mut out = [0.0f32; 2];
        source.pull(&mut out);
        assert_eq!(out, [0.25, 0.25]);
    }
}
