//! Convolution reverb: a generated noise-burst impulse response applied
//! with FFT overlap-add convolution.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::Rng;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::EffectStage;

/// Frames accumulated before a segment is convolved. The wet path carries
/// exactly this much latency, which a hall impulse happily absorbs.
const BLOCK_FRAMES: usize = 4096;

/// Generate a two-channel impulse response: white noise under a power-law
/// decay envelope. The noise content is random; the envelope shape is
/// deterministic and monotonically non-increasing.
pub fn reverb_impulse(sample_rate: u32, duration_secs: f32, decay: f32) -> [Vec<f32>; 2] {
    let length = ((sample_rate as f32 * duration_secs) as usize).max(1);
    let mut rng = rand::thread_rng();

    let mut channels = [vec![0.0f32; length], vec![0.0f32; length]];
    for channel in channels.iter_mut() {
        for (i, sample) in channel.iter_mut().enumerate() {
            let envelope = (1.0 - i as f32 / length as f32).powf(decay);
            *sample = rng.gen_range(-1.0f32..=1.0) * envelope;
        }
    }
    channels
}

/// Per-channel convolution state.
struct ConvChannel {
    /// Input waiting for a full block.
    pending: Vec<f32>,
    /// Overlap-add carryover from previous blocks.
    tail: Vec<f32>,
    /// Convolved wet output, primed with one block of silence so the
    /// wet/dry alignment is independent of the host block size.
    ready: VecDeque<f32>,
    scratch: Vec<Complex<f32>>,
}

impl ConvChannel {
    fn new(fft_size: usize, ir_len: usize) -> Self {
        Self {
            pending: Vec::new(),
            tail: vec![0.0; ir_len.saturating_sub(1)],
            ready: VecDeque::from(vec![0.0; BLOCK_FRAMES]),
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.tail.fill(0.0);
        self.ready.clear();
        self.ready.extend(std::iter::repeat(0.0).take(BLOCK_FRAMES));
    }
}

/// Convolution reverb stage. The impulse is fixed at construction; only
/// the wet/dry mix is retuned in place.
pub struct ConvolverStage {
    mix: f32,
    ir_len: usize,
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    ir_spectra: [Vec<Complex<f32>>; 2],
    channels: [ConvChannel; 2],
}

impl ConvolverStage {
    pub fn new(mix: f32, impulse: [Vec<f32>; 2]) -> Self {
        let ir_len = impulse[0].len().min(impulse[1].len());
        let fft_size = (BLOCK_FRAMES + ir_len.max(1) - 1).next_power_of_two();

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let ifft = planner.plan_fft_inverse(fft_size);

        // Energy normalization keeps the wet level comparable across
        // impulse lengths and decay settings.
        let energy = (impulse
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|s| s * s)
            .sum::<f32>()
            / 2.0)
            .sqrt();
        let scale = if energy > f32::EPSILON { 1.0 / energy } else { 1.0 };

        let ir_spectra = [
            Self::spectrum(fft.as_ref(), &impulse[0][..ir_len], fft_size, scale),
            Self::spectrum(fft.as_ref(), &impulse[1][..ir_len], fft_size, scale),
        ];

        Self {
            mix: mix.clamp(0.0, 1.0),
            ir_len,
            fft_size,
            fft,
            ifft,
            ir_spectra,
            channels: [
                ConvChannel::new(fft_size, ir_len),
                ConvChannel::new(fft_size, ir_len),
            ],
        }
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    fn spectrum(
        fft: &dyn Fft<f32>,
        impulse: &[f32],
        fft_size: usize,
        scale: f32,
    ) -> Vec<Complex<f32>> {
        let mut buf = vec![Complex::new(0.0, 0.0); fft_size];
        for (slot, &sample) in buf.iter_mut().zip(impulse.iter()) {
            *slot = Complex::new(sample * scale, 0.0);
        }
        fft.process(&mut buf);
        buf
    }
}

/// Convolve one block out of `channel.pending` and queue the wet result.
fn convolve_block(
    fft: &dyn Fft<f32>,
    ifft: &dyn Fft<f32>,
    spectrum: &[Complex<f32>],
    fft_size: usize,
    ir_len: usize,
    channel: &mut ConvChannel,
) {
    channel.scratch.fill(Complex::new(0.0, 0.0));
    for (slot, &sample) in channel
        .scratch
        .iter_mut()
        .zip(channel.pending.iter().take(BLOCK_FRAMES))
    {
        *slot = Complex::new(sample, 0.0);
    }

    fft.process(&mut channel.scratch);
    for (bin, coeff) in channel.scratch.iter_mut().zip(spectrum.iter()) {
        *bin *= *coeff;
    }
    ifft.process(&mut channel.scratch);

    let norm = 1.0 / fft_size as f32;
    let conv_len = BLOCK_FRAMES + ir_len - 1;

    for i in 0..BLOCK_FRAMES {
        let mut sample = channel.scratch[i].re * norm;
        if i < channel.tail.len() {
            sample += channel.tail[i];
        }
        channel.ready.push_back(sample);
    }

    let mut next_tail = vec![0.0f32; ir_len.saturating_sub(1)];
    for (i, slot) in next_tail.iter_mut().enumerate() {
        let idx = BLOCK_FRAMES + i;
        let mut sample = if idx < conv_len {
            channel.scratch[idx].re * norm
        } else {
            0.0
        };
        if idx < channel.tail.len() {
            sample += channel.tail[idx];
        }
        *slot = sample;
    }
    channel.tail = next_tail;
    channel.pending.drain(..BLOCK_FRAMES);
}

impl EffectStage for ConvolverStage {
    fn process(&mut self, samples: &mut [f32]) {
        if self.ir_len == 0 {
            return;
        }

        for frame in samples.chunks_exact(2) {
            self.channels[0].pending.push(frame[0]);
            self.channels[1].pending.push(frame[1]);
        }

        let mix = self.mix;
        let dry_gain = 1.0 - mix * 0.5;

        let Self {
            fft,
            ifft,
            ir_spectra,
            channels,
            fft_size,
            ir_len,
            ..
        } = self;
        for (channel, spectrum) in channels.iter_mut().zip(ir_spectra.iter()) {
            while channel.pending.len() >= BLOCK_FRAMES {
                convolve_block(
                    fft.as_ref(),
                    ifft.as_ref(),
                    spectrum,
                    *fft_size,
                    *ir_len,
                    channel,
                );
            }
        }

        for frame in samples.chunks_exact_mut(2) {
            let wet_l = channels[0].ready.pop_front().unwrap_or(0.0);
            let wet_r = channels[1].ready.pop_front().unwrap_or(0.0);
            frame[0] = frame[0] * dry_gain + wet_l * mix;
            frame[1] = frame[1] * dry_gain + wet_r * mix;
        }
    }

    fn reset(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_respects_decay_envelope() {
        let impulse = reverb_impulse(8000, 0.5, 2.0);
        let length = impulse[0].len();
        assert_eq!(length, 4000);
        for channel in impulse.iter() {
            for (i, sample) in channel.iter().enumerate() {
                let bound = (1.0 - i as f32 / length as f32).powf(2.0);
                assert!(
                    sample.abs() <= bound + 1e-6,
                    "sample {i} = {sample} exceeds envelope {bound}"
                );
            }
        }
    }

    #[test]
    fn dirac_impulse_passes_signal_with_block_latency() {
        let mut stage = ConvolverStage::new(1.0, [vec![1.0], vec![1.0]]);
        let frames = BLOCK_FRAMES * 2;
        let mut signal = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let s = (i % 100) as f32 / 100.0;
            signal.push(s);
            signal.push(s);
        }
        let dry = signal.clone();
        stage.process(&mut signal);

        // Before the wet path fills: pure dry at the attenuated gain.
        let early = signal[150 * 2];
        assert!((early - dry[150 * 2] * 0.5).abs() < 1e-4, "early {early}");

        // After one block: dry plus the identity-convolved signal.
        let frame = BLOCK_FRAMES + 904;
        let expected = dry[frame * 2] * 0.5 + dry[(frame - BLOCK_FRAMES) * 2];
        let got = signal[frame * 2];
        assert!((got - expected).abs() < 1e-3, "got {got}, expected {expected}");
    }

    #[test]
    fn mix_is_retuned_in_place() {
        let mut stage = ConvolverStage::new(0.3, reverb_impulse(8000, 0.1, 2.0));
        stage.set_mix(0.9);
        assert_eq!(stage.mix(), 0.9);
        stage.set_mix(1.5);
        assert_eq!(stage.mix(), 1.0);
    }

    #[test]
    fn reset_silences_the_tail() {
        let mut stage = ConvolverStage::new(1.0, reverb_impulse(8000, 0.1, 2.0));
        let mut noise: Vec<f32> = (0..BLOCK_FRAMES * 4).map(|i| ((i * 7) % 13) as f32).collect();
        stage.process(&mut noise);
        stage.reset();
        let mut quiet = vec![0.0f32; 1024];
        stage.process(&mut quiet);
        assert!(quiet.iter().all(|s| *s == 0.0));
    }
}
