use std::f64::consts::PI;

use super::EffectStage;

/// Number of points in the shaping curve.
pub const CURVE_SAMPLES: usize = 44100;

/// Fixed post-shaper gain, keeping hot curves out of clipping range.
const POST_GAIN: f32 = 0.8;

/// Build the distortion nonlinearity for `amount`.
///
/// Pure function: the same amount always yields the identical curve. The
/// arithmetic runs in f64 and is stored as f32, so repeated generation is
/// reproducible down to the last bit.
pub fn distortion_curve(amount: f32) -> Vec<f32> {
    let deg = PI / 180.0;
    let drive = amount as f64 * 100.0;

    (0..CURVE_SAMPLES)
        .map(|i| {
            let x = (i as f64 * 2.0) / CURVE_SAMPLES as f64 - 1.0;
            (((3.0 + drive) * x * 20.0 * deg) / (PI + drive * x.abs())) as f32
        })
        .collect()
}

/// Waveshaping distortion stage. The curve is regenerated in place when
/// `amount` changes; the node itself stays put in the chain.
pub struct WaveShaperStage {
    amount: f32,
    curve: Vec<f32>,
}

impl WaveShaperStage {
    pub fn new(amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);
        Self {
            amount,
            curve: distortion_curve(amount),
        }
    }

    pub fn set_amount(&mut self, amount: f32) {
        let amount = amount.clamp(0.0, 1.0);
        self.amount = amount;
        self.curve = distortion_curve(amount);
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    /// Map one sample through the curve with linear interpolation.
    /// Out-of-range input saturates at the curve endpoints.
    fn shape(&self, sample: f32) -> f32 {
        let last = self.curve.len() - 1;
        let pos = (sample.clamp(-1.0, 1.0) + 1.0) * 0.5 * last as f32;
        let index = pos as usize;
        if index >= last {
            return self.curve[last];
        }
        let frac = pos - index as f32;
        self.curve[index] + (self.curve[index + 1] - self.curve[index]) * frac
    }
}

impl EffectStage for WaveShaperStage {
    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.shape(*sample) * POST_GAIN;
        }
    }

    fn reset(&mut self) {}
}
