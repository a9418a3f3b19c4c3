use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::EffectStage;

/// Biquad response shapes selectable from the UI.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilterShape {
  #[default]
  Lowpass,
  Highpass,
  Bandpass,
  Notch,
}

/// Biquad filter coefficients (normalized by a0).
#[derive(Clone)]
struct BiquadCoeffs {
  b0: f64,
  b1: f64,
  b2: f64,
  a1: f64,
  a2: f64,
}

impl BiquadCoeffs {
  fn compute(shape: FilterShape, freq: f64, q: f64, sample_rate: f64) -> Self {
    let omega0 = 2.0 * PI * freq / sample_rate;
    let sin_omega0 = omega0.sin();
    let cos_omega0 = omega0.cos();
    let alpha = sin_omega0 / (2.0 * q);

    let a0 = 1.0 + alpha;
    let inv_a0 = 1.0 / a0;
    match shape {
      FilterShape::Lowpass => Self {
        b0: (1.0 - cos_omega0) * 0.5 * inv_a0,
        b1: (1.0 - cos_omega0) * inv_a0,
        b2: (1.0 - cos_omega0) * 0.5 * inv_a0,
        a1: -2.0 * cos_omega0 * inv_a0,
        a2: (1.0 - alpha) * inv_a0,
      },
      FilterShape::Highpass => Self {
        b0: (1.0 + cos_omega0) * 0.5 * inv_a0,
        b1: -(1.0 + cos_omega0) * inv_a0,
        b2: (1.0 + cos_omega0) * 0.5 * inv_a0,
        a1: -2.0 * cos_omega0 * inv_a0,
        a2: (1.0 - alpha) * inv_a0,
      },
      FilterShape::Bandpass => Self {
        b0: alpha * inv_a0,
        b1: 0.0,
        b2: -alpha * inv_a0,
        a1: -2.0 * cos_omega0 * inv_a0,
        a2: (1.0 - alpha) * inv_a0,
      },
      FilterShape::Notch => Self {
        b0: inv_a0,
        b1: -2.0 * cos_omega0 * inv_a0,
        b2: inv_a0,
        a1: -2.0 * cos_omega0 * inv_a0,
        a2: (1.0 - alpha) * inv_a0,
      },
    }
  }
}

/// Per-channel biquad filter state (Direct Form I).
#[derive(Clone, Default)]
struct BiquadState {
  x1: f64,
  x2: f64,
  y1: f64,
  y2: f64,
}

impl BiquadState {
  fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
    let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
      - coeffs.a1 * self.y1
      - coeffs.a2 * self.y2;

    if !output.is_finite() {
      // Reset on NaN/Inf to avoid cascading errors
      self.reset();
      return 0.0;
    }

    self.x2 = self.x1;
    self.x1 = input;
    self.y2 = self.y1;
    self.y1 = output;
    output
  }

  fn reset(&mut self) {
    self.x1 = 0.0;
    self.x2 = 0.0;
    self.y1 = 0.0;
    self.y2 = 0.0;
  }
}

/// Single reconfigurable filter node. Shape, frequency and Q are all
/// rewritable in place, so switching lowpass → notch while the chain is
/// live never replaces the node.
pub struct BiquadStage {
  shape: FilterShape,
  frequency: f32,
  q: f32,
  sample_rate: u32,
  coeffs: BiquadCoeffs,
  left: BiquadState,
  right: BiquadState,
}

impl BiquadStage {
  pub fn new(shape: FilterShape, frequency: f32, q: f32, sample_rate: u32) -> Self {
    let mut stage = Self {
      shape,
      frequency: 0.0,
      q: 0.0,
      sample_rate,
      coeffs: BiquadCoeffs::compute(shape, 1000.0, 1.0, sample_rate as f64),
      left: BiquadState::default(),
      right: BiquadState::default(),
    };
    stage.frequency = stage.clamp_frequency(frequency);
    stage.q = q.max(0.0001);
    stage.update_coeffs();
    stage
  }

  pub fn set_shape(&mut self, shape: FilterShape) {
    self.shape = shape;
    self.update_coeffs();
  }

  pub fn set_frequency(&mut self, frequency: f32) {
    self.frequency = self.clamp_frequency(frequency);
    self.update_coeffs();
  }

  pub fn set_q(&mut self, q: f32) {
    self.q = q.max(0.0001);
    self.update_coeffs();
  }

  pub fn shape(&self) -> FilterShape {
    self.shape
  }

  pub fn frequency(&self) -> f32 {
    self.frequency
  }

  pub fn q(&self) -> f32 {
    self.q
  }

  /// Keep the center frequency inside (0, Nyquist).
  fn clamp_frequency(&self, frequency: f32) -> f32 {
    let nyquist = self.sample_rate as f32 / 2.0;
    frequency.clamp(1.0, nyquist - 1.0)
  }

  fn update_coeffs(&mut self) {
    self.coeffs = BiquadCoeffs::compute(
      self.shape,
      self.frequency as f64,
      self.q as f64,
      self.sample_rate as f64,
    );
  }
}

impl EffectStage for BiquadStage {
  fn process(&mut self, samples: &mut [f32]) {
    for frame in samples.chunks_exact_mut(2) {
      frame[0] = self.left.process(frame[0] as f64, &self.coeffs) as f32;
      frame[1] = self.right.process(frame[1] as f64, &self.coeffs) as f32;
    }
  }

  fn reset(&mut self) {
    self.left.reset();
    self.right.reset();
  }
}
