pub mod biquad;
pub mod delay_line;
pub mod distortion;
pub mod echo;
pub mod rack;
pub mod reverb;

pub use biquad::{BiquadStage, FilterShape};
pub use delay_line::DelayLine;
pub use distortion::WaveShaperStage;
pub use echo::EchoStage;
pub use rack::{EffectsConfig, EffectsRack};
pub use reverb::ConvolverStage;

/// Trait for effect stages that process interleaved stereo f32 samples.
/// Buffer layout: [L, R, L, R, ...]; block length is host-chosen and may
/// vary from call to call.
pub trait EffectStage: Send {
    /// Process samples in-place.
    fn process(&mut self, samples: &mut [f32]);
    /// Reset internal state (delay tails, filter memory) without touching
    /// parameters.
    fn reset(&mut self);
}
