pub mod beat;
pub mod sampler;
pub mod tap;

pub use beat::{BeatDetector, BeatEvent};
pub use sampler::{AudioFrame, BandEnergies, SpectralSampler};
pub use tap::AnalysisTap;
