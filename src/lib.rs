//! pulseviz — the real-time audio core behind an audio-reactive visualizer.
//!
//! Signal path: opaque PCM source → ordered effect chain
//! (distortion → filter → echo → reverb) → analysis tap → output block.
//! Per animation tick a caller pulls a byte snapshot from the
//! [`SpectralSampler`] and feeds it to the [`BeatDetector`]; the resulting
//! band energies and beat events drive whatever is drawing.
//!
//! Rendering, preset storage and device plumbing live outside this crate —
//! the engine only owns the graph, the analysis and the effect parameters.

pub mod analysis;
pub mod common;
pub mod config;
pub mod effects;
pub mod graph;
pub mod source;

pub use analysis::{AudioFrame, BandEnergies, BeatDetector, BeatEvent, SpectralSampler};
pub use common::EngineError;
pub use config::EngineConfig;
pub use effects::{EffectsConfig, EffectsRack, FilterShape};
pub use graph::{AudioGraph, EffectKind, EffectNode, GraphState};
pub use source::{BufferSource, SampleSource, SourceHandle};
