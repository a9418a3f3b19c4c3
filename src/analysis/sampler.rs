use std::sync::Arc;

use crate::common::EngineError;
use crate::graph::AudioGraph;
use crate::source::SourceHandle;

/// Scalar band summary derived from one frequency snapshot. Band
/// boundaries sit at fixed fractions of the bin count (10% and 50%), so
/// the three ranges partition the spectrum exactly regardless of window
/// size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandEnergies {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub avg_frequency: f32,
}

/// One per-tick observation of the signal at the tap. Buffers are fresh
/// per call; consumers must still treat them as read-only.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub frequency: Vec<u8>,
    pub time: Vec<u8>,
    pub bands: BandEnergies,
}

/// Per-frame analysis front end over the graph's tap.
pub struct SpectralSampler {
    graph: Arc<AudioGraph>,
}

impl SpectralSampler {
    pub fn new(graph: Arc<AudioGraph>) -> Self {
        Self { graph }
    }

    /// Connect a new source into the analysed path, replacing any prior
    /// one. Problems disconnecting a stale handle are logged inside the
    /// graph, never raised here.
    pub fn attach_source(&self, source: SourceHandle) -> Result<(), EngineError> {
        self.graph.connect_source(source)
    }

    /// Push a new analysis window size and smoothing factor to the tap.
    pub fn configure(&self, window_size: usize, smoothing: f32) -> Result<(), EngineError> {
        self.graph.configure_tap(window_size, smoothing)
    }

    /// Capture the current snapshot.
    ///
    /// Returns `None` while no source is attached or the tap has not yet
    /// seen a full window — "no data yet", not an error.
    pub fn sample(&self) -> Option<AudioFrame> {
        if !self.graph.has_source() {
            return None;
        }
        let (frequency, time) = self.graph.with_tap(|tap| {
            if !tap.ready() {
                return None;
            }
            Some((tap.frequency_bytes(), tap.time_bytes()))
        })??;

        let bands = band_energies(&frequency);
        Some(AudioFrame {
            frequency,
            time,
            bands,
        })
    }
}

/// Mean band levels over the fixed sub-ranges of one snapshot.
/// Recomputed from scratch on every call — nothing is cached across
/// snapshots.
pub fn band_energies(frequency: &[u8]) -> BandEnergies {
    let len = frequency.len();
    if len == 0 {
        return BandEnergies {
            bass: 0.0,
            mid: 0.0,
            treble: 0.0,
            avg_frequency: 0.0,
        };
    }

    let bass_end = (len as f32 * 0.1) as usize;
    let mid_end = (len as f32 * 0.5) as usize;

    BandEnergies {
        bass: mean(&frequency[..bass_end]),
        mid: mean(&frequency[bass_end..mid_end]),
        treble: mean(&frequency[mid_end..]),
        avg_frequency: mean(frequency),
    }
}

fn mean(bytes: &[u8]) -> f32 {
    if bytes.is_empty() {
        return 0.0;
    }
    bytes.iter().map(|&b| b as f32).sum::<f32>() / bytes.len() as f32
}
