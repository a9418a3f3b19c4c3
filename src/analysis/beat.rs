//! Energy-based beat detection with variance-adaptive thresholding,
//! plus a smoothed tempo estimate derived from recent inter-beat
//! intervals.

use std::collections::VecDeque;

/// Rolling energy window: ~1 second at ~43 analysis frames per second.
const ENERGY_HISTORY: usize = 43;
/// Beats kept for tempo derivation.
const BEAT_HISTORY: usize = 8;
/// Derived BPM values kept for smoothing.
const BPM_HISTORY: usize = 5;
/// Base energy multiplier for a beat.
const BEAT_THRESHOLD: f64 = 1.5;
/// Linear de-rating of the threshold by energy variance. Deliberately
/// unclamped: high variance can push the factor to or below 1.0.
const VARIANCE_SLOPE: f64 = -0.0025714;
/// Minimum inter-beat gap in milliseconds (caps detection at 200 BPM).
const MIN_BEAT_INTERVAL_MS: f64 = 300.0;
/// Low-frequency bins examined for instant energy. Absolute range, not a
/// fraction of the snapshot length.
const ENERGY_BINS: usize = 10;
/// Plausible tempo range; anything outside reports as unknown.
const BPM_MIN: i64 = 60;
const BPM_MAX: i64 = 200;

/// Result of one detection call. Consumed immediately by callers; the
/// detector itself only remembers what its rings need.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    pub is_beat: bool,
    pub confidence: f64,
    /// Smoothed tempo estimate, 0 when unknown.
    pub bpm: u32,
    pub energy: f64,
    pub timestamp_ms: f64,
}

/// Per-track beat detector.
///
/// Calls must be ordered by non-decreasing `now_ms` for one instance —
/// the rolling statistics and the minimum-interval gate both assume
/// monotonic time.
#[derive(Default)]
pub struct BeatDetector {
    energy_history: VecDeque<f64>,
    beat_history: VecDeque<f64>,
    bpm_history: VecDeque<i64>,
    last_beat_ms: Option<f64>,
}

impl BeatDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Examine one frequency snapshot taken at `now_ms`.
    pub fn detect_beat(&mut self, frequency: &[u8], now_ms: f64) -> BeatEvent {
        let energy = instant_energy(frequency);

        self.energy_history.push_back(energy);
        if self.energy_history.len() > ENERGY_HISTORY {
            self.energy_history.pop_front();
        }

        let avg_energy = mean(&self.energy_history);
        let variance = self
            .energy_history
            .iter()
            .map(|e| {
                let diff = e - avg_energy;
                diff * diff
            })
            .sum::<f64>()
            / self.energy_history.len() as f64;
        let threshold = VARIANCE_SLOPE * variance + BEAT_THRESHOLD;

        let interval_ok = self
            .last_beat_ms
            .is_none_or(|last| now_ms - last > MIN_BEAT_INTERVAL_MS);
        let is_beat = energy > threshold * avg_energy && interval_ok;

        let confidence = if is_beat {
            (energy / (threshold * avg_energy) - 1.0).min(1.0)
        } else {
            0.0
        };

        if is_beat {
            self.last_beat_ms = Some(now_ms);
            self.beat_history.push_back(now_ms);
            if self.beat_history.len() > BEAT_HISTORY {
                self.beat_history.pop_front();
            }
        }

        let bpm = self.compute_bpm();

        BeatEvent {
            is_beat,
            confidence,
            bpm,
            energy,
            timestamp_ms: now_ms,
        }
    }

    /// Current smoothed tempo estimate.
    ///
    /// Note: like the detection path, this re-derives a BPM sample from
    /// the beat ring and appends it to the smoothing window — repeated
    /// polling returns a stable value but does mutate the window.
    pub fn current_bpm(&mut self) -> u32 {
        self.compute_bpm()
    }

    /// Clear all rolling state; the next call behaves like a fresh
    /// instance.
    pub fn reset(&mut self) {
        self.energy_history.clear();
        self.beat_history.clear();
        self.bpm_history.clear();
        self.last_beat_ms = None;
    }

    fn compute_bpm(&mut self) -> u32 {
        if self.beat_history.len() < 2 {
            return 0;
        }

        let mut interval_sum = 0.0;
        let mut intervals = 0usize;
        let mut prev: Option<f64> = None;
        for &beat in &self.beat_history {
            if let Some(p) = prev {
                interval_sum += beat - p;
                intervals += 1;
            }
            prev = Some(beat);
        }
        let avg_interval = interval_sum / intervals as f64;

        let bpm = (60_000.0 / avg_interval).round() as i64;
        self.bpm_history.push_back(bpm);
        if self.bpm_history.len() > BPM_HISTORY {
            self.bpm_history.pop_front();
        }

        let smoothed = (self.bpm_history.iter().sum::<i64>() as f64
            / self.bpm_history.len() as f64)
            .round() as i64;

        if (BPM_MIN..=BPM_MAX).contains(&smoothed) {
            smoothed as u32
        } else {
            0
        }
    }
}

/// Mean of squared values over the low-frequency bins. Snapshots shorter
/// than the fixed range average over what they have.
fn instant_energy(frequency: &[u8]) -> f64 {
    let end = ENERGY_BINS.min(frequency.len());
    if end == 0 {
        return 0.0;
    }
    frequency[..end]
        .iter()
        .map(|&b| b as f64 * b as f64)
        .sum::<f64>()
        / end as f64
}

fn mean(values: &VecDeque<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
