//! The analysis tap: observes the processed signal without altering it and
//! exposes byte-quantized frequency and waveform snapshots of the most
//! recent window.

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use tracing::warn;

/// Smallest accepted analysis window, in samples.
pub const MIN_WINDOW: usize = 32;
/// Largest accepted analysis window.
pub const MAX_WINDOW: usize = 32768;

/// Byte mapping range for frequency magnitudes, in decibels.
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

pub struct AnalysisTap {
    window_size: usize,
    smoothing: f32,
    fft: Arc<dyn Fft<f32>>,
    /// Mono mixdown of the most recent `window_size` samples.
    recent: VecDeque<f32>,
    /// Per-bin magnitudes carried across frames for temporal smoothing.
    smoothed: Vec<f32>,
    filled: bool,
}

impl AnalysisTap {
    pub fn new(window_size: usize, smoothing: f32) -> Self {
        let window_size = sanitize_window(window_size);
        let mut planner = FftPlanner::<f32>::new();
        Self {
            window_size,
            smoothing: sanitize_smoothing(smoothing),
            fft: planner.plan_fft_forward(window_size),
            recent: VecDeque::with_capacity(window_size),
            smoothed: vec![0.0; window_size / 2],
            filled: false,
        }
    }

    /// Apply a new window size and smoothing factor. May be called at any
    /// time; a changed window reallocates the snapshot buffers and the tap
    /// refills before reporting ready again.
    pub fn configure(&mut self, window_size: usize, smoothing: f32) {
        self.smoothing = sanitize_smoothing(smoothing);

        let window_size = sanitize_window(window_size);
        if window_size == self.window_size {
            return;
        }

        let mut planner = FftPlanner::<f32>::new();
        self.fft = planner.plan_fft_forward(window_size);
        self.window_size = window_size;
        self.smoothed = vec![0.0; window_size / 2];
        while self.recent.len() > window_size {
            self.recent.pop_front();
        }
        self.filled = self.recent.len() >= window_size;
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn bin_count(&self) -> usize {
        self.window_size / 2
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    /// Feed a processed block (interleaved stereo) past the tap.
    pub fn push(&mut self, samples: &[f32]) {
        for frame in samples.chunks_exact(2) {
            if self.recent.len() == self.window_size {
                self.recent.pop_front();
            }
            self.recent.push_back((frame[0] + frame[1]) * 0.5);
        }
        if self.recent.len() >= self.window_size {
            self.filled = true;
        }
    }

    /// Whether a full window has been observed since the last reconfigure.
    pub fn ready(&self) -> bool {
        self.filled
    }

    /// Byte frequency data for the current window.
    ///
    /// Magnitudes are exponentially smoothed per bin
    /// (`new = s*old + (1-s)*raw`) and mapped through the analyser dB
    /// range onto 0–255.
    pub fn frequency_bytes(&mut self) -> Vec<u8> {
        let n = self.window_size;
        if self.recent.len() < n {
            return vec![0; self.bin_count()];
        }

        let mut buf: Vec<Complex<f32>> = self
            .recent
            .iter()
            .enumerate()
            .map(|(i, &s)| Complex::new(s * hann(i, n), 0.0))
            .collect();
        self.fft.process(&mut buf);

        let bins = n / 2;
        for i in 0..bins {
            let magnitude = buf[i].norm() / n as f32;
            self.smoothed[i] =
                self.smoothing * self.smoothed[i] + (1.0 - self.smoothing) * magnitude;
        }

        self.smoothed.iter().map(|&m| magnitude_to_byte(m)).collect()
    }

    /// Byte waveform data: the latest `bin_count` samples, 128 = zero.
    pub fn time_bytes(&self) -> Vec<u8> {
        let bins = self.bin_count();
        let skip = self.recent.len().saturating_sub(bins);
        let mut out: Vec<u8> = self
            .recent
            .iter()
            .skip(skip)
            .map(|&s| (128.0 * (1.0 + s)).clamp(0.0, 255.0) as u8)
            .collect();
        // Short of a full window, pad at the zero line.
        out.resize(bins, 128);
        out
    }
}

fn magnitude_to_byte(magnitude: f32) -> u8 {
    let db = 20.0 * magnitude.max(1e-10).log10();
    let scaled = (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
    (scaled.clamp(0.0, 1.0) * 255.0) as u8
}

fn sanitize_window(window_size: usize) -> usize {
    let clamped = window_size.clamp(MIN_WINDOW, MAX_WINDOW);
    let pow2 = clamped.next_power_of_two();
    if pow2 != window_size {
        warn!("window size {window_size} adjusted to {pow2}");
    }
    pow2
}

fn sanitize_smoothing(smoothing: f32) -> f32 {
    if !(0.0..1.0).contains(&smoothing) {
        warn!("smoothing {smoothing} outside [0, 1), clamping");
    }
    smoothing.clamp(0.0, 0.999)
}

fn hann(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}
