//! Lock-free analysis tap between the audio callback and the frame loop

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;
use thiserror::Error;
use tracing::debug;

/// FFT window length in samples
pub const FFT_SIZE: usize = 2048;

/// Snapshot length: one value per FFT bin below Nyquist
pub const BIN_COUNT: usize = FFT_SIZE / 2;

/// Upper bound of the spectrum magnitude scale
pub const MAX_MAGNITUDE: f32 = 255.0;

/// Default exponential smoothing factor for spectrum magnitudes
pub const DEFAULT_SMOOTHING: f32 = 0.85;

/// Spectrum floor in decibels; magnitudes at or below map to 0
const MIN_DB: f32 = -100.0;

/// Spectrum ceiling in decibels; magnitudes at or above map to MAX_MAGNITUDE
const MAX_DB: f32 = -30.0;

/// Ring capacity in samples between the two timelines.
/// Several callbacks' worth; excess is dropped, never blocked on.
const RING_WINDOWS: usize = 4;

/// Errors from tap configuration
#[derive(Debug, Error)]
pub enum TapError {
    /// FFT sizes must be powers of two within the supported range
    #[error("fft size {0} is not a power of two in 32..=32768")]
    BadFftSize(usize),
    /// Smoothing of 1.0 would freeze the spectrum forever
    #[error("smoothing factor {0} is outside [0, 1)")]
    BadSmoothing(f32),
}

/// Tap configuration
#[derive(Clone, Copy, Debug)]
pub struct TapConfig {
    /// FFT window length; power of two in [32, 32768]
    pub fft_size: usize,
    /// Spectrum smoothing factor in [0, 1)
    pub smoothing: f32,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            fft_size: FFT_SIZE,
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}

impl TapConfig {
    fn validate(&self) -> Result<(), TapError> {
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return Err(TapError::BadFftSize(self.fft_size));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(TapError::BadSmoothing(self.smoothing));
        }
        Ok(())
    }
}

/// One display frame worth of analysis data.
///
/// Both sequences have the same length, fixed for the life of the tap.
/// Every call to [`AnalysisTap::frame`] produces an independent copy.
#[derive(Clone, Debug)]
pub struct AnalysisFrame {
    /// Smoothed spectrum magnitudes, one per bin, in [0, MAX_MAGNITUDE]
    pub spectrum: Vec<f32>,
    /// Most recent window samples, one per bin, in [-1, 1]
    pub waveform: Vec<f32>,
}

impl AnalysisFrame {
    /// All-quiet frame: zero spectrum, flat waveform
    pub fn quiet(bins: usize) -> Self {
        Self {
            spectrum: vec![0.0; bins],
            waveform: vec![0.0; bins],
        }
    }

    /// Number of bins in both sequences
    pub fn bin_count(&self) -> usize {
        self.spectrum.len()
    }

    /// Mean spectrum magnitude, in [0, MAX_MAGNITUDE]
    pub fn average_energy(&self) -> f32 {
        if self.spectrum.is_empty() {
            return 0.0;
        }
        self.spectrum.iter().sum::<f32>() / self.spectrum.len() as f32
    }
}

/// Audio-side half of the tap. Lives in the output callback.
pub struct TapFeed {
    producer: HeapProd<f32>,
}

impl TapFeed {
    /// Push mono samples toward the frame loop.
    ///
    /// Never blocks. Returns how many samples fit; the rest are dropped,
    /// which only happens when the frame loop has stalled.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }
}

/// Frame-side half of the tap: drains the ring and computes snapshots.
pub struct AnalysisTap {
    consumer: HeapCons<f32>,
    fft: std::sync::Arc<dyn rustfft::Fft<f32>>,
    fft_size: usize,
    bins: usize,
    /// Pre-computed Hann window coefficients
    hann: Vec<f32>,
    smoothing: f32,
    /// Per-bin smoothed linear magnitudes, carried across frames
    smoothed: Vec<f32>,
    /// Circular buffer of the last fft_size samples seen
    window: Box<[f32]>,
    write_pos: usize,
    /// Scratch: window unrolled oldest-first
    ordered: Vec<f32>,
    /// Pre-allocated FFT buffer to avoid allocation in frame()
    fft_buffer: Vec<Complex<f32>>,
}

/// Create a connected feed/tap pair.
///
/// The feed side belongs to the audio callback, the tap side to the frame
/// loop. They share a lock-free ring; neither side ever blocks the other.
pub fn tap_pair(config: TapConfig) -> Result<(TapFeed, AnalysisTap), TapError> {
    config.validate()?;

    let fft_size = config.fft_size;
    let bins = fft_size / 2;
    let (producer, consumer) = HeapRb::<f32>::new(fft_size * RING_WINDOWS).split();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);

    // Pre-compute Hann window
    let hann: Vec<f32> = (0..fft_size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / fft_size as f32).cos()))
        .collect();

    debug!(fft_size, bins, smoothing = config.smoothing, "analysis tap ready");

    let feed = TapFeed { producer };
    let tap = AnalysisTap {
        consumer,
        fft,
        fft_size,
        bins,
        hann,
        smoothing: config.smoothing,
        smoothed: vec![0.0; bins],
        window: vec![0.0; fft_size].into_boxed_slice(),
        write_pos: 0,
        ordered: vec![0.0; fft_size],
        fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
    };
    Ok((feed, tap))
}

impl AnalysisTap {
    /// Number of bins in every snapshot this tap produces
    pub fn bin_count(&self) -> usize {
        self.bins
    }

    /// Produce the next snapshot pair.
    ///
    /// Drains whatever audio has arrived since the last call; if none has,
    /// the previous window is analyzed again. A tap that has only ever seen
    /// silence returns the all-quiet frame. Smoothing state advances once
    /// per call, so call this once per display frame.
    pub fn frame(&mut self) -> AnalysisFrame {
        self.drain();

        // Unroll the circular window oldest-first
        for i in 0..self.fft_size {
            self.ordered[i] = self.window[(self.write_pos + i) % self.fft_size];
        }

        // Windowed forward FFT
        for i in 0..self.fft_size {
            self.fft_buffer[i] = Complex::new(self.ordered[i] * self.hann[i], 0.0);
        }
        self.fft.process(&mut self.fft_buffer);

        // Normalized magnitudes with exponential smoothing
        let norm = 1.0 / self.fft_size as f32;
        for k in 0..self.bins {
            let mag = self.fft_buffer[k].norm() * norm;
            self.smoothed[k] = self.smoothed[k] * self.smoothing + mag * (1.0 - self.smoothing);
        }

        let spectrum: Vec<f32> = self.smoothed.iter().map(|&m| scale_magnitude(m)).collect();
        let waveform: Vec<f32> = self.ordered[self.fft_size - self.bins..]
            .iter()
            .map(|s| s.clamp(-1.0, 1.0))
            .collect();

        AnalysisFrame { spectrum, waveform }
    }

    /// Move everything the feed has pushed into the analysis window
    fn drain(&mut self) {
        let mut chunk = [0.0f32; 256];
        loop {
            let n = self.consumer.pop_slice(&mut chunk);
            if n == 0 {
                break;
            }
            for &sample in &chunk[..n] {
                self.window[self.write_pos] = sample;
                self.write_pos = (self.write_pos + 1) % self.fft_size;
            }
        }
    }
}

/// Map a linear magnitude onto the [0, MAX_MAGNITUDE] decibel scale
fn scale_magnitude(mag: f32) -> f32 {
    if mag <= 0.0 {
        return 0.0;
    }
    let db = 20.0 * mag.log10();
    let t = (db - MIN_DB) / (MAX_DB - MIN_DB);
    (t * MAX_MAGNITUDE).clamp(0.0, MAX_MAGNITUDE)
}
