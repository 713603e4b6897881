//! Audio analysis for phosphor
//!
//! Provides the lock-free tap that carries samples from the audio callback
//! into the frame loop, and the windowed FFT snapshots the visualizer draws.

mod tap;

pub use tap::{
    tap_pair, AnalysisFrame, AnalysisTap, TapConfig, TapError, TapFeed, BIN_COUNT,
    DEFAULT_SMOOTHING, FFT_SIZE, MAX_MAGNITUDE,
};
