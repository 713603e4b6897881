//! Phosphor render - software rasterizer and the visualizer pass chain
//!
//! Everything here draws into an RGBA [`Surface`] owned by the caller, so
//! the same pipeline output can be blitted to a terminal, dumped to a file
//! or inspected in tests. The [`Visualizer`] runs five passes per frame:
//! a trail fade, spectrum bars, a waveform trace, a polar trace and a
//! center glow.

mod palette;
mod passes;
mod surface;
mod visualizer;

pub use palette::{BACKDROP, BAR_BLUE, GLOW, POLAR, POLAR_ALPHA, TRAIL_ALPHA, WAVEFORM};
pub use passes::{CenterGlow, Pass, PolarTrace, SpectrumBars, TrailFade, WaveformTrace};
pub use surface::{Rgb, Surface};
pub use visualizer::Visualizer;
