//! Pass composition - runs the drawing stages in their fixed order

use crate::passes::{CenterGlow, Pass, PolarTrace, SpectrumBars, TrailFade, WaveformTrace};
use crate::surface::Surface;
use phosphor_analysis::AnalysisFrame;

/// Draws one analysis frame onto a surface through the full pass chain.
///
/// The order is fixed: fade first so trails decay, then bars, waveform,
/// polar ring and finally the glow on top.
pub struct Visualizer {
    passes: Vec<Box<dyn Pass>>,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            passes: vec![
                Box::new(TrailFade),
                Box::new(SpectrumBars),
                Box::new(WaveformTrace),
                Box::new(PolarTrace),
                Box::new(CenterGlow),
            ],
        }
    }

    /// Render one frame. Geometry comes from the surface, so callers
    /// resize the surface first and this picks the new size up for free.
    pub fn render(&self, frame: &AnalysisFrame, surface: &mut Surface) {
        for pass in &self.passes {
            pass.render(frame, surface);
        }
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette;
    use crate::surface::Rgb;

    #[test]
    fn test_pass_order_is_fixed() {
        let viz = Visualizer::new();
        assert_eq!(
            viz.pass_names(),
            vec![
                "trail-fade",
                "spectrum-bars",
                "waveform-trace",
                "polar-trace",
                "center-glow"
            ]
        );
    }

    #[test]
    fn test_quiet_frame_settles_onto_the_backdrop() {
        let mut surface = Surface::new(64, 32, Rgb::new(0, 0, 0));
        let viz = Visualizer::new();
        let frame = AnalysisFrame::quiet(64);

        for _ in 0..200 {
            viz.render(&frame, &mut surface);
        }

        // Away from the centered traces the repeated fade has converged
        let px = surface.pixel(2, 2).unwrap();
        assert!(px[0].abs_diff(palette::BACKDROP.r) <= 1);
        assert!(px[1].abs_diff(palette::BACKDROP.g) <= 1);
        assert!(px[2].abs_diff(palette::BACKDROP.b) <= 1);
    }

    #[test]
    fn test_render_survives_a_degenerate_surface() {
        let mut surface = Surface::new(0, 0, Rgb::new(0, 0, 0));
        let viz = Visualizer::new();
        let mut frame = AnalysisFrame::quiet(32);
        for m in frame.spectrum.iter_mut() {
            *m = 200.0;
        }
        viz.render(&frame, &mut surface);

        surface.resize(1, 1);
        viz.render(&frame, &mut surface);
    }
}
