//! The five drawing passes, executed in order every display frame

use crate::palette;
use crate::surface::{Rgb, Surface};
use phosphor_analysis::{AnalysisFrame, MAX_MAGNITUDE};
use std::f32::consts::TAU;

/// Bar width as a multiple of the per-bin slice of the surface width
const BAR_WIDTH_FACTOR: f32 = 2.5;
/// Bar height per unit of spectrum magnitude
const BAR_HEIGHT_FACTOR: f32 = 1.5;
/// Gutter between bars in pixels
const BAR_GUTTER: f32 = 1.0;
/// Red ramp added across the spectrum, low bins to high
const BAR_RED_RAMP: f32 = 25.0;
/// Green ramp across the spectrum
const BAR_GREEN_RAMP: f32 = 250.0;

/// Waveform stroke width in pixels
const WAVEFORM_STROKE: f32 = 3.0;
/// Waveform amplitude in fractions of the surface height
const WAVEFORM_SPAN: f32 = 1.0 / 3.0;

/// Polar trace stroke width in pixels
const POLAR_STROKE: f32 = 2.0;
/// Divisor of min(W, H) giving the resting ring radius
const POLAR_BASE_DIVISOR: f32 = 3.5;
/// Ring deflection in pixels per unit of sample amplitude
const POLAR_DEFLECTION: f32 = 100.0;

/// Glow radius per unit of average energy
const GLOW_RADIUS_FACTOR: f32 = 0.5;

/// A single drawing stage of the visualizer.
///
/// Stages draw over whatever the previous stages left on the surface and
/// read the geometry from the surface itself, so a resize between frames
/// needs no notification.
pub trait Pass {
    fn name(&self) -> &'static str;
    fn render(&self, frame: &AnalysisFrame, surface: &mut Surface);
}

/// Composites the backdrop over the whole surface so earlier frames decay
/// into motion trails instead of vanishing.
pub struct TrailFade;

impl Pass for TrailFade {
    fn name(&self) -> &'static str {
        "trail-fade"
    }

    fn render(&self, _frame: &AnalysisFrame, surface: &mut Surface) {
        surface.fade(palette::BACKDROP, palette::TRAIL_ALPHA);
    }
}

/// Bottom-anchored frequency bars, green sweeping to red across the
/// spectrum. Every bin issues a bar; the surface clips the overflow.
pub struct SpectrumBars;

impl Pass for SpectrumBars {
    fn name(&self) -> &'static str {
        "spectrum-bars"
    }

    fn render(&self, frame: &AnalysisFrame, surface: &mut Surface) {
        let n = frame.spectrum.len();
        if n == 0 {
            return;
        }
        let w = surface.width() as f32;
        let h = surface.height() as f32;
        let bar_width = (w / n as f32) * BAR_WIDTH_FACTOR;

        let mut x = 0.0f32;
        for (i, &magnitude) in frame.spectrum.iter().enumerate() {
            let bar_height = magnitude * BAR_HEIGHT_FACTOR;
            let t = i as f32 / n as f32;
            let color = Rgb::new(
                channel(bar_height + BAR_RED_RAMP * t),
                channel(BAR_GREEN_RAMP * t),
                palette::BAR_BLUE,
            );
            surface.fill_rect(x, h - bar_height, bar_width, bar_height, color, 1.0);
            x += bar_width + BAR_GUTTER;
        }
    }
}

/// Time-domain trace stroked across the vertical center
pub struct WaveformTrace;

impl Pass for WaveformTrace {
    fn name(&self) -> &'static str {
        "waveform-trace"
    }

    fn render(&self, frame: &AnalysisFrame, surface: &mut Surface) {
        let n = frame.waveform.len();
        if n < 2 {
            return;
        }
        let w = surface.width() as f32;
        let h = surface.height() as f32;
        let slice_width = w / n as f32;

        let mut points = Vec::with_capacity(n);
        let mut x = 0.0f32;
        for &sample in &frame.waveform {
            let y = h / 2.0 + sample * (h * WAVEFORM_SPAN);
            points.push((x, y));
            x += slice_width;
        }
        surface.stroke_polyline(&points, WAVEFORM_STROKE, palette::WAVEFORM, 1.0);
    }
}

/// The same time-domain data bent around the surface center into a closed
/// ring; amplitude deflects the ring radially.
pub struct PolarTrace;

impl Pass for PolarTrace {
    fn name(&self) -> &'static str {
        "polar-trace"
    }

    fn render(&self, frame: &AnalysisFrame, surface: &mut Surface) {
        let n = frame.waveform.len();
        if n < 2 {
            return;
        }
        let w = surface.width() as f32;
        let h = surface.height() as f32;
        let cx = w / 2.0;
        let cy = h / 2.0;
        let base_radius = w.min(h) / POLAR_BASE_DIVISOR;

        let mut points = Vec::with_capacity(n + 1);
        for (i, &sample) in frame.waveform.iter().enumerate() {
            let angle = (i as f32 / n as f32) * TAU;
            let radius = base_radius + sample * POLAR_DEFLECTION;
            points.push((cx + radius * angle.cos(), cy + radius * angle.sin()));
        }
        // Close the loop back onto the first point
        points.push(points[0]);
        surface.stroke_polyline(&points, POLAR_STROKE, palette::POLAR, palette::POLAR_ALPHA);
    }
}

/// Loudness-reactive glow at the surface center. Both the radius and the
/// opacity follow the average spectrum energy.
pub struct CenterGlow;

impl Pass for CenterGlow {
    fn name(&self) -> &'static str {
        "center-glow"
    }

    fn render(&self, frame: &AnalysisFrame, surface: &mut Surface) {
        let avg = frame.average_energy();
        if avg <= 0.0 {
            return;
        }
        let cx = surface.width() as f32 / 2.0;
        let cy = surface.height() as f32 / 2.0;
        let radius = avg * GLOW_RADIUS_FACTOR;
        let opacity = (avg / MAX_MAGNITUDE).clamp(0.0, 1.0);
        surface.fill_circle(cx, cy, radius, palette::GLOW, opacity);
    }
}

fn channel(value: f32) -> u8 {
    value.clamp(0.0, 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_frame(bins: usize) -> AnalysisFrame {
        AnalysisFrame::quiet(bins)
    }

    fn black_surface(w: u32, h: u32) -> Surface {
        Surface::new(w, h, Rgb::new(0, 0, 0))
    }

    fn is_black(surface: &Surface, x: u32, y: u32) -> bool {
        let px = surface.pixel(x, y).unwrap();
        px[0] == 0 && px[1] == 0 && px[2] == 0
    }

    #[test]
    fn test_trail_fade_pulls_toward_backdrop() {
        let mut s = black_surface(4, 4);
        s.blend_pixel(2, 2, Rgb::new(255, 255, 255), 1.0);
        TrailFade.render(&quiet_frame(8), &mut s);

        let px = s.pixel(2, 2).unwrap();
        assert!(px[0] < 255);
        // The untouched corner moved off black toward the backdrop
        assert!(s.pixel(0, 0).unwrap()[2] > 0);
    }

    #[test]
    fn test_quiet_spectrum_draws_no_bars() {
        let mut s = black_surface(40, 20);
        SpectrumBars.render(&quiet_frame(16), &mut s);
        for y in 0..20 {
            for x in 0..40 {
                assert!(is_black(&s, x, y));
            }
        }
    }

    #[test]
    fn test_bars_anchor_to_the_bottom_edge() {
        let mut s = black_surface(40, 40);
        let mut frame = quiet_frame(4);
        frame.spectrum[0] = 10.0; // 15px tall on a 40px surface

        SpectrumBars.render(&frame, &mut s);
        assert!(!is_black(&s, 2, 39));
        assert!(!is_black(&s, 2, 25));
        assert!(is_black(&s, 2, 20));
    }

    #[test]
    fn test_bar_geometry_and_color_ramp() {
        // 4 bins on a 40px-wide surface: barWidth = 25, gutter 1,
        // so bar 1 starts at x = 26 and the column at 25 stays empty
        let mut s = black_surface(40, 40);
        let mut frame = quiet_frame(4);
        frame.spectrum[0] = 255.0;
        frame.spectrum[1] = 255.0;

        SpectrumBars.render(&frame, &mut s);
        let bar0 = s.pixel(10, 20).unwrap();
        let bar1 = s.pixel(30, 20).unwrap();
        let gutter = s.pixel(25, 20).unwrap();

        // Oversized bars fill the full height and clamp red
        assert_eq!(bar0[0], 255);
        assert_eq!(bar0[1], 0);
        assert_eq!(bar0[2], palette::BAR_BLUE);
        // 250 * (1/4), rounded
        assert_eq!(bar1[1], 63);
        assert_eq!(gutter, [0, 0, 0, 255]);
    }

    #[test]
    fn test_flat_waveform_strokes_the_centerline() {
        let mut s = black_surface(64, 32);
        WaveformTrace.render(&quiet_frame(64), &mut s);

        let center = s.pixel(30, 16).unwrap();
        assert_eq!(center[0], palette::WAVEFORM.r);
        assert_eq!(center[1], palette::WAVEFORM.g);
        assert_eq!(center[2], palette::WAVEFORM.b);
        assert!(is_black(&s, 30, 4));
        assert!(is_black(&s, 30, 28));
    }

    #[test]
    fn test_waveform_deflects_by_a_third_of_the_height() {
        let mut s = black_surface(60, 60);
        let mut frame = quiet_frame(60);
        for v in frame.waveform.iter_mut() {
            *v = 1.0;
        }
        WaveformTrace.render(&frame, &mut s);

        // y = 30 + 1.0 * 20 = 50
        assert!(!is_black(&s, 30, 50));
        assert!(is_black(&s, 30, 30));
    }

    #[test]
    fn test_polar_ring_sits_at_the_base_radius() {
        let mut s = black_surface(70, 70);
        PolarTrace.render(&quiet_frame(128), &mut s);

        // base radius = 70 / 3.5 = 20: the ring crosses (cx + 20, cy)
        let on_ring = s.pixel(55, 35).unwrap();
        assert!(on_ring[0] > 0);
        assert!(is_black(&s, 35, 35));
    }

    #[test]
    fn test_polar_loop_closes_the_final_gap() {
        // 4 points land on the axes; only the closing segment spans the
        // quadrant between the last point and the first
        let mut s = black_surface(80, 80);
        let mut frame = quiet_frame(4);
        for v in frame.waveform.iter_mut() {
            *v = 0.0;
        }
        PolarTrace.render(&frame, &mut s);

        // Closing segment from (cx, cy - r) back to (cx + r, cy)
        let r = 80.0f32 / 3.5;
        let mid_x = (40.0 + r * 0.5) as u32;
        let mid_y = (40.0 - r * 0.5) as u32;
        assert!(!is_black(&s, mid_x, mid_y));
    }

    #[test]
    fn test_glow_tracks_average_energy() {
        let mut s = black_surface(50, 50);
        let mut frame = quiet_frame(8);
        for m in frame.spectrum.iter_mut() {
            *m = 255.0;
        }
        CenterGlow.render(&frame, &mut s);
        assert_eq!(s.pixel(25, 25).unwrap()[0], 255);

        // Quiet input draws nothing
        let mut s = black_surface(50, 50);
        CenterGlow.render(&quiet_frame(8), &mut s);
        assert!(is_black(&s, 25, 25));
    }
}
