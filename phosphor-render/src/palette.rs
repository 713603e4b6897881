//! Fixed colors of the visualization

use crate::surface::Rgb;

/// Near-black backdrop the trail fade composites over the scene
pub const BACKDROP: Rgb = Rgb::new(10, 10, 18);

/// Alpha of the per-frame trail fade; lower leaves longer trails
pub const TRAIL_ALPHA: f32 = 0.3;

/// Waveform stroke accent
pub const WAVEFORM: Rgb = Rgb::new(0, 255, 204);

/// Polar trace accent
pub const POLAR: Rgb = Rgb::new(255, 0, 191);

/// Alpha of the polar trace stroke
pub const POLAR_ALPHA: f32 = 0.8;

/// Center glow color; its opacity tracks the average energy
pub const GLOW: Rgb = Rgb::new(255, 255, 255);

/// Fixed blue channel of the spectrum bars
pub const BAR_BLUE: u8 = 50;
