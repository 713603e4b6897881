//! RGBA8 raster surface with the drawing primitives the passes need

use std::collections::HashSet;

/// A 24-bit color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Row-major RGBA8 framebuffer.
///
/// The alpha byte is always 255; translucency exists only at draw time,
/// composited source-over like a canvas. All primitives clip to bounds,
/// so callers can issue geometry that hangs off the edges.
pub struct Surface {
    width: u32,
    height: u32,
    clear_color: Rgb,
    data: Vec<u8>,
}

impl Surface {
    /// Create a surface filled with the clear color
    pub fn new(width: u32, height: u32, clear_color: Rgb) -> Self {
        let mut surface = Self {
            width,
            height,
            clear_color,
            data: Vec::new(),
        };
        surface.allocate();
        surface
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 bytes, row-major
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// One pixel as [r, g, b, a], or None outside the surface
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        Some([
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ])
    }

    /// Adopt a new geometry. Contents are cleared on any size change and
    /// preserved when the size is unchanged.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        self.allocate();
    }

    /// Fill with the clear color
    pub fn clear(&mut self) {
        for px in self.data.chunks_exact_mut(4) {
            px[0] = self.clear_color.r;
            px[1] = self.clear_color.g;
            px[2] = self.clear_color.b;
            px[3] = 255;
        }
    }

    fn allocate(&mut self) {
        self.data = vec![0; (self.width * self.height * 4) as usize];
        self.clear();
    }

    /// Composite a translucent color over the whole surface.
    /// Repeated application converges the image onto that color.
    pub fn fade(&mut self, color: Rgb, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        for px in self.data.chunks_exact_mut(4) {
            px[0] = blend_channel(px[0], color.r, alpha);
            px[1] = blend_channel(px[1], color.g, alpha);
            px[2] = blend_channel(px[2], color.b, alpha);
            px[3] = 255;
        }
    }

    /// Source-over blend of one pixel; silently clipped outside the bounds
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: Rgb, alpha: f32) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        let idx = ((y as u32 * self.width + x as u32) * 4) as usize;
        let px = &mut self.data[idx..idx + 4];
        if alpha >= 1.0 {
            px[0] = color.r;
            px[1] = color.g;
            px[2] = color.b;
        } else {
            px[0] = blend_channel(px[0], color.r, alpha);
            px[1] = blend_channel(px[1], color.g, alpha);
            px[2] = blend_channel(px[2], color.b, alpha);
        }
        px[3] = 255;
    }

    /// Fill an axis-aligned rectangle given in float coordinates.
    /// Partial pixel coverage at the edges scales the applied alpha, so
    /// sub-pixel geometry still leaves a proportional trace.
    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb, alpha: f32) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let x1 = x + w;
        let y1 = y + h;
        let col0 = (x.floor() as i32).max(0);
        let row0 = (y.floor() as i32).max(0);
        let col1 = (x1.ceil() as i32).min(self.width as i32);
        let row1 = (y1.ceil() as i32).min(self.height as i32);

        for row in row0..row1 {
            let cov_y = cell_coverage(row, y, y1);
            if cov_y <= 0.0 {
                continue;
            }
            for col in col0..col1 {
                let cov = cov_y * cell_coverage(col, x, x1);
                if cov > 0.0 {
                    self.blend_pixel(col, row, color, alpha * cov);
                }
            }
        }
    }

    /// Stroke a connected polyline with the given width.
    ///
    /// Each pixel is blended at most once per call, so translucent strokes
    /// stay even where segments overlap or rejoin.
    pub fn stroke_polyline(&mut self, points: &[(f32, f32)], width: f32, color: Rgb, alpha: f32) {
        if points.len() < 2 {
            return;
        }
        let radius = (width * 0.5).max(0.5);
        let reach = radius.ceil() as i32;
        let r_sq = radius * radius;

        let mut stamped: HashSet<(i32, i32)> = HashSet::new();
        for pair in points.windows(2) {
            let x0 = pair[0].0.round() as i32;
            let y0 = pair[0].1.round() as i32;
            let x1 = pair[1].0.round() as i32;
            let y1 = pair[1].1.round() as i32;
            for_each_line_point(x0, y0, x1, y1, |px, py| {
                for dy in -reach..=reach {
                    for dx in -reach..=reach {
                        if (dx * dx + dy * dy) as f32 <= r_sq {
                            stamped.insert((px + dx, py + dy));
                        }
                    }
                }
            });
        }
        for (x, y) in stamped {
            self.blend_pixel(x, y, color, alpha);
        }
    }

    /// Fill a circle with a softened one-pixel rim
    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgb, alpha: f32) {
        if radius <= 0.0 || alpha <= 0.0 {
            return;
        }
        let reach = radius + 0.5;
        let col0 = ((cx - reach).floor() as i32).max(0);
        let row0 = ((cy - reach).floor() as i32).max(0);
        let col1 = ((cx + reach).ceil() as i32).min(self.width as i32);
        let row1 = ((cy + reach).ceil() as i32).min(self.height as i32);

        for row in row0..row1 {
            for col in col0..col1 {
                let dx = col as f32 + 0.5 - cx;
                let dy = row as f32 + 0.5 - cy;
                let dist = (dx * dx + dy * dy).sqrt();
                let cov = (radius + 0.5 - dist).clamp(0.0, 1.0);
                if cov > 0.0 {
                    self.blend_pixel(col, row, color, alpha * cov);
                }
            }
        }
    }
}

/// Fraction of the unit cell [cell, cell+1) covered by [start, end)
fn cell_coverage(cell: i32, start: f32, end: f32) -> f32 {
    let lo = start.max(cell as f32);
    let hi = end.min(cell as f32 + 1.0);
    (hi - lo).clamp(0.0, 1.0)
}

fn blend_channel(dst: u8, src: u8, alpha: f32) -> u8 {
    (src as f32 * alpha + dst as f32 * (1.0 - alpha) + 0.5) as u8
}

/// Bresenham walk from (x0, y0) to (x1, y1), inclusive
fn for_each_line_point(x0: i32, y0: i32, x1: i32, y1: i32, mut visit: impl FnMut(i32, i32)) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let mut x = x0;
    let mut y = y0;
    loop {
        visit(x, y);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgb = Rgb::new(0, 0, 0);
    const WHITE: Rgb = Rgb::new(255, 255, 255);

    fn surface(w: u32, h: u32) -> Surface {
        Surface::new(w, h, BLACK)
    }

    #[test]
    fn test_new_surface_is_cleared() {
        let s = Surface::new(4, 3, Rgb::new(10, 10, 18));
        assert_eq!(s.data().len(), 4 * 3 * 4);
        assert_eq!(s.pixel(0, 0), Some([10, 10, 18, 255]));
        assert_eq!(s.pixel(3, 2), Some([10, 10, 18, 255]));
        assert_eq!(s.pixel(4, 0), None);
    }

    #[test]
    fn test_blend_pixel_clips_out_of_bounds() {
        let mut s = surface(8, 8);
        s.blend_pixel(-1, 0, WHITE, 1.0);
        s.blend_pixel(0, -1, WHITE, 1.0);
        s.blend_pixel(8, 0, WHITE, 1.0);
        s.blend_pixel(0, 8, WHITE, 1.0);
        assert!(s.data().chunks_exact(4).all(|px| px[0] == 0));
    }

    #[test]
    fn test_blend_pixel_half_alpha() {
        let mut s = surface(2, 2);
        s.blend_pixel(0, 0, WHITE, 0.5);
        let px = s.pixel(0, 0).unwrap();
        assert!(px[0] == 127 || px[0] == 128);
    }

    #[test]
    fn test_fade_converges_onto_its_color() {
        let mut s = surface(3, 3);
        s.blend_pixel(1, 1, WHITE, 1.0);
        for _ in 0..100 {
            s.fade(Rgb::new(10, 10, 18), 0.3);
        }
        // Rounding leaves at most one counting step of residue
        for (x, y) in [(1, 1), (0, 0)] {
            let px = s.pixel(x, y).unwrap();
            assert!(px[0].abs_diff(10) <= 1, "r was {}", px[0]);
            assert!(px[1].abs_diff(10) <= 1, "g was {}", px[1]);
            assert!(px[2].abs_diff(18) <= 1, "b was {}", px[2]);
        }
    }

    #[test]
    fn test_fade_single_step_arithmetic() {
        let mut s = surface(1, 1);
        s.fade(Rgb::new(10, 10, 18), 0.3);
        // 0.7 * 0 + 0.3 * channel, rounded
        assert_eq!(s.pixel(0, 0), Some([3, 3, 5, 255]));
    }

    #[test]
    fn test_fill_rect_full_and_partial_coverage() {
        let mut s = surface(10, 10);
        s.fill_rect(2.0, 2.0, 3.0, 3.0, WHITE, 1.0);

        assert_eq!(s.pixel(3, 3), Some([255, 255, 255, 255]));
        assert_eq!(s.pixel(1, 3).unwrap()[0], 0);
        assert_eq!(s.pixel(5, 3).unwrap()[0], 0);

        // A half-covered column applies half the alpha
        let mut s = surface(10, 10);
        s.fill_rect(0.0, 0.0, 0.5, 10.0, WHITE, 1.0);
        let px = s.pixel(0, 5).unwrap();
        assert!(px[0] == 127 || px[0] == 128, "got {}", px[0]);
    }

    #[test]
    fn test_fill_rect_clips_to_surface() {
        let mut s = surface(4, 4);
        s.fill_rect(-100.0, -100.0, 1000.0, 1000.0, WHITE, 1.0);
        assert!(s.data().chunks_exact(4).all(|px| px[0] == 255));
    }

    #[test]
    fn test_stroke_blends_overlaps_only_once() {
        let mut s = surface(20, 20);
        // Out and back over the same span
        let path = [(2.0, 10.0), (15.0, 10.0), (2.0, 10.0)];
        s.stroke_polyline(&path, 1.0, WHITE, 0.5);
        let px = s.pixel(8, 10).unwrap();
        assert!(px[0] == 127 || px[0] == 128, "got {}", px[0]);
    }

    #[test]
    fn test_stroke_width_three_covers_adjacent_rows() {
        let mut s = surface(20, 20);
        s.stroke_polyline(&[(0.0, 10.0), (19.0, 10.0)], 3.0, WHITE, 1.0);
        assert_eq!(s.pixel(10, 9).unwrap()[0], 255);
        assert_eq!(s.pixel(10, 10).unwrap()[0], 255);
        assert_eq!(s.pixel(10, 11).unwrap()[0], 255);
        assert_eq!(s.pixel(10, 7).unwrap()[0], 0);
    }

    #[test]
    fn test_stroke_with_one_point_draws_nothing() {
        let mut s = surface(8, 8);
        s.stroke_polyline(&[(4.0, 4.0)], 3.0, WHITE, 1.0);
        assert!(s.data().chunks_exact(4).all(|px| px[0] == 0));
    }

    #[test]
    fn test_fill_circle_center_and_rim() {
        let mut s = surface(21, 21);
        s.fill_circle(10.5, 10.5, 5.0, WHITE, 1.0);
        assert_eq!(s.pixel(10, 10).unwrap()[0], 255);
        // Well outside the rim stays untouched
        assert_eq!(s.pixel(2, 2).unwrap()[0], 0);
    }

    #[test]
    fn test_resize_changes_geometry_and_clears() {
        let mut s = surface(4, 4);
        s.blend_pixel(0, 0, WHITE, 1.0);

        s.resize(4, 4);
        assert_eq!(s.pixel(0, 0).unwrap()[0], 255);

        s.resize(6, 2);
        assert_eq!(s.width(), 6);
        assert_eq!(s.height(), 2);
        assert_eq!(s.pixel(0, 0).unwrap()[0], 0);
        assert_eq!(s.data().len(), 6 * 2 * 4);
    }

    #[test]
    fn test_zero_sized_surface_accepts_draws() {
        let mut s = surface(0, 0);
        s.fade(WHITE, 0.5);
        s.fill_rect(0.0, 0.0, 10.0, 10.0, WHITE, 1.0);
        s.stroke_polyline(&[(0.0, 0.0), (5.0, 5.0)], 3.0, WHITE, 1.0);
        s.fill_circle(0.0, 0.0, 4.0, WHITE, 1.0);
        assert!(s.data().is_empty());
    }
}
