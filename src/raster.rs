//! CPU raster surface: a packed RGB8 buffer with the handful of primitives
//! the chart renderer needs. All drawing clips to the surface and blends in
//! u8 with round-to-nearest, so repeated renders are byte-identical.

use crate::color::Rgba;
use crate::element::LineStyle;

#[derive(Clone, Debug)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 3],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        Rgba::rgb(self.data[i], self.data[i + 1], self.data[i + 2])
    }

    pub fn fill(&mut self, color: Rgba) {
        for px in self.data.chunks_exact_mut(3) {
            px[0] = color.r;
            px[1] = color.g;
            px[2] = color.b;
        }
    }

    /// Source-over blend of one pixel; `color.a` is the coverage.
    pub fn blend_px(&mut self, x: i64, y: i64, color: Rgba) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let a = u16::from(color.a);
        if a == 0 {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        if a == 255 {
            self.data[i] = color.r;
            self.data[i + 1] = color.g;
            self.data[i + 2] = color.b;
            return;
        }
        let inv = 255 - a;
        for (c, src) in [color.r, color.g, color.b].into_iter().enumerate() {
            let dst = u16::from(self.data[i + c]);
            self.data[i + c] =
                mul_div255(u16::from(src), a).saturating_add(mul_div255(dst, inv));
        }
    }

    /// Axis-aligned rectangle, pixel coordinates, half-open on the rounded
    /// bounds. Coordinates may be given in either order.
    pub fn fill_rect(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Rgba) {
        let (x0, x1) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        let (y0, y1) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        let ix0 = (x0.round() as i64).max(0);
        let iy0 = (y0.round() as i64).max(0);
        let ix1 = (x1.round() as i64).min(i64::from(self.width));
        let iy1 = (y1.round() as i64).min(i64::from(self.height));
        // at least one pixel for degenerate spans inside the surface
        let ix1 = if ix1 == ix0 && ix0 < i64::from(self.width) {
            ix0 + 1
        } else {
            ix1
        };
        let iy1 = if iy1 == iy0 && iy0 < i64::from(self.height) {
            iy0 + 1
        } else {
            iy1
        };
        for y in iy0..iy1 {
            for x in ix0..ix1 {
                self.blend_px(x, y, color);
            }
        }
    }

    /// Rectangle filled with a vertical top-to-bottom color ramp.
    pub fn fill_rect_vgradient(
        &mut self,
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        top: Rgba,
        bottom: Rgba,
    ) {
        let (x0, x1) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        let (y0, y1) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        let ix0 = (x0.round() as i64).max(0);
        let iy0 = (y0.round() as i64).max(0);
        let ix1 = (x1.round() as i64).min(i64::from(self.width));
        let iy1 = (y1.round() as i64).min(i64::from(self.height));
        if iy1 <= iy0 || ix1 <= ix0 {
            return;
        }
        let span = ((iy1 - iy0 - 1) as f64).max(1.0);
        for y in iy0..iy1 {
            let t = (y - iy0) as f64 / span;
            let row_color = Rgba::lerp(top, bottom, t);
            for x in ix0..ix1 {
                self.blend_px(x, y, row_color);
            }
        }
    }

    /// Thick line segment rendered as a filled quad. Dashed and dotted
    /// styles split the segment by arc length.
    pub fn draw_segment(
        &mut self,
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        width: f64,
        color: Rgba,
        style: LineStyle,
    ) {
        let len = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        if len < 1e-9 {
            self.fill_rect(
                x0 - width / 2.0,
                y0 - width / 2.0,
                x0 + width / 2.0,
                y0 + width / 2.0,
                color,
            );
            return;
        }
        match style {
            LineStyle::Solid => self.solid_segment(x0, y0, x1, y1, width, color),
            LineStyle::Dashed | LineStyle::Dotted => {
                let (on, off) = match style {
                    LineStyle::Dashed => (width.max(1.0) * 5.0, width.max(1.0) * 3.0),
                    _ => (width.max(1.0), width.max(1.0) * 2.0),
                };
                let dx = (x1 - x0) / len;
                let dy = (y1 - y0) / len;
                let mut at = 0.0;
                while at < len {
                    let seg_end = (at + on).min(len);
                    self.solid_segment(
                        x0 + dx * at,
                        y0 + dy * at,
                        x0 + dx * seg_end,
                        y0 + dy * seg_end,
                        width,
                        color,
                    );
                    at += on + off;
                }
            }
        }
    }

    fn solid_segment(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, width: f64, color: Rgba) {
        let len = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        if len < 1e-9 {
            return;
        }
        // perpendicular half-width offset
        let hx = -(y1 - y0) / len * width / 2.0;
        let hy = (x1 - x0) / len * width / 2.0;
        self.fill_polygon(
            &[
                (x0 + hx, y0 + hy),
                (x1 + hx, y1 + hy),
                (x1 - hx, y1 - hy),
                (x0 - hx, y0 - hy),
            ],
            color,
        );
    }

    /// Even-odd scanline fill over row centers.
    pub fn fill_polygon(&mut self, points: &[(f64, f64)], color: Rgba) {
        if points.len() < 3 {
            return;
        }
        let y_min = points.iter().map(|p| p.1).fold(f64::MAX, f64::min);
        let y_max = points.iter().map(|p| p.1).fold(f64::MIN, f64::max);
        let iy0 = (y_min.floor() as i64).max(0);
        let iy1 = (y_max.ceil() as i64).min(i64::from(self.height));
        let mut xs: Vec<f64> = Vec::with_capacity(points.len());
        for y in iy0..iy1 {
            let yc = y as f64 + 0.5;
            xs.clear();
            for i in 0..points.len() {
                let (ax, ay) = points[i];
                let (bx, by) = points[(i + 1) % points.len()];
                if (ay <= yc && by > yc) || (by <= yc && ay > yc) {
                    xs.push(ax + (yc - ay) / (by - ay) * (bx - ax));
                }
            }
            xs.sort_by(f64::total_cmp);
            for pair in xs.chunks_exact(2) {
                let x_start = (pair[0].round() as i64).max(0);
                let x_end = (pair[1].round() as i64).min(i64::from(self.width));
                for x in x_start..x_end {
                    self.blend_px(x, y, color);
                }
            }
        }
    }

    /// Soft radial splat with quadratic falloff, used for candle glow.
    pub fn glow_splat(&mut self, cx: f64, cy: f64, radius: f64, color: Rgba, intensity: f64) {
        if radius <= 0.0 || intensity <= 0.0 {
            return;
        }
        let r = radius.ceil() as i64;
        let icx = cx.round() as i64;
        let icy = cy.round() as i64;
        for dy in -r..=r {
            for dx in -r..=r {
                let d = ((dx * dx + dy * dy) as f64).sqrt();
                if d > radius {
                    continue;
                }
                let falloff = 1.0 - d / radius;
                let a = (intensity * falloff * falloff).clamp(0.0, 1.0);
                self.blend_px(icx + dx, icy + dy, color.with_opacity(a));
            }
        }
    }

    /// Glyph-run width and vertical extents at `size` px.
    pub fn measure_text(font: &fontdue::Font, text: &str, size: f32) -> TextMetrics {
        let mut width: f64 = 0.0;
        let mut max_ascent: i32 = 0;
        let mut max_descent: i32 = 0;
        for ch in text.chars() {
            let metrics = font.metrics(ch, size);
            let ascent = metrics.height as i32 + metrics.ymin;
            let descent = -metrics.ymin;
            max_ascent = max_ascent.max(ascent);
            max_descent = max_descent.max(descent);
            width += f64::from(metrics.advance_width);
        }
        TextMetrics {
            width,
            ascent: max_ascent,
            descent: max_descent,
        }
    }

    /// Draws a glyph run with its left edge at `x` and baseline at `y`,
    /// blending per-pixel coverage into the surface.
    pub fn draw_text(&mut self, font: &fontdue::Font, text: &str, x: f64, y: f64, size: f32, color: Rgba) {
        let mut cursor_x = x;
        for ch in text.chars() {
            let (metrics, bitmap) = font.rasterize(ch, size);
            let glyph_x = cursor_x.round() as i64 + i64::from(metrics.xmin);
            let glyph_y = y.round() as i64 - (metrics.height as i64 + i64::from(metrics.ymin));
            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let coverage = bitmap[gy * metrics.width + gx];
                    if coverage == 0 {
                        continue;
                    }
                    let a = mul_div255(u16::from(coverage), u16::from(color.a));
                    self.blend_px(
                        glyph_x + gx as i64,
                        glyph_y + gy as i64,
                        Rgba::new(color.r, color.g, color.b, a),
                    );
                }
            }
            cursor_x += f64::from(metrics.advance_width);
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TextMetrics {
    pub width: f64,
    pub ascent: i32,
    pub descent: i32,
}

impl TextMetrics {
    pub fn height(&self) -> f64 {
        f64::from(self.ascent + self.descent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_covers_every_pixel() {
        let mut s = Surface::new(4, 3);
        s.fill(Rgba::rgb(10, 20, 30));
        assert_eq!(s.data().len(), 4 * 3 * 3);
        for y in 0..3 {
            for x in 0..4 {
                assert_eq!(s.pixel(x, y), Rgba::rgb(10, 20, 30));
            }
        }
        s.data_mut()[0] = 99;
        assert_eq!(s.pixel(0, 0).r, 99);
    }

    #[test]
    fn blend_px_clips_and_blends() {
        let mut s = Surface::new(2, 2);
        s.blend_px(-1, 0, Rgba::WHITE);
        s.blend_px(0, 5, Rgba::WHITE);
        s.blend_px(0, 0, Rgba::new(255, 255, 255, 128));
        let p = s.pixel(0, 0);
        assert!(p.r > 120 && p.r < 135, "half blend, got {}", p.r);
        assert_eq!(s.pixel(1, 1), Rgba::BLACK);
    }

    #[test]
    fn opaque_blend_overwrites() {
        let mut s = Surface::new(1, 1);
        s.fill(Rgba::rgb(9, 9, 9));
        s.blend_px(0, 0, Rgba::rgb(200, 100, 50));
        assert_eq!(s.pixel(0, 0), Rgba::rgb(200, 100, 50));
    }

    #[test]
    fn fill_rect_clips_to_surface() {
        let mut s = Surface::new(4, 4);
        s.fill_rect(-10.0, -10.0, 100.0, 100.0, Rgba::WHITE);
        assert_eq!(s.pixel(0, 0), Rgba::WHITE);
        assert_eq!(s.pixel(3, 3), Rgba::WHITE);
    }

    #[test]
    fn degenerate_rect_still_draws_one_pixel_column() {
        let mut s = Surface::new(4, 4);
        s.fill_rect(2.0, 0.0, 2.0, 4.0, Rgba::WHITE);
        assert_eq!(s.pixel(2, 1), Rgba::WHITE);
        assert_eq!(s.pixel(1, 1), Rgba::BLACK);
    }

    #[test]
    fn vgradient_interpolates_rows() {
        let mut s = Surface::new(1, 3);
        s.fill_rect_vgradient(0.0, 0.0, 1.0, 3.0, Rgba::rgb(0, 0, 0), Rgba::rgb(200, 200, 200));
        assert_eq!(s.pixel(0, 0).r, 0);
        assert_eq!(s.pixel(0, 2).r, 200);
        let mid = s.pixel(0, 1).r;
        assert!(mid > 90 && mid < 110, "got {mid}");
    }

    #[test]
    fn polygon_fill_hits_interior_not_exterior() {
        let mut s = Surface::new(10, 10);
        s.fill_polygon(
            &[(2.0, 2.0), (8.0, 2.0), (8.0, 8.0), (2.0, 8.0)],
            Rgba::WHITE,
        );
        assert_eq!(s.pixel(5, 5), Rgba::WHITE);
        assert_eq!(s.pixel(0, 0), Rgba::BLACK);
        assert_eq!(s.pixel(9, 9), Rgba::BLACK);
    }

    #[test]
    fn horizontal_segment_spans_requested_width() {
        let mut s = Surface::new(10, 10);
        s.draw_segment(1.0, 5.0, 9.0, 5.0, 2.0, Rgba::WHITE, LineStyle::Solid);
        assert_eq!(s.pixel(5, 4), Rgba::WHITE);
        assert_eq!(s.pixel(5, 5), Rgba::WHITE);
        assert_eq!(s.pixel(5, 1), Rgba::BLACK);
    }

    #[test]
    fn dashed_segment_leaves_gaps() {
        let mut s = Surface::new(40, 3);
        s.draw_segment(0.0, 1.5, 40.0, 1.5, 1.0, Rgba::WHITE, LineStyle::Dashed);
        let lit: usize = (0..40).filter(|&x| s.pixel(x, 1) == Rgba::WHITE).count();
        assert!(lit > 5, "some pixels on, got {lit}");
        assert!(lit < 40, "gaps expected, got {lit}");
    }

    #[test]
    fn glow_is_brightest_at_center() {
        let mut s = Surface::new(11, 11);
        s.glow_splat(5.0, 5.0, 4.0, Rgba::rgb(255, 200, 0), 0.8);
        let center = s.pixel(5, 5).r;
        let edge = s.pixel(8, 5).r;
        assert!(center > edge);
        assert_eq!(s.pixel(0, 0), Rgba::BLACK);
    }
}
