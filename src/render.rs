//! Frame rasterization and the render loop.
//!
//! The renderer is read-only over scene state: `Scene::update` mutates, this
//! module only looks. Each frame is rebuilt from scratch on a supersampled
//! surface, downsampled, run through post-processing and streamed to ffmpeg.

use std::path::Path;

use crate::color::Rgba;
use crate::config::RenderConfig;
use crate::element::{Candle, Element, HAlign, LineStyle, VAlign};
use crate::encode::{EncodeConfig, FfmpegEncoder};
use crate::error::{ChartAnimError, ChartAnimResult};
use crate::postfx;
use crate::raster::Surface;
use crate::scene::Scene;

/// Pixel-space mapping for the price panel.
#[derive(Clone, Copy, Debug)]
struct PlotMap {
    // price panel bounds, pixels
    x0: f64,
    y0: f64,
    w: f64,
    h: f64,
    // volume panel bounds (zero-height when volume is off)
    vol_y0: f64,
    vol_h: f64,
    // data-space window
    x_min: f64,
    x_max: f64,
    price_min: f64,
    price_max: f64,
}

impl PlotMap {
    fn x_to_px(&self, x: f64) -> f64 {
        self.x0 + (x - self.x_min) / (self.x_max - self.x_min) * self.w
    }

    fn price_to_py(&self, price: f64) -> f64 {
        self.y0 + (1.0 - (price - self.price_min) / (self.price_max - self.price_min)) * self.h
    }

    /// Pixels per index unit.
    fn x_scale(&self) -> f64 {
        self.w / (self.x_max - self.x_min)
    }

    /// Screen-fraction anchor (y up) to pixel coordinates.
    fn frac_to_px(&self, fx: f64, fy: f64) -> (f64, f64) {
        (self.x0 + fx * self.w, self.y0 + (1.0 - fy) * self.h)
    }
}

pub struct Renderer {
    config: RenderConfig,
    font: Option<fontdue::Font>,
    font_warned: bool,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> ChartAnimResult<Self> {
        config.validate()?;
        let font = match &config.font_path {
            Some(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    ChartAnimError::validation(format!(
                        "failed to read font '{}': {e}",
                        path.display()
                    ))
                })?;
                let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
                    .map_err(|e| {
                        ChartAnimError::validation(format!(
                            "failed to parse font '{}': {e}",
                            path.display()
                        ))
                    })?;
                Some(font)
            }
            None => None,
        };
        Ok(Self {
            config,
            font,
            font_warned: false,
        })
    }

    /// Renders the scene's full timeline to a video file.
    pub fn render_scene(&mut self, scene: &mut Scene, out_path: &Path) -> ChartAnimResult<()> {
        let c = &self.config;
        let total_frames = (scene.total_duration() * f64::from(c.fps)).round() as u64;
        if total_frames == 0 {
            tracing::info!("nothing to render (0 frames)");
            return Ok(());
        }

        tracing::info!(
            frames = total_frames,
            fps = c.fps,
            duration_s = scene.total_duration(),
            size = %format!("{}x{}", c.width, c.height),
            out = %out_path.display(),
            "rendering scene"
        );

        let mut encoder = FfmpegEncoder::new(EncodeConfig::from_render(c, out_path))?;
        let fps = f64::from(self.config.fps);
        let report_every = u64::from(self.config.fps).max(1);

        for frame_idx in 0..total_frames {
            let t = frame_idx as f64 / fps;
            scene.update(t);
            let frame = self.render_frame(scene)?;
            encoder.write_frame(&frame)?;

            if frame_idx % report_every == 0 || frame_idx + 1 == total_frames {
                tracing::info!(
                    frame = frame_idx + 1,
                    total = total_frames,
                    pct = %format!("{:.1}", (frame_idx + 1) as f64 / total_frames as f64 * 100.0),
                    "rendered"
                );
            }
        }

        encoder.finish()?;
        tracing::info!(out = %out_path.display(), "render complete");
        Ok(())
    }

    /// Rasterizes the scene's current state into one packed RGB24 frame at
    /// the target resolution, post-processing included.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn render_frame(&mut self, scene: &Scene) -> ChartAnimResult<Vec<u8>> {
        let ss = self.config.supersample.max(1);
        let (sw, sh) = (self.config.width * ss, self.config.height * ss);
        let mut surface = Surface::new(sw, sh);
        let map = self.plot_map(scene, sw, sh);

        surface.fill(self.config.theme.background);
        self.draw_panels(&mut surface, &map);
        if self.config.show_grid {
            self.draw_grid(&mut surface, &map);
        }

        // fixed layer order, z_order breaking ties within each layer
        self.draw_zones(&mut surface, scene, &map);
        self.draw_fill_betweens(&mut surface, scene, &map);
        self.draw_hlines(&mut surface, scene, &map);
        self.draw_candles(&mut surface, scene, &map);
        self.draw_volume(&mut surface, scene, &map);
        self.draw_lines(&mut surface, scene, &map);
        self.draw_areas(&mut surface, scene, &map);
        self.draw_ohlc_bars(&mut surface, scene, &map);
        self.draw_arrows(&mut surface, scene, &map);
        self.draw_texts(&mut surface, scene, &map);
        self.draw_watermark(&mut surface, &map);
        self.draw_axis_labels(&mut surface, scene, &map);

        let (w, h) = (self.config.width, self.config.height);
        let mut frame = if ss > 1 {
            let img = image::RgbImage::from_raw(sw, sh, surface.into_data())
                .ok_or_else(|| ChartAnimError::evaluation("surface buffer size mismatch"))?;
            let resized =
                image::imageops::resize(&img, w, h, image::imageops::FilterType::Lanczos3);
            resized.into_raw()
        } else {
            surface.into_data()
        };

        postfx::apply(&self.config.post, &mut frame, w, h)?;
        Ok(frame)
    }

    fn plot_map(&self, scene: &Scene, sw: u32, sh: u32) -> PlotMap {
        let c = &self.config;
        let cam = &scene.camera;
        let axis_w = f64::from(sw) * c.price_axis_width;
        let axis_h = f64::from(sh) * c.time_axis_height;
        let plot_w = f64::from(sw) - axis_w;
        let plot_h = f64::from(sh) - axis_h;
        let (vol_h, price_h) = if c.show_volume {
            let v = plot_h * c.volume_height_ratio;
            (v, plot_h - v)
        } else {
            (0.0, plot_h)
        };
        PlotMap {
            x0: 0.0,
            y0: 0.0,
            w: plot_w,
            h: price_h,
            vol_y0: price_h,
            vol_h,
            x_min: cam.view_start - 0.5,
            x_max: cam.view_end + 0.5,
            price_min: cam.price_min,
            price_max: cam.price_max,
        }
    }

    fn draw_panels(&self, surface: &mut Surface, map: &PlotMap) {
        let c = &self.config;
        surface.fill_rect(map.x0, map.y0, map.x0 + map.w, map.y0 + map.h, c.theme.panel_bg);
        if map.vol_h > 0.0 {
            surface.fill_rect(
                map.x0,
                map.vol_y0,
                map.x0 + map.w,
                map.vol_y0 + map.vol_h,
                c.theme.panel_bg,
            );
        }
        if let Some((top, bottom)) = c.background_gradient {
            surface.fill_rect_vgradient(
                map.x0,
                map.y0,
                map.x0 + map.w,
                map.y0 + map.h,
                top,
                bottom,
            );
        }
    }

    fn draw_grid(&self, surface: &mut Surface, map: &PlotMap) {
        let c = &self.config;
        let ss = f64::from(c.supersample.max(1));
        let color = c.theme.grid_color.with_opacity(c.grid_alpha);
        let lw = (c.grid_linewidth * ss).max(1.0);

        for price in price_ticks(map.price_min, map.price_max) {
            let py = map.price_to_py(price);
            surface.draw_segment(map.x0, py, map.x0 + map.w, py, lw, color, LineStyle::Solid);
        }
        for index in index_ticks(map.x_min, map.x_max) {
            let px = map.x_to_px(index as f64);
            surface.draw_segment(px, map.y0, px, map.y0 + map.h, lw, color, LineStyle::Solid);
        }
    }

    fn sorted<'a, T>(
        scene: &'a Scene,
        pick: impl Fn(&'a Element) -> Option<&'a T>,
    ) -> Vec<&'a T>
    where
        T: 'a,
    {
        let mut picked: Vec<(i32, &T)> = scene
            .elements()
            .iter()
            .filter(|(_, e)| e.is_drawable())
            .filter_map(|(_, e)| pick(e).map(|t| (e.common().z_order, t)))
            .collect();
        picked.sort_by_key(|(z, _)| *z);
        picked.into_iter().map(|(_, t)| t).collect()
    }

    fn draw_zones(&mut self, surface: &mut Surface, scene: &Scene, map: &PlotMap) {
        let c = &self.config;
        let ss = f64::from(c.supersample.max(1));
        for zone in Self::sorted(scene, |e| match e {
            Element::Zone(z) => Some(z),
            _ => None,
        }) {
            let opacity = zone.common.opacity;
            let x2 = if zone.extend_right {
                map.x_max
            } else {
                zone.x2
            };
            let (px0, py0) = (map.x_to_px(zone.x1), map.price_to_py(zone.y1));
            let (px1, py1) = (map.x_to_px(x2), map.price_to_py(zone.y2));
            surface.fill_rect(px0, py0, px1, py1, zone.fill_color.with_opacity(opacity));
            if let Some(border) = zone.border_color {
                let bw = (zone.border_width * ss).max(1.0);
                let bc = border.with_opacity(opacity);
                surface.draw_segment(px0, py0, px1, py0, bw, bc, zone.border_style);
                surface.draw_segment(px1, py0, px1, py1, bw, bc, zone.border_style);
                surface.draw_segment(px1, py1, px0, py1, bw, bc, zone.border_style);
                surface.draw_segment(px0, py1, px0, py0, bw, bc, zone.border_style);
            }
            if !zone.label.is_empty() {
                let lx = map.x_to_px(zone.x1 + 0.3);
                let ly = map.price_to_py((zone.y1 + zone.y2) / 2.0);
                self.draw_label(
                    surface,
                    &zone.label,
                    lx,
                    ly,
                    (zone.label_size * ss) as f32,
                    zone.label_color.with_opacity(opacity),
                    HAlign::Left,
                    VAlign::Center,
                );
            }
        }
    }

    fn draw_fill_betweens(&self, surface: &mut Surface, scene: &Scene, map: &PlotMap) {
        let ss = f64::from(self.config.supersample.max(1));
        for fb in Self::sorted(scene, |e| match e {
            Element::FillBetween(f) => Some(f),
            _ => None,
        }) {
            let n = fb.visible_count();
            if n < 2 {
                continue;
            }
            let opacity = fb.common.opacity;
            let mut poly: Vec<(f64, f64)> = Vec::with_capacity(n * 2);
            for i in 0..n {
                poly.push((map.x_to_px(fb.points_x[i]), map.price_to_py(fb.upper_y[i])));
            }
            for i in (0..n).rev() {
                poly.push((map.x_to_px(fb.points_x[i]), map.price_to_py(fb.lower_y[i])));
            }
            surface.fill_polygon(&poly, fb.fill_color.with_opacity(opacity));
            if let Some(edge) = fb.edge_color {
                let ec = edge.with_opacity(opacity);
                let ew = (fb.edge_width * ss).max(1.0);
                for i in 1..n {
                    let (x0, y0) = (map.x_to_px(fb.points_x[i - 1]), map.price_to_py(fb.upper_y[i - 1]));
                    let (x1, y1) = (map.x_to_px(fb.points_x[i]), map.price_to_py(fb.upper_y[i]));
                    surface.draw_segment(x0, y0, x1, y1, ew, ec, LineStyle::Solid);
                    let (x0, y0) = (map.x_to_px(fb.points_x[i - 1]), map.price_to_py(fb.lower_y[i - 1]));
                    let (x1, y1) = (map.x_to_px(fb.points_x[i]), map.price_to_py(fb.lower_y[i]));
                    surface.draw_segment(x0, y0, x1, y1, ew, ec, LineStyle::Solid);
                }
            }
        }
    }

    fn draw_hlines(&mut self, surface: &mut Surface, scene: &Scene, map: &PlotMap) {
        let c = &self.config;
        let ss = f64::from(c.supersample.max(1));
        for hl in Self::sorted(scene, |e| match e {
            Element::HLine(h) => Some(h),
            _ => None,
        }) {
            let opacity = hl.common.opacity;
            let xs = hl.x_start.unwrap_or(map.x_min);
            let xe = hl.x_end.unwrap_or(map.x_max);
            let py = map.price_to_py(hl.y);
            surface.draw_segment(
                map.x_to_px(xs),
                py,
                map.x_to_px(xe),
                py,
                (hl.linewidth * ss).max(1.0),
                hl.color.with_opacity(opacity),
                hl.linestyle,
            );
            if !hl.label.is_empty() {
                let color = hl.label_color.unwrap_or(hl.color).with_opacity(opacity);
                self.draw_label(
                    surface,
                    &hl.label,
                    map.x_to_px(xe + 0.3),
                    py,
                    (hl.label_size * ss) as f32,
                    color,
                    HAlign::Left,
                    VAlign::Center,
                );
            }
        }
    }

    fn body_color(&self, is_bull: bool, bull: Option<Rgba>, bear: Option<Rgba>) -> Rgba {
        if is_bull {
            bull.unwrap_or(self.config.theme.bull_body)
        } else {
            bear.unwrap_or(self.config.theme.bear_body)
        }
    }

    // element overrides win over the theme's wick colors
    fn wick_color(&self, is_bull: bool, bull: Option<Rgba>, bear: Option<Rgba>) -> Rgba {
        if is_bull {
            bull.unwrap_or(self.config.theme.bull_wick)
        } else {
            bear.unwrap_or(self.config.theme.bear_wick)
        }
    }

    fn draw_candles(&self, surface: &mut Surface, scene: &Scene, map: &PlotMap) {
        let c = &self.config;
        let ss = f64::from(c.supersample.max(1));
        let candles = Self::sorted(scene, |e| match e {
            Element::Candle(ca) => Some(ca),
            _ => None,
        });
        let half_w = c.candle_width / 2.0 * map.x_scale();
        let wick_w = (c.wick_linewidth * ss).max(1.0);

        // shadows behind every body
        if c.candle_shadow {
            for candle in &candles {
                let geo = CandleGeo::of(candle, map);
                let (ox, oy) = c.candle_shadow_offset;
                let sx = ox * map.x_scale();
                let sy = -oy * map.h / (map.price_max - map.price_min);
                surface.fill_rect(
                    geo.cx - half_w + sx,
                    geo.body_top_py + sy,
                    geo.cx + half_w + sx,
                    geo.body_bottom_py + sy,
                    c.candle_shadow_color.with_opacity(candle.common.opacity),
                );
            }
        }

        for candle in &candles {
            if candle.glow_enabled {
                let geo = CandleGeo::of(candle, map);
                let body_color =
                    self.body_color(candle.is_bull(), candle.bull_color, candle.bear_color);
                let radius = c.candle_width * candle.glow_radius * map.x_scale();
                surface.glow_splat(
                    geo.cx,
                    (geo.body_top_py + geo.body_bottom_py) / 2.0,
                    radius,
                    body_color,
                    candle.glow_intensity * candle.common.opacity,
                );
            }
        }

        for candle in &candles {
            let geo = CandleGeo::of(candle, map);
            let wick_color = self
                .wick_color(candle.is_bull(), candle.bull_color, candle.bear_color)
                .with_opacity(candle.common.opacity);
            if geo.high_py < geo.body_top_py {
                surface.draw_segment(
                    geo.cx,
                    geo.high_py,
                    geo.cx,
                    geo.body_top_py,
                    wick_w,
                    wick_color,
                    LineStyle::Solid,
                );
            }
            if geo.low_py > geo.body_bottom_py {
                surface.draw_segment(
                    geo.cx,
                    geo.body_bottom_py,
                    geo.cx,
                    geo.low_py,
                    wick_w,
                    wick_color,
                    LineStyle::Solid,
                );
            }
        }

        for candle in &candles {
            let geo = CandleGeo::of(candle, map);
            let body_color = self
                .body_color(candle.is_bull(), candle.bull_color, candle.bear_color)
                .with_opacity(candle.common.opacity);
            surface.fill_rect(
                geo.cx - half_w,
                geo.body_top_py,
                geo.cx + half_w,
                geo.body_bottom_py,
                body_color,
            );
        }
    }

    fn draw_volume(&self, surface: &mut Surface, scene: &Scene, map: &PlotMap) {
        if map.vol_h <= 0.0 {
            return;
        }
        let c = &self.config;
        let candles = Self::sorted(scene, |e| match e {
            Element::Candle(ca) => Some(ca),
            _ => None,
        });
        let max_volume = candles.iter().map(|ca| ca.volume).fold(0.0, f64::max);
        if max_volume <= 0.0 {
            return;
        }
        let half_w = c.candle_width / 2.0 * map.x_scale();
        for candle in candles {
            if candle.volume <= 0.0 {
                continue;
            }
            let color = if candle.is_bull() {
                c.theme.volume_bull
            } else {
                c.theme.volume_bear
            };
            let cx = map.x_to_px(candle.index as f64);
            let bar_h = candle.volume / max_volume * map.vol_h;
            surface.fill_rect(
                cx - half_w,
                map.vol_y0 + map.vol_h - bar_h,
                cx + half_w,
                map.vol_y0 + map.vol_h,
                color.with_opacity(candle.common.opacity),
            );
        }
    }

    fn draw_lines(&mut self, surface: &mut Surface, scene: &Scene, map: &PlotMap) {
        let ss = f64::from(self.config.supersample.max(1));
        for line in Self::sorted(scene, |e| match e {
            Element::Line(l) => Some(l),
            _ => None,
        }) {
            let n = line.visible_count();
            if n < 2 {
                continue;
            }
            let color = line.color.with_opacity(line.common.opacity);
            let lw = (line.linewidth * ss).max(1.0);
            for i in 1..n {
                surface.draw_segment(
                    map.x_to_px(line.points_x[i - 1]),
                    map.price_to_py(line.points_y[i - 1]),
                    map.x_to_px(line.points_x[i]),
                    map.price_to_py(line.points_y[i]),
                    lw,
                    color,
                    line.linestyle,
                );
            }
            if !line.label.is_empty() && line.draw_progress >= 1.0 {
                self.draw_label(
                    surface,
                    &line.label,
                    map.x_to_px(line.points_x[n - 1] + 0.5),
                    map.price_to_py(line.points_y[n - 1]),
                    (9.0 * ss) as f32,
                    color,
                    HAlign::Left,
                    VAlign::Center,
                );
            }
        }
    }

    fn draw_areas(&mut self, surface: &mut Surface, scene: &Scene, map: &PlotMap) {
        let ss = f64::from(self.config.supersample.max(1));
        for area in Self::sorted(scene, |e| match e {
            Element::Area(a) => Some(a),
            _ => None,
        }) {
            let n = area.visible_count();
            if n < 2 {
                continue;
            }
            let opacity = area.common.opacity;
            let baseline = area.baseline.unwrap_or(map.price_min);
            let base_py = map.price_to_py(baseline);
            let top_price = area.points_y[..n].iter().fold(f64::MIN, |a, &b| a.max(b));
            let top_py = map.price_to_py(top_price.max(baseline));
            let grad_span = (base_py - top_py).max(1.0);

            // column fill with a vertical alpha ramp toward the baseline
            for i in 1..n {
                let (xa, ya) = (map.x_to_px(area.points_x[i - 1]), map.price_to_py(area.points_y[i - 1]));
                let (xb, yb) = (map.x_to_px(area.points_x[i]), map.price_to_py(area.points_y[i]));
                let px0 = xa.round() as i64;
                let px1 = xb.round() as i64;
                if px1 <= px0 {
                    continue;
                }
                for px in px0..px1 {
                    let t = (px as f64 + 0.5 - xa) / (xb - xa);
                    let curve_py = ya + (yb - ya) * t.clamp(0.0, 1.0);
                    let y_start = curve_py.round() as i64;
                    let y_end = base_py.round() as i64;
                    for py in y_start..y_end {
                        let frac = 1.0 - (py as f64 - top_py) / grad_span;
                        let alpha = area.fill_alpha_bottom
                            + (area.fill_alpha_top - area.fill_alpha_bottom) * frac.clamp(0.0, 1.0);
                        surface.blend_px(px, py, area.fill_color.with_opacity(alpha * opacity));
                    }
                }
            }

            let color = area.color.with_opacity(opacity);
            let lw = (area.linewidth * ss).max(1.0);
            for i in 1..n {
                surface.draw_segment(
                    map.x_to_px(area.points_x[i - 1]),
                    map.price_to_py(area.points_y[i - 1]),
                    map.x_to_px(area.points_x[i]),
                    map.price_to_py(area.points_y[i]),
                    lw,
                    color,
                    LineStyle::Solid,
                );
            }
            if !area.label.is_empty() && area.draw_progress >= 1.0 {
                self.draw_label(
                    surface,
                    &area.label,
                    map.x_to_px(area.points_x[n - 1] + 0.5),
                    map.price_to_py(area.points_y[n - 1]),
                    (9.0 * ss) as f32,
                    color,
                    HAlign::Left,
                    VAlign::Center,
                );
            }
        }
    }

    fn draw_ohlc_bars(&self, surface: &mut Surface, scene: &Scene, map: &PlotMap) {
        let c = &self.config;
        let ss = f64::from(c.supersample.max(1));
        let lw = (c.wick_linewidth * ss).max(1.0);
        for bar in Self::sorted(scene, |e| match e {
            Element::OhlcBar(b) => Some(b),
            _ => None,
        }) {
            let color = if bar.is_bull() {
                bar.bull_color.unwrap_or(c.theme.bull_color)
            } else {
                bar.bear_color.unwrap_or(c.theme.bear_color)
            }
            .with_opacity(bar.common.opacity);
            let (o, h, l, cl) = bar.scaled_ohlc();
            let cx = map.x_to_px(bar.index as f64);
            let tick = bar.tick_width * map.x_scale();
            surface.draw_segment(
                cx,
                map.price_to_py(l),
                cx,
                map.price_to_py(h),
                lw,
                color,
                LineStyle::Solid,
            );
            let o_py = map.price_to_py(o);
            surface.draw_segment(cx - tick, o_py, cx, o_py, lw, color, LineStyle::Solid);
            let c_py = map.price_to_py(cl);
            surface.draw_segment(cx, c_py, cx + tick, c_py, lw, color, LineStyle::Solid);
        }
    }

    fn draw_arrows(&mut self, surface: &mut Surface, scene: &Scene, map: &PlotMap) {
        let ss = f64::from(self.config.supersample.max(1));
        for arrow in Self::sorted(scene, |e| match e {
            Element::Arrow(a) => Some(a),
            _ => None,
        }) {
            let opacity = arrow.common.opacity;
            let color = arrow.color.with_opacity(opacity);
            let lw = (arrow.linewidth * ss).max(1.0);
            let (x1, y1) = (map.x_to_px(arrow.x1), map.price_to_py(arrow.y1));
            let (x2, y2) = (map.x_to_px(arrow.x2), map.price_to_py(arrow.y2));
            surface.draw_segment(x1, y1, x2, y2, lw, color, LineStyle::Solid);

            // open arrow head: two barbs swept back from the tip
            let len = ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt();
            if len > 1e-9 {
                let head = arrow.head_length * map.x_scale();
                let (ux, uy) = ((x2 - x1) / len, (y2 - y1) / len);
                for side in [-1.0, 1.0] {
                    let angle = side * std::f64::consts::FRAC_PI_6;
                    let (sin, cos) = angle.sin_cos();
                    let bx = x2 - head * (ux * cos - uy * sin);
                    let by = y2 - head * (ux * sin + uy * cos);
                    surface.draw_segment(x2, y2, bx, by, lw, color, LineStyle::Solid);
                }
            }

            if !arrow.label.is_empty() {
                let color = arrow.label_color.unwrap_or(arrow.color).with_opacity(opacity);
                self.draw_label(
                    surface,
                    &arrow.label,
                    (x1 + x2) / 2.0,
                    (y1 + y2) / 2.0,
                    (arrow.label_size * ss) as f32,
                    color,
                    HAlign::Center,
                    VAlign::Bottom,
                );
            }
        }
    }

    fn draw_texts(&mut self, surface: &mut Surface, scene: &Scene, map: &PlotMap) {
        let ss = f64::from(self.config.supersample.max(1));
        for txt in Self::sorted(scene, |e| match e {
            Element::Text(t) => Some(t),
            _ => None,
        }) {
            let shown = txt.visible_text();
            if shown.is_empty() {
                continue;
            }
            let size = (txt.font_size * txt.scale * ss) as f32;
            if size < 0.5 {
                continue;
            }
            let opacity = txt.common.opacity;
            let (ax, ay) = if txt.use_data_coords {
                (map.x_to_px(txt.x), map.price_to_py(txt.y))
            } else {
                map.frac_to_px(txt.x, txt.y)
            };

            if let Some(shadow) = txt.shadow {
                self.draw_label(
                    surface,
                    shown,
                    ax + shadow.offset_x * ss,
                    ay + shadow.offset_y * ss,
                    size,
                    shadow.color.with_opacity(opacity * shadow.alpha),
                    txt.halign,
                    txt.valign,
                );
            }
            if let Some(outline) = txt.outline {
                let w = (outline.width * ss).max(1.0);
                let color = outline.color.with_opacity(opacity);
                for (dx, dy) in [
                    (-w, 0.0),
                    (w, 0.0),
                    (0.0, -w),
                    (0.0, w),
                    (-w, -w),
                    (w, -w),
                    (-w, w),
                    (w, w),
                ] {
                    self.draw_label(
                        surface,
                        shown,
                        ax + dx,
                        ay + dy,
                        size,
                        color,
                        txt.halign,
                        txt.valign,
                    );
                }
            }
            self.draw_label(
                surface,
                shown,
                ax,
                ay,
                size,
                txt.color.with_opacity(opacity),
                txt.halign,
                txt.valign,
            );
        }
    }

    fn draw_watermark(&mut self, surface: &mut Surface, map: &PlotMap) {
        let c = &self.config;
        let Some(watermark) = c.watermark.clone() else {
            return;
        };
        let ss = f64::from(c.supersample.max(1));
        let (cx, cy) = map.frac_to_px(0.5, 0.5);
        let color = c.theme.text_color.with_opacity(c.watermark_alpha);
        self.draw_label(
            surface,
            &watermark,
            cx,
            cy,
            (48.0 * ss) as f32,
            color,
            HAlign::Center,
            VAlign::Center,
        );
    }

    fn draw_axis_labels(&mut self, surface: &mut Surface, scene: &Scene, map: &PlotMap) {
        if self.font.is_none() {
            return;
        }
        let c = &self.config;
        let ss = f64::from(c.supersample.max(1));
        let size = (9.0 * ss) as f32;
        let color = c.theme.axis_color;

        for price in price_ticks(map.price_min, map.price_max) {
            let py = map.price_to_py(price);
            self.draw_label(
                surface,
                &format_price(price),
                map.x0 + map.w + 4.0 * ss,
                py,
                size,
                color,
                HAlign::Left,
                VAlign::Center,
            );
        }

        let labels = scene.time_labels();
        let axis_top = map.vol_y0 + map.vol_h;
        for index in index_ticks(map.x_min, map.x_max) {
            let text = if index >= 0 {
                labels.get(index as usize).cloned()
            } else {
                None
            };
            let text = match text {
                Some(t) if !t.is_empty() => t,
                _ => continue,
            };
            let px = map.x_to_px(index as f64);
            self.draw_label(
                surface,
                &text,
                px,
                axis_top + 12.0 * ss,
                size,
                color,
                HAlign::Center,
                VAlign::Center,
            );
        }
    }

    /// Draws an aligned glyph run; silently skips (with a one-time warning)
    /// when no font is configured.
    #[allow(clippy::too_many_arguments)]
    fn draw_label(
        &mut self,
        surface: &mut Surface,
        text: &str,
        x: f64,
        y: f64,
        size: f32,
        color: Rgba,
        halign: HAlign,
        valign: VAlign,
    ) {
        let Some(font) = self.font.as_ref() else {
            if !self.font_warned {
                self.font_warned = true;
                tracing::warn!("no font configured; text elements and labels are skipped");
            }
            return;
        };
        let metrics = Surface::measure_text(font, text, size);
        let left = match halign {
            HAlign::Left => x,
            HAlign::Center => x - metrics.width / 2.0,
            HAlign::Right => x - metrics.width,
        };
        let baseline = match valign {
            VAlign::Top => y + f64::from(metrics.ascent),
            VAlign::Center => y + f64::from(metrics.ascent) - metrics.height() / 2.0,
            VAlign::Bottom => y - f64::from(metrics.descent),
        };
        surface.draw_text(font, text, left, baseline, size, color);
    }
}

/// Geometry of one candle in pixel space, body already scaled and offset.
struct CandleGeo {
    cx: f64,
    high_py: f64,
    low_py: f64,
    body_top_py: f64,
    body_bottom_py: f64,
}

impl CandleGeo {
    fn of(candle: &Candle, map: &PlotMap) -> Self {
        let (o, h, l, cl) = candle.scaled_ohlc();
        let body_bottom = o.min(cl);
        // degenerate doji bodies keep a sliver of height
        let body_h = (cl - o).abs().max((h - l) * 0.01);
        let body_top = body_bottom + body_h;
        Self {
            cx: map.x_to_px(candle.index as f64),
            high_py: map.price_to_py(h),
            low_py: map.price_to_py(l),
            body_top_py: map.price_to_py(body_top),
            body_bottom_py: map.price_to_py(body_bottom),
        }
    }
}

fn format_price(price: f64) -> String {
    if price.abs() >= 1000.0 {
        format!("{price:.0}")
    } else {
        format!("{price:.2}")
    }
}

/// Roughly five horizontal price gridlines at a round step.
fn price_ticks(min: f64, max: f64) -> Vec<f64> {
    let range = max - min;
    if !(range.is_finite() && range > 0.0) {
        return Vec::new();
    }
    let step = nice_step(range / 5.0);
    let mut ticks = Vec::new();
    let mut v = (min / step).ceil() * step;
    while v < max {
        ticks.push(v);
        v += step;
    }
    ticks
}

/// Vertical gridline indices, thinned to at most ~8 across the view.
fn index_ticks(x_min: f64, x_max: f64) -> Vec<i64> {
    let first = x_min.ceil() as i64;
    let last = x_max.floor() as i64;
    if last < first {
        return Vec::new();
    }
    let count = (last - first + 1) as usize;
    let step = (count / 8).max(1) as i64;
    (first..=last).step_by(step as usize).collect()
}

fn nice_step(raw: f64) -> f64 {
    if !(raw.is_finite() && raw > 0.0) {
        return 1.0;
    }
    let mag = 10f64.powf(raw.log10().floor());
    let norm = raw / mag;
    let factor = if norm < 1.5 {
        1.0
    } else if norm < 3.0 {
        2.0
    } else if norm < 7.0 {
        5.0
    } else {
        10.0
    };
    factor * mag
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::Animation;
    use crate::anim_ops::{AnimKind, AppearStyle};
    use crate::element::{ElementCommon, Zone};
    use crate::series::{CandleSeries, OhlcRecord};

    fn small_config() -> RenderConfig {
        RenderConfig {
            width: 64,
            height: 48,
            fps: 30,
            show_grid: false,
            ..RenderConfig::default()
        }
    }

    fn scene_with_candles() -> Scene {
        let mut scene = Scene::new(small_config()).unwrap();
        let series = CandleSeries::from_records(vec![
            OhlcRecord::new(10.0, 13.0, 9.0, 12.0),
            OhlcRecord::new(12.0, 12.5, 10.5, 11.0),
            OhlcRecord::new(11.0, 14.0, 11.0, 13.5),
        ])
        .unwrap();
        let ids = scene.add_elements(series.candle_elements());
        let anim = Animation::new(AnimKind::CandlesAppear {
            targets: ids,
            style: AppearStyle::All,
            auto_camera: true,
        })
        .with_duration(1.0);
        scene.play(vec![anim]).unwrap();
        scene
    }

    #[test]
    fn frame_has_exact_rgb24_length() {
        let mut scene = scene_with_candles();
        scene.update(1.0);
        let mut renderer = Renderer::new(small_config()).unwrap();
        let frame = renderer.render_frame(&scene).unwrap();
        assert_eq!(frame.len(), 64 * 48 * 3);
    }

    #[test]
    fn frame_rendering_is_deterministic() {
        let mut scene = scene_with_candles();
        scene.update(1.0);
        let mut renderer = Renderer::new(small_config()).unwrap();
        let a = renderer.render_frame(&scene).unwrap();
        let b = renderer.render_frame(&scene).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn revealed_candles_change_the_frame() {
        let mut scene = scene_with_candles();
        let mut renderer = Renderer::new(small_config()).unwrap();
        scene.update(0.0);
        let before = renderer.render_frame(&scene).unwrap();
        scene.update(1.0);
        let after = renderer.render_frame(&scene).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn supersampled_frame_downsamples_to_target_size() {
        let mut scene = scene_with_candles();
        scene.update(1.0);
        let cfg = RenderConfig {
            supersample: 2,
            ..small_config()
        };
        let mut renderer = Renderer::new(cfg).unwrap();
        let frame = renderer.render_frame(&scene).unwrap();
        assert_eq!(frame.len(), 64 * 48 * 3);
    }

    #[test]
    fn hidden_elements_do_not_draw() {
        let cfg = small_config();
        let mut scene = Scene::new(cfg.clone()).unwrap();
        scene.add_element(Element::Zone(Zone {
            common: ElementCommon::hidden(),
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 100.0,
            fill_color: Rgba::rgb(255, 0, 0),
            ..Zone::default()
        }));
        let mut renderer = Renderer::new(cfg).unwrap();
        let with_hidden = renderer.render_frame(&scene).unwrap();

        let empty_scene = Scene::new(small_config()).unwrap();
        let empty = renderer.render_frame(&empty_scene).unwrap();
        assert_eq!(with_hidden, empty);
    }

    #[test]
    fn mismatched_point_arrays_render_the_shared_prefix() {
        use crate::element::{Area, FillBetween, Line};

        let cfg = small_config();
        let mut scene = Scene::new(cfg.clone()).unwrap();
        scene.add_element(Element::Line(Line {
            points_x: (0..5).map(f64::from).collect(),
            points_y: vec![10.0, 11.0, 12.0],
            ..Line::default()
        }));
        scene.add_element(Element::Area(Area {
            points_x: (0..3).map(f64::from).collect(),
            points_y: vec![10.0, 12.0, 11.0, 13.0, 9.0],
            ..Area::default()
        }));
        scene.add_element(Element::FillBetween(FillBetween {
            points_x: (0..4).map(f64::from).collect(),
            upper_y: vec![12.0; 4],
            lower_y: vec![10.0; 2],
            ..FillBetween::default()
        }));

        let mut renderer = Renderer::new(cfg).unwrap();
        let frame = renderer.render_frame(&scene).unwrap();
        assert_eq!(frame.len(), 64 * 48 * 3);
    }

    #[test]
    fn missing_font_file_is_a_validation_error() {
        let cfg = RenderConfig {
            font_path: Some("/definitely/not/a/font.ttf".into()),
            ..small_config()
        };
        assert!(matches!(
            Renderer::new(cfg),
            Err(ChartAnimError::Validation(_))
        ));
    }

    #[test]
    fn tick_helpers_produce_round_values() {
        assert_eq!(nice_step(0.9), 1.0);
        assert_eq!(nice_step(1.8), 2.0);
        assert_eq!(nice_step(4.0), 5.0);
        assert_eq!(nice_step(80.0), 100.0);

        let ticks = price_ticks(0.0, 10.0);
        assert!(!ticks.is_empty());
        assert!(ticks.iter().all(|t| *t >= 0.0 && *t < 10.0));

        assert_eq!(index_ticks(2.5, 2.0), Vec::<i64>::new());
        assert_eq!(index_ticks(-0.5, 3.5), vec![0, 1, 2, 3]);
    }
}
