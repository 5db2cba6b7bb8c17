use std::path::PathBuf;

use crate::color::Rgba;
use crate::error::{ChartAnimError, ChartAnimResult};

/// Chart colors.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Theme {
    pub background: Rgba,
    pub panel_bg: Rgba,
    pub grid_color: Rgba,
    pub text_color: Rgba,
    pub axis_color: Rgba,
    pub bull_color: Rgba,
    pub bear_color: Rgba,
    pub bull_body: Rgba,
    pub bear_body: Rgba,
    pub bull_wick: Rgba,
    pub bear_wick: Rgba,
    pub volume_bull: Rgba,
    pub volume_bear: Rgba,
    pub accent_colors: Vec<Rgba>,
}

impl Theme {
    /// TradingView-style dark palette.
    pub fn dark() -> Self {
        Self {
            background: Rgba::from_hex("#131722"),
            panel_bg: Rgba::from_hex("#1e222d"),
            grid_color: Rgba::from_hex("#262b3e"),
            text_color: Rgba::from_hex("#d1d4dc"),
            axis_color: Rgba::from_hex("#787b86"),
            bull_color: Rgba::from_hex("#26a69a"),
            bear_color: Rgba::from_hex("#ef5350"),
            bull_body: Rgba::from_hex("#26a69a"),
            bear_body: Rgba::from_hex("#ef5350"),
            bull_wick: Rgba::from_hex("#26a69a"),
            bear_wick: Rgba::from_hex("#ef5350"),
            volume_bull: Rgba::from_hex("#26a69a80"),
            volume_bear: Rgba::from_hex("#ef535080"),
            accent_colors: vec![
                Rgba::from_hex("#2196F3"),
                Rgba::from_hex("#FF9800"),
                Rgba::from_hex("#E040FB"),
                Rgba::from_hex("#00E5FF"),
            ],
        }
    }

    pub fn light() -> Self {
        Self {
            background: Rgba::from_hex("#ffffff"),
            panel_bg: Rgba::from_hex("#f5f5f5"),
            grid_color: Rgba::from_hex("#e0e0e0"),
            text_color: Rgba::from_hex("#333333"),
            axis_color: Rgba::from_hex("#666666"),
            volume_bull: Rgba::from_hex("#26a69a60"),
            volume_bear: Rgba::from_hex("#ef535060"),
            ..Self::dark()
        }
    }

    pub fn black() -> Self {
        Self {
            background: Rgba::from_hex("#000000"),
            panel_bg: Rgba::from_hex("#0a0a0a"),
            grid_color: Rgba::from_hex("#1a1a1a"),
            text_color: Rgba::from_hex("#d1d4dc"),
            axis_color: Rgba::from_hex("#787b86"),
            bull_color: Rgba::from_hex("#11cd83"),
            bear_color: Rgba::from_hex("#f23645"),
            bull_body: Rgba::from_hex("#11cd83"),
            bear_body: Rgba::from_hex("#f23645"),
            bull_wick: Rgba::from_hex("#11cd83"),
            bear_wick: Rgba::from_hex("#f23645"),
            volume_bull: Rgba::from_hex("#11cd8380"),
            volume_bear: Rgba::from_hex("#f2364580"),
            accent_colors: Self::dark().accent_colors,
        }
    }

    pub fn accent(&self, i: usize) -> Rgba {
        if self.accent_colors.is_empty() {
            return self.text_color;
        }
        self.accent_colors[i % self.accent_colors.len()]
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

/// Brightness/contrast/saturation scalars, each neutral at 1.0.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColorGrading {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
}

impl Default for ColorGrading {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
        }
    }
}

/// Whole-frame filter chain, applied in declaration order.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PostFx {
    pub bloom_enabled: bool,
    pub bloom_radius: u32,
    pub bloom_intensity: f64,
    pub vignette_enabled: bool,
    pub vignette_strength: f64,
    pub color_grading: Option<ColorGrading>,
    pub chromatic_aberration_enabled: bool,
    pub chromatic_aberration_offset: f64,
    pub lens_distortion_enabled: bool,
    pub lens_distortion_k: f64, // negative barrel, positive pincushion
}

impl Default for PostFx {
    fn default() -> Self {
        Self {
            bloom_enabled: false,
            bloom_radius: 15,
            bloom_intensity: 0.15,
            vignette_enabled: false,
            vignette_strength: 0.3,
            color_grading: None,
            chromatic_aberration_enabled: false,
            chromatic_aberration_offset: 3.0,
            lens_distortion_enabled: false,
            lens_distortion_k: 0.0,
        }
    }
}

/// Tweenable numeric fields of [`PostFx`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PostFxField {
    BloomIntensity,
    VignetteStrength,
    ChromaticAberrationOffset,
    LensDistortionK,
    GradingBrightness,
    GradingContrast,
    GradingSaturation,
}

impl PostFx {
    pub fn get(&self, field: PostFxField) -> f64 {
        let grading = self.color_grading.unwrap_or_default();
        match field {
            PostFxField::BloomIntensity => self.bloom_intensity,
            PostFxField::VignetteStrength => self.vignette_strength,
            PostFxField::ChromaticAberrationOffset => self.chromatic_aberration_offset,
            PostFxField::LensDistortionK => self.lens_distortion_k,
            PostFxField::GradingBrightness => grading.brightness,
            PostFxField::GradingContrast => grading.contrast,
            PostFxField::GradingSaturation => grading.saturation,
        }
    }

    /// Writing a grading field materializes a neutral [`ColorGrading`] first.
    pub fn set(&mut self, field: PostFxField, value: f64) {
        match field {
            PostFxField::BloomIntensity => self.bloom_intensity = value,
            PostFxField::VignetteStrength => self.vignette_strength = value,
            PostFxField::ChromaticAberrationOffset => self.chromatic_aberration_offset = value,
            PostFxField::LensDistortionK => self.lens_distortion_k = value,
            PostFxField::GradingBrightness => {
                self.color_grading.get_or_insert_with(Default::default).brightness = value;
            }
            PostFxField::GradingContrast => {
                self.color_grading.get_or_insert_with(Default::default).contrast = value;
            }
            PostFxField::GradingSaturation => {
                self.color_grading.get_or_insert_with(Default::default).saturation = value;
            }
        }
    }
}

/// Output and layout settings for a render.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub pixel_format: String,
    pub crf: u32,
    pub preset: String,
    pub theme: Theme,
    pub candle_width: f64, // fraction of one index slot
    pub wick_linewidth: f64,
    pub padding_top: f64,    // fraction of the price range
    pub padding_bottom: f64, // fraction of the price range
    pub padding_right: f64,  // index units after the last candle
    pub price_axis_width: f64, // fraction of frame width
    pub time_axis_height: f64, // fraction of frame height
    pub show_grid: bool,
    pub grid_alpha: f64,
    pub grid_linewidth: f64,
    pub show_volume: bool,
    pub volume_height_ratio: f64, // fraction of the plot height
    pub watermark: Option<String>,
    pub watermark_alpha: f64,
    pub speed_multiplier: f64,
    pub supersample: u32, // render at Nx then downscale
    pub background_gradient: Option<(Rgba, Rgba)>, // top, bottom
    pub candle_shadow: bool,
    pub candle_shadow_offset: (f64, f64), // data units (x, y)
    pub candle_shadow_color: Rgba,
    pub font_path: Option<PathBuf>,
    pub post: PostFx,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 60,
            codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            crf: 18,
            preset: "medium".to_string(),
            theme: Theme::dark(),
            candle_width: 0.6,
            wick_linewidth: 1.2,
            padding_top: 0.05,
            padding_bottom: 0.05,
            padding_right: 3.0,
            price_axis_width: 0.08,
            time_axis_height: 0.06,
            show_grid: true,
            grid_alpha: 0.3,
            grid_linewidth: 0.5,
            show_volume: false,
            volume_height_ratio: 0.15,
            watermark: None,
            watermark_alpha: 0.1,
            speed_multiplier: 1.0,
            supersample: 1,
            background_gradient: None,
            candle_shadow: false,
            candle_shadow_offset: (0.08, -0.08),
            candle_shadow_color: Rgba::from_hex("#00000040"),
            font_path: None,
            post: PostFx::default(),
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> ChartAnimResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ChartAnimError::validation(format!(
                "frame size {}x{} must be nonzero",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(ChartAnimError::validation("fps must be nonzero"));
        }
        if self.supersample == 0 {
            return Err(ChartAnimError::validation("supersample must be at least 1"));
        }
        if !(self.speed_multiplier.is_finite() && self.speed_multiplier > 0.0) {
            return Err(ChartAnimError::validation(format!(
                "speed_multiplier {} must be positive",
                self.speed_multiplier
            )));
        }
        if !(self.candle_width.is_finite() && self.candle_width > 0.0) {
            return Err(ChartAnimError::validation(format!(
                "candle_width {} must be positive",
                self.candle_width
            )));
        }
        if !(0.0..1.0).contains(&self.price_axis_width)
            || !(0.0..1.0).contains(&self.time_axis_height)
        {
            return Err(ChartAnimError::validation(
                "axis fractions must be in [0, 1)",
            ));
        }
        if !(0.0..1.0).contains(&self.volume_height_ratio) {
            return Err(ChartAnimError::validation(
                "volume_height_ratio must be in [0, 1)",
            ));
        }
        Ok(())
    }

    /// Rendered surface size before downsampling.
    pub fn supersampled_size(&self) -> (u32, u32) {
        (self.width * self.supersample, self.height * self.supersample)
    }
}
