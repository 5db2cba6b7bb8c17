use crate::color::Rgba;

/// Handle to an element owned by a [`crate::scene::Scene`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ElementId(pub usize);

/// State shared by every drawable primitive.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ElementCommon {
    pub opacity: f64, // 0..1, clamped by writers
    pub visible: bool,
    pub z_order: i32,
}

impl Default for ElementCommon {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            visible: true,
            z_order: 0,
        }
    }
}

impl ElementCommon {
    /// Hidden until an animation reveals it.
    pub fn hidden() -> Self {
        Self {
            opacity: 0.0,
            visible: false,
            z_order: 0,
        }
    }

    pub fn is_drawable(&self) -> bool {
        self.visible && self.opacity > 0.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum VAlign {
    Top,
    Center,
    #[default]
    Bottom,
}

/// Single candlestick positioned at an integer index on the time axis.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    pub common: ElementCommon,
    pub index: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub bull_color: Option<Rgba>,
    pub bear_color: Option<Rgba>,
    pub scale_y: f64,  // vertical squash about the body midpoint
    pub offset_y: f64, // vertical translate, data units
    pub glow_enabled: bool,
    pub glow_radius: f64,
    pub glow_intensity: f64,
}

impl Default for Candle {
    fn default() -> Self {
        Self {
            common: ElementCommon::default(),
            index: 0,
            open: 0.0,
            high: 0.0,
            low: 0.0,
            close: 0.0,
            volume: 0.0,
            bull_color: None,
            bear_color: None,
            scale_y: 1.0,
            offset_y: 0.0,
            glow_enabled: false,
            glow_radius: 3.0,
            glow_intensity: 0.15,
        }
    }
}

impl Candle {
    pub fn is_bull(&self) -> bool {
        self.close >= self.open
    }

    pub fn body_top(&self) -> f64 {
        self.open.max(self.close)
    }

    pub fn body_bottom(&self) -> f64 {
        self.open.min(self.close)
    }

    pub fn body_height(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn mid(&self) -> f64 {
        (self.open + self.close) / 2.0
    }

    /// Open/high/low/close after applying `offset_y` and then `scale_y`
    /// about the (offset) body midpoint.
    pub fn scaled_ohlc(&self) -> (f64, f64, f64, f64) {
        let o = self.open + self.offset_y;
        let h = self.high + self.offset_y;
        let l = self.low + self.offset_y;
        let c = self.close + self.offset_y;
        let mid = (o + c) / 2.0;
        let s = self.scale_y;
        (
            mid + (o - mid) * s,
            mid + (h - mid) * s,
            mid + (l - mid) * s,
            mid + (c - mid) * s,
        )
    }
}

/// Open/close tick bar variant of [`Candle`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct OhlcBar {
    pub common: ElementCommon,
    pub index: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub bull_color: Option<Rgba>,
    pub bear_color: Option<Rgba>,
    pub scale_y: f64,
    pub offset_y: f64,
    pub tick_width: f64,
}

impl Default for OhlcBar {
    fn default() -> Self {
        Self {
            common: ElementCommon::default(),
            index: 0,
            open: 0.0,
            high: 0.0,
            low: 0.0,
            close: 0.0,
            volume: 0.0,
            bull_color: None,
            bear_color: None,
            scale_y: 1.0,
            offset_y: 0.0,
            tick_width: 0.3,
        }
    }
}

impl OhlcBar {
    pub fn is_bull(&self) -> bool {
        self.close >= self.open
    }

    pub fn scaled_ohlc(&self) -> (f64, f64, f64, f64) {
        let o = self.open + self.offset_y;
        let h = self.high + self.offset_y;
        let l = self.low + self.offset_y;
        let c = self.close + self.offset_y;
        let mid = (o + c) / 2.0;
        let s = self.scale_y;
        (
            mid + (o - mid) * s,
            mid + (h - mid) * s,
            mid + (l - mid) * s,
            mid + (c - mid) * s,
        )
    }
}

/// Polyline over ordered data-space samples with progressive reveal.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Line {
    pub common: ElementCommon,
    pub points_x: Vec<f64>,
    pub points_y: Vec<f64>,
    pub color: Rgba,
    pub linewidth: f64,
    pub linestyle: LineStyle,
    pub draw_progress: f64, // fraction of the sample prefix shown
    pub label: String,
}

impl Default for Line {
    fn default() -> Self {
        Self {
            common: ElementCommon::default(),
            points_x: Vec::new(),
            points_y: Vec::new(),
            color: Rgba::from_hex("#2196F3"),
            linewidth: 1.5,
            linestyle: LineStyle::Solid,
            draw_progress: 1.0,
            label: String::new(),
        }
    }
}

/// Number of leading samples exposed by `draw_progress` over `n` samples.
pub fn reveal_count(n: usize, progress: f64) -> usize {
    let p = progress.clamp(0.0, 1.0);
    ((n as f64) * p).floor() as usize
}

impl Line {
    /// Mismatched x/y lengths are truncated to the shorter array.
    pub fn visible_count(&self) -> usize {
        let n = self.points_x.len().min(self.points_y.len());
        reveal_count(n, self.draw_progress)
    }
}

/// Line with a gradient fill down to a baseline.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Area {
    pub common: ElementCommon,
    pub points_x: Vec<f64>,
    pub points_y: Vec<f64>,
    pub color: Rgba,
    pub linewidth: f64,
    pub fill_color: Rgba,
    pub fill_alpha_top: f64,
    pub fill_alpha_bottom: f64,
    pub baseline: Option<f64>, // None: camera price_min at draw time
    pub draw_progress: f64,
    pub label: String,
}

impl Default for Area {
    fn default() -> Self {
        Self {
            common: ElementCommon::default(),
            points_x: Vec::new(),
            points_y: Vec::new(),
            color: Rgba::from_hex("#2196F3"),
            linewidth: 1.5,
            fill_color: Rgba::from_hex("#2196F3"),
            fill_alpha_top: 0.4,
            fill_alpha_bottom: 0.0,
            baseline: None,
            draw_progress: 1.0,
            label: String::new(),
        }
    }
}

impl Area {
    /// Mismatched x/y lengths are truncated to the shorter array.
    pub fn visible_count(&self) -> usize {
        let n = self.points_x.len().min(self.points_y.len());
        reveal_count(n, self.draw_progress)
    }
}

/// Axis-aligned rectangle in data space.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Zone {
    pub common: ElementCommon,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub fill_color: Rgba,
    pub border_color: Option<Rgba>,
    pub border_width: f64,
    pub border_style: LineStyle,
    pub label: String,
    pub label_color: Rgba,
    pub label_size: f64,
    pub extend_right: bool, // stretch x2 to the camera's right edge at draw time
}

impl Default for Zone {
    fn default() -> Self {
        Self {
            common: ElementCommon::default(),
            x1: 0.0,
            y1: 0.0,
            x2: 0.0,
            y2: 0.0,
            fill_color: Rgba::from_hex("#2196F340"),
            border_color: None,
            border_width: 1.0,
            border_style: LineStyle::Solid,
            label: String::new(),
            label_color: Rgba::from_hex("#d1d4dc"),
            label_size: 10.0,
            extend_right: false,
        }
    }
}

impl Zone {
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct TextShadow {
    pub color: Rgba,
    pub offset_x: f64, // pixels at 1x resolution
    pub offset_y: f64,
    pub alpha: f64,
}

impl Default for TextShadow {
    fn default() -> Self {
        Self {
            color: Rgba::BLACK,
            offset_x: 2.0,
            offset_y: 2.0,
            alpha: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct TextOutline {
    pub color: Rgba,
    pub width: f64, // pixels at 1x resolution
}

impl Default for TextOutline {
    fn default() -> Self {
        Self {
            color: Rgba::BLACK,
            width: 3.0,
        }
    }
}

/// Anchored string with typewriter reveal.
///
/// `x`/`y` are data-space when `use_data_coords`, otherwise fractions of the
/// frame (0..1, y up).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Text {
    pub common: ElementCommon,
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub color: Rgba,
    pub font_size: f64,
    pub halign: HAlign,
    pub valign: VAlign,
    pub char_progress: f64, // fraction of the character prefix shown
    pub use_data_coords: bool,
    pub scale: f64,
    pub shadow: Option<TextShadow>,
    pub outline: Option<TextOutline>,
}

impl Default for Text {
    fn default() -> Self {
        Self {
            common: ElementCommon::default(),
            text: String::new(),
            x: 0.0,
            y: 0.0,
            color: Rgba::from_hex("#d1d4dc"),
            font_size: 14.0,
            halign: HAlign::Left,
            valign: VAlign::Bottom,
            char_progress: 1.0,
            use_data_coords: true,
            scale: 1.0,
            shadow: None,
            outline: None,
        }
    }
}

impl Text {
    /// Prefix of the string revealed by `char_progress` (char-aligned).
    pub fn visible_text(&self) -> &str {
        let total = self.text.chars().count();
        let n = reveal_count(total, self.char_progress);
        match self.text.char_indices().nth(n) {
            Some((byte_idx, _)) => &self.text[..byte_idx],
            None => &self.text,
        }
    }
}

/// Horizontal reference line; endpoints default to the camera edges.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HLine {
    pub common: ElementCommon,
    pub y: f64,
    pub color: Rgba,
    pub linewidth: f64,
    pub linestyle: LineStyle,
    pub label: String,
    pub label_color: Option<Rgba>,
    pub label_size: f64,
    pub x_start: Option<f64>,
    pub x_end: Option<f64>,
}

impl Default for HLine {
    fn default() -> Self {
        Self {
            common: ElementCommon::default(),
            y: 0.0,
            color: Rgba::from_hex("#787b86"),
            linewidth: 1.0,
            linestyle: LineStyle::Dashed,
            label: String::new(),
            label_color: None,
            label_size: 10.0,
            x_start: None,
            x_end: None,
        }
    }
}

/// Arrow annotation between two data-space points.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Arrow {
    pub common: ElementCommon,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub color: Rgba,
    pub linewidth: f64,
    pub head_length: f64, // data units along the shaft
    pub label: String,
    pub label_color: Option<Rgba>,
    pub label_size: f64,
}

impl Default for Arrow {
    fn default() -> Self {
        Self {
            common: ElementCommon::default(),
            x1: 0.0,
            y1: 0.0,
            x2: 0.0,
            y2: 0.0,
            color: Rgba::from_hex("#d1d4dc"),
            linewidth: 1.5,
            head_length: 0.2,
            label: String::new(),
            label_color: None,
            label_size: 10.0,
        }
    }
}

/// Filled region between two sample series sharing an x axis.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FillBetween {
    pub common: ElementCommon,
    pub points_x: Vec<f64>,
    pub upper_y: Vec<f64>,
    pub lower_y: Vec<f64>,
    pub fill_color: Rgba,
    pub edge_color: Option<Rgba>,
    pub edge_width: f64,
    pub draw_progress: f64,
    pub label: String,
}

impl Default for FillBetween {
    fn default() -> Self {
        Self {
            common: ElementCommon::default(),
            points_x: Vec::new(),
            upper_y: Vec::new(),
            lower_y: Vec::new(),
            fill_color: Rgba::from_hex("#2196F315"),
            edge_color: None,
            edge_width: 0.5,
            draw_progress: 1.0,
            label: String::new(),
        }
    }
}

impl FillBetween {
    /// Mismatched array lengths are truncated to the shortest of the three.
    pub fn visible_count(&self) -> usize {
        let n = self
            .points_x
            .len()
            .min(self.upper_y.len())
            .min(self.lower_y.len());
        reveal_count(n, self.draw_progress)
    }
}

/// Closed set of drawable primitives. Draw order is decided by the renderer's
/// fixed layer table, not by this enum's ordering.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum Element {
    Candle(Candle),
    OhlcBar(OhlcBar),
    Line(Line),
    Area(Area),
    Zone(Zone),
    Text(Text),
    HLine(HLine),
    Arrow(Arrow),
    FillBetween(FillBetween),
}

impl Element {
    pub fn common(&self) -> &ElementCommon {
        match self {
            Self::Candle(e) => &e.common,
            Self::OhlcBar(e) => &e.common,
            Self::Line(e) => &e.common,
            Self::Area(e) => &e.common,
            Self::Zone(e) => &e.common,
            Self::Text(e) => &e.common,
            Self::HLine(e) => &e.common,
            Self::Arrow(e) => &e.common,
            Self::FillBetween(e) => &e.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut ElementCommon {
        match self {
            Self::Candle(e) => &mut e.common,
            Self::OhlcBar(e) => &mut e.common,
            Self::Line(e) => &mut e.common,
            Self::Area(e) => &mut e.common,
            Self::Zone(e) => &mut e.common,
            Self::Text(e) => &mut e.common,
            Self::HLine(e) => &mut e.common,
            Self::Arrow(e) => &mut e.common,
            Self::FillBetween(e) => &mut e.common,
        }
    }

    pub fn is_drawable(&self) -> bool {
        self.common().is_drawable()
    }

    /// Horizontal sort key used by directional reveals.
    pub fn x_key(&self) -> f64 {
        match self {
            Self::Candle(e) => e.index as f64,
            Self::OhlcBar(e) => e.index as f64,
            Self::Line(e) => e.points_x.first().copied().unwrap_or(0.0),
            Self::Area(e) => e.points_x.first().copied().unwrap_or(0.0),
            Self::Zone(e) => e.x1,
            Self::Text(e) => e.x,
            Self::HLine(e) => e.x_start.unwrap_or(0.0),
            Self::Arrow(e) => e.x1,
            Self::FillBetween(e) => e.points_x.first().copied().unwrap_or(0.0),
        }
    }

    /// Vertical sort key used by directional reveals.
    pub fn y_key(&self) -> f64 {
        match self {
            Self::Candle(e) => e.mid(),
            Self::OhlcBar(e) => (e.open + e.close) / 2.0,
            Self::Line(e) => e.points_y.first().copied().unwrap_or(0.0),
            Self::Area(e) => e.points_y.first().copied().unwrap_or(0.0),
            Self::Zone(e) => e.y1,
            Self::Text(e) => e.y,
            Self::HLine(e) => e.y,
            Self::Arrow(e) => e.y1,
            Self::FillBetween(e) => e.lower_y.first().copied().unwrap_or(0.0),
        }
    }
}

/// Slot-based element storage. Ids stay stable across removals; a removed
/// slot is never reused within one scene.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct ElementStore {
    slots: Vec<Option<Element>>,
}

impl ElementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, element: Element) -> ElementId {
        self.slots.push(Some(element));
        ElementId(self.slots.len() - 1)
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn remove(&mut self, id: ElementId) -> Option<Element> {
        self.slots.get_mut(id.0).and_then(Option::take)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &Element)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|e| (ElementId(i), e)))
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_ids_survive_removal() {
        let mut store = ElementStore::new();
        let a = store.insert(Element::Zone(Zone::default()));
        let b = store.insert(Element::Text(Text::default()));
        assert_eq!(store.len(), 2);
        assert!(store.remove(a).is_some());
        assert!(store.get(a).is_none());
        assert!(store.get(b).is_some(), "later ids must stay valid");
        assert!(store.remove(a).is_none(), "double remove yields nothing");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn candle_accessors() {
        let c = Candle {
            open: 10.0,
            high: 13.0,
            low: 9.0,
            close: 12.0,
            ..Candle::default()
        };
        assert!(c.is_bull());
        assert_eq!(c.body_top(), 12.0);
        assert_eq!(c.body_bottom(), 10.0);
        assert_eq!(c.body_height(), 2.0);
        assert_eq!(c.mid(), 11.0);
    }

    #[test]
    fn candle_scale_y_squashes_about_midpoint() {
        let c = Candle {
            open: 10.0,
            high: 13.0,
            low: 9.0,
            close: 12.0,
            scale_y: 0.5,
            ..Candle::default()
        };
        let (o, h, l, cl) = c.scaled_ohlc();
        assert_eq!(o, 10.5);
        assert_eq!(cl, 11.5);
        assert_eq!(h, 12.0);
        assert_eq!(l, 10.0);
    }

    #[test]
    fn candle_offset_applies_before_scaling() {
        let c = Candle {
            open: 10.0,
            high: 13.0,
            low: 9.0,
            close: 12.0,
            offset_y: 1.0,
            ..Candle::default()
        };
        let (o, h, l, cl) = c.scaled_ohlc();
        assert_eq!((o, h, l, cl), (11.0, 14.0, 10.0, 13.0));
    }

    #[test]
    fn line_reveal_uses_floor_semantics() {
        let line = Line {
            points_x: (0..10).map(f64::from).collect(),
            points_y: vec![0.0; 10],
            draw_progress: 0.35,
            ..Line::default()
        };
        assert_eq!(line.visible_count(), 3);

        let full = Line {
            draw_progress: 1.0,
            ..line.clone()
        };
        assert_eq!(full.visible_count(), 10);

        let none = Line {
            draw_progress: 0.0,
            ..line
        };
        assert_eq!(none.visible_count(), 0);
    }

    #[test]
    fn reveal_truncates_to_the_shorter_point_array() {
        let line = Line {
            points_x: (0..5).map(f64::from).collect(),
            points_y: vec![0.0; 3],
            draw_progress: 1.0,
            ..Line::default()
        };
        assert_eq!(line.visible_count(), 3);

        let area = Area {
            points_x: (0..2).map(f64::from).collect(),
            points_y: vec![0.0; 6],
            draw_progress: 1.0,
            ..Area::default()
        };
        assert_eq!(area.visible_count(), 2);

        let fb = FillBetween {
            points_x: (0..4).map(f64::from).collect(),
            upper_y: vec![2.0; 4],
            lower_y: vec![1.0; 2],
            draw_progress: 1.0,
            ..FillBetween::default()
        };
        assert_eq!(fb.visible_count(), 2);
    }

    #[test]
    fn text_reveal_is_char_aligned() {
        let t = Text {
            text: "héllo".to_string(),
            char_progress: 0.5,
            ..Text::default()
        };
        // floor(5 * 0.5) = 2 chars
        assert_eq!(t.visible_text(), "hé");

        let all = Text {
            char_progress: 1.0,
            ..t
        };
        assert_eq!(all.visible_text(), "héllo");
    }

    #[test]
    fn hidden_common_is_not_drawable() {
        let mut e = Element::Zone(Zone {
            common: ElementCommon::hidden(),
            ..Zone::default()
        });
        assert!(!e.is_drawable());
        e.common_mut().visible = true;
        e.common_mut().opacity = 0.5;
        assert!(e.is_drawable());
    }
}
