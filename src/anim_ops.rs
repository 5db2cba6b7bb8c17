//! The animation catalogue.
//!
//! Every kind keeps whatever starting snapshot it needs inside its own
//! variant, filled in by `on_activate`. Progress hooks are pure functions of
//! the eased progress and that snapshot, so re-evaluating a frame is
//! idempotent.

use std::f64::consts::TAU;

use crate::anim::Stage;
use crate::anim_ease::Ease;
use crate::camera::CameraSnapshot;
use crate::color::Rgba;
use crate::config::PostFxField;
use crate::element::{Element, ElementId, ElementStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AppearStyle {
    /// Every candle fades in together.
    All,
    /// Left-to-right reveal, one candle after another.
    Sequential,
    /// Sequential, sliding up into place from below.
    SlideUp,
    /// Sequential, scaling up from the body midpoint.
    Pop,
    /// Overlapping left-to-right fade.
    Cascade,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

/// Captured screen-space endpoints for the slide animations.
#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct SlideTrack {
    pub start_x: f64,
    pub start_y: f64,
    pub target_x: f64,
    pub target_y: f64,
}

/// One post-processing scalar driven from `from` to `to`.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct PostFxTween {
    pub field: PostFxField,
    pub from: f64,
    pub to: f64,
}

/// A described one-shot mutation, applied when the animation activates.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum PropChange {
    Opacity { target: ElementId, value: f64 },
    Visible { target: ElementId, value: bool },
    ZOrder { target: ElementId, value: i32 },
    DrawProgress { target: ElementId, value: f64 },
    CharProgress { target: ElementId, value: f64 },
    ScaleY { target: ElementId, value: f64 },
    OffsetY { target: ElementId, value: f64 },
    Detach { target: ElementId },
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum AnimKind {
    CandlesAppear {
        targets: Vec<ElementId>,
        style: AppearStyle,
        auto_camera: bool,
    },
    CandleGrow {
        targets: Vec<ElementId>,
        sequential: bool,
        auto_camera: bool,
    },
    FadeIn {
        targets: Vec<ElementId>,
    },
    FadeOut {
        targets: Vec<ElementId>,
        detach: bool,
    },
    StaggeredFadeIn {
        targets: Vec<ElementId>,
        stagger: f64,
        fade_duration: f64,
    },
    DrawLine {
        target: ElementId,
    },
    TypeText {
        target: ElementId,
    },
    HighlightZone {
        target: ElementId,
    },
    PanCamera {
        view_start: f64,
        view_end: f64,
        price_min: Option<f64>,
        price_max: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<CameraSnapshot>,
    },
    ZoomTo {
        start_index: i64,
        end_index: i64,
        padding: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<CameraSnapshot>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<CameraSnapshot>,
    },
    FlashCandle {
        target: ElementId,
        color: Rgba,
        cycles: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        original: Option<(Option<Rgba>, Option<Rgba>)>,
    },
    ColorShift {
        target: ElementId,
        from: Rgba,
        to: Rgba,
    },
    SlideIn {
        target: ElementId,
        direction: Direction,
        distance: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        track: Option<SlideTrack>,
    },
    SlideOut {
        target: ElementId,
        direction: Direction,
        distance: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        track: Option<SlideTrack>,
    },
    ScaleIn {
        target: ElementId,
    },
    BounceIn {
        target: ElementId,
    },
    Pulse {
        targets: Vec<ElementId>,
        min_opacity: f64,
        max_opacity: f64,
        cycles: u32,
    },
    Shake {
        target: ElementId,
        amplitude: f64,
        frequency: f64,
    },
    MorphLine {
        target: ElementId,
        target_y: Vec<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_y: Option<Vec<f64>>,
    },
    Wipe {
        targets: Vec<ElementId>,
        direction: Direction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order: Option<Vec<ElementId>>,
    },
    TweenPostFx {
        tweens: Vec<PostFxTween>,
    },
    ApplyProps {
        changes: Vec<PropChange>,
    },
}

/// Per-member reveal fraction inside a sequential group of `n`.
fn local_progress(reveal: f64, i: usize) -> f64 {
    (reveal - i as f64).clamp(0.0, 1.0)
}

fn set_opacity(store: &mut ElementStore, id: ElementId, value: f64) {
    if let Some(e) = store.get_mut(id) {
        e.common_mut().opacity = value;
    }
}

fn set_visible(store: &mut ElementStore, id: ElementId, value: bool) {
    if let Some(e) = store.get_mut(id) {
        e.common_mut().visible = value;
    }
}

fn show(store: &mut ElementStore, id: ElementId, opacity: f64) {
    if let Some(e) = store.get_mut(id) {
        let c = e.common_mut();
        c.visible = true;
        c.opacity = opacity;
    }
}

fn set_candle_pose(store: &mut ElementStore, id: ElementId, scale_y: f64, offset_y: f64) {
    match store.get_mut(id) {
        Some(Element::Candle(c)) => {
            c.scale_y = scale_y;
            c.offset_y = offset_y;
        }
        Some(Element::OhlcBar(b)) => {
            b.scale_y = scale_y;
            b.offset_y = offset_y;
        }
        _ => {}
    }
}

fn set_draw_progress(store: &mut ElementStore, id: ElementId, value: f64) {
    match store.get_mut(id) {
        Some(Element::Line(l)) => l.draw_progress = value,
        Some(Element::Area(a)) => a.draw_progress = value,
        Some(Element::FillBetween(f)) => f.draw_progress = value,
        _ => {}
    }
}

/// Writes into the variant's main color slot; candles and OHLC bars get the
/// value as both bull and bear overrides.
fn set_primary_color(store: &mut ElementStore, id: ElementId, color: Rgba) {
    match store.get_mut(id) {
        Some(Element::Line(l)) => l.color = color,
        Some(Element::Area(a)) => a.color = color,
        Some(Element::Text(t)) => t.color = color,
        Some(Element::HLine(h)) => h.color = color,
        Some(Element::Arrow(ar)) => ar.color = color,
        Some(Element::Zone(z)) => z.fill_color = color,
        Some(Element::FillBetween(f)) => f.fill_color = color,
        Some(Element::Candle(c)) => {
            c.bull_color = Some(color);
            c.bear_color = Some(color);
        }
        Some(Element::OhlcBar(b)) => {
            b.bull_color = Some(color);
            b.bear_color = Some(color);
        }
        None => {}
    }
}

fn candle_price_span(store: &ElementStore, id: ElementId) -> f64 {
    match store.get(id) {
        Some(Element::Candle(c)) => c.high - c.low,
        Some(Element::OhlcBar(b)) => b.high - b.low,
        _ => 0.0,
    }
}

fn fit_camera_to(stage: &mut Stage<'_>, targets: &[ElementId]) {
    let fit = stage.fit;
    stage
        .camera
        .fit_to_candles(targets.iter().filter_map(|id| stage.elements.get(*id)), fit);
}

fn slide_delta(direction: Direction, distance: f64) -> (f64, f64) {
    match direction {
        Direction::Left => (-distance, 0.0),
        Direction::Right => (distance, 0.0),
        Direction::Up => (0.0, distance),
        Direction::Down => (0.0, -distance),
    }
}

fn text_position(store: &ElementStore, id: ElementId) -> (f64, f64) {
    match store.get(id) {
        Some(Element::Text(t)) => (t.x, t.y),
        _ => (0.0, 0.0),
    }
}

fn set_text_position(store: &mut ElementStore, id: ElementId, x: f64, y: f64) {
    if let Some(Element::Text(t)) = store.get_mut(id) {
        t.x = x;
        t.y = y;
    }
}

fn set_text_scale(store: &mut ElementStore, id: ElementId, scale: f64) {
    if let Some(Element::Text(t)) = store.get_mut(id) {
        t.scale = scale;
    }
}

impl AnimKind {
    pub fn default_duration(&self) -> f64 {
        match self {
            Self::CandlesAppear { .. } => 3.0,
            Self::CandleGrow { .. } => 1.0,
            Self::FadeIn { .. } | Self::FadeOut { .. } => 0.5,
            Self::StaggeredFadeIn {
                targets,
                stagger,
                fade_duration,
            } => fade_duration + stagger * targets.len().saturating_sub(1) as f64,
            Self::DrawLine { .. } => 2.0,
            Self::TypeText { .. } => 1.0,
            Self::HighlightZone { .. } => 0.8,
            Self::PanCamera { .. } | Self::ZoomTo { .. } => 1.5,
            Self::FlashCandle { .. } | Self::ColorShift { .. } => 1.0,
            Self::SlideIn { .. } => 0.6,
            Self::SlideOut { .. } | Self::ScaleIn { .. } | Self::Shake { .. } => 0.5,
            Self::BounceIn { .. } => 0.7,
            Self::Pulse { .. } => 1.5,
            Self::MorphLine { .. } | Self::Wipe { .. } => 1.0,
            Self::TweenPostFx { .. } => 2.0,
            Self::ApplyProps { .. } => 0.0,
        }
    }

    pub fn default_easing(&self) -> Ease {
        match self {
            Self::CandlesAppear {
                style: AppearStyle::Pop,
                ..
            } => Ease::OutBack,
            Self::CandlesAppear { .. }
            | Self::CandleGrow { .. }
            | Self::FadeIn { .. }
            | Self::FadeOut { .. }
            | Self::HighlightZone { .. }
            | Self::ColorShift { .. }
            | Self::SlideIn { .. } => Ease::OutCubic,
            Self::StaggeredFadeIn { .. }
            | Self::TypeText { .. }
            | Self::FlashCandle { .. }
            | Self::Pulse { .. }
            | Self::Shake { .. }
            | Self::ApplyProps { .. } => Ease::Linear,
            Self::DrawLine { .. }
            | Self::PanCamera { .. }
            | Self::ZoomTo { .. }
            | Self::SlideOut { .. }
            | Self::MorphLine { .. }
            | Self::Wipe { .. }
            | Self::TweenPostFx { .. } => Ease::InOutCubic,
            Self::ScaleIn { .. } => Ease::OutBack,
            Self::BounceIn { .. } => Ease::OutBounce,
        }
    }

    pub fn on_activate(&mut self, stage: &mut Stage<'_>) {
        match self {
            Self::CandlesAppear { .. } => {}

            Self::CandleGrow { targets, .. } => {
                for id in targets.iter() {
                    show(stage.elements, *id, 0.0);
                    set_candle_pose(stage.elements, *id, 0.0, 0.0);
                }
            }

            Self::FadeIn { targets } | Self::StaggeredFadeIn { targets, .. } => {
                for id in targets.iter() {
                    show(stage.elements, *id, 0.0);
                }
            }

            Self::Wipe {
                targets,
                direction,
                order,
            } => {
                for id in targets.iter() {
                    show(stage.elements, *id, 0.0);
                }
                let key = |id: ElementId| match direction {
                    Direction::Left => element_x(stage.elements, id),
                    Direction::Right => -element_x(stage.elements, id),
                    Direction::Down => element_y(stage.elements, id),
                    Direction::Up => -element_y(stage.elements, id),
                };
                let mut sorted = targets.clone();
                sorted.sort_by(|a, b| key(*a).total_cmp(&key(*b)));
                *order = Some(sorted);
            }

            Self::FadeOut { .. } => {}

            Self::DrawLine { target } => {
                show(stage.elements, *target, 1.0);
                set_draw_progress(stage.elements, *target, 0.0);
            }

            Self::TypeText { target } => {
                show(stage.elements, *target, 1.0);
                if let Some(Element::Text(t)) = stage.elements.get_mut(*target) {
                    t.char_progress = 0.0;
                }
            }

            Self::HighlightZone { target } => {
                show(stage.elements, *target, 0.0);
            }

            Self::PanCamera { from, .. } => {
                *from = Some(stage.camera.snapshot());
            }

            Self::ZoomTo {
                start_index,
                end_index,
                padding,
                from,
                to,
            } => {
                let snap = stage.camera.snapshot();
                *from = Some(snap);

                let mut lo = f64::MAX;
                let mut hi = f64::MIN;
                for e in stage.elements.elements() {
                    let (index, low, high) = match e {
                        Element::Candle(c) => (c.index, c.low, c.high),
                        Element::OhlcBar(b) => (b.index, b.low, b.high),
                        _ => continue,
                    };
                    if index >= *start_index && index <= *end_index {
                        lo = lo.min(low);
                        hi = hi.max(high);
                    }
                }
                *to = if lo > hi {
                    Some(snap) // no candles in range: hold the current view
                } else {
                    let range = hi - lo;
                    Some(CameraSnapshot {
                        view_start: *start_index as f64 - 1.0,
                        view_end: *end_index as f64 + 3.0,
                        price_min: lo - range * *padding,
                        price_max: hi + range * *padding,
                    })
                };
            }

            Self::FlashCandle {
                target, original, ..
            } => {
                *original = match stage.elements.get(*target) {
                    Some(Element::Candle(c)) => Some((c.bull_color, c.bear_color)),
                    Some(Element::OhlcBar(b)) => Some((b.bull_color, b.bear_color)),
                    _ => Some((None, None)),
                };
            }

            Self::SlideIn {
                target,
                direction,
                distance,
                track,
            } => {
                let (tx, ty) = text_position(stage.elements, *target);
                let (dx, dy) = slide_delta(*direction, *distance);
                let t = SlideTrack {
                    start_x: tx + dx,
                    start_y: ty + dy,
                    target_x: tx,
                    target_y: ty,
                };
                set_text_position(stage.elements, *target, t.start_x, t.start_y);
                show(stage.elements, *target, 0.0);
                *track = Some(t);
            }

            Self::SlideOut {
                target,
                direction,
                distance,
                track,
            } => {
                let (sx, sy) = text_position(stage.elements, *target);
                let (dx, dy) = slide_delta(*direction, *distance);
                *track = Some(SlideTrack {
                    start_x: sx,
                    start_y: sy,
                    target_x: sx + dx,
                    target_y: sy + dy,
                });
            }

            Self::ScaleIn { target } | Self::BounceIn { target } => {
                show(stage.elements, *target, 0.0);
                set_text_scale(stage.elements, *target, 0.01);
            }

            Self::Pulse { .. } | Self::Shake { .. } | Self::ColorShift { .. } => {}

            Self::MorphLine {
                target, start_y, ..
            } => {
                *start_y = match stage.elements.get(*target) {
                    Some(Element::Line(l)) => Some(l.points_y.clone()),
                    Some(Element::Area(a)) => Some(a.points_y.clone()),
                    _ => Some(Vec::new()),
                };
            }

            Self::TweenPostFx { tweens } => {
                for tw in tweens.iter() {
                    stage.post.set(tw.field, tw.from);
                }
            }

            Self::ApplyProps { changes } => {
                for change in changes.iter() {
                    apply_prop(stage.elements, change);
                }
            }
        }
    }

    /// `duration` is the owning animation's scheduled duration; only the
    /// staggered kinds need it to recover absolute local time.
    pub fn on_progress(&self, stage: &mut Stage<'_>, p: f64, duration: f64) {
        match self {
            Self::CandlesAppear {
                targets,
                style,
                auto_camera,
            } => {
                let n = targets.len();
                if n == 0 {
                    return;
                }
                match style {
                    AppearStyle::All => {
                        for id in targets {
                            show(stage.elements, *id, p);
                            set_candle_pose(stage.elements, *id, 1.0, 0.0);
                        }
                    }
                    AppearStyle::Sequential => {
                        let reveal = p * n as f64;
                        for (i, id) in targets.iter().enumerate() {
                            let lp = local_progress(reveal, i);
                            set_visible(stage.elements, *id, lp > 0.0);
                            set_opacity(stage.elements, *id, lp);
                            set_candle_pose(stage.elements, *id, 1.0, 0.0);
                        }
                    }
                    AppearStyle::SlideUp => {
                        let reveal = p * n as f64;
                        for (i, id) in targets.iter().enumerate() {
                            let lp = local_progress(reveal, i);
                            let span = candle_price_span(stage.elements, *id);
                            set_visible(stage.elements, *id, lp > 0.0);
                            set_opacity(stage.elements, *id, lp);
                            set_candle_pose(stage.elements, *id, 1.0, -(1.0 - lp) * span * 3.0);
                        }
                    }
                    AppearStyle::Pop => {
                        let reveal = p * n as f64;
                        for (i, id) in targets.iter().enumerate() {
                            let lp = local_progress(reveal, i);
                            set_visible(stage.elements, *id, lp > 0.0);
                            set_opacity(stage.elements, *id, (lp * 2.0).min(1.0));
                            set_candle_pose(stage.elements, *id, lp, 0.0);
                        }
                    }
                    AppearStyle::Cascade => {
                        for (i, id) in targets.iter().enumerate() {
                            let delay = i as f64 / n as f64 * 0.6;
                            let lp = ((p - delay) / 0.4).clamp(0.0, 1.0);
                            set_visible(stage.elements, *id, lp > 0.0);
                            set_opacity(stage.elements, *id, lp);
                            set_candle_pose(stage.elements, *id, 1.0, 0.0);
                        }
                    }
                }
                if *auto_camera {
                    fit_camera_to(stage, targets);
                }
            }

            Self::CandleGrow {
                targets,
                sequential,
                auto_camera,
            } => {
                let n = targets.len();
                if n == 0 {
                    return;
                }
                if *sequential {
                    let reveal = p * n as f64;
                    for (i, id) in targets.iter().enumerate() {
                        let lp = local_progress(reveal, i);
                        set_candle_pose(stage.elements, *id, lp, 0.0);
                        set_opacity(stage.elements, *id, (lp * 2.0).min(1.0));
                        set_visible(stage.elements, *id, lp > 0.0);
                    }
                } else {
                    for id in targets {
                        set_candle_pose(stage.elements, *id, p, 0.0);
                        set_opacity(stage.elements, *id, (p * 2.0).min(1.0));
                    }
                }
                if *auto_camera {
                    fit_camera_to(stage, targets);
                }
            }

            Self::FadeIn { targets } => {
                for id in targets {
                    set_opacity(stage.elements, *id, p);
                }
            }

            Self::FadeOut { targets, .. } => {
                for id in targets {
                    set_opacity(stage.elements, *id, 1.0 - p);
                }
            }

            Self::StaggeredFadeIn {
                targets,
                stagger,
                fade_duration,
            } => {
                let total_t = p * duration;
                for (i, id) in targets.iter().enumerate() {
                    let delay = i as f64 * stagger;
                    // zero fade duration is an instant step at the delay
                    let lp = if *fade_duration > 0.0 {
                        ((total_t - delay) / fade_duration).clamp(0.0, 1.0)
                    } else if total_t >= delay {
                        1.0
                    } else {
                        0.0
                    };
                    set_opacity(stage.elements, *id, Ease::OutCubic.apply(lp));
                }
            }

            Self::DrawLine { target } => {
                set_draw_progress(stage.elements, *target, p);
            }

            Self::TypeText { target } => {
                if let Some(Element::Text(t)) = stage.elements.get_mut(*target) {
                    t.char_progress = p;
                }
            }

            Self::HighlightZone { target } => {
                set_opacity(stage.elements, *target, p);
            }

            Self::PanCamera {
                view_start,
                view_end,
                price_min,
                price_max,
                from,
            } => {
                if let Some(from) = from {
                    let to = CameraSnapshot {
                        view_start: *view_start,
                        view_end: *view_end,
                        price_min: price_min.unwrap_or(from.price_min),
                        price_max: price_max.unwrap_or(from.price_max),
                    };
                    stage.camera.lerp_between(*from, to, p);
                }
            }

            Self::ZoomTo { from, to, .. } => {
                if let (Some(from), Some(to)) = (from, to) {
                    stage.camera.lerp_between(*from, *to, p);
                }
            }

            Self::FlashCandle {
                target,
                color,
                cycles,
                original,
            } => {
                let Some((orig_bull, orig_bear)) = original else {
                    return;
                };
                let pulse = 0.5 + 0.5 * (p * f64::from(*cycles) * TAU).sin();
                let (bull, bear) = if pulse > 0.5 {
                    (Some(*color), Some(*color))
                } else {
                    (*orig_bull, *orig_bear)
                };
                match stage.elements.get_mut(*target) {
                    Some(Element::Candle(c)) => {
                        c.bull_color = bull;
                        c.bear_color = bear;
                    }
                    Some(Element::OhlcBar(b)) => {
                        b.bull_color = bull;
                        b.bear_color = bear;
                    }
                    _ => {}
                }
            }

            Self::ColorShift { target, from, to } => {
                set_primary_color(stage.elements, *target, Rgba::lerp(*from, *to, p));
            }

            Self::SlideIn { target, track, .. } => {
                if let Some(t) = track {
                    let x = t.start_x + (t.target_x - t.start_x) * p;
                    let y = t.start_y + (t.target_y - t.start_y) * p;
                    set_text_position(stage.elements, *target, x, y);
                    set_opacity(stage.elements, *target, p);
                }
            }

            Self::SlideOut { target, track, .. } => {
                if let Some(t) = track {
                    let x = t.start_x + (t.target_x - t.start_x) * p;
                    let y = t.start_y + (t.target_y - t.start_y) * p;
                    set_text_position(stage.elements, *target, x, y);
                    set_opacity(stage.elements, *target, 1.0 - p);
                }
            }

            Self::ScaleIn { target } => {
                set_text_scale(stage.elements, *target, p);
                set_opacity(stage.elements, *target, (p * 2.0).min(1.0));
            }

            Self::BounceIn { target } => {
                set_text_scale(stage.elements, *target, p);
                set_opacity(stage.elements, *target, (p * 3.0).min(1.0));
            }

            Self::Pulse {
                targets,
                min_opacity,
                max_opacity,
                cycles,
            } => {
                let t = 0.5 + 0.5 * (p * f64::from(*cycles) * TAU).sin();
                let opacity = min_opacity + (max_opacity - min_opacity) * t;
                for id in targets {
                    set_opacity(stage.elements, *id, opacity);
                }
            }

            Self::Shake {
                target,
                amplitude,
                frequency,
            } => {
                let decay = 1.0 - p;
                let offset = amplitude * decay * (p * frequency * TAU).sin();
                if let Some(e) = stage.elements.get_mut(*target) {
                    match e {
                        Element::Candle(c) => c.offset_y = offset,
                        Element::OhlcBar(b) => b.offset_y = offset,
                        _ => {}
                    }
                }
            }

            Self::MorphLine {
                target,
                target_y,
                start_y,
            } => {
                let Some(start) = start_y else { return };
                let morphed: Vec<f64> = start
                    .iter()
                    .zip(target_y.iter())
                    .map(|(s, t)| s + (t - s) * p)
                    .collect();
                match stage.elements.get_mut(*target) {
                    Some(Element::Line(l)) => {
                        l.points_y[..morphed.len()].copy_from_slice(&morphed);
                    }
                    Some(Element::Area(a)) => {
                        a.points_y[..morphed.len()].copy_from_slice(&morphed);
                    }
                    _ => {}
                }
            }

            Self::Wipe { targets, order, .. } => {
                let order = order.as_ref().unwrap_or(targets);
                let n = order.len();
                let reveal = p * n as f64;
                for (i, id) in order.iter().enumerate() {
                    set_opacity(stage.elements, *id, local_progress(reveal, i));
                }
            }

            Self::TweenPostFx { tweens } => {
                for tw in tweens.iter() {
                    stage.post.set(tw.field, tw.from + (tw.to - tw.from) * p);
                }
            }

            Self::ApplyProps { .. } => {}
        }
    }

    pub fn on_complete(&self, stage: &mut Stage<'_>) {
        match self {
            Self::CandlesAppear {
                targets,
                auto_camera,
                ..
            }
            | Self::CandleGrow {
                targets,
                auto_camera,
                ..
            } => {
                for id in targets {
                    show(stage.elements, *id, 1.0);
                    set_candle_pose(stage.elements, *id, 1.0, 0.0);
                }
                if *auto_camera {
                    fit_camera_to(stage, targets);
                }
            }

            Self::FadeOut { targets, detach } => {
                for id in targets {
                    set_visible(stage.elements, *id, false);
                    set_opacity(stage.elements, *id, 0.0);
                    if *detach {
                        stage.elements.remove(*id);
                    }
                }
            }

            Self::StaggeredFadeIn { targets, .. } | Self::Wipe { targets, .. } => {
                for id in targets {
                    set_opacity(stage.elements, *id, 1.0);
                }
            }

            Self::DrawLine { target } => {
                set_draw_progress(stage.elements, *target, 1.0);
            }

            Self::FlashCandle {
                target, original, ..
            } => {
                if let Some((bull, bear)) = original {
                    match stage.elements.get_mut(*target) {
                        Some(Element::Candle(c)) => {
                            c.bull_color = *bull;
                            c.bear_color = *bear;
                        }
                        Some(Element::OhlcBar(b)) => {
                            b.bull_color = *bull;
                            b.bear_color = *bear;
                        }
                        _ => {}
                    }
                }
            }

            Self::SlideIn { target, track, .. } => {
                if let Some(t) = track {
                    set_text_position(stage.elements, *target, t.target_x, t.target_y);
                }
                set_opacity(stage.elements, *target, 1.0);
            }

            Self::SlideOut { target, .. } => {
                set_visible(stage.elements, *target, false);
                set_opacity(stage.elements, *target, 0.0);
            }

            Self::ScaleIn { target } | Self::BounceIn { target } => {
                set_text_scale(stage.elements, *target, 1.0);
                set_opacity(stage.elements, *target, 1.0);
            }

            Self::Shake { target, .. } => {
                set_candle_pose(stage.elements, *target, 1.0, 0.0);
            }

            Self::ColorShift { target, to, .. } => {
                set_primary_color(stage.elements, *target, *to);
            }

            Self::TweenPostFx { tweens } => {
                for tw in tweens.iter() {
                    stage.post.set(tw.field, tw.to);
                }
            }

            Self::FadeIn { .. }
            | Self::TypeText { .. }
            | Self::HighlightZone { .. }
            | Self::PanCamera { .. }
            | Self::ZoomTo { .. }
            | Self::Pulse { .. }
            | Self::MorphLine { .. }
            | Self::ApplyProps { .. } => {}
        }
    }
}

fn element_x(store: &ElementStore, id: ElementId) -> f64 {
    store.get(id).map(Element::x_key).unwrap_or(0.0)
}

fn element_y(store: &ElementStore, id: ElementId) -> f64 {
    store.get(id).map(Element::y_key).unwrap_or(0.0)
}

fn apply_prop(store: &mut ElementStore, change: &PropChange) {
    match change {
        PropChange::Opacity { target, value } => set_opacity(store, *target, *value),
        PropChange::Visible { target, value } => set_visible(store, *target, *value),
        PropChange::ZOrder { target, value } => {
            if let Some(e) = store.get_mut(*target) {
                e.common_mut().z_order = *value;
            }
        }
        PropChange::DrawProgress { target, value } => set_draw_progress(store, *target, *value),
        PropChange::CharProgress { target, value } => {
            if let Some(Element::Text(t)) = store.get_mut(*target) {
                t.char_progress = *value;
            }
        }
        PropChange::ScaleY { target, value } => {
            match store.get_mut(*target) {
                Some(Element::Candle(c)) => c.scale_y = *value,
                Some(Element::OhlcBar(b)) => b.scale_y = *value,
                _ => {}
            }
        }
        PropChange::OffsetY { target, value } => {
            match store.get_mut(*target) {
                Some(Element::Candle(c)) => c.offset_y = *value,
                Some(Element::OhlcBar(b)) => b.offset_y = *value,
                _ => {}
            }
        }
        PropChange::Detach { target } => {
            store.remove(*target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::{Animation, Stage};
    use crate::camera::{Camera, FitPaddings};
    use crate::config::PostFx;
    use crate::element::{Candle, ElementCommon, Line, Text};

    struct Fixture {
        store: ElementStore,
        camera: Camera,
        post: PostFx,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: ElementStore::new(),
                camera: Camera::default(),
                post: PostFx::default(),
            }
        }

        fn run(&mut self, anim: &mut Animation, t: f64) {
            let mut stage = Stage {
                elements: &mut self.store,
                camera: &mut self.camera,
                post: &mut self.post,
                fit: FitPaddings::default(),
            };
            anim.advance(&mut stage, t);
        }

        fn hidden_candle(&mut self, index: i64, low: f64, high: f64) -> ElementId {
            self.store.insert(Element::Candle(Candle {
                common: ElementCommon::hidden(),
                index,
                open: low,
                high,
                low,
                close: high,
                ..Candle::default()
            }))
        }
    }

    #[test]
    fn sequential_appear_reveals_a_prefix() {
        let mut fx = Fixture::new();
        let ids: Vec<_> = (0..4).map(|i| fx.hidden_candle(i, 10.0, 20.0)).collect();
        let mut anim = Animation::new(AnimKind::CandlesAppear {
            targets: ids.clone(),
            style: AppearStyle::Sequential,
            auto_camera: false,
        })
        .with_easing(Ease::Linear)
        .with_duration(1.0);

        // reveal = 0.625 * 4 = 2.5: two full, one half, one hidden
        fx.run(&mut anim, 0.625);
        let op = |i: usize| fx.store.get(ids[i]).unwrap().common().opacity;
        assert!((op(0) - 1.0).abs() < 1e-9);
        assert!((op(1) - 1.0).abs() < 1e-9);
        assert!((op(2) - 0.5).abs() < 1e-9);
        assert_eq!(op(3), 0.0);
        assert!(!fx.store.get(ids[3]).unwrap().common().visible);
    }

    #[test]
    fn appear_completion_snaps_everything_on() {
        let mut fx = Fixture::new();
        let ids: Vec<_> = (0..3).map(|i| fx.hidden_candle(i, 10.0, 20.0)).collect();
        let mut anim = Animation::new(AnimKind::CandlesAppear {
            targets: ids.clone(),
            style: AppearStyle::Pop,
            auto_camera: true,
        })
        .with_duration(1.0);

        fx.run(&mut anim, 0.0);
        fx.run(&mut anim, 2.0);
        assert!(anim.is_completed());
        for id in &ids {
            let e = fx.store.get(*id).unwrap();
            assert!(e.common().visible);
            assert_eq!(e.common().opacity, 1.0);
            match e {
                Element::Candle(c) => {
                    assert_eq!(c.scale_y, 1.0);
                    assert_eq!(c.offset_y, 0.0);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        // auto camera framed indices 0..2 with default paddings
        assert_eq!(fx.camera.view_start, -1.0);
        assert_eq!(fx.camera.view_end, 5.0);
    }

    #[test]
    fn fade_out_with_detach_removes_the_element() {
        let mut fx = Fixture::new();
        let id = fx.store.insert(Element::Line(Line::default()));
        let mut anim = Animation::new(AnimKind::FadeOut {
            targets: vec![id],
            detach: true,
        })
        .with_duration(1.0);

        fx.run(&mut anim, 0.0);
        assert!(fx.store.get(id).is_some());
        fx.run(&mut anim, 1.0);
        assert!(fx.store.get(id).is_none());
    }

    #[test]
    fn pan_camera_holds_unspecified_price_axis() {
        let mut fx = Fixture::new();
        fx.camera = Camera {
            view_start: 10.0,
            view_end: 30.0,
            price_min: 5.0,
            price_max: 15.0,
        };
        let mut anim = Animation::new(AnimKind::PanCamera {
            view_start: 20.0,
            view_end: 40.0,
            price_min: None,
            price_max: None,
            from: None,
        })
        .with_easing(Ease::Linear)
        .with_duration(1.0);

        fx.run(&mut anim, 0.5);
        assert_eq!(fx.camera.view_start, 15.0);
        assert_eq!(fx.camera.view_end, 35.0);
        assert_eq!(fx.camera.price_min, 5.0);
        assert_eq!(fx.camera.price_max, 15.0);

        // re-running the same clock value lands on the same view
        fx.run(&mut anim, 0.5);
        assert_eq!(fx.camera.view_start, 15.0);
    }

    #[test]
    fn zoom_to_targets_the_index_range() {
        let mut fx = Fixture::new();
        for i in 0..10 {
            let id = fx.hidden_candle(i, 10.0 + i as f64, 20.0 + i as f64);
            fx.store.get_mut(id).unwrap().common_mut().visible = true;
            fx.store.get_mut(id).unwrap().common_mut().opacity = 1.0;
        }
        let mut anim = Animation::new(AnimKind::ZoomTo {
            start_index: 2,
            end_index: 5,
            padding: 0.1,
            from: None,
            to: None,
        })
        .with_easing(Ease::Linear)
        .with_duration(1.0);

        fx.run(&mut anim, 1.0);
        assert_eq!(fx.camera.view_start, 1.0);
        assert_eq!(fx.camera.view_end, 8.0);
        // lows 12..15, highs 22..25 -> range 13, pad 1.3
        assert!((fx.camera.price_min - (12.0 - 1.3)).abs() < 1e-9);
        assert!((fx.camera.price_max - (25.0 + 1.3)).abs() < 1e-9);
    }

    #[test]
    fn flash_candle_restores_original_colors() {
        let mut fx = Fixture::new();
        let id = fx.store.insert(Element::Candle(Candle {
            bull_color: Some(Rgba::rgb(1, 2, 3)),
            ..Candle::default()
        }));
        let flash = Rgba::from_hex("#FFD54F");
        let mut anim = Animation::new(AnimKind::FlashCandle {
            target: id,
            color: flash,
            cycles: 3,
            original: None,
        })
        .with_duration(1.0);

        // first quarter cycle: pulse above 0.5, flash color applied
        fx.run(&mut anim, 0.05);
        match fx.store.get(id).unwrap() {
            Element::Candle(c) => assert_eq!(c.bull_color, Some(flash)),
            _ => unreachable!(),
        }
        fx.run(&mut anim, 1.0);
        match fx.store.get(id).unwrap() {
            Element::Candle(c) => {
                assert_eq!(c.bull_color, Some(Rgba::rgb(1, 2, 3)));
                assert_eq!(c.bear_color, None);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn shake_decays_and_ends_at_rest() {
        let mut fx = Fixture::new();
        let id = fx.hidden_candle(0, 10.0, 20.0);
        let mut anim = Animation::new(AnimKind::Shake {
            target: id,
            amplitude: 0.5,
            frequency: 15.0,
        })
        .with_duration(1.0);

        fx.run(&mut anim, 0.4);
        fx.run(&mut anim, 1.0);
        match fx.store.get(id).unwrap() {
            Element::Candle(c) => assert_eq!(c.offset_y, 0.0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn morph_line_interpolates_from_captured_start() {
        let mut fx = Fixture::new();
        let id = fx.store.insert(Element::Line(Line {
            points_x: vec![0.0, 1.0],
            points_y: vec![0.0, 10.0],
            ..Line::default()
        }));
        let mut anim = Animation::new(AnimKind::MorphLine {
            target: id,
            target_y: vec![20.0, 30.0],
            start_y: None,
        })
        .with_easing(Ease::Linear)
        .with_duration(1.0);

        fx.run(&mut anim, 0.5);
        match fx.store.get(id).unwrap() {
            Element::Line(l) => assert_eq!(l.points_y, vec![10.0, 20.0]),
            _ => unreachable!(),
        }
        fx.run(&mut anim, 1.0);
        match fx.store.get(id).unwrap() {
            Element::Line(l) => assert_eq!(l.points_y, vec![20.0, 30.0]),
            _ => unreachable!(),
        }
    }

    #[test]
    fn wipe_orders_by_x_for_leftward_reveal() {
        let mut fx = Fixture::new();
        // inserted out of order on purpose
        let right = fx.hidden_candle(9, 10.0, 20.0);
        let left = fx.hidden_candle(1, 10.0, 20.0);
        let mut anim = Animation::new(AnimKind::Wipe {
            targets: vec![right, left],
            direction: Direction::Left,
            order: None,
        })
        .with_easing(Ease::Linear)
        .with_duration(1.0);

        fx.run(&mut anim, 0.5); // reveal = 1.0: first in order fully on
        assert_eq!(fx.store.get(left).unwrap().common().opacity, 1.0);
        assert_eq!(fx.store.get(right).unwrap().common().opacity, 0.0);
    }

    #[test]
    fn tween_postfx_drives_named_fields() {
        let mut fx = Fixture::new();
        let mut anim = Animation::new(AnimKind::TweenPostFx {
            tweens: vec![PostFxTween {
                field: PostFxField::VignetteStrength,
                from: 0.0,
                to: 0.6,
            }],
        })
        .with_easing(Ease::Linear)
        .with_duration(1.0);

        fx.run(&mut anim, 0.5);
        assert!((fx.post.get(PostFxField::VignetteStrength) - 0.3).abs() < 1e-9);
        fx.run(&mut anim, 1.0);
        assert_eq!(fx.post.get(PostFxField::VignetteStrength), 0.6);
    }

    #[test]
    fn apply_props_is_a_one_shot_command() {
        let mut fx = Fixture::new();
        let id = fx.store.insert(Element::Text(Text::default()));
        let mut anim = Animation::new(AnimKind::ApplyProps {
            changes: vec![
                PropChange::Opacity {
                    target: id,
                    value: 0.25,
                },
                PropChange::ZOrder {
                    target: id,
                    value: 7,
                },
            ],
        });
        assert_eq!(anim.duration, 0.0);

        fx.run(&mut anim, 0.0);
        assert!(anim.is_completed());
        let e = fx.store.get(id).unwrap();
        assert_eq!(e.common().opacity, 0.25);
        assert_eq!(e.common().z_order, 7);
    }

    #[test]
    fn staggered_fade_in_staggers_start_times() {
        let mut fx = Fixture::new();
        let a = fx.store.insert(Element::Text(Text::default()));
        let b = fx.store.insert(Element::Text(Text::default()));
        let kind = AnimKind::StaggeredFadeIn {
            targets: vec![a, b],
            stagger: 0.5,
            fade_duration: 0.5,
        };
        assert_eq!(kind.default_duration(), 1.0);
        let mut anim = Animation::new(kind).with_easing(Ease::Linear);

        fx.run(&mut anim, 0.5);
        assert_eq!(fx.store.get(a).unwrap().common().opacity, 1.0);
        assert_eq!(fx.store.get(b).unwrap().common().opacity, 0.0);
    }

    #[test]
    fn color_shift_lerps_and_lands_on_the_end_color() {
        let mut fx = Fixture::new();
        let id = fx.store.insert(Element::Line(Line::default()));
        let from = Rgba::rgb(0, 0, 0);
        let to = Rgba::rgb(200, 100, 50);
        let mut anim = Animation::new(AnimKind::ColorShift { target: id, from, to })
            .with_easing(Ease::Linear)
            .with_duration(1.0);
        assert_eq!(anim.duration, 1.0);

        fx.run(&mut anim, 0.5);
        match fx.store.get(id).unwrap() {
            Element::Line(l) => assert_eq!(l.color, Rgba::rgb(100, 50, 25)),
            other => panic!("unexpected {other:?}"),
        }

        fx.run(&mut anim, 2.0);
        assert!(anim.is_completed());
        match fx.store.get(id).unwrap() {
            Element::Line(l) => assert_eq!(l.color, to),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn staggered_fade_with_zero_fade_duration_steps_instantly() {
        let mut fx = Fixture::new();
        let a = fx.store.insert(Element::Text(Text::default()));
        let b = fx.store.insert(Element::Text(Text::default()));
        let mut anim = Animation::new(AnimKind::StaggeredFadeIn {
            targets: vec![a, b],
            stagger: 0.5,
            fade_duration: 0.0,
        })
        .with_easing(Ease::Linear);
        assert_eq!(anim.duration, 0.5);

        fx.run(&mut anim, 0.25);
        let op_a = fx.store.get(a).unwrap().common().opacity;
        let op_b = fx.store.get(b).unwrap().common().opacity;
        assert_eq!(op_a, 1.0);
        assert_eq!(op_b, 0.0);
        assert!(op_b.is_finite());

        fx.run(&mut anim, 0.5);
        assert_eq!(fx.store.get(b).unwrap().common().opacity, 1.0);
    }
}
