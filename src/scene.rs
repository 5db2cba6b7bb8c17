use std::path::Path;

use crate::anim::{Animation, Stage};
use crate::camera::{Camera, FitPaddings};
use crate::config::RenderConfig;
use crate::element::{Element, ElementId, ElementStore};
use crate::error::{ChartAnimError, ChartAnimResult};
use crate::render::Renderer;

/// Scheduling options for [`Scene::play`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PlayOpts {
    /// Overrides every member's duration (before speed scaling).
    pub duration: Option<f64>,
    /// Stagger between consecutive members, seconds.
    pub delay: f64,
}

/// Owns the elements, the camera and the animation timeline.
///
/// Scheduling is cursor-based: `play` advances the cursor past its slowest
/// member, `play_with_previous` overlaps the previous group without moving
/// the cursor, `wait` inserts a gap. All durations are divided by the
/// configured speed multiplier once, at schedule time.
#[derive(Debug)]
pub struct Scene {
    pub config: RenderConfig,
    pub camera: Camera,
    elements: ElementStore,
    animations: Vec<Animation>,
    time_labels: Vec<String>,
    cursor: f64,
    prev_play_start: f64,
}

impl Scene {
    pub fn new(config: RenderConfig) -> ChartAnimResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            camera: Camera::default(),
            elements: ElementStore::new(),
            animations: Vec::new(),
            time_labels: Vec::new(),
            cursor: 0.0,
            prev_play_start: 0.0,
        })
    }

    /// Per-index labels for the time axis (one per candle slot).
    pub fn set_time_labels(&mut self, labels: Vec<String>) {
        self.time_labels = labels;
    }

    pub fn time_labels(&self) -> &[String] {
        &self.time_labels
    }

    pub fn add_element(&mut self, element: Element) -> ElementId {
        self.elements.insert(element)
    }

    pub fn add_elements(&mut self, elements: Vec<Element>) -> Vec<ElementId> {
        elements
            .into_iter()
            .map(|e| self.elements.insert(e))
            .collect()
    }

    /// Removes the element from the scene entirely. The id becomes dead.
    pub fn detach(&mut self, id: ElementId) {
        self.elements.remove(id);
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id)
    }

    pub fn elements(&self) -> &ElementStore {
        &self.elements
    }

    pub fn animations(&self) -> &[Animation] {
        &self.animations
    }

    fn fit_paddings(&self) -> FitPaddings {
        FitPaddings {
            top: self.config.padding_top,
            bottom: self.config.padding_bottom,
            right: self.config.padding_right,
        }
    }

    /// Schedules a parallel group at the cursor and advances the cursor past
    /// its slowest member (stagger included).
    pub fn play(&mut self, animations: Vec<Animation>) -> ChartAnimResult<()> {
        self.play_with(animations, PlayOpts::default())
    }

    pub fn play_with(
        &mut self,
        animations: Vec<Animation>,
        opts: PlayOpts,
    ) -> ChartAnimResult<()> {
        Self::check_opts(opts.duration, opts.delay)?;
        let speed = self.config.speed_multiplier;
        self.prev_play_start = self.cursor;
        let mut max_end = 0.0_f64;
        for (idx, mut anim) in animations.into_iter().enumerate() {
            anim.duration = opts.duration.unwrap_or(anim.duration) / speed;
            let offset = idx as f64 * opts.delay / speed;
            anim.start_time = self.cursor + offset;
            max_end = max_end.max(offset + anim.duration);
            self.animations.push(anim);
        }
        self.cursor += max_end;
        Ok(())
    }

    /// Schedules a group relative to the previous `play` call's start,
    /// shifted by `offset` seconds, without advancing the cursor.
    pub fn play_with_previous(
        &mut self,
        animations: Vec<Animation>,
        offset: f64,
    ) -> ChartAnimResult<()> {
        self.play_with_previous_opts(animations, offset, None)
    }

    pub fn play_with_previous_opts(
        &mut self,
        animations: Vec<Animation>,
        offset: f64,
        duration: Option<f64>,
    ) -> ChartAnimResult<()> {
        Self::check_opts(duration, 0.0)?;
        let speed = self.config.speed_multiplier;
        let start = self.prev_play_start + offset / speed;
        for mut anim in animations {
            anim.duration = duration.unwrap_or(anim.duration) / speed;
            anim.start_time = start;
            self.animations.push(anim);
        }
        Ok(())
    }

    pub fn wait(&mut self, duration: f64) -> ChartAnimResult<()> {
        if !(duration.is_finite() && duration >= 0.0) {
            return Err(ChartAnimError::scheduling(format!(
                "wait duration {duration} must be finite and non-negative"
            )));
        }
        self.cursor += duration / self.config.speed_multiplier;
        Ok(())
    }

    fn check_opts(duration: Option<f64>, delay: f64) -> ChartAnimResult<()> {
        if let Some(d) = duration {
            if !(d.is_finite() && d >= 0.0) {
                return Err(ChartAnimError::scheduling(format!(
                    "duration {d} must be finite and non-negative"
                )));
            }
        }
        if !(delay.is_finite() && delay >= 0.0) {
            return Err(ChartAnimError::scheduling(format!(
                "delay {delay} must be finite and non-negative"
            )));
        }
        Ok(())
    }

    /// Timeline length: the cursor, or the tail of the longest-running
    /// animation if one extends past it.
    pub fn total_duration(&self) -> f64 {
        let max_end = self
            .animations
            .iter()
            .map(Animation::end_time)
            .fold(0.0, f64::max);
        self.cursor.max(max_end)
    }

    /// Evaluates the scene at clock value `t`. Callers feed non-decreasing
    /// clock values; rewinding is not supported.
    pub fn update(&mut self, t: f64) {
        let fit = self.fit_paddings();
        let mut stage = Stage {
            elements: &mut self.elements,
            camera: &mut self.camera,
            post: &mut self.config.post,
            fit,
        };
        for anim in &mut self.animations {
            anim.advance(&mut stage, t);
        }
    }

    /// Renders the full timeline to a video file at `path`.
    pub fn render(&mut self, path: impl AsRef<Path>) -> ChartAnimResult<()> {
        let mut renderer = Renderer::new(self.config.clone())?;
        renderer.render_scene(self, path.as_ref())
    }
}
