use crate::anim_ease::Ease;
use crate::anim_ops::AnimKind;
use crate::camera::{Camera, FitPaddings};
use crate::config::PostFx;
use crate::element::ElementStore;

/// Mutable view of scene state handed to animation hooks. The renderer only
/// ever reads; all mutation flows through here.
pub struct Stage<'a> {
    pub elements: &'a mut ElementStore,
    pub camera: &'a mut Camera,
    pub post: &'a mut PostFx,
    pub fit: FitPaddings,
}

/// A scheduled animation: a kind plus its slot on the timeline.
///
/// `advance` is the per-frame state machine. Hooks fire in a fixed order:
/// `on_activate` once when the clock first reaches `start_time`,
/// `on_progress` on every call after that (including after completion, with
/// terminal eased progress), `on_complete` once when raw progress hits 1.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Animation {
    pub kind: AnimKind,
    pub start_time: f64,
    pub duration: f64,
    pub easing: Ease,
    started: bool,
    completed: bool,
}

impl Animation {
    /// Wraps a kind with its stock duration and easing.
    pub fn new(kind: AnimKind) -> Self {
        let duration = kind.default_duration();
        let easing = kind.default_easing();
        Self {
            kind,
            start_time: 0.0,
            duration,
            easing,
            started: false,
            completed: false,
        }
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_easing(mut self, easing: Ease) -> Self {
        self.easing = easing;
        self
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Feeds the clock value `t` through the state machine. Callers advance
    /// `t` monotonically; a `t` before `start_time` is a no-op.
    pub fn advance(&mut self, stage: &mut Stage<'_>, t: f64) {
        if t < self.start_time {
            return;
        }

        let raw = if self.duration > 0.0 {
            ((t - self.start_time) / self.duration).min(1.0)
        } else {
            1.0
        };
        let progress = self.easing.apply(raw);

        if !self.started {
            self.started = true;
            self.kind.on_activate(stage);
        }

        self.kind.on_progress(stage, progress, self.duration);

        if raw >= 1.0 && !self.completed {
            self.completed = true;
            self.kind.on_complete(stage);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, ElementId, Zone};

    fn stage_parts() -> (ElementStore, Camera, PostFx) {
        (ElementStore::new(), Camera::default(), PostFx::default())
    }

    fn fade_in(id: ElementId) -> Animation {
        Animation::new(AnimKind::FadeIn { targets: vec![id] }).with_easing(Ease::Linear)
    }

    #[test]
    fn pending_before_start_time() {
        let (mut store, mut cam, mut post) = stage_parts();
        let id = store.insert(Element::Zone(Zone::default()));
        let mut anim = fade_in(id);
        anim.start_time = 2.0;

        let mut stage = Stage {
            elements: &mut store,
            camera: &mut cam,
            post: &mut post,
            fit: FitPaddings::default(),
        };
        anim.advance(&mut stage, 1.9);
        assert!(!anim.is_started());
        // activation has not touched the element
        assert_eq!(store.get(id).unwrap().common().opacity, 1.0);
    }

    #[test]
    fn activation_fires_once_and_progress_tracks_clock() {
        let (mut store, mut cam, mut post) = stage_parts();
        let id = store.insert(Element::Zone(Zone::default()));
        let mut anim = fade_in(id).with_duration(1.0);

        for (t, want) in [(0.0, 0.0), (0.25, 0.25), (0.5, 0.5), (0.5, 0.5)] {
            let mut stage = Stage {
                elements: &mut store,
                camera: &mut cam,
                post: &mut post,
                fit: FitPaddings::default(),
            };
            anim.advance(&mut stage, t);
            assert!((store.get(id).unwrap().common().opacity - want).abs() < 1e-9);
        }
        assert!(anim.is_started());
        assert!(!anim.is_completed());
    }

    #[test]
    fn completion_fires_once_and_progress_keeps_firing() {
        let (mut store, mut cam, mut post) = stage_parts();
        let id = store.insert(Element::Zone(Zone::default()));
        let mut anim = fade_in(id).with_duration(1.0);

        for t in [0.0, 1.0, 5.0, 100.0] {
            let mut stage = Stage {
                elements: &mut store,
                camera: &mut cam,
                post: &mut post,
                fit: FitPaddings::default(),
            };
            anim.advance(&mut stage, t);
        }
        assert!(anim.is_completed());
        assert_eq!(store.get(id).unwrap().common().opacity, 1.0);
    }

    #[test]
    fn zero_duration_jumps_straight_to_terminal_state() {
        let (mut store, mut cam, mut post) = stage_parts();
        let id = store.insert(Element::Zone(Zone::default()));
        let mut anim = fade_in(id).with_duration(0.0);

        let mut stage = Stage {
            elements: &mut store,
            camera: &mut cam,
            post: &mut post,
            fit: FitPaddings::default(),
        };
        anim.advance(&mut stage, 0.0);
        assert!(anim.is_started());
        assert!(anim.is_completed());
        assert_eq!(store.get(id).unwrap().common().opacity, 1.0);
    }
}
