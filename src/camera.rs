use crate::element::Element;

/// Data-space viewport: index window on x, price window on y.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Camera {
    pub view_start: f64,
    pub view_end: f64,
    pub price_min: f64,
    pub price_max: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            view_start: -1.0,
            view_end: 10.0,
            price_min: 0.0,
            price_max: 1.0,
        }
    }
}

/// Immutable copy of the camera taken when an animation activates.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CameraSnapshot {
    pub view_start: f64,
    pub view_end: f64,
    pub price_min: f64,
    pub price_max: f64,
}

/// Fractional and index-unit margins applied by [`Camera::fit_to_candles`].
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct FitPaddings {
    /// Fraction of the price range added above the highest high.
    pub top: f64,
    /// Fraction of the price range added below the lowest low.
    pub bottom: f64,
    /// Index units added after the last candle.
    pub right: f64,
}

impl Default for FitPaddings {
    fn default() -> Self {
        Self {
            top: 0.05,
            bottom: 0.05,
            right: 3.0,
        }
    }
}

impl Camera {
    pub fn snapshot(&self) -> CameraSnapshot {
        CameraSnapshot {
            view_start: self.view_start,
            view_end: self.view_end,
            price_min: self.price_min,
            price_max: self.price_max,
        }
    }

    pub fn restore(&mut self, snap: CameraSnapshot) {
        self.view_start = snap.view_start;
        self.view_end = snap.view_end;
        self.price_min = snap.price_min;
        self.price_max = snap.price_max;
    }

    pub fn view_width(&self) -> f64 {
        self.view_end - self.view_start
    }

    pub fn price_range(&self) -> f64 {
        self.price_max - self.price_min
    }

    /// Frames every drawable candle and OHLC bar in `elements`. Hidden or
    /// fully transparent candles are ignored; no-op when none qualify.
    pub fn fit_to_candles<'a>(
        &mut self,
        elements: impl IntoIterator<Item = &'a Element>,
        pad: FitPaddings,
    ) {
        let mut min_idx = i64::MAX;
        let mut max_idx = i64::MIN;
        let mut lo = f64::MAX;
        let mut hi = f64::MIN;
        for e in elements {
            if !e.is_drawable() {
                continue;
            }
            let (index, low, high) = match e {
                Element::Candle(c) => (c.index, c.low, c.high),
                Element::OhlcBar(b) => (b.index, b.low, b.high),
                _ => continue,
            };
            min_idx = min_idx.min(index);
            max_idx = max_idx.max(index);
            lo = lo.min(low);
            hi = hi.max(high);
        }
        if min_idx > max_idx {
            return;
        }

        self.view_start = min_idx as f64 - 1.0;
        self.view_end = max_idx as f64 + pad.right;

        let mut range = hi - lo;
        if range <= 0.0 {
            range = 1.0;
        }
        self.price_min = lo - range * pad.bottom;
        self.price_max = hi + range * pad.top;
    }

    /// Absolute interpolation between two snapshots. Calling twice with the
    /// same `p` lands on the same view, so animation updates stay idempotent.
    pub fn lerp_between(&mut self, from: CameraSnapshot, to: CameraSnapshot, p: f64) {
        fn lerp(a: f64, b: f64, p: f64) -> f64 {
            a + (b - a) * p
        }
        self.view_start = lerp(from.view_start, to.view_start, p);
        self.view_end = lerp(from.view_end, to.view_end, p);
        self.price_min = lerp(from.price_min, to.price_min, p);
        self.price_max = lerp(from.price_max, to.price_max, p);
    }
}
