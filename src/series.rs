use crate::color::Rgba;
use crate::element::{Area, Candle, Element, ElementCommon, Line, OhlcBar};
use crate::error::{ChartAnimError, ChartAnimResult};

/// One OHLCV bar of input data.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OhlcRecord {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
    /// Optional label for the time axis (e.g. a date string).
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl OhlcRecord {
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            volume: 0.0,
            timestamp: None,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    fn validate(&self, i: usize) -> ChartAnimResult<()> {
        for (name, v) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ] {
            if !v.is_finite() {
                return Err(ChartAnimError::validation(format!(
                    "record {i}: {name} is not finite"
                )));
            }
        }
        if self.high < self.low {
            return Err(ChartAnimError::validation(format!(
                "record {i}: high {} below low {}",
                self.high, self.low
            )));
        }
        if self.volume < 0.0 {
            return Err(ChartAnimError::validation(format!(
                "record {i}: negative volume {}",
                self.volume
            )));
        }
        Ok(())
    }
}

/// Ordered OHLCV data, indexed 0..n on the time axis.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CandleSeries {
    records: Vec<OhlcRecord>,
    labels: Vec<String>,
}

impl CandleSeries {
    pub fn from_records(records: Vec<OhlcRecord>) -> ChartAnimResult<Self> {
        if records.is_empty() {
            return Err(ChartAnimError::validation("series has no records"));
        }
        for (i, r) in records.iter().enumerate() {
            r.validate(i)?;
        }
        let labels = records
            .iter()
            .map(|r| r.timestamp.clone().unwrap_or_default())
            .collect();
        Ok(Self { records, labels })
    }

    /// Replaces the per-bar time axis labels. Length must match the records.
    pub fn set_labels(&mut self, labels: Vec<String>) -> ChartAnimResult<()> {
        if labels.len() != self.records.len() {
            return Err(ChartAnimError::validation(format!(
                "{} labels for {} records",
                labels.len(),
                self.records.len()
            )));
        }
        self.labels = labels;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[OhlcRecord] {
        &self.records
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels
            .get(index)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn price_range(&self) -> (f64, f64) {
        let lo = self.records.iter().map(|r| r.low).fold(f64::MAX, f64::min);
        let hi = self.records.iter().map(|r| r.high).fold(f64::MIN, f64::max);
        (lo, hi)
    }

    pub fn max_volume(&self) -> f64 {
        self.records.iter().map(|r| r.volume).fold(0.0, f64::max)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.close).collect()
    }

    /// Close price at `index`.
    pub fn price_at(&self, index: usize) -> Option<f64> {
        self.records.get(index).map(|r| r.close)
    }

    pub fn high_at(&self, index: usize) -> Option<f64> {
        self.records.get(index).map(|r| r.high)
    }

    pub fn low_at(&self, index: usize) -> Option<f64> {
        self.records.get(index).map(|r| r.low)
    }

    /// Sub-series over `range`, labels included. Indexing restarts at 0.
    pub fn slice(&self, range: std::ops::Range<usize>) -> ChartAnimResult<Self> {
        if range.is_empty() || range.end > self.records.len() {
            return Err(ChartAnimError::validation(format!(
                "slice {}..{} out of bounds for {} records",
                range.start,
                range.end,
                self.records.len()
            )));
        }
        Ok(Self {
            records: self.records[range.clone()].to_vec(),
            labels: self.labels[range].to_vec(),
        })
    }

    /// One hidden [`Candle`] per record, ready to be revealed by an animation.
    pub fn candle_elements(&self) -> Vec<Element> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                Element::Candle(Candle {
                    common: ElementCommon::hidden(),
                    index: i as i64,
                    open: r.open,
                    high: r.high,
                    low: r.low,
                    close: r.close,
                    volume: r.volume,
                    ..Candle::default()
                })
            })
            .collect()
    }

    /// One hidden [`OhlcBar`] per record.
    pub fn ohlc_bar_elements(&self) -> Vec<Element> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                Element::OhlcBar(OhlcBar {
                    common: ElementCommon::hidden(),
                    index: i as i64,
                    open: r.open,
                    high: r.high,
                    low: r.low,
                    close: r.close,
                    volume: r.volume,
                    ..OhlcBar::default()
                })
            })
            .collect()
    }

    /// Close prices as a polyline (visible, full reveal).
    pub fn close_line(&self, color: Rgba, linewidth: f64) -> Element {
        Element::Line(Line {
            points_x: (0..self.records.len()).map(|i| i as f64).collect(),
            points_y: self.closes(),
            color,
            linewidth,
            ..Line::default()
        })
    }

    /// Close prices as a gradient-filled area.
    pub fn close_area(&self, color: Rgba) -> Element {
        Element::Area(Area {
            points_x: (0..self.records.len()).map(|i| i as f64).collect(),
            points_y: self.closes(),
            color,
            fill_color: color,
            ..Area::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CandleSeries {
        CandleSeries::from_records(vec![
            OhlcRecord::new(10.0, 13.0, 9.0, 12.0).with_volume(100.0),
            OhlcRecord::new(12.0, 12.5, 10.5, 11.0).with_volume(250.0),
            OhlcRecord::new(11.0, 14.0, 11.0, 13.5).with_volume(80.0),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_empty_and_inverted_records() {
        assert!(CandleSeries::from_records(vec![]).is_err());
        assert!(
            CandleSeries::from_records(vec![OhlcRecord::new(1.0, 2.0, 3.0, 1.5)]).is_err(),
            "high below low must fail"
        );
        assert!(
            CandleSeries::from_records(vec![OhlcRecord::new(1.0, f64::NAN, 0.5, 1.5)]).is_err()
        );
    }

    #[test]
    fn price_range_spans_lows_and_highs() {
        assert_eq!(sample().price_range(), (9.0, 14.0));
        assert_eq!(sample().max_volume(), 250.0);
    }

    #[test]
    fn candle_elements_start_hidden_at_their_index() {
        let elems = sample().candle_elements();
        assert_eq!(elems.len(), 3);
        for (i, e) in elems.iter().enumerate() {
            assert!(!e.is_drawable());
            match e {
                Element::Candle(c) => assert_eq!(c.index, i as i64),
                other => panic!("expected candle, got {other:?}"),
            }
        }
    }

    #[test]
    fn close_line_tracks_closes() {
        match sample().close_line(Rgba::WHITE, 2.0) {
            Element::Line(l) => {
                assert_eq!(l.points_x, vec![0.0, 1.0, 2.0]);
                assert_eq!(l.points_y, vec![12.0, 11.0, 13.5]);
                assert_eq!(l.draw_progress, 1.0);
            }
            other => panic!("expected line, got {other:?}"),
        }
    }

    #[test]
    fn alternate_chart_builders() {
        let s = sample();
        let bars = s.ohlc_bar_elements();
        assert_eq!(bars.len(), 3);
        assert!(bars.iter().all(|e| !e.is_drawable()));

        match s.close_area(Rgba::WHITE) {
            Element::Area(a) => {
                assert_eq!(a.points_y, vec![12.0, 11.0, 13.5]);
                assert_eq!(a.fill_color, Rgba::WHITE);
            }
            other => panic!("expected area, got {other:?}"),
        }
    }

    #[test]
    fn point_accessors_and_slice() {
        let s = sample();
        assert_eq!(s.price_at(1), Some(11.0));
        assert_eq!(s.high_at(2), Some(14.0));
        assert_eq!(s.low_at(0), Some(9.0));
        assert_eq!(s.price_at(3), None);

        let sub = s.slice(1..3).unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.price_at(0), Some(11.0));
        assert!(s.slice(2..2).is_err());
        assert!(s.slice(1..9).is_err());
    }

    #[test]
    fn label_lookup_skips_empty_strings() {
        let mut s = sample();
        assert_eq!(s.label(0), None);
        s.set_labels(vec!["a".into(), String::new(), "c".into()])
            .unwrap();
        assert_eq!(s.label(0), Some("a"));
        assert_eq!(s.label(1), None);
        assert!(s.set_labels(vec!["x".into()]).is_err());
    }
}
