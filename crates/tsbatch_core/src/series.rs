//! Scalar series capability and the bar timeline it is indexed against.

use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single timestamped market record (OHLCV).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Start of the bar interval (UTC).
    pub begin_time: DateTime<Utc>,
    /// Opening price.
    pub open: f64,
    /// Highest price during the interval.
    pub high: f64,
    /// Lowest price during the interval.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Volume traded during the interval.
    pub volume: f64,
}

impl Bar {
    /// Create a bar that only carries a timestamp.
    #[must_use]
    pub fn at(begin_time: DateTime<Utc>) -> Self {
        Self {
            begin_time,
            open: 0.0,
            high: 0.0,
            low: 0.0,
            close: 0.0,
            volume: 0.0,
        }
    }
}

/// An ordered view over shared bars.
///
/// Cloning and slicing are cheap: the bars live behind an `Arc` and a
/// timeline only records the `[start, end)` window it exposes.
#[derive(Debug, Clone)]
pub struct Timeline {
    bars: Arc<[Bar]>,
    start: usize,
    end: usize,
}

impl Timeline {
    /// Create a timeline from bars in chronological order.
    #[must_use]
    pub fn new(bars: Vec<Bar>) -> Self {
        let end = bars.len();
        Self {
            bars: bars.into(),
            start: 0,
            end,
        }
    }

    /// Create a timeline of price-less bars from timestamps.
    #[must_use]
    pub fn from_times<I>(times: I) -> Self
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        Self::new(times.into_iter().map(Bar::at).collect())
    }

    /// The bars visible through this view.
    #[must_use]
    pub fn bars(&self) -> &[Bar] {
        &self.bars[self.start..self.end]
    }

    /// Number of visible bars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if no bar is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Restrict the view to `range`, relative to this view and clamped to it.
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> Self {
        let len = self.len();
        let lo = range.start.min(len);
        let hi = range.end.clamp(lo, len);
        Self {
            bars: Arc::clone(&self.bars),
            start: self.start + lo,
            end: self.start + hi,
        }
    }

    /// Begin times of the visible bars.
    #[must_use]
    pub fn begin_times(&self) -> Vec<DateTime<Utc>> {
        self.bars().iter().map(|bar| bar.begin_time).collect()
    }
}

/// A time-indexed function producing one number per bar index.
///
/// This is the only view the batching engine has of its data. Implementations
/// must be cheap to read repeatedly; the engine never writes back.
pub trait ScalarSeries: Send + Sync {
    /// Feature name used for labels and logging.
    fn name(&self) -> &str;

    /// Number of values currently available.
    fn len(&self) -> usize;

    /// Check if the series holds no values.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `index`. Callers keep `index < len()`.
    fn value(&self, index: usize) -> f64;

    /// Bounds-checked access.
    fn get(&self, index: usize) -> Option<f64> {
        (index < self.len()).then(|| self.value(index))
    }

    /// The bar timeline this series is indexed against.
    fn timeline(&self) -> Timeline;

    /// Category names when the values are class indices.
    fn labels(&self) -> Option<Vec<String>> {
        None
    }

    /// Whether consumers should treat values as categorical indices.
    fn is_one_hot(&self) -> bool {
        false
    }
}

/// An ordered feature set of co-indexed series.
pub type SeriesGroup = Vec<Arc<dyn ScalarSeries>>;

/// In-memory scalar series backed by a vector.
#[derive(Debug, Clone)]
pub struct VecSeries {
    name: String,
    values: Vec<f64>,
    timeline: Timeline,
}

impl VecSeries {
    /// Create a series. `values` and `timeline` are expected to line up.
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<f64>, timeline: Timeline) -> Self {
        Self {
            name: name.into(),
            values,
            timeline,
        }
    }

    /// Wrap into a shareable trait object for a [`SeriesGroup`].
    #[must_use]
    pub fn into_shared(self) -> Arc<dyn ScalarSeries> {
        Arc::new(self)
    }

    /// The raw values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

impl ScalarSeries for VecSeries {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn value(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(f64::NAN)
    }

    fn timeline(&self) -> Timeline {
        self.timeline.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn daily(n: usize) -> Timeline {
        Timeline::from_times(
            (0..n).map(|d| Utc.with_ymd_and_hms(2024, 1, 1 + d as u32, 0, 0, 0).unwrap()),
        )
    }

    #[test]
    fn test_timeline_slice_is_relative_and_clamped() {
        let tl = daily(10);
        let tail = tl.slice(4..10);
        assert_eq!(tail.len(), 6);
        assert_eq!(tail.bars()[0].begin_time, tl.bars()[4].begin_time);

        let inner = tail.slice(1..100);
        assert_eq!(inner.len(), 5);
        assert_eq!(inner.bars()[0].begin_time, tl.bars()[5].begin_time);

        assert!(tl.slice(20..30).is_empty());
    }

    #[test]
    fn test_vec_series_access() {
        let s = VecSeries::new("close", vec![1.0, 2.0, 3.0], daily(3));
        assert_eq!(s.name(), "close");
        assert_eq!(s.len(), 3);
        assert_eq!(s.get(1), Some(2.0));
        assert_eq!(s.get(3), None);
        assert!(s.value(3).is_nan());
        assert!(s.labels().is_none());
        assert!(!s.is_one_hot());
    }
}
