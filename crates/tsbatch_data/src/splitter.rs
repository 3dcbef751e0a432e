//! Head/tail splitting of series groups into training and test partitions.
//!
//! Time series must not be split randomly: the test partition has to lie
//! strictly after the training partition to avoid look-ahead bias. A split
//! point is an index into the shared timeline, given directly, as a fraction
//! of the length, or as a calendar date.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tsbatch_core::{ScalarSeries, SeriesGroup, Timeline};

use crate::error::{DataError, Result};

/// Where to cut a series group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SplitPoint {
    /// Explicit index: head is `[0, pos)`, tail is `[pos, end)`.
    Position(usize),
    /// Fraction of the total length, e.g. 0.8 for an 80/20 split.
    Fraction(f64),
    /// First bar strictly after `date`, shifted by `offset` bars.
    Date {
        /// Cut-off date.
        date: DateTime<Utc>,
        /// Bars to shift the cut by; the result is clamped to the timeline.
        offset: isize,
    },
}

/// A head or tail view onto another series.
pub struct SplitSeries {
    inner: Arc<dyn ScalarSeries>,
    pos: usize,
    head: bool,
}

impl SplitSeries {
    /// Restrict `inner` to `[0, pos)` when `head`, else to `[pos, end)`.
    #[must_use]
    pub fn new(inner: Arc<dyn ScalarSeries>, pos: usize, head: bool) -> Self {
        Self { inner, pos, head }
    }

    /// Whether this is the head partition.
    #[must_use]
    pub fn is_head(&self) -> bool {
        self.head
    }

    /// The split position in the underlying series.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    fn offset(&self) -> usize {
        if self.head {
            0
        } else {
            self.pos
        }
    }
}

impl ScalarSeries for SplitSeries {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn len(&self) -> usize {
        if self.head {
            self.pos.min(self.inner.len())
        } else {
            // the tail follows the underlying series as it grows
            self.inner.len().saturating_sub(self.pos)
        }
    }

    fn value(&self, index: usize) -> f64 {
        self.inner.value(self.offset() + index)
    }

    fn timeline(&self) -> Timeline {
        let timeline = self.inner.timeline();
        if self.head {
            timeline.slice(0..self.pos)
        } else {
            timeline.slice(self.pos..usize::MAX)
        }
    }

    fn labels(&self) -> Option<Vec<String>> {
        self.inner.labels()
    }

    fn is_one_hot(&self) -> bool {
        self.inner.is_one_hot()
    }
}

fn first(group: &SeriesGroup) -> Result<&Arc<dyn ScalarSeries>> {
    group
        .first()
        .ok_or_else(|| DataError::InvalidArgument("cannot split an empty series group".to_string()))
}

/// Split every series of a group at `pos`.
///
/// # Arguments
///
/// * `group` - Co-indexed series to split
/// * `pos` - Split index
/// * `head` - `true` for `[0, pos)` (training data), `false` for `[pos, end)` (test data)
///
/// # Errors
///
/// Returns an error if the group is empty.
pub fn split_at_position(group: &SeriesGroup, pos: usize, head: bool) -> Result<SeriesGroup> {
    let reference = first(group)?;
    if pos > reference.len() {
        tracing::debug!(
            pos,
            len = reference.len(),
            "split position beyond series length"
        );
    }
    Ok(group
        .iter()
        .map(|series| Arc::new(SplitSeries::new(Arc::clone(series), pos, head)) as Arc<dyn ScalarSeries>)
        .collect())
}

/// Split every series of a group at a fraction of its length.
///
/// The fraction is clamped to `[0, 1]` and the position is
/// `floor(fraction * len)` of the first series.
///
/// # Errors
///
/// Returns an error if the group is empty or the fraction is NaN.
pub fn split_at_fraction(group: &SeriesGroup, fraction: f64, head: bool) -> Result<SeriesGroup> {
    let pos = fraction_position(group, fraction)?;
    split_at_position(group, pos, head)
}

fn fraction_position(group: &SeriesGroup, fraction: f64) -> Result<usize> {
    if fraction.is_nan() {
        return Err(DataError::InvalidArgument(
            "split fraction must be a number".to_string(),
        ));
    }
    let len = first(group)?.len();
    Ok((fraction.clamp(0.0, 1.0) * len as f64).floor() as usize)
}

/// Split every series of a group at a calendar date.
///
/// # Arguments
///
/// * `group` - Co-indexed series to split
/// * `date` - Bars up to and including this instant go to the head
/// * `head` - Which partition to return
/// * `offset` - Bars to shift the split position by
///
/// # Errors
///
/// Returns an error if the group or its timeline is empty.
pub fn split_at_date(
    group: &SeriesGroup,
    date: DateTime<Utc>,
    head: bool,
    offset: isize,
) -> Result<SeriesGroup> {
    let pos = find_split_position(group, date, offset)?;
    split_at_position(group, pos, head)
}

/// Locate the split index for `date`.
///
/// Scans the timeline of the first series and counts the bars whose begin
/// time is not after `date`; a bar stamped exactly at `date` belongs to the
/// head. `offset` is added and the result clamped to `[0, len - 1]`.
///
/// # Errors
///
/// Returns an error if the group or its timeline is empty.
pub fn find_split_position(group: &SeriesGroup, date: DateTime<Utc>, offset: isize) -> Result<usize> {
    let timeline = first(group)?.timeline();
    if timeline.is_empty() {
        return Err(DataError::InvalidArgument(
            "cannot split on an empty timeline".to_string(),
        ));
    }

    let pos = timeline
        .bars()
        .iter()
        .take_while(|bar| bar.begin_time <= date)
        .count();

    let last = timeline.len() - 1;
    let shifted = (pos as isize).saturating_add(offset);
    Ok(shifted.clamp(0, last as isize) as usize)
}

/// Split a group according to a [`SplitPoint`].
///
/// # Errors
///
/// Returns an error if the group is empty or the split point is invalid.
pub fn split_group(group: &SeriesGroup, point: &SplitPoint, head: bool) -> Result<SeriesGroup> {
    let pos = resolve_position(group, point)?;
    split_at_position(group, pos, head)
}

/// Split a group into `(train, test)` partitions in one call.
///
/// # Errors
///
/// Returns an error if the group is empty or the split point is invalid.
pub fn train_test_split(group: &SeriesGroup, point: &SplitPoint) -> Result<(SeriesGroup, SeriesGroup)> {
    let pos = resolve_position(group, point)?;
    Ok((
        split_at_position(group, pos, true)?,
        split_at_position(group, pos, false)?,
    ))
}

fn resolve_position(group: &SeriesGroup, point: &SplitPoint) -> Result<usize> {
    match point {
        SplitPoint::Position(pos) => {
            first(group)?;
            Ok(*pos)
        }
        SplitPoint::Fraction(fraction) => fraction_position(group, *fraction),
        SplitPoint::Date { date, offset } => find_split_position(group, *date, *offset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tsbatch_core::VecSeries;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn group(len: usize) -> SeriesGroup {
        let timeline = Timeline::from_times((0..len).map(|d| start() + Duration::days(d as i64)));
        vec![
            VecSeries::new("close", (0..len).map(|i| i as f64).collect(), timeline.clone()).into_shared(),
            VecSeries::new("volume", (0..len).map(|i| 100.0 + i as f64).collect(), timeline).into_shared(),
        ]
    }

    #[test]
    fn test_split_lengths() {
        let g = group(10);
        for p in 0..=10 {
            let head = split_at_position(&g, p, true).unwrap();
            let tail = split_at_position(&g, p, false).unwrap();
            assert_eq!(head[0].len(), p);
            assert_eq!(tail[0].len(), 10 - p);
            assert_eq!(head[1].timeline().len(), p);
            assert_eq!(tail[1].timeline().len(), 10 - p);
        }
    }

    #[test]
    fn test_split_reconstructs_values() {
        let g = group(10);
        let head = split_at_position(&g, 6, true).unwrap();
        let tail = split_at_position(&g, 6, false).unwrap();

        for (f, series) in g.iter().enumerate() {
            let rebuilt: Vec<f64> = (0..head[f].len())
                .map(|i| head[f].value(i))
                .chain((0..tail[f].len()).map(|i| tail[f].value(i)))
                .collect();
            let original: Vec<f64> = (0..series.len()).map(|i| series.value(i)).collect();
            assert_eq!(rebuilt, original);
            assert_eq!(head[f].name(), series.name());
        }
        assert_eq!(tail[0].timeline().bars()[0].begin_time, start() + Duration::days(6));
    }

    #[test]
    fn test_split_position_beyond_length_is_clamped() {
        let g = group(5);
        assert_eq!(split_at_position(&g, 9, true).unwrap()[0].len(), 5);
        assert_eq!(split_at_position(&g, 9, false).unwrap()[0].len(), 0);
    }

    #[test]
    fn test_split_at_fraction() {
        let g = group(10);
        assert_eq!(split_at_fraction(&g, 0.75, true).unwrap()[0].len(), 7);
        assert_eq!(split_at_fraction(&g, 0.75, false).unwrap()[0].len(), 3);
        assert_eq!(split_at_fraction(&g, 2.0, true).unwrap()[0].len(), 10);
        assert!(split_at_fraction(&g, f64::NAN, true).is_err());
    }

    #[test]
    fn test_find_split_position_first_bar_after_date() {
        let g = group(10);
        for d in 0..9 {
            // exact timestamp: the bar at `d` is not after the date
            let exact = start() + Duration::days(d);
            assert_eq!(find_split_position(&g, exact, 0).unwrap(), d as usize + 1);

            let between = exact + Duration::hours(12);
            let pos = find_split_position(&g, between, 0).unwrap();
            let bars = g[0].timeline();
            assert!(bars.bars()[pos].begin_time > between);
            assert!(bars.bars()[..pos].iter().all(|b| b.begin_time <= between));
        }
    }

    #[test]
    fn test_find_split_position_clamps() {
        let g = group(10);
        let before = start() - Duration::days(5);
        let after = start() + Duration::days(50);
        assert_eq!(find_split_position(&g, before, 0).unwrap(), 0);
        assert_eq!(find_split_position(&g, after, 0).unwrap(), 9);
        assert_eq!(find_split_position(&g, start(), -4).unwrap(), 0);
        assert_eq!(find_split_position(&g, start(), 100).unwrap(), 9);
        assert_eq!(find_split_position(&g, start(), 2).unwrap(), 3);
    }

    #[test]
    fn test_find_split_position_extreme_offsets() {
        let g = group(10);
        let after = start() + Duration::days(50);
        assert_eq!(find_split_position(&g, after, isize::MAX).unwrap(), 9);
        assert_eq!(find_split_position(&g, after, isize::MIN).unwrap(), 0);
        assert_eq!(find_split_position(&g, start(), isize::MIN).unwrap(), 0);
        assert_eq!(find_split_position(&g, start(), isize::MAX).unwrap(), 9);
    }

    #[test]
    fn test_split_at_date() {
        let g = group(10);
        let date = start() + Duration::days(3);
        let head = split_at_date(&g, date, true, 0).unwrap();
        let tail = split_at_date(&g, date, false, 0).unwrap();
        assert_eq!(head[0].len(), 4);
        assert_eq!(tail[0].value(0), 4.0);
    }

    #[test]
    fn test_empty_group_is_rejected() {
        let empty: SeriesGroup = Vec::new();
        assert!(matches!(
            split_at_position(&empty, 1, true),
            Err(DataError::InvalidArgument(_))
        ));
        assert!(find_split_position(&empty, start(), 0).is_err());
        assert!(split_at_fraction(&empty, 0.5, true).is_err());
    }

    #[test]
    fn test_empty_timeline_is_rejected() {
        let g: SeriesGroup = vec![VecSeries::new("x", vec![], Timeline::new(vec![])).into_shared()];
        assert!(find_split_position(&g, start(), 0).is_err());
    }

    #[test]
    fn test_train_test_split_with_split_point() {
        let g = group(10);
        let (train, test) = train_test_split(&g, &SplitPoint::Fraction(0.8)).unwrap();
        assert_eq!((train[0].len(), test[0].len()), (8, 2));

        let point = SplitPoint::Date {
            date: start() + Duration::days(1),
            offset: 1,
        };
        let (train, test) = train_test_split(&g, &point).unwrap();
        assert_eq!((train[0].len(), test[0].len()), (3, 7));

        let head = split_group(&g, &SplitPoint::Position(4), true).unwrap();
        assert_eq!(head[1].value(3), 103.0);
    }

    #[test]
    fn test_split_point_serialization() {
        let point = SplitPoint::Date {
            date: start(),
            offset: -2,
        };
        let json = serde_json::to_string(&point).unwrap();
        let restored: SplitPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(point, restored);
    }
}
