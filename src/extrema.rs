//! Margin-based peak and valley detection
//!
//! Bar `i` is a peak when its high is strictly greater than the high of every
//! bar within `margin` positions on either side, and a valley when its low is
//! strictly lower than every neighbouring low. A tie with any neighbour
//! disqualifies the candidate.
//!
//! Bars closer than `margin` to either end of the view lack a full window and
//! are never classified. A bar can be both a peak and a valley when it
//! strictly dominates its neighbourhood on both sides.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::{check_index, Margin, Result, OHLCV};

/// One detected extremum. `price` is the bar's high for peaks and its low
/// for valleys; `index` is the position in the analyzed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct ExtremumPoint {
    pub index: usize,
    pub date: NaiveDateTime,
    pub price: Decimal,
}

/// Peaks and valleys of one detection pass, each in ascending index order
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Extrema {
    pub peaks: Vec<ExtremumPoint>,
    pub valleys: Vec<ExtremumPoint>,
}

impl Extrema {
    pub fn is_peak(&self, index: usize) -> bool {
        contains(&self.peaks, index)
    }

    pub fn is_valley(&self, index: usize) -> bool {
        contains(&self.valleys, index)
    }

    /// Peak or valley
    #[inline]
    pub fn is_extremum(&self, index: usize) -> bool {
        self.is_peak(index) || self.is_valley(index)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty() && self.valleys.is_empty()
    }
}

fn contains(points: &[ExtremumPoint], index: usize) -> bool {
    points.binary_search_by_key(&index, |p| p.index).is_ok()
}

/// Range of indices that have a full window of `margin` neighbours
#[inline]
fn interior(len: usize, margin: usize) -> std::ops::Range<usize> {
    margin..len.saturating_sub(margin)
}

#[inline]
fn dominates<T: OHLCV>(bars: &[T], i: usize, margin: usize, beats: impl Fn(&T, &T) -> bool) -> bool {
    let candidate = &bars[i];
    (i - margin..=i + margin).all(|j| j == i || beats(candidate, &bars[j]))
}

#[inline]
fn peak_at<T: OHLCV>(bars: &[T], i: usize, margin: usize) -> bool {
    dominates(bars, i, margin, |c, n| c.high() > n.high())
}

#[inline]
fn valley_at<T: OHLCV>(bars: &[T], i: usize, margin: usize) -> bool {
    dominates(bars, i, margin, |c, n| c.low() < n.low())
}

/// Scan every interior bar. `O(n * margin)`.
pub fn detect<T: OHLCV>(bars: &[T], margin: Margin) -> Extrema {
    let m = margin.get();
    let mut extrema = Extrema::default();

    for i in interior(bars.len(), m) {
        let bar = &bars[i];
        if peak_at(bars, i, m) {
            extrema.peaks.push(ExtremumPoint {
                index: i,
                date: bar.timestamp(),
                price: bar.high(),
            });
        }
        if valley_at(bars, i, m) {
            extrema.valleys.push(ExtremumPoint {
                index: i,
                date: bar.timestamp(),
                price: bar.low(),
            });
        }
    }

    extrema
}

/// Classify a single index. Out-of-range indices fail with
/// [`WaveError::InvalidIndex`](crate::WaveError::InvalidIndex); indices within
/// `margin` of an edge are simply not peaks.
pub fn is_peak<T: OHLCV>(bars: &[T], index: usize, margin: Margin) -> Result<bool> {
    check_index(bars, index)?;
    Ok(interior(bars.len(), margin.get()).contains(&index) && peak_at(bars, index, margin.get()))
}

/// Valley counterpart of [`is_peak`]
pub fn is_valley<T: OHLCV>(bars: &[T], index: usize, margin: Margin) -> Result<bool> {
    check_index(bars, index)?;
    Ok(interior(bars.len(), margin.get()).contains(&index) && valley_at(bars, index, margin.get()))
}
