//! Wave enumeration and wave descriptors
//!
//! A wave connects a valley to a later peak (up) or a peak to a later valley
//! (down). Every ordered pair is a candidate: no pruning, no deduplication.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::{check_index, extrema::ExtremumPoint, parser::parse_date, Result, WaveError, OHLCV};

/// Short date used in wave descriptions, `M/D/YYYY`
const SHORT_DATE: &str = "%-m/%-d/%Y";

const SEPARATOR: &str = " - ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveDirection {
    Up,
    Down,
}

/// Directional span between two view positions. `start < end` always holds.
///
/// The direction is a tag declared at enumeration time. Fibonacci math does
/// not trust it and derives high/low from the endpoint prices instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Wave {
    start: usize,
    end: usize,
    direction: WaveDirection,
}

/// Bounding box of a wave, in view positions and prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PriceBox {
    pub start: usize,
    pub end: usize,
    pub low: Decimal,
    pub high: Decimal,
}

impl Wave {
    pub fn new(start: usize, end: usize, direction: WaveDirection) -> Result<Self> {
        if start >= end {
            return Err(WaveError::InvalidValue("wave start must precede its end"));
        }
        Ok(Self {
            start,
            end,
            direction,
        })
    }

    #[inline]
    pub fn start_index(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn end_index(&self) -> usize {
        self.end
    }

    #[inline]
    pub fn direction(&self) -> WaveDirection {
        self.direction
    }

    #[inline]
    pub fn is_up(&self) -> bool {
        self.direction == WaveDirection::Up
    }

    /// Number of bars covered, endpoints included
    #[inline]
    pub fn span(&self) -> usize {
        self.end - self.start + 1
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.end).contains(&index)
    }

    /// `"<start> - <end>"` with both dates as `M/D/YYYY`
    pub fn describe<T: OHLCV>(&self, bars: &[T]) -> Result<String> {
        let start = check_index(bars, self.start)?.timestamp();
        let end = check_index(bars, self.end)?.timestamp();
        Ok(format!("{}{SEPARATOR}{}", short_date(start), short_date(end)))
    }

    /// Up-waves span the start bar's low to the end bar's high. Down-waves
    /// take the lowest low and highest high across the whole span.
    pub fn price_box<T: OHLCV>(&self, bars: &[T]) -> Result<PriceBox> {
        let first = check_index(bars, self.start)?;
        let last = check_index(bars, self.end)?;

        let (low, high) = match self.direction {
            WaveDirection::Up => (first.low(), last.high()),
            WaveDirection::Down => bars[self.start..=self.end].iter().fold(
                (Decimal::MAX, Decimal::MIN),
                |(low, high), bar| (low.min(bar.low()), high.max(bar.high())),
            ),
        };

        Ok(PriceBox {
            start: self.start,
            end: self.end,
            low,
            high,
        })
    }
}

#[inline]
fn short_date(ts: NaiveDateTime) -> String {
    ts.format(SHORT_DATE).to_string()
}

/// All up-waves (valley-major, then by peak) followed by all down-waves
/// (peak-major). `O(P * V)`.
pub fn enumerate(peaks: &[ExtremumPoint], valleys: &[ExtremumPoint]) -> Vec<Wave> {
    let mut waves = Vec::new();

    for valley in valleys {
        for peak in peaks.iter().filter(|p| p.index > valley.index) {
            waves.push(Wave {
                start: valley.index,
                end: peak.index,
                direction: WaveDirection::Up,
            });
        }
    }

    for peak in peaks {
        for valley in valleys.iter().filter(|v| v.index > peak.index) {
            waves.push(Wave {
                start: peak.index,
                end: valley.index,
                direction: WaveDirection::Down,
            });
        }
    }

    waves
}

/// Resolve a description produced by [`Wave::describe`]. Each date maps to
/// the first bar on that calendar day; the first wave with both endpoints
/// matching wins.
pub fn find_wave<T: OHLCV>(waves: &[Wave], bars: &[T], description: &str) -> Option<Wave> {
    let (start, end) = description.split_once(SEPARATOR)?;
    let start = parse_date(start.trim()).ok()?.date();
    let end = parse_date(end.trim()).ok()?.date();

    let position = |date: NaiveDate| bars.iter().position(|bar| bar.timestamp().date() == date);
    let (start, end) = (position(start)?, position(end)?);

    waves
        .iter()
        .find(|wave| wave.start == start && wave.end == end)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{extrema, series::Series, Margin};
    use rust_decimal_macros::dec;

    fn point(index: usize) -> ExtremumPoint {
        ExtremumPoint {
            index,
            date: NaiveDate::MIN.and_time(chrono::NaiveTime::MIN),
            price: Decimal::ZERO,
        }
    }

    fn points(indices: &[usize]) -> Vec<ExtremumPoint> {
        indices.iter().copied().map(point).collect()
    }

    fn pairs(waves: &[Wave]) -> Vec<(usize, usize, WaveDirection)> {
        waves.iter().map(|w| (w.start, w.end, w.direction)).collect()
    }

    #[test]
    fn test_enumeration_order() {
        use WaveDirection::*;
        let waves = enumerate(&points(&[2, 6]), &points(&[1, 4, 8]));
        assert_eq!(
            pairs(&waves),
            vec![
                (1, 2, Up),
                (1, 6, Up),
                (4, 6, Up),
                (2, 4, Down),
                (2, 8, Down),
                (6, 8, Down),
            ]
        );
    }

    #[test]
    fn test_enumeration_edge_cases() {
        assert!(enumerate(&[], &points(&[1, 2])).is_empty());
        assert!(enumerate(&points(&[1]), &[]).is_empty());
        // shared index pairs with neither side
        assert!(enumerate(&points(&[3]), &points(&[3])).is_empty());
    }

    #[test]
    fn test_new_requires_ordering() {
        assert!(Wave::new(1, 4, WaveDirection::Down).is_ok());
        assert!(Wave::new(4, 4, WaveDirection::Up).is_err());
        assert!(Wave::new(5, 4, WaveDirection::Up).is_err());
        let wave = Wave::new(2, 5, WaveDirection::Up).unwrap();
        assert_eq!(wave.span(), 4);
        assert!(wave.contains(2) && wave.contains(5) && !wave.contains(6));
    }

    fn fixture() -> Series {
        Series::ingest([
            "Date,Open,High,Low,Close,Volume",
            "2021-02-01,10,12,9,11,100",
            "2021-02-02,11,15,10,14,100",
            "2021-02-03,14,14,11,12,100",
            "2021-02-04,12,13,8,9,100",
            "2021-02-05,9,10,7,8,100",
            "2021-02-06,8,11,7.5,10,100",
        ])
        .series
    }

    #[test]
    fn test_describe_and_find() {
        let series = fixture();
        let found = extrema::detect(series.bars(), Margin::new(1).unwrap());
        let waves = enumerate(&found.peaks, &found.valleys);
        assert_eq!(waves.len(), 1);

        let text = waves[0].describe(series.bars()).unwrap();
        assert_eq!(text, "2/2/2021 - 2/5/2021");
        assert_eq!(find_wave(&waves, series.bars(), &text), Some(waves[0]));
        assert_eq!(find_wave(&waves, series.bars(), "garbage"), None);
        assert_eq!(find_wave(&waves, series.bars(), "2/2/2021 - 3/1/2021"), None);
    }

    #[test]
    fn test_describe_out_of_range() {
        let series = fixture();
        let wave = Wave::new(2, 9, WaveDirection::Up).unwrap();
        assert!(matches!(
            wave.describe(series.bars()),
            Err(WaveError::InvalidIndex { index: 9, len: 6 })
        ));
    }

    #[test]
    fn test_price_box() {
        let series = fixture();
        let down = Wave::new(1, 4, WaveDirection::Down).unwrap();
        let bx = down.price_box(series.bars()).unwrap();
        assert_eq!((bx.low, bx.high), (dec!(7), dec!(15)));

        let up = Wave::new(4, 5, WaveDirection::Up).unwrap();
        let bx = up.price_box(series.bars()).unwrap();
        assert_eq!((bx.low, bx.high), (dec!(7), dec!(11)));
    }
}
