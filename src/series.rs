//! Bar collections: ingestion, date filtering and price bounds

use std::{fs::File, io::BufRead, io::BufReader, ops::Deref, path::Path};

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tracing::debug;

use crate::{
    bar::Bar,
    check_index,
    parser::{parse_row, Delimiter},
    Ratio, Result, OHLCV,
};

// ============================================================
// SERIES
// ============================================================

/// Bars in ingestion order. Never re-sorted by timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    bars: Vec<Bar>,
}

/// Outcome of ingesting a text source
#[derive(Debug, Clone, Default)]
pub struct Ingest {
    pub series: Series,
    /// Delimiter chosen from the header, `None` when the source was empty
    pub delimiter: Option<Delimiter>,
    /// Data lines seen after the header, blank lines included
    pub rows_read: usize,
    /// Non-blank rows that failed to parse
    pub rows_dropped: usize,
}

impl Series {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars }
    }

    /// Best-effort ingestion. The first line is a header and is always
    /// discarded; it also decides the delimiter. Blank lines are skipped and
    /// rows that fail to parse are dropped.
    pub fn ingest<I, S>(lines: I) -> Ingest
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lines = lines.into_iter();
        let Some(header) = lines.next() else {
            return Ingest::default();
        };
        let delimiter = Delimiter::detect(header.as_ref());

        let mut bars = Vec::new();
        let mut rows_read = 0;
        let mut rows_dropped = 0;

        for (n, line) in lines.enumerate() {
            rows_read += 1;
            let line = line.as_ref();
            if line.is_empty() {
                continue;
            }
            match parse_row(line, delimiter) {
                Ok(bar) => bars.push(bar),
                Err(error) => {
                    rows_dropped += 1;
                    debug!(line = n + 2, %error, "dropping row");
                }
            }
        }

        debug!(bars = bars.len(), rows_read, rows_dropped, ?delimiter, "ingested series");
        Ingest {
            series: Series { bars },
            delimiter: Some(delimiter),
            rows_read,
            rows_dropped,
        }
    }

    /// Ingest from any buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Ingest> {
        let lines = reader.lines().collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self::ingest(lines))
    }

    /// Read and ingest a file
    pub fn load(path: impl AsRef<Path>) -> Result<Ingest> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    #[inline]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bars with `start <= timestamp <= end`, in ingestion order.
    /// An inverted range yields an empty view.
    pub fn filter_by_date(&self, start: NaiveDateTime, end: NaiveDateTime) -> SeriesView<'_> {
        SeriesView {
            bars: self
                .bars
                .iter()
                .filter(|bar| bar.timestamp >= start && bar.timestamp <= end)
                .collect(),
            source_len: self.bars.len(),
        }
    }

    /// Unfiltered view over every bar
    pub fn view(&self) -> SeriesView<'_> {
        SeriesView {
            bars: self.bars.iter().collect(),
            source_len: self.bars.len(),
        }
    }

    #[inline]
    pub fn price_bounds(&self) -> PriceBounds {
        price_bounds(&self.bars)
    }
}

impl FromIterator<Bar> for Series {
    fn from_iter<I: IntoIterator<Item = Bar>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// ============================================================
// VIEW
// ============================================================

/// Date-filtered subsequence of a [`Series`]. Borrows bars, owns none.
/// Positions in the view are the indices used by every analysis result.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesView<'a> {
    bars: Vec<&'a Bar>,
    source_len: usize,
}

/// Whether a view has anything to analyze
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", content = "bars", rename_all = "snake_case")]
pub enum ViewStatus {
    /// The source series has no bars at all
    NoData,
    /// The source has bars but none fall in the requested range
    EmptyRange,
    Ready(usize),
}

impl<'a> SeriesView<'a> {
    /// Size of the series this view was filtered from
    #[inline]
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    pub fn status(&self) -> ViewStatus {
        match (self.source_len, self.bars.len()) {
            (0, _) => ViewStatus::NoData,
            (_, 0) => ViewStatus::EmptyRange,
            (_, n) => ViewStatus::Ready(n),
        }
    }

    /// Checked access; out-of-range indices are a caller bug
    pub fn bar(&self, index: usize) -> Result<&'a Bar> {
        check_index(&self.bars, index).copied()
    }

    /// First position whose bar falls on `date`'s calendar day
    pub fn position_of(&self, date: chrono::NaiveDate) -> Option<usize> {
        self.bars.iter().position(|bar| bar.date() == date)
    }

    #[inline]
    pub fn price_bounds(&self) -> PriceBounds {
        price_bounds(&self.bars)
    }
}

impl<'a> Deref for SeriesView<'a> {
    type Target = [&'a Bar];

    fn deref(&self) -> &Self::Target {
        &self.bars
    }
}

// ============================================================
// PRICE BOUNDS
// ============================================================

/// Lowest low and highest high of a set of bars.
///
/// Empty input yields [`PriceBounds::EMPTY`], the inverted pair
/// `(Decimal::MAX, Decimal::MIN)` left over from the fold's seed. It is not a
/// usable range: check [`PriceBounds::is_empty`] before scaling a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PriceBounds {
    pub min: Decimal,
    pub max: Decimal,
}

impl PriceBounds {
    pub const EMPTY: PriceBounds = PriceBounds {
        min: Decimal::MAX,
        max: Decimal::MIN,
    };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Axis range padded by `buffer`: `floor(min) * (1 - buffer)` to
    /// `ceil(max) * (1 + buffer)`. `None` for the empty sentinel.
    pub fn padded(&self, buffer: Ratio) -> Option<(Decimal, Decimal)> {
        if self.is_empty() {
            return None;
        }
        let b = buffer.get();
        Some((
            self.min.floor().saturating_mul(Decimal::ONE - b),
            self.max.ceil().saturating_mul(Decimal::ONE + b),
        ))
    }
}

/// Fold `(min low, max high)` over `bars`
pub fn price_bounds<T: OHLCV>(bars: &[T]) -> PriceBounds {
    bars.iter().fold(PriceBounds::EMPTY, |acc, bar| PriceBounds {
        min: acc.min.min(bar.low()),
        max: acc.max.max(bar.high()),
    })
}

// ============================================================
// TESTS
// ============================================================
