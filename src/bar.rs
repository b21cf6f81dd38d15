//! Parsed OHLCV record

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::OHLCV;

/// One price bar. Built once from a text row and never mutated.
///
/// OHLC consistency (`low <= open, close <= high`) is not enforced: a row with
/// an unparseable price keeps that field at zero. Use
/// [`OHLCVExt::validate`](crate::OHLCVExt::validate) to check explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

impl Bar {
    pub fn new(
        timestamp: NaiveDateTime,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: u64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Bar with every price and the volume at zero
    pub fn empty(timestamp: NaiveDateTime) -> Self {
        Self::new(
            timestamp,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            0,
        )
    }

    #[inline]
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

impl OHLCV for Bar {
    fn open(&self) -> Decimal {
        self.open
    }

    fn high(&self) -> Decimal {
        self.high
    }

    fn low(&self) -> Decimal {
        self.low
    }

    fn close(&self) -> Decimal {
        self.close
    }

    fn volume(&self) -> u64 {
        self.volume
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}
