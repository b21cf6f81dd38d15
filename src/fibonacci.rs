//! Fibonacci retracement levels and confirmation scanning
//!
//! Levels are laid out between the lower and the higher of the two endpoint
//! prices, whatever direction the wave was declared with:
//!
//! ```text
//! price(f) = low + f * (high - low)    f in FIB_RATIOS
//! ```
//!
//! A bar confirms a level `L` when its `[low, high]` range overlaps
//! `[L - tol, L + tol]`, with `tol` a fraction of the wave height.

use rust_decimal::Decimal;

use crate::{
    check_index,
    simulation::SimulationClock,
    waves::{Wave, WaveDirection},
    OHLCVExt, Ratio, Result, WaveError, OHLCV,
};

const fn thousandths(value: u32) -> Decimal {
    Decimal::from_parts(value, 0, 0, false, 3)
}

/// 0%, 23.6%, 38.2%, 50%, 61.8%, 76.4%, 100%
pub const FIB_RATIOS: [Decimal; 7] = [
    thousandths(0),
    thousandths(236),
    thousandths(382),
    thousandths(500),
    thousandths(618),
    thousandths(764),
    thousandths(1000),
];

/// Half-width of the confirmation band: 0.5% of the wave height
pub const DEFAULT_TOLERANCE: Ratio = Ratio::new_const(thousandths(5));

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct FibLevel {
    pub ratio: Decimal,
    pub price: Decimal,
}

/// A bar whose range touched `level`
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Confirmation {
    pub index: usize,
    pub level: FibLevel,
}

/// Which bars are eligible to confirm a level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationScope {
    /// Every bar in the view, the wave's own bars included
    #[default]
    AllBars,
    /// Skip bars between the endpoints, endpoints included
    OutsideWave,
}

/// Price geometry of a wave (or of any two positions) ready for level math.
///
/// `start_price` is always the high of the first bar. `end_price` is the low
/// of the last bar, unless a simulation replaced it with an interpolated price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Retracement {
    start: usize,
    end: usize,
    direction: WaveDirection,
    start_price: Decimal,
    end_price: Decimal,
}

impl Retracement {
    fn new(
        start: usize,
        end: usize,
        direction: WaveDirection,
        start_price: Decimal,
        end_price: Decimal,
    ) -> Result<Self> {
        // every level lies inside [low, high], so a representable height is enough
        start_price
            .max(end_price)
            .checked_sub(start_price.min(end_price))
            .ok_or(WaveError::Overflow("retracement height"))?;
        Ok(Self {
            start,
            end,
            direction,
            start_price,
            end_price,
        })
    }

    /// Retracement between two arbitrary positions, in either order. The
    /// direction tag is up when the end price exceeds the start price.
    pub fn between<T: OHLCV>(bars: &[T], start: usize, end: usize) -> Result<Self> {
        let start_price = check_index(bars, start)?.high();
        let end_price = check_index(bars, end)?.low();
        let direction = if end_price > start_price {
            WaveDirection::Up
        } else {
            WaveDirection::Down
        };
        Self::new(start, end, direction, start_price, end_price)
    }

    /// Unsimulated retracement of `wave`, keeping its declared direction
    pub fn for_wave<T: OHLCV>(wave: &Wave, bars: &[T]) -> Result<Self> {
        let start_price = check_index(bars, wave.start_index())?.high();
        let end_price = check_index(bars, wave.end_index())?.low();
        Self::new(
            wave.start_index(),
            wave.end_index(),
            wave.direction(),
            start_price,
            end_price,
        )
    }

    /// Retracement of `wave` as of the clock's current step. Once the clock
    /// has moved past step 0 its interpolated price stands in for the end.
    /// The clock must have `wave` selected.
    pub fn simulated<T: OHLCV>(wave: &Wave, bars: &[T], clock: &SimulationClock) -> Result<Self> {
        if clock.wave() != Some(*wave) {
            return Err(WaveError::InvalidValue("clock has a different wave selected"));
        }
        let retracement = Self::for_wave(wave, bars)?;
        if clock.step() > 0 {
            retracement.with_end_price(clock.price())
        } else {
            Ok(retracement)
        }
    }

    pub fn with_end_price(self, price: Decimal) -> Result<Self> {
        Self::new(self.start, self.end, self.direction, self.start_price, price)
    }

    #[inline]
    pub fn start_index(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn end_index(&self) -> usize {
        self.end
    }

    /// Declared direction tag; not used by the math
    #[inline]
    pub fn direction(&self) -> WaveDirection {
        self.direction
    }

    #[inline]
    pub fn start_price(&self) -> Decimal {
        self.start_price
    }

    #[inline]
    pub fn end_price(&self) -> Decimal {
        self.end_price
    }

    #[inline]
    pub fn high(&self) -> Decimal {
        self.start_price.max(self.end_price)
    }

    #[inline]
    pub fn low(&self) -> Decimal {
        self.start_price.min(self.end_price)
    }

    #[inline]
    pub fn height(&self) -> Decimal {
        self.high() - self.low()
    }

    /// Prices actually moved up, independent of the declared tag
    #[inline]
    pub fn is_up(&self) -> bool {
        self.end_price > self.start_price
    }

    /// Levels from low to high. With a completion fraction `c` only levels at
    /// or below `low + c * height` are emitted.
    pub fn levels(&self, completion: Option<Ratio>) -> Vec<FibLevel> {
        let low = self.low();
        let height = self.height();
        let top = low.saturating_add(completion.unwrap_or(Ratio::ONE).get() * height);

        FIB_RATIOS
            .iter()
            .map(|&ratio| FibLevel {
                ratio,
                price: low.saturating_add(ratio * height),
            })
            .filter(|level| level.price <= top)
            .collect()
    }

    /// Band half-width for a tolerance `factor`
    #[inline]
    pub fn tolerance(&self, factor: Ratio) -> Decimal {
        factor.get() * self.height()
    }

    /// Bars touching any of `levels`. `levels` is checked in order and the
    /// first hit wins, so each bar confirms at most once.
    pub fn confirmations<T: OHLCV>(
        &self,
        bars: &[T],
        levels: &[FibLevel],
        factor: Ratio,
        scope: ConfirmationScope,
    ) -> Vec<Confirmation> {
        let tol = self.tolerance(factor);
        let span = self.start.min(self.end)..=self.start.max(self.end);

        bars.iter()
            .enumerate()
            .filter(|(i, _)| scope == ConfirmationScope::AllBars || !span.contains(i))
            .filter_map(|(index, bar)| {
                levels
                    .iter()
                    .find(|level| bar.touches(level.price, tol))
                    .map(|&level| Confirmation { index, level })
            })
            .collect()
    }
}

/// The seven levels of `wave`, optionally cut at a completion fraction
pub fn levels<T: OHLCV>(wave: &Wave, bars: &[T], completion: Option<Ratio>) -> Result<Vec<FibLevel>> {
    Ok(Retracement::for_wave(wave, bars)?.levels(completion))
}

/// Confirmations over every bar with the default 0.5% tolerance
pub fn confirmations<T: OHLCV>(wave: &Wave, bars: &[T], levels: &[FibLevel]) -> Result<Vec<Confirmation>> {
    Ok(Retracement::for_wave(wave, bars)?.confirmations(
        bars,
        levels,
        DEFAULT_TOLERANCE,
        ConfirmationScope::AllBars,
    ))
}
