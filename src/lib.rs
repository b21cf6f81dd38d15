//! # wavefib - peak/valley waves with Fibonacci retracement confirmation
//!
//! Parses OHLCV rows, detects margin-based peaks and valleys, enumerates the
//! up/down waves connecting them, and evaluates Fibonacci retracement levels and
//! confirmation bars for a selected wave. A discrete [`SimulationClock`] replays
//! a wave's progress step by step.
//!
//! ## Quick Start
//!
//! ```rust
//! use wavefib::prelude::*;
//!
//! let rows = [
//!     "Date,Open,High,Low,Close,Volume",
//!     "2021-02-01,10,12,9,11,100",
//!     "2021-02-02,11,15,10,14,100",
//!     "2021-02-03,14,14,11,12,100",
//!     "2021-02-04,12,13,8,9,100",
//!     "2021-02-05,9,10,7,8,100",
//!     "2021-02-06,8,11,7.5,10,100",
//! ];
//! let ingest = Series::ingest(rows);
//!
//! let analyzer = AnalyzerBuilder::new()
//!     .margin(Margin::new(1).unwrap())
//!     .build()
//!     .unwrap();
//!
//! let analysis = analyzer.analyze_all(&ingest.series);
//! for wave in &analysis.waves {
//!     let levels = analyzer.levels(wave, &analysis.view, None).unwrap();
//!     let hits = analyzer.confirmations(wave, &analysis.view, &levels).unwrap();
//!     println!("{}: {} confirmations", wave.describe(&analysis.view).unwrap(), hits.len());
//! }
//! ```

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tracing::debug;

pub mod bar;
pub mod config;
pub mod extrema;
pub mod fibonacci;
pub mod parser;
pub mod selection;
pub mod series;
pub mod simulation;
pub mod waves;

pub mod prelude {
    pub use crate::{
        // Data
        bar::Bar,
        // Configuration
        config::{AnalysisConfig, ConfirmationConfig, SimulationConfig},
        // Detection
        extrema::{Extrema, ExtremumPoint},
        // Fibonacci
        fibonacci::{Confirmation, ConfirmationScope, FibLevel, Retracement, FIB_RATIOS},
        // Parallel
        analyze_parallel,
        // Parsing
        parser::{parse_row, to_row, Delimiter},
        selection::Selection,
        series::{Ingest, PriceBounds, Series, SeriesView, ViewStatus},
        simulation::{ClockState, SimulationClock, SimulationState, Tick},
        waves::{PriceBox, Wave, WaveDirection},
        // Engine
        Analysis,
        AnalyzerBuilder,
        InstrumentReport,
        Margin,
        OHLCVExt,
        Ratio,
        Result,
        StepCount,
        WaveAnalyzer,
        // Errors
        WaveError,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, WaveError>;

/// Errors raised by parsing, analysis and simulation
#[derive(Debug, thiserror::Error)]
pub enum WaveError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Unparseable date token {token:?}")]
    DateParse { token: String },

    #[error("Row is missing the {field} field")]
    MissingField { field: &'static str },

    #[error("Index {index} outside view of {len} bars")]
    InvalidIndex { index: usize, len: usize },

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("Price arithmetic overflowed in {0}")]
    Overflow(&'static str),

    #[error("Cannot {op} while the simulation is {state}")]
    InvalidTransition {
        op: &'static str,
        state: simulation::ClockState,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Fraction in range 0..=1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ratio(Decimal);

impl Ratio {
    pub const ZERO: Ratio = Ratio(Decimal::ZERO);
    pub const ONE: Ratio = Ratio(Decimal::ONE);

    /// Create a new Ratio, validating the value is in [0, 1]
    pub fn new(value: Decimal) -> Result<Self> {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(WaveError::OutOfRange {
                field: "Ratio",
                value,
                min: Decimal::ZERO,
                max: Decimal::ONE,
            });
        }
        Ok(Self(value))
    }

    /// Whole percent, e.g. `from_percent(20)` is 0.20
    pub fn from_percent(percent: u32) -> Result<Self> {
        Self::new(Decimal::new(i64::from(percent), 2))
    }

    /// `numerator / denominator`, for callers that already hold `numerator <= denominator`
    pub(crate) fn fraction(numerator: usize, denominator: usize) -> Self {
        if denominator == 0 {
            return Self::ZERO;
        }
        let value = Decimal::from(numerator) / Decimal::from(denominator);
        Self(value.clamp(Decimal::ZERO, Decimal::ONE))
    }

    #[doc(hidden)]
    pub const fn new_const(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> Decimal {
        self.0
    }
}

impl std::fmt::Display for Ratio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.0, s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = <Decimal as serde::Deserialize>::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Number of neighbours examined on each side of a candidate extremum (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Margin(usize);

impl Margin {
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(WaveError::InvalidValue("Margin must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Margin {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Margin {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Margin::new(value).map_err(serde::de::Error::custom)
    }
}

/// Number of discrete simulation steps (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StepCount(usize);

impl StepCount {
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(WaveError::InvalidValue("StepCount must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for StepCount {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for StepCount {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        StepCount::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> Decimal;
    fn high(&self) -> Decimal;
    fn low(&self) -> Decimal;
    fn close(&self) -> Decimal;
    fn volume(&self) -> u64;
    fn timestamp(&self) -> NaiveDateTime;
}

/// Views hold `&Bar`, so references forward to the underlying bar
impl<T: OHLCV + ?Sized> OHLCV for &T {
    fn open(&self) -> Decimal {
        (**self).open()
    }

    fn high(&self) -> Decimal {
        (**self).high()
    }

    fn low(&self) -> Decimal {
        (**self).low()
    }

    fn close(&self) -> Decimal {
        (**self).close()
    }

    fn volume(&self) -> u64 {
        (**self).volume()
    }

    fn timestamp(&self) -> NaiveDateTime {
        (**self).timestamp()
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn range(&self) -> Decimal {
        self.high().saturating_sub(self.low())
    }

    /// True if `[low, high]` overlaps `[level - tol, level + tol]`. The band
    /// saturates at the ends of the `Decimal` range.
    #[inline]
    fn touches(&self, level: Decimal, tolerance: Decimal) -> bool {
        self.low() <= level.saturating_add(tolerance) && self.high() >= level.saturating_sub(tolerance)
    }

    /// Check OHLC consistency. Nothing in the pipeline calls this; parsed bars
    /// are never corrected.
    fn validate(&self) -> Result<()> {
        if self.high() < self.low() {
            return Err(WaveError::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        if self.open() < self.low() || self.open() > self.high() {
            return Err(WaveError::InvalidOHLCV {
                index: 0,
                reason: "open outside [low, high]",
            });
        }
        if self.close() < self.low() || self.close() > self.high() {
            return Err(WaveError::InvalidOHLCV {
                index: 0,
                reason: "close outside [low, high]",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV + ?Sized> OHLCVExt for T {}

/// Validate every bar, reporting the first offending index
pub fn validate_bars<T: OHLCV>(bars: &[T]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            WaveError::InvalidOHLCV { reason, .. } => WaveError::InvalidOHLCV { index: i, reason },
            other => other,
        })?;
    }
    Ok(())
}

/// Fail fast when `index` is not a position in `bars`
#[inline]
pub(crate) fn check_index<T>(bars: &[T], index: usize) -> Result<&T> {
    bars.get(index).ok_or(WaveError::InvalidIndex {
        index,
        len: bars.len(),
    })
}

// ============================================================
// ANALYZER
// ============================================================

use config::AnalysisConfig;
use extrema::Extrema;
use fibonacci::{Confirmation, FibLevel, Retracement};
use series::{PriceBounds, Series, SeriesView, ViewStatus};
use simulation::SimulationClock;
use waves::{Wave, WaveDirection};

/// Result of running the detection pipeline over one date-filtered view
#[derive(Debug, Clone)]
pub struct Analysis<'a> {
    pub view: SeriesView<'a>,
    pub extrema: Extrema,
    pub waves: Vec<Wave>,
}

impl<'a> Analysis<'a> {
    /// Tells "no data at all" apart from "no data in range"
    #[inline]
    pub fn status(&self) -> ViewStatus {
        self.view.status()
    }

    pub fn up_waves(&self) -> impl Iterator<Item = &Wave> + '_ {
        self.waves.iter().filter(|w| w.direction() == WaveDirection::Up)
    }

    pub fn down_waves(&self) -> impl Iterator<Item = &Wave> + '_ {
        self.waves.iter().filter(|w| w.direction() == WaveDirection::Down)
    }

    #[inline]
    pub fn price_bounds(&self) -> PriceBounds {
        self.view.price_bounds()
    }

    /// Resolve a `"<start> - <end>"` description back to a wave
    pub fn find_wave(&self, description: &str) -> Option<Wave> {
        waves::find_wave(&self.waves, &self.view, description)
    }
}

/// Main analysis engine
#[derive(Debug, Clone, Default)]
pub struct WaveAnalyzer {
    config: AnalysisConfig,
}

impl WaveAnalyzer {
    #[inline]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    // ===========================================
    // LOW-LEVEL: Primitives
    // ===========================================

    /// Peaks and valleys using the configured margin
    #[inline]
    pub fn detect<T: OHLCV>(&self, bars: &[T]) -> Extrema {
        extrema::detect(bars, self.config.margin)
    }

    /// All candidate waves, truncated to `max_waves` when configured
    pub fn enumerate(&self, extrema: &Extrema) -> Vec<Wave> {
        let mut waves = waves::enumerate(&extrema.peaks, &extrema.valleys);
        if let Some(cap) = self.config.max_waves {
            waves.truncate(cap);
        }
        waves
    }

    // ===========================================
    // MID-LEVEL: Fibonacci for a selected wave
    // ===========================================

    /// Retracement levels for `wave`, partially revealed when `completion` is set
    pub fn levels<T: OHLCV>(
        &self,
        wave: &Wave,
        bars: &[T],
        completion: Option<Ratio>,
    ) -> Result<Vec<FibLevel>> {
        Ok(Retracement::for_wave(wave, bars)?.levels(completion))
    }

    /// Bars touching any of `levels`, using the configured tolerance and scope
    pub fn confirmations<T: OHLCV>(
        &self,
        wave: &Wave,
        bars: &[T],
        levels: &[FibLevel],
    ) -> Result<Vec<Confirmation>> {
        let retracement = Retracement::for_wave(wave, bars)?;
        Ok(self.confirm(&retracement, bars, levels))
    }

    /// Confirmations for an arbitrary retracement (simulated or drag preview)
    pub fn confirm<T: OHLCV>(
        &self,
        retracement: &Retracement,
        bars: &[T],
        levels: &[FibLevel],
    ) -> Vec<Confirmation> {
        let confirmation = &self.config.confirmation;
        retracement.confirmations(bars, levels, confirmation.tolerance, confirmation.scope)
    }

    /// Select `wave` on `clock` using the configured range and step count
    pub fn select<T: OHLCV>(&self, clock: &mut SimulationClock, wave: Wave, bars: &[T]) -> Result<()> {
        let sim = &self.config.simulation;
        clock.select(wave, bars, sim.range, sim.max_steps)
    }

    /// Start `clock` on `wave` using the configured range and step count
    pub fn start<T: OHLCV>(&self, clock: &mut SimulationClock, wave: Wave, bars: &[T]) -> Result<()> {
        let sim = &self.config.simulation;
        clock.start(wave, bars, sim.range, sim.max_steps)
    }

    // ===========================================
    // HIGH-LEVEL: Pipeline
    // ===========================================

    /// Filter by inclusive date range, then detect and enumerate
    pub fn analyze<'a>(
        &self,
        series: &'a Series,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Analysis<'a> {
        self.analyze_view(series.filter_by_date(start, end))
    }

    /// Pipeline over the whole series
    pub fn analyze_all<'a>(&self, series: &'a Series) -> Analysis<'a> {
        self.analyze_view(series.view())
    }

    pub fn analyze_view<'a>(&self, view: SeriesView<'a>) -> Analysis<'a> {
        let extrema = self.detect(&view);
        let waves = self.enumerate(&extrema);
        debug!(
            source = view.source_len(),
            bars = view.len(),
            peaks = extrema.peaks.len(),
            valleys = extrema.valleys.len(),
            waves = waves.len(),
            "analysis complete"
        );
        Analysis {
            view,
            extrema,
            waves,
        }
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating WaveAnalyzer instances
#[derive(Debug, Clone, Default)]
pub struct AnalyzerBuilder {
    config: AnalysisConfig,
}

impl AnalyzerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration
    pub fn from_config(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn margin(mut self, margin: Margin) -> Self {
        self.config.margin = margin;
        self
    }

    /// Cap the number of enumerated waves
    pub fn max_waves(mut self, cap: usize) -> Self {
        self.config.max_waves = Some(cap);
        self
    }

    /// Confirmation band half-width as a fraction of wave height
    pub fn tolerance(mut self, tolerance: Ratio) -> Self {
        self.config.confirmation.tolerance = tolerance;
        self
    }

    pub fn confirmation_scope(mut self, scope: fibonacci::ConfirmationScope) -> Self {
        self.config.confirmation.scope = scope;
        self
    }

    pub fn simulation_range(mut self, range: Ratio) -> Self {
        self.config.simulation.range = range;
        self
    }

    pub fn max_steps(mut self, steps: StepCount) -> Self {
        self.config.simulation.max_steps = steps;
        self
    }

    /// Build the analyzer
    pub fn build(self) -> Result<WaveAnalyzer> {
        self.config.validate()?;
        Ok(WaveAnalyzer {
            config: self.config,
        })
    }
}

// ============================================================
// PARALLEL ANALYSIS
// ============================================================

use rayon::prelude::*;

/// Owned summary of one instrument's analysis
#[derive(Debug, Clone, serde::Serialize)]
pub struct InstrumentReport {
    pub symbol: String,
    pub status: ViewStatus,
    pub source_len: usize,
    pub view_len: usize,
    pub extrema: Extrema,
    pub waves: Vec<Wave>,
}

/// Analyze several instruments independently over the same date range
pub fn analyze_parallel<'a, I>(
    analyzer: &WaveAnalyzer,
    instruments: I,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Vec<InstrumentReport>
where
    I: IntoParallelIterator<Item = (&'a str, &'a Series)>,
{
    instruments
        .into_par_iter()
        .map(|(symbol, series)| {
            let analysis = analyzer.analyze(series, start, end);
            InstrumentReport {
                symbol: symbol.to_string(),
                status: analysis.status(),
                source_len: analysis.view.source_len(),
                view_len: analysis.view.len(),
                extrema: analysis.extrema,
                waves: analysis.waves,
            }
        })
        .collect()
}

// ============================================================
// TESTS
// ============================================================
