//! Analysis settings and their metadata
//!
//! [`AnalysisConfig`] gathers every tunable of the pipeline. It deserializes
//! from any serde format; missing keys fall back to defaults and unknown keys
//! are rejected. Individual settings can also be overridden by name, which is
//! what the command line `--set key=value` flag uses.
//!
//! # Example
//!
//! ```rust
//! use wavefib::config::{AnalysisConfig, SETTINGS};
//!
//! let mut config = AnalysisConfig::default();
//! config.apply("margin", "3").unwrap();
//! config.apply("scope", "outside_wave").unwrap();
//! assert_eq!(config.margin.get(), 3);
//!
//! for setting in SETTINGS {
//!   println!("{} = {} ({})", setting.name, setting.default, setting.description);
//! }
//! ```

use std::{str::FromStr, time::Duration};

use rust_decimal::Decimal;

use crate::{
  fibonacci::{ConfirmationScope, DEFAULT_TOLERANCE},
  simulation::{DEFAULT_RANGE, DEFAULT_STEPS, DEFAULT_TICK_INTERVAL},
  Margin, Ratio, Result, StepCount, WaveError,
};

// ============================================================
// DEFAULTS
// ============================================================

pub const DEFAULT_MARGIN: Margin = Margin::new_const(2);

/// Vertical padding around the price axis, 2%
pub const DEFAULT_DISPLAY_BUFFER: Ratio = Ratio::new_const(hundredths(2));

// ============================================================
// CONFIG
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
  /// Neighbours examined on each side of a candidate extremum
  pub margin: Margin,
  /// Truncate wave enumeration; `None` keeps every candidate
  pub max_waves: Option<usize>,
  pub confirmation: ConfirmationConfig,
  pub simulation: SimulationConfig,
  /// Padding applied by [`PriceBounds::padded`](crate::series::PriceBounds::padded)
  pub display_buffer: Ratio,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfirmationConfig {
  /// Band half-width as a fraction of wave height
  pub tolerance: Ratio,
  pub scope: ConfirmationScope,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
  /// Target distance beyond the start price, as a fraction of wave height
  pub range: Ratio,
  pub max_steps: StepCount,
  pub tick_interval_ms: u64,
}

impl Default for AnalysisConfig {
  fn default() -> Self {
    Self {
      margin: DEFAULT_MARGIN,
      max_waves: None,
      confirmation: ConfirmationConfig::default(),
      simulation: SimulationConfig::default(),
      display_buffer: DEFAULT_DISPLAY_BUFFER,
    }
  }
}

impl Default for ConfirmationConfig {
  fn default() -> Self {
    Self { tolerance: DEFAULT_TOLERANCE, scope: ConfirmationScope::AllBars }
  }
}

impl Default for SimulationConfig {
  fn default() -> Self {
    Self {
      range: DEFAULT_RANGE,
      max_steps: DEFAULT_STEPS,
      tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
    }
  }
}

impl SimulationConfig {
  #[inline]
  pub fn tick_interval(&self) -> Duration {
    Duration::from_millis(self.tick_interval_ms)
  }
}

impl AnalysisConfig {
  /// Checks that cannot be expressed by the field types alone
  pub fn validate(&self) -> Result<()> {
    if self.max_waves == Some(0) {
      return Err(WaveError::InvalidConfig("max_waves must be > 0 when set".into()));
    }
    if self.simulation.tick_interval_ms == 0 {
      return Err(WaveError::InvalidConfig("tick_interval_ms must be > 0".into()));
    }
    Ok(())
  }

  /// Override one setting by its [`SETTINGS`] name
  pub fn apply(&mut self, name: &str, value: &str) -> Result<()> {
    match name {
      "margin" => self.margin = Margin::new(parse(name, value)?)?,
      "max_waves" => {
        self.max_waves = match value {
          "none" | "" => None,
          v => Some(parse(name, v)?),
        }
      },
      "tolerance" => self.confirmation.tolerance = Ratio::new(parse(name, value)?)?,
      "scope" => {
        self.confirmation.scope = match value {
          "all_bars" => ConfirmationScope::AllBars,
          "outside_wave" => ConfirmationScope::OutsideWave,
          _ => return Err(unparseable(name, value)),
        }
      },
      "range" => self.simulation.range = Ratio::new(parse(name, value)?)?,
      "steps" => self.simulation.max_steps = StepCount::new(parse(name, value)?)?,
      "tick_interval_ms" => self.simulation.tick_interval_ms = parse(name, value)?,
      "display_buffer" => self.display_buffer = Ratio::new(parse(name, value)?)?,
      _ => return Err(WaveError::InvalidConfig(format!("unknown setting {name:?}"))),
    }
    Ok(())
  }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T> {
  value.trim().parse().map_err(|_| unparseable(name, value))
}

fn unparseable(name: &str, value: &str) -> WaveError {
  WaveError::InvalidConfig(format!("{name}: cannot parse {value:?}"))
}

// ============================================================
// SETTING METADATA
// ============================================================

/// Description of one overridable setting
#[derive(Debug, Clone)]
pub struct SettingMeta {
  pub name: &'static str,
  pub default: &'static str,
  /// Sweep range for numeric settings: (min, max, step)
  pub range: Option<(Decimal, Decimal, Decimal)>,
  pub description: &'static str,
}

impl SettingMeta {
  const fn new(
    name: &'static str,
    default: &'static str,
    range: Option<(Decimal, Decimal, Decimal)>,
    description: &'static str,
  ) -> Self {
    Self { name, default, range, description }
  }

  /// Every value of the sweep range, inclusive. Empty for settings without one.
  pub fn grid(&self) -> Vec<Decimal> {
    let Some((min, max, step)) = self.range else {
      return Vec::new();
    };
    let mut values = Vec::new();
    let mut v = min;
    while v <= max && step > Decimal::ZERO {
      values.push(v);
      v += step;
    }
    values
  }

  pub fn find(name: &str) -> Option<&'static SettingMeta> {
    SETTINGS.iter().find(|s| s.name == name)
  }
}

const fn whole(v: u32) -> Decimal {
  Decimal::from_parts(v, 0, 0, false, 0)
}

const fn hundredths(v: u32) -> Decimal {
  Decimal::from_parts(v, 0, 0, false, 2)
}

const fn thousandths(v: u32) -> Decimal {
  Decimal::from_parts(v, 0, 0, false, 3)
}

pub static SETTINGS: &[SettingMeta] = &[
  SettingMeta::new("margin", "2", Some((whole(1), whole(4), whole(1))), "Neighbours on each side of an extremum"),
  SettingMeta::new("max_waves", "none", None, "Cap on enumerated waves"),
  SettingMeta::new(
    "tolerance",
    "0.005",
    Some((thousandths(1), hundredths(2), thousandths(1))),
    "Confirmation band half-width, fraction of wave height",
  ),
  SettingMeta::new("scope", "all_bars", None, "all_bars or outside_wave"),
  SettingMeta::new("range", "0.20", Some((hundredths(10), hundredths(50), hundredths(10))), "Simulation target, fraction of wave height"),
  SettingMeta::new("steps", "32", Some((whole(8), whole(64), whole(8))), "Simulation step count"),
  SettingMeta::new("tick_interval_ms", "500", None, "Reference cadence for ticks"),
  SettingMeta::new("display_buffer", "0.02", None, "Price axis padding"),
];

// ============================================================
// TESTS
// ============================================================
