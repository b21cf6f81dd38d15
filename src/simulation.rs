//! Discrete replay of a wave's progress
//!
//! The clock interpolates linearly from the start bar's high towards a target
//! price over `max_steps` steps:
//!
//! ```text
//! target = start + range * |low(end) - high(start)|
//! price  = start + (target - start) * step / max_steps
//! ```
//!
//! The target is always above the start, for down-waves too. The clock owns
//! no timer; an external scheduler calls [`SimulationClock::tick`], nominally
//! every [`DEFAULT_TICK_INTERVAL`].
//!
//! `select` loads a wave into `Idle`, `start` enters `Running`, and `stop` or
//! a tick past the last step moves to `Paused`. Manual stepping is only
//! accepted outside `Running`.

use std::{fmt, time::Duration};

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::{check_index, waves::Wave, Ratio, Result, StepCount, WaveError, OHLCV};

/// Reference cadence for driving [`SimulationClock::tick`]
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(500);

pub const DEFAULT_STEPS: StepCount = StepCount::new_const(32);

/// 20% of the wave height
pub const DEFAULT_RANGE: Ratio = Ratio::new_const(Decimal::from_parts(20, 0, 0, false, 2));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockState {
    #[default]
    Idle,
    Running,
    Paused,
}

impl fmt::Display for ClockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClockState::Idle => "idle",
            ClockState::Running => "running",
            ClockState::Paused => "paused",
        })
    }
}

/// Outcome of one [`SimulationClock::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Advanced { step: usize, price: Decimal },
    /// The clock was already at `max_steps` and is now paused
    Completed { step: usize },
}

/// Serializable snapshot of a clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SimulationState {
    pub state: ClockState,
    pub step: usize,
    pub max_steps: StepCount,
    pub range: Ratio,
    pub start_price: Decimal,
    pub target_price: Decimal,
    pub price: Decimal,
}

/// Bounded step counter over a selected wave. Single writer, not synchronized.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    state: ClockState,
    wave: Option<Wave>,
    step: usize,
    max_steps: StepCount,
    range: Ratio,
    start_price: Decimal,
    target_price: Decimal,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self {
            state: ClockState::Idle,
            wave: None,
            step: 0,
            max_steps: DEFAULT_STEPS,
            range: DEFAULT_RANGE,
            start_price: Decimal::ZERO,
            target_price: Decimal::ZERO,
        }
    }
}

impl SimulationClock {
    /// Load `wave` and reset to step 0 in `Idle`. Valid from any state.
    pub fn select<T: OHLCV>(
        &mut self,
        wave: Wave,
        bars: &[T],
        range: Ratio,
        max_steps: StepCount,
    ) -> Result<()> {
        let start_price = check_index(bars, wave.start_index())?.high();
        let end_low = check_index(bars, wave.end_index())?.low();
        let target_price = end_low
            .checked_sub(start_price)
            .and_then(|diff| start_price.checked_add(range.get() * diff.abs()))
            .ok_or(WaveError::Overflow("simulation target"))?;

        self.wave = Some(wave);
        self.step = 0;
        self.max_steps = max_steps;
        self.range = range;
        self.start_price = start_price;
        self.target_price = target_price;
        self.state = ClockState::Idle;

        debug!(
            start = wave.start_index(),
            end = wave.end_index(),
            %start_price,
            target_price = %self.target_price,
            "simulation wave selected"
        );
        Ok(())
    }

    /// [`select`](Self::select) then enter `Running`. Restarts from step 0
    /// whatever the current state.
    pub fn start<T: OHLCV>(
        &mut self,
        wave: Wave,
        bars: &[T],
        range: Ratio,
        max_steps: StepCount,
    ) -> Result<()> {
        self.select(wave, bars, range, max_steps)?;
        self.state = ClockState::Running;
        Ok(())
    }

    /// Advance one step. At `max_steps` the clock pauses instead and the
    /// step is left unchanged.
    pub fn tick(&mut self) -> Result<Tick> {
        if self.state != ClockState::Running {
            return Err(self.invalid("tick"));
        }
        if self.step >= self.max_steps.get() {
            self.state = ClockState::Paused;
            info!(step = self.step, price = %self.price(), "simulation complete");
            return Ok(Tick::Completed { step: self.step });
        }
        self.step += 1;
        Ok(Tick::Advanced {
            step: self.step,
            price: self.price(),
        })
    }

    /// Move by `delta` steps, clamped to `[0, max_steps]`. Not allowed while
    /// running; never changes state. Returns the new step.
    pub fn step_by(&mut self, delta: i64) -> Result<usize> {
        if self.state == ClockState::Running {
            return Err(self.invalid("step"));
        }
        let max = i64::try_from(self.max_steps.get()).unwrap_or(i64::MAX);
        let current = i64::try_from(self.step).unwrap_or(i64::MAX);
        let next = current.saturating_add(delta).clamp(0, max);
        // clamped into [0, max_steps], which fits usize
        self.step = usize::try_from(next).unwrap_or(self.max_steps.get());
        Ok(self.step)
    }

    /// `Running -> Paused`, keeping the step
    pub fn stop(&mut self) -> Result<()> {
        if self.state != ClockState::Running {
            return Err(self.invalid("stop"));
        }
        self.state = ClockState::Paused;
        Ok(())
    }

    fn invalid(&self, op: &'static str) -> WaveError {
        WaveError::InvalidTransition {
            op,
            state: self.state,
        }
    }

    #[inline]
    pub fn state(&self) -> ClockState {
        self.state
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    #[inline]
    pub fn wave(&self) -> Option<Wave> {
        self.wave
    }

    #[inline]
    pub fn step(&self) -> usize {
        self.step
    }

    #[inline]
    pub fn max_steps(&self) -> StepCount {
        self.max_steps
    }

    #[inline]
    pub fn range(&self) -> Ratio {
        self.range
    }

    #[inline]
    pub fn start_price(&self) -> Decimal {
        self.start_price
    }

    #[inline]
    pub fn target_price(&self) -> Decimal {
        self.target_price
    }

    /// Interpolated price at the current step. Multiplies before dividing so
    /// the last step lands exactly on the target, unless the product would
    /// not fit in a `Decimal`.
    pub fn price(&self) -> Decimal {
        // target >= start, and select already checked the target fits
        let distance = self.target_price - self.start_price;
        let step = Decimal::from(self.step);
        let steps = Decimal::from(self.max_steps.get());
        let travelled = match distance.checked_mul(step) {
            Some(product) => product / steps,
            None => distance / steps * step,
        };
        self.start_price.saturating_add(travelled)
    }

    /// `step / max_steps`
    #[inline]
    pub fn completion(&self) -> Ratio {
        Ratio::fraction(self.step, self.max_steps.get())
    }

    pub fn snapshot(&self) -> SimulationState {
        SimulationState {
            state: self.state,
            step: self.step,
            max_steps: self.max_steps,
            range: self.range,
            start_price: self.start_price,
            target_price: self.target_price,
            price: self.price(),
        }
    }
}
