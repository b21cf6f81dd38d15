//! Index selection behind a drag gesture
//!
//! A drag anchors on a detected extremum and tracks a cursor position until
//! released. Releasing discards the selection; the caller snapshots
//! [`Selection::span`] or [`Selection::preview`] beforehand if it needs them.

use crate::{extrema::Extrema, fibonacci::Retracement, Result, OHLCV};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    drag: Option<(usize, usize)>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor a drag at `index`. Only peaks and valleys can anchor; any
    /// other index leaves the selection untouched and returns `false`.
    pub fn begin(&mut self, extrema: &Extrema, index: usize) -> bool {
        if !extrema.is_extremum(index) {
            return false;
        }
        self.drag = Some((index, index));
        true
    }

    /// Move the cursor. `false` when not dragging or nothing changed.
    pub fn drag_to(&mut self, index: usize) -> bool {
        match &mut self.drag {
            Some((_, cursor)) if *cursor != index => {
                *cursor = index;
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// `(anchor, cursor)` of the active drag
    #[inline]
    pub fn span(&self) -> Option<(usize, usize)> {
        self.drag
    }

    /// Retracement between anchor and cursor, for previewing an in-progress
    /// drag. `None` when idle or before the cursor has moved.
    pub fn preview<T: OHLCV>(&self, bars: &[T]) -> Result<Option<Retracement>> {
        match self.drag {
            Some((anchor, cursor)) if anchor != cursor => {
                Retracement::between(bars, anchor, cursor).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// End the gesture, returning the span it had
    pub fn release(&mut self) -> Option<(usize, usize)> {
        self.drag.take()
    }
}
