//! Incremental bar indicators.
//!
//! Every indicator consumes one [`Candle`] per call and keeps its own window
//! state. Windows are fixed-capacity ring buffers carrying running sums so a
//! bar costs O(1) regardless of the period.

pub mod bollinger;
pub mod efficiency;
pub mod ema_slope;

use std::collections::VecDeque;

use crate::types::Candle;

pub use bollinger::{BollingerBands, BollingerReading};
pub use efficiency::{EfficiencyReading, MarketEfficiency};
pub use ema_slope::EmaSlope;

/// A source of a normalized trend slope in `[-1, 1]`.
///
/// Returns `None` until the implementation has enough history to emit a
/// slope. Implementations are interchangeable inside the strategy.
pub trait TrendSignal {
    fn update(&mut self, candle: &Candle) -> Option<f64>;
}

impl<T: TrendSignal + ?Sized> TrendSignal for Box<T> {
    fn update(&mut self, candle: &Candle) -> Option<f64> {
        (**self).update(candle)
    }
}

/// Fixed-capacity sliding window with running sum and sum of squares.
///
/// Aggregates are maintained by add-newest / subtract-oldest, so long runs
/// accumulate floating-point drift relative to a fresh summation. Use
/// [`RollingWindow::recomputed_sum`] to measure it.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    values: VecDeque<f64>,
    sum: f64,
    sum_squares: f64,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity + 1),
            sum: 0.0,
            sum_squares: 0.0,
        }
    }

    /// Push a value, evicting and returning the oldest once full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.values.push_back(value);
        self.sum += value;
        self.sum_squares += value * value;

        if self.values.len() > self.capacity {
            let removed = self.values.pop_front()?;
            self.sum -= removed;
            self.sum_squares -= removed * removed;
            return Some(removed);
        }
        None
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.values.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Oldest value still in the window.
    pub fn oldest(&self) -> Option<f64> {
        self.values.front().copied()
    }

    /// Newest value in the window.
    pub fn newest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.sum / self.values.len() as f64)
    }

    /// Population standard deviation. Negative variance from cancellation
    /// error is floored at zero.
    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let n = self.values.len() as f64;
        let variance = (self.sum_squares / n) - mean * mean;
        Some(variance.max(0.0).sqrt())
    }

    /// Sum computed from scratch over the current contents.
    pub fn recomputed_sum(&self) -> f64 {
        self.values.iter().sum()
    }
}

/// Normalize a mid-line slope to `[-1, 1]`.
///
/// The denominator is `std_dev`, falling back to `|prev_mid|` and then
/// `|mid|` when zero. If all three are zero the slope is exactly 0.
/// A NaN result is passed through so callers treat it as not ready.
pub(crate) fn normalize_slope(mid: f64, prev_mid: f64, std_dev: f64) -> f64 {
    let slope = mid - prev_mid;
    let denom = if std_dev != 0.0 {
        std_dev
    } else if prev_mid != 0.0 {
        prev_mid.abs()
    } else {
        mid.abs()
    };

    if denom == 0.0 {
        return 0.0;
    }
    let norm = slope / denom;
    if norm.is_nan() {
        return norm;
    }
    norm.clamp(-1.0, 1.0)
}
