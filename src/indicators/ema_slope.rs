//! EMA-slope trend indicator.
//!
//! Keeps a window of the last `span` EMA values and reports how far the
//! window mean moved since the previous bar, scaled by the window's standard
//! deviation and clamped to `[-1, 1]`.

use crate::indicators::{normalize_slope, RollingWindow, TrendSignal};
use crate::types::Candle;

#[derive(Debug, Clone)]
pub struct EmaSlope {
    span: usize,
    alpha: f64,
    decay: f64,
    /// Seeded at zero, so the first value is `close * alpha`.
    ema: f64,
    window: RollingWindow,
    prev_mean: Option<f64>,
}

impl EmaSlope {
    pub fn new(span: usize) -> Self {
        let alpha = 2.0 / (span as f64 + 1.0);
        Self {
            span,
            alpha,
            decay: 1.0 - alpha,
            ema: 0.0,
            window: RollingWindow::new(span),
            prev_mean: None,
        }
    }

    pub fn span(&self) -> usize {
        self.span
    }

    /// Latest raw EMA value.
    pub fn ema(&self) -> f64 {
        self.ema
    }
}

impl TrendSignal for EmaSlope {
    /// Not ready for the first `span` bars: the window fills on bar `span`
    /// and the slope needs the mean from the bar before.
    fn update(&mut self, candle: &Candle) -> Option<f64> {
        self.ema = candle.close * self.alpha + self.ema * self.decay;
        self.window.push(self.ema);

        if !self.window.is_full() {
            return None;
        }

        let mean = self.window.mean()?;
        let std_dev = self.window.std_dev()?;
        let prev_mean = self.prev_mean.replace(mean)?;

        let norm = normalize_slope(mean, prev_mean, std_dev);
        if norm.is_nan() {
            return None;
        }
        Some(norm)
    }
}
