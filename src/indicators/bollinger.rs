//! Bollinger-band trend indicator.
//!
//! Rolling mean and standard deviation of raw closes. The band mid-line's
//! bar-over-bar change, normalized like [`EmaSlope`](super::EmaSlope), makes
//! it a drop-in [`TrendSignal`].

use crate::indicators::{normalize_slope, RollingWindow, TrendSignal};
use crate::types::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerReading {
    pub mid: f64,
    pub upper: f64,
    pub lower: f64,
    /// `(upper - lower) / mid`, or 0 when mid is 0.
    pub width: f64,
    /// `(close - mid) / std_dev`, or 0 when the window has no variance.
    pub z_score: f64,
    /// Mid-line slope in `[-1, 1]`.
    pub normalized_slope: f64,
}

#[derive(Debug, Clone)]
pub struct BollingerBands {
    multiplier: f64,
    closes: RollingWindow,
    prev_mid: Option<f64>,
}

impl BollingerBands {
    pub fn new(period: usize, multiplier: f64) -> Self {
        Self {
            multiplier,
            closes: RollingWindow::new(period),
            prev_mid: None,
        }
    }

    /// Consume one bar and return the full band state once warm.
    pub fn update_bands(&mut self, candle: &Candle) -> Option<BollingerReading> {
        self.closes.push(candle.close);
        if !self.closes.is_full() {
            return None;
        }

        let mid = self.closes.mean()?;
        let std_dev = self.closes.std_dev()?;
        let prev_mid = self.prev_mid.replace(mid)?;

        let normalized_slope = normalize_slope(mid, prev_mid, std_dev);
        if normalized_slope.is_nan() {
            return None;
        }

        let upper = mid + self.multiplier * std_dev;
        let lower = mid - self.multiplier * std_dev;
        let width = if mid != 0.0 { (upper - lower) / mid } else { 0.0 };
        let z_score = if std_dev != 0.0 {
            (candle.close - mid) / std_dev
        } else {
            0.0
        };

        Some(BollingerReading {
            mid,
            upper,
            lower,
            width,
            z_score,
            normalized_slope,
        })
    }
}

impl TrendSignal for BollingerBands {
    fn update(&mut self, candle: &Candle) -> Option<f64> {
        self.update_bands(candle).map(|r| r.normalized_slope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(time: i64, close: f64) -> Candle {
        Candle {
            time,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn test_warmup_needs_period_plus_one() {
        let mut bb = BollingerBands::new(3, 2.0);
        let ready: Vec<bool> = [1.0, 2.0, 3.0, 4.0, 5.0]
            .iter()
            .enumerate()
            .map(|(i, c)| bb.update(&close(i as i64, *c)).is_some())
            .collect();
        assert_eq!(ready, vec![false, false, false, true, true]);
    }

    #[test]
    fn test_band_values() {
        let mut bb = BollingerBands::new(4, 2.0);
        for (i, c) in [1.0, 2.0, 4.0, 4.0].iter().enumerate() {
            bb.update_bands(&close(i as i64, *c));
        }
        // window [2, 4, 4, 6] -> mean 4, std sqrt(2); previous mid = 11/4
        let r = bb.update_bands(&close(4, 6.0)).unwrap();
        let std = 2f64.sqrt();
        assert!((r.mid - 4.0).abs() < 1e-12);
        assert!((r.upper - (4.0 + 2.0 * std)).abs() < 1e-12);
        assert!((r.lower - (4.0 - 2.0 * std)).abs() < 1e-12);
        assert!((r.width - 4.0 * std / 4.0).abs() < 1e-12);
        assert!((r.z_score - 2.0 / std).abs() < 1e-12);
        assert!((r.normalized_slope - (1.25 / std)).abs() < 1e-12);
    }

    #[test]
    fn test_flat_window_falls_back_to_previous_mid() {
        let mut bb = BollingerBands::new(2, 2.0);
        bb.update(&close(0, 100.0));
        bb.update(&close(1, 100.0));
        let slope = bb.update_bands(&close(2, 100.0)).unwrap();
        assert_eq!(slope.normalized_slope, 0.0);
        assert_eq!(slope.z_score, 0.0);
        assert_eq!(slope.upper, slope.lower);
    }

    #[test]
    fn test_interchangeable_as_trait_object() {
        let mut sources: Vec<Box<dyn TrendSignal>> = vec![
            Box::new(BollingerBands::new(3, 2.0)),
            Box::new(crate::indicators::EmaSlope::new(3)),
        ];
        for source in sources.iter_mut() {
            let mut last = None;
            for i in 0..20 {
                last = source.update(&close(i, 10.0 + i as f64));
            }
            let slope = last.unwrap();
            assert!(slope > 0.0 && slope <= 1.0);
        }
    }
}
