//! Market-efficiency indicator: windowed price efficiency blended with a
//! relative-volume term.

use crate::indicators::RollingWindow;
use crate::types::Candle;

/// Weight of the price-efficiency term in the blend.
const PRICE_WEIGHT: f64 = 0.7;
/// Weight of the relative-volume term in the blend.
const VOLUME_WEIGHT: f64 = 0.3;
/// Relative volume is capped here before blending.
const VOLUME_RATIO_CAP: f64 = 3.0;

/// Output of [`MarketEfficiency::update`] once the window is warm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EfficiencyReading {
    /// Blended efficiency in `[0, 1]`.
    pub efficiency: f64,
    /// `|price_change| / total_movement` before blending.
    pub raw_efficiency: f64,
    /// Current volume over the window's average volume (uncapped).
    pub volume_ratio: f64,
    /// Close minus the close `period` bars ago.
    pub price_change: f64,
    /// Sum of true ranges across the window.
    pub total_movement: f64,
    /// `price_change > 0`.
    pub is_bullish: bool,
    /// `price_change < 0`. A flat window is neither.
    pub is_bearish: bool,
}

impl EfficiencyReading {
    /// Efficiency signed by bar direction: negative only when bearish.
    pub fn directional(&self) -> f64 {
        if self.is_bearish {
            -self.efficiency
        } else {
            self.efficiency
        }
    }
}

/// Incremental market-efficiency indicator over `period` bars.
///
/// Needs `period + 1` closes before the first reading. A `period` of zero
/// never becomes ready.
#[derive(Debug, Clone)]
pub struct MarketEfficiency {
    period: usize,
    true_ranges: RollingWindow,
    volumes: RollingWindow,
    closes: RollingWindow,
}

impl MarketEfficiency {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            true_ranges: RollingWindow::new(period),
            volumes: RollingWindow::new(period),
            closes: RollingWindow::new(period + 1),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Consume one bar. Returns `None` while warming up or when any
    /// intermediate value is NaN.
    pub fn update(&mut self, candle: &Candle) -> Option<EfficiencyReading> {
        if self.period == 0 {
            return None;
        }

        let tr = true_range(candle, self.closes.newest());
        self.true_ranges.push(tr);
        self.volumes.push(candle.volume);
        self.closes.push(candle.close);

        if !self.closes.is_full() || !self.true_ranges.is_full() || !self.volumes.is_full() {
            return None;
        }

        let oldest_close = self.closes.oldest()?;
        let price_change = candle.close - oldest_close;
        let total_movement = self.true_ranges.sum();
        if price_change.is_nan() || total_movement.is_nan() {
            return None;
        }

        let raw_efficiency = if total_movement > 0.0 {
            price_change.abs() / total_movement
        } else {
            0.0
        };

        let volume_avg = self.volumes.sum() / self.period as f64;
        let volume_ratio = if volume_avg > 0.0 {
            candle.volume / volume_avg
        } else {
            0.0
        };
        if volume_avg.is_nan() || volume_ratio.is_nan() {
            return None;
        }

        let volume_term = volume_ratio.min(VOLUME_RATIO_CAP) / VOLUME_RATIO_CAP;
        let blended = raw_efficiency * PRICE_WEIGHT + volume_term * VOLUME_WEIGHT;
        let efficiency = blended.min(1.0);
        if efficiency.is_nan() {
            return None;
        }

        Some(EfficiencyReading {
            efficiency,
            raw_efficiency,
            volume_ratio,
            price_change,
            total_movement,
            is_bullish: price_change > 0.0,
            is_bearish: price_change < 0.0,
        })
    }
}

/// `max(high - low, |high - prev_close|, |low - prev_close|)`; just the bar
/// range when there is no previous close.
fn true_range(candle: &Candle, prev_close: Option<f64>) -> f64 {
    let range = candle.high - candle.low;
    match prev_close {
        Some(pc) => range
            .max((candle.high - pc).abs())
            .max((candle.low - pc).abs()),
        None => range,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(time: i64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle {
            time,
            open: close,
            high,
            low,
            close,
            volume,
        }
    }

    fn flat(time: i64, close: f64) -> Candle {
        bar(time, close, close, close, 10.0)
    }

    #[test]
    fn test_ready_flips_on_period_plus_one() {
        let mut me = MarketEfficiency::new(3);
        let closes = [10.0, 11.0, 9.0, 12.0, 13.0];
        let ready: Vec<bool> = closes
            .iter()
            .enumerate()
            .map(|(i, c)| me.update(&flat(i as i64, *c)).is_some())
            .collect();
        assert_eq!(ready, vec![false, false, false, true, true]);
    }

    #[test]
    fn test_sliding_window_sums_match_manual() {
        let mut me = MarketEfficiency::new(3);
        let closes = [10.0, 11.0, 9.0, 12.0, 13.0];
        let mut readings = Vec::new();
        for (i, c) in closes.iter().enumerate() {
            readings.push(me.update(&flat(i as i64, *c)));
        }

        // Bar 4: TRs (high == low == close) are |close - prev close|.
        // window = [|11-10|, |9-11|, |12-9|] = [1, 2, 3] -> 6
        let r4 = readings[3].unwrap();
        assert!((r4.price_change - 2.0).abs() < 1e-12); // 12 - 10
        assert!((r4.total_movement - 6.0).abs() < 1e-12);
        // constant volume -> ratio 1 -> 0.7 * 2/6 + 0.3 * 1/3
        let expected = 0.7 * (2.0 / 6.0) + 0.3 * (1.0 / 3.0);
        assert!((r4.efficiency - expected).abs() < 1e-12);
        assert!(r4.is_bullish);

        // Bar 5: window = [2, 3, 1] -> 6, change = 13 - 11 = 2
        let r5 = readings[4].unwrap();
        assert!((r5.price_change - 2.0).abs() < 1e-12);
        assert!((r5.total_movement - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_true_range_uses_previous_close_gap() {
        let c = bar(1, 105.0, 103.0, 104.0, 1.0);
        // gap up from 100: |105 - 100| = 5 beats range 2
        assert!((true_range(&c, Some(100.0)) - 5.0).abs() < 1e-12);
        assert!((true_range(&c, None) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_movement_yields_volume_term_only() {
        let mut me = MarketEfficiency::new(2);
        let mut last = None;
        for i in 0..4 {
            last = me.update(&flat(i, 50.0));
        }
        let r = last.unwrap();
        assert_eq!(r.total_movement, 0.0);
        assert_eq!(r.raw_efficiency, 0.0);
        assert!((r.efficiency - 0.1).abs() < 1e-12);
        assert!(!r.is_bullish);
        assert!(!r.is_bearish);
        assert!((r.directional() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_flat_window_with_range_is_not_bearish() {
        let mut me = MarketEfficiency::new(2);
        let mut last = None;
        for i in 0..3 {
            last = me.update(&bar(i, 51.0, 49.0, 50.0, 1.0));
        }
        let r = last.unwrap();
        assert_eq!(r.price_change, 0.0);
        assert!((r.efficiency - 0.1).abs() < 1e-12);
        assert!((r.directional() - r.efficiency).abs() < 1e-12);
    }

    #[test]
    fn test_zero_volume_average() {
        let mut me = MarketEfficiency::new(2);
        let mut last = None;
        for (i, c) in [10.0, 11.0, 12.0].iter().enumerate() {
            last = me.update(&bar(i as i64, *c, *c, *c, 0.0));
        }
        let r = last.unwrap();
        assert_eq!(r.volume_ratio, 0.0);
        assert!((r.efficiency - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_volume_ratio_capped_and_efficiency_bounded() {
        let mut me = MarketEfficiency::new(4);
        for i in 0..4 {
            let c = 10.0 + i as f64;
            me.update(&bar(i, c, c, c, 1.0));
        }
        // straight-line move plus a volume spike: both terms saturate
        let r = me.update(&bar(4, 14.0, 14.0, 14.0, 1_000.0)).unwrap();
        assert!(r.volume_ratio > VOLUME_RATIO_CAP);
        assert!((r.raw_efficiency - 1.0).abs() < 1e-12);
        assert!((r.efficiency - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_period_never_ready() {
        let mut me = MarketEfficiency::new(0);
        for i in 0..10 {
            assert!(me.update(&flat(i, 100.0 + i as f64)).is_none());
        }
    }

    #[test]
    fn test_nan_input_is_not_ready() {
        let mut me = MarketEfficiency::new(2);
        me.update(&flat(0, 10.0));
        me.update(&flat(1, 11.0));
        assert!(me.update(&bar(2, 12.0, 12.0, 12.0, f64::NAN)).is_none());
    }

    #[test]
    fn test_bearish_direction_flips_sign() {
        let mut me = MarketEfficiency::new(2);
        me.update(&flat(0, 12.0));
        me.update(&flat(1, 11.0));
        let r = me.update(&flat(2, 10.0)).unwrap();
        assert!(!r.is_bullish);
        assert!(r.is_bearish);
        assert!(r.directional() < 0.0);
        assert!((r.directional() + r.efficiency).abs() < 1e-12);
    }

    #[test]
    fn test_efficiency_bounded_over_noisy_series() {
        let mut me = MarketEfficiency::new(14);
        for i in 0..2_000 {
            let base = 100.0 + (i as f64 * 0.11).sin() * 5.0;
            let c = bar(i, base + 0.8, base - 0.6, base, 1.0 + (i % 13) as f64);
            if let Some(r) = me.update(&c) {
                assert!((0.0..=1.0).contains(&r.efficiency), "{}", r.efficiency);
            }
        }
    }
}
