//! Market-making strategy: turns indicator state plus inventory into a
//! two-sided quote around the close.
//!
//! Spread widens with market efficiency. Both quotes are then shifted
//! against the current inventory and against the detected trend, and a
//! side is switched off when filling it would breach the inventory limit.

use tracing::debug;

use crate::indicators::{MarketEfficiency, TrendSignal};
use crate::types::{Candle, Quote};

/// Weight of the signed efficiency term in the trend blend.
const DIRECTIONAL_WEIGHT: f64 = 0.5;

/// Quoting coefficients, fixed for the lifetime of a strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteParams {
    /// Spread as a fraction of the close before efficiency widening.
    pub base_spread: f64,
    /// Maximum absolute inventory in lots. 0 disables limits and inventory skew.
    pub inventory_limit: i64,
    /// Size of every quote, in lots.
    pub lot_size: i64,
    /// Inventory skew in half-spreads at full inventory.
    pub inventory_skew_k: f64,
    /// Trend skew in half-spreads at full trend signal.
    pub trend_skew_k: f64,
    /// Constant added to the trend signal before clamping.
    pub trend_bias: f64,
}

/// Stateful quote generator. Owns its indicators; feed it every bar in order.
pub struct MarketMakingStrategy<T> {
    efficiency: MarketEfficiency,
    trend: T,
    params: QuoteParams,
}

impl<T: TrendSignal> MarketMakingStrategy<T> {
    pub fn new(efficiency: MarketEfficiency, trend: T, params: QuoteParams) -> Self {
        Self {
            efficiency,
            trend,
            params,
        }
    }

    pub fn params(&self) -> &QuoteParams {
        &self.params
    }

    /// Consume a bar and the current signed inventory (lots).
    ///
    /// Returns `None` while either indicator is warming up; the caller must
    /// then hold no resting orders for this cycle.
    pub fn process(&mut self, candle: &Candle, inventory: i64) -> Option<Quote> {
        // Both indicators see every bar, even when the other is not ready.
        let slope = self.trend.update(candle);
        let reading = self.efficiency.update(candle);

        let (slope, reading) = match (slope, reading) {
            (Some(s), Some(r)) if !s.is_nan() && !r.efficiency.is_nan() => (s, r),
            _ => {
                debug!(time = candle.time, "indicators not ready, withholding quote");
                return None;
            }
        };

        let p = &self.params;
        let close = candle.close;
        let efficiency = reading.efficiency;

        let spread = p.base_spread * close * (1.0 + efficiency * 2.0);
        let half_spread = spread / 2.0;

        let mut bid = close - half_spread;
        let mut ask = close + half_spread;

        if p.inventory_limit > 0 && p.inventory_skew_k != 0.0 {
            let inv_frac = (inventory as f64 / p.inventory_limit as f64).clamp(-1.0, 1.0);
            let shift = p.inventory_skew_k * inv_frac * half_spread;
            bid -= shift;
            ask -= shift;
        }

        if p.trend_skew_k != 0.0 {
            let signal = trend_signal(slope, reading.directional(), p.trend_bias);
            let shift = p.trend_skew_k * signal * half_spread;
            bid -= shift;
            ask -= shift;
        }

        let bid_active = side_within_limit(inventory + p.lot_size, p.inventory_limit);
        let ask_active = side_within_limit(inventory - p.lot_size, p.inventory_limit);

        Some(Quote {
            time: candle.time,
            bid_price: if bid_active { bid } else { f64::NAN },
            bid_size: p.lot_size,
            bid_active,
            ask_price: if ask_active { ask } else { f64::NAN },
            ask_size: p.lot_size,
            ask_active,
            valid: true,
        })
    }
}

/// Blend the trend slope with signed efficiency.
///
/// The bias is added. An older variant of this strategy subtracted it,
/// which flips the skew direction for a non-zero bias.
fn trend_signal(normalized_slope: f64, directional_efficiency: f64, bias: f64) -> f64 {
    (normalized_slope + DIRECTIONAL_WEIGHT * directional_efficiency + bias).clamp(-1.0, 1.0)
}

/// A side may rest only if its fill keeps `|inventory|` within the limit.
fn side_within_limit(post_fill_inventory: i64, limit: i64) -> bool {
    limit <= 0 || post_fill_inventory.abs() <= limit
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Trend stub returning a scripted slope once `warmup` bars have passed.
    struct FixedTrend {
        slope: f64,
        warmup: usize,
        seen: usize,
    }

    impl TrendSignal for FixedTrend {
        fn update(&mut self, _candle: &Candle) -> Option<f64> {
            self.seen += 1;
            (self.seen > self.warmup).then_some(self.slope)
        }
    }

    fn params() -> QuoteParams {
        QuoteParams {
            base_spread: 0.001,
            inventory_limit: 0,
            lot_size: 1,
            inventory_skew_k: 0.0,
            trend_skew_k: 0.0,
            trend_bias: 0.0,
        }
    }

    fn flat_bar(time: i64, close: f64, volume: f64) -> Candle {
        Candle {
            time,
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    /// Strategy whose efficiency reads exactly 0 at close 100: flat prices
    /// and zero volume.
    fn zero_efficiency_strategy(p: QuoteParams, slope: f64) -> MarketMakingStrategy<FixedTrend> {
        let mut s = MarketMakingStrategy::new(
            MarketEfficiency::new(2),
            FixedTrend {
                slope,
                warmup: 0,
                seen: 0,
            },
            p,
        );
        for i in 0..2 {
            assert!(s.process(&flat_bar(i, 100.0, 0.0), 0).is_none());
        }
        s
    }

    #[test]
    fn test_base_spread_example() {
        let mut s = zero_efficiency_strategy(params(), 0.0);
        let q = s.process(&flat_bar(2, 100.0, 0.0), 0).unwrap();
        assert!(q.valid);
        assert!((q.bid_price - 99.95).abs() < 1e-9);
        assert!((q.ask_price - 100.05).abs() < 1e-9);
        assert!(q.bid_active && q.ask_active);
        assert_eq!(q.bid_size, 1);
        assert_eq!(q.time, 2);
    }

    #[test]
    fn test_efficiency_widens_spread() {
        let mut s = MarketMakingStrategy::new(
            MarketEfficiency::new(2),
            FixedTrend {
                slope: 0.0,
                warmup: 0,
                seen: 0,
            },
            params(),
        );
        s.process(&flat_bar(0, 98.0, 0.0), 0);
        s.process(&flat_bar(1, 99.0, 0.0), 0);
        // straight line, zero volume -> efficiency 0.7 -> spread 0.1 * 2.4
        let q = s.process(&flat_bar(2, 100.0, 0.0), 0).unwrap();
        assert!((q.ask_price - q.bid_price - 0.24).abs() < 1e-9);
        assert!(((q.ask_price + q.bid_price) / 2.0 - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_withholds_until_trend_ready() {
        let mut s = MarketMakingStrategy::new(
            MarketEfficiency::new(1),
            FixedTrend {
                slope: 0.0,
                warmup: 5,
                seen: 0,
            },
            params(),
        );
        let ok: Vec<bool> = (0..7)
            .map(|i| s.process(&flat_bar(i, 100.0, 1.0), 0).is_some())
            .collect();
        assert_eq!(ok, vec![false, false, false, false, false, true, true]);
    }

    #[test]
    fn test_nan_slope_withholds() {
        let mut s = zero_efficiency_strategy(params(), f64::NAN);
        assert!(s.process(&flat_bar(2, 100.0, 0.0), 0).is_none());
    }

    #[test]
    fn test_long_inventory_shifts_quotes_down() {
        let mut p = params();
        p.inventory_limit = 10;
        p.inventory_skew_k = 1.0;
        let mut s = zero_efficiency_strategy(p, 0.0);
        let q = s.process(&flat_bar(2, 100.0, 0.0), 5).unwrap();
        // shift = 1.0 * 0.5 * 0.05 = 0.025
        assert!((q.bid_price - 99.925).abs() < 1e-9);
        assert!((q.ask_price - 100.025).abs() < 1e-9);
    }

    #[test]
    fn test_inventory_fraction_clamped() {
        let mut p = params();
        p.inventory_limit = 2;
        p.inventory_skew_k = 1.0;
        let mut s = zero_efficiency_strategy(p, 0.0);
        // 3 / 2 clamps to a full-inventory shift of one half-spread
        let q = s.process(&flat_bar(2, 100.0, 0.0), 3).unwrap();
        assert!(!q.bid_active);
        assert!(q.ask_active);
        assert!((q.ask_price - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_skew_with_positive_bias() {
        let mut p = params();
        p.trend_skew_k = 1.0;
        p.trend_bias = 0.2;
        // efficiency 0 so the directional term vanishes; signal = 0.3 + 0.2
        let mut s = zero_efficiency_strategy(p, 0.3);
        let q = s.process(&flat_bar(2, 100.0, 0.0), 0).unwrap();
        let shift = 0.5 * 0.05;
        assert!((q.bid_price - (99.95 - shift)).abs() < 1e-9);
        assert!((q.ask_price - (100.05 - shift)).abs() < 1e-9);
    }

    #[test]
    fn test_flat_window_skews_as_positive_efficiency() {
        let mut p = params();
        p.trend_skew_k = 1.0;
        let mut s = MarketMakingStrategy::new(
            MarketEfficiency::new(2),
            FixedTrend {
                slope: 0.0,
                warmup: 0,
                seen: 0,
            },
            p,
        );
        let ranged = |time| Candle {
            time,
            open: 50.0,
            high: 51.0,
            low: 49.0,
            close: 50.0,
            volume: 1.0,
        };
        s.process(&ranged(0), 0);
        s.process(&ranged(1), 0);
        // no net change, efficiency 0.1 from volume: signal +0.05
        let q = s.process(&ranged(2), 0).unwrap();
        let half = 0.001 * 50.0 * 1.2 / 2.0;
        let shift = 0.05 * half;
        assert!((q.bid_price - (50.0 - half - shift)).abs() < 1e-9);
        assert!((q.ask_price - (50.0 + half - shift)).abs() < 1e-9);
        assert!((q.bid_price + q.ask_price) / 2.0 < 50.0);
    }

    #[test]
    fn test_efficiency_advances_while_trend_warms_up() {
        let mut s = MarketMakingStrategy::new(
            MarketEfficiency::new(2),
            FixedTrend {
                slope: 0.0,
                warmup: 3,
                seen: 0,
            },
            params(),
        );
        for (i, c) in [98.0, 99.0, 100.0].iter().enumerate() {
            assert!(s.process(&flat_bar(i as i64, *c, 0.0), 0).is_none());
        }
        // window [99, 100, 100]: change 1 over movement 1 -> efficiency 0.7
        let q = s.process(&flat_bar(3, 100.0, 0.0), 0).unwrap();
        assert!((q.ask_price - q.bid_price - 0.24).abs() < 1e-9);
    }

    #[test]
    fn test_trend_signal_blend_and_clamp() {
        assert!((trend_signal(0.2, 0.4, 0.1) - 0.5).abs() < 1e-12);
        assert!((trend_signal(-0.2, -0.4, 0.0) + 0.4).abs() < 1e-12);
        assert_eq!(trend_signal(0.9, 0.8, 0.5), 1.0);
        assert_eq!(trend_signal(-0.9, -0.8, -0.5), -1.0);
    }

    #[test]
    fn test_bid_disabled_at_long_limit() {
        let mut p = params();
        p.inventory_limit = 3;
        let mut s = zero_efficiency_strategy(p, 0.0);
        let q = s.process(&flat_bar(2, 100.0, 0.0), 3).unwrap();
        assert!(!q.bid_active);
        assert!(q.bid_price.is_nan());
        assert!(q.ask_active);
        assert!((q.ask_price - 100.05).abs() < 1e-9);
    }

    #[test]
    fn test_ask_disabled_at_short_limit() {
        let mut p = params();
        p.inventory_limit = 3;
        let mut s = zero_efficiency_strategy(p, 0.0);
        let q = s.process(&flat_bar(2, 100.0, 0.0), -3).unwrap();
        assert!(q.bid_active);
        assert!(!q.ask_active);
        assert!(q.ask_price.is_nan());
    }

    #[test]
    fn test_unbounded_inventory_keeps_both_sides() {
        let mut s = zero_efficiency_strategy(params(), 0.0);
        let q = s.process(&flat_bar(2, 100.0, 0.0), 1_000_000).unwrap();
        assert!(q.bid_active && q.ask_active);
    }
}
