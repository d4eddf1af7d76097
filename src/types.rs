//! Core data types shared by the indicators, strategy, and paper engine.

use serde::Serialize;

/// One OHLCV bar. `time` is the bar open time in epoch milliseconds and
/// must increase monotonically across a feed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Two-sided quote produced by the strategy for one bar.
///
/// An inactive side carries a NaN price. `valid == false` means the strategy
/// withheld this cycle and no resting orders may remain on the book.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub time: i64,
    pub bid_price: f64,
    pub bid_size: i64,
    pub bid_active: bool,
    pub ask_price: f64,
    pub ask_size: i64,
    pub ask_active: bool,
    pub valid: bool,
}

impl Quote {
    /// A quote marking a cycle where the strategy produced nothing.
    pub fn withheld(time: i64) -> Self {
        Self {
            time,
            bid_price: f64::NAN,
            bid_size: 0,
            bid_active: false,
            ask_price: f64::NAN,
            ask_size: 0,
            ask_active: false,
            valid: false,
        }
    }

    /// Whether the bid side should become a resting buy order.
    pub fn places_bid(&self) -> bool {
        self.valid && self.bid_active && self.bid_size > 0 && !self.bid_price.is_nan()
    }

    /// Whether the ask side should become a resting sell order.
    pub fn places_ask(&self) -> bool {
        self.valid && self.ask_active && self.ask_size > 0 && !self.ask_price.is_nan()
    }
}

/// Resting order held by the paper engine between two bars.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Order {
    pub side: Side,
    pub price: f64,
    pub size: i64,
    pub placed_at: i64,
}

/// Immutable fill record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trade {
    pub side: Side,
    pub time: i64,
    pub price: f64,
    pub size: i64,
}

/// Per-bar snapshot emitted by the paper engine.
///
/// `bid`/`ask` are NaN when the side was not quoted; fill prices are `None`
/// when that side did not fill during the bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultRow {
    pub time: i64,
    pub close: f64,
    pub bid: f64,
    pub ask: f64,
    pub inventory: i64,
    /// +1 net long, -1 net short, 0 flat.
    pub signal: f64,
    pub cash: f64,
    pub cumulative_pnl: f64,
    pub buy_fill_price: Option<f64>,
    pub sell_fill_price: Option<f64>,
}
