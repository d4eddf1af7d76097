//! Paper trading engine.
//!
//! Simulates passive fills of the previous bar's quote against the current
//! bar's range and keeps the books: signed inventory in lots, cash, a
//! mark-to-market P&L series, and append-only trade and result logs.
//!
//! Per bar the caller runs [`PaperEngine::apply_fills`] first, then asks the
//! strategy for a quote, then calls [`PaperEngine::finalize_candle`]. A quote
//! therefore never meets the range of the bar it was computed from.

use tracing::debug;

use crate::types::{Candle, Order, Quote, ResultRow, Side, Trade};

#[derive(Debug, Default)]
pub struct PaperEngine {
    inventory: i64,
    cash: f64,
    pending_orders: Vec<Order>,
    pnl_history: Vec<f64>,
    trades: Vec<Trade>,
    results: Vec<ResultRow>,
    last_close: f64,
}

impl PaperEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match resting orders against this bar's range.
    ///
    /// A buy fills when `low <= price`, a sell when `high >= price`, always
    /// in full at the order price. The book is empty afterwards whether or
    /// not anything filled.
    pub fn apply_fills(&mut self, candle: &Candle) -> Vec<Trade> {
        if self.pending_orders.is_empty() {
            return Vec::new();
        }

        let mut fills = Vec::with_capacity(self.pending_orders.len());
        for order in self.pending_orders.drain(..) {
            let filled = match order.side {
                Side::Buy => candle.low <= order.price,
                Side::Sell => candle.high >= order.price,
            };
            if !filled {
                continue;
            }

            let notional = order.price * order.size as f64;
            match order.side {
                Side::Buy => {
                    self.inventory += order.size;
                    self.cash -= notional;
                }
                Side::Sell => {
                    self.inventory -= order.size;
                    self.cash += notional;
                }
            }

            let trade = Trade {
                side: order.side,
                time: candle.time,
                price: order.price,
                size: order.size,
            };
            debug!(
                side = order.side.as_str(),
                price = order.price,
                size = order.size,
                inventory = self.inventory,
                "paper fill"
            );
            self.trades.push(trade);
            fills.push(trade);
        }
        fills
    }

    /// Mark the books to this bar's close, record the result row, and rest
    /// the new quote for the next bar.
    ///
    /// A withheld quote (`valid == false`) leaves the book empty.
    pub fn finalize_candle(&mut self, candle: &Candle, quote: &Quote, fills: &[Trade]) -> ResultRow {
        let pnl = self.cash + self.inventory as f64 * candle.close;
        self.pnl_history.push(pnl);

        let signal = match self.inventory {
            i if i > 0 => 1.0,
            i if i < 0 => -1.0,
            _ => 0.0,
        };

        let mut row = ResultRow {
            time: candle.time,
            close: candle.close,
            bid: f64::NAN,
            ask: f64::NAN,
            inventory: self.inventory,
            signal,
            cash: self.cash,
            cumulative_pnl: pnl,
            buy_fill_price: None,
            sell_fill_price: None,
        };

        for fill in fills {
            match fill.side {
                Side::Buy => row.buy_fill_price = Some(fill.price),
                Side::Sell => row.sell_fill_price = Some(fill.price),
            }
        }

        if quote.valid && quote.bid_active {
            row.bid = quote.bid_price;
        }
        if quote.valid && quote.ask_active {
            row.ask = quote.ask_price;
        }

        self.pending_orders.clear();
        if quote.places_bid() {
            self.pending_orders.push(Order {
                side: Side::Buy,
                price: quote.bid_price,
                size: quote.bid_size,
                placed_at: quote.time,
            });
        }
        if quote.places_ask() {
            self.pending_orders.push(Order {
                side: Side::Sell,
                price: quote.ask_price,
                size: quote.ask_size,
                placed_at: quote.time,
            });
        }

        self.results.push(row);
        self.last_close = candle.close;
        row
    }

    /// `cash + inventory * last processed close`.
    pub fn final_pnl(&self) -> f64 {
        self.cash + self.inventory as f64 * self.last_close
    }

    pub fn inventory(&self) -> i64 {
        self.inventory
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn last_close(&self) -> f64 {
        self.last_close
    }

    pub fn pending_orders(&self) -> &[Order] {
        &self.pending_orders
    }

    pub fn pnl_history(&self) -> &[f64] {
        &self.pnl_history
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn results(&self) -> &[ResultRow] {
        &self.results
    }
}
