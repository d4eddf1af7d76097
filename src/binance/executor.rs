//! [`ExecutionPort`] backed by Binance futures orders.
//!
//! `apply` only enqueues the quote. A single task drains the queue, keeping
//! the newest quote when several are waiting, and for each one cancels every
//! open order on the symbol before posting the active sides.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::binance::position::PositionTracker;
use crate::binance::rest::{BinanceRest, LimitOrder, Placement};
use crate::error::MmError;
use crate::execution::ExecutionPort;
use crate::types::{Quote, Side};

/// Post-only rejections worth one retry at the queue price.
const RETRY_CODES: [i64; 3] = [-5022, -5028, -1008];
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub symbol: String,
    /// Base-asset quantity of one lot.
    pub trade_sz: f64,
    pub px_precision: u32,
    pub sz_precision: u32,
}

pub struct BinanceExecutor {
    position: PositionTracker,
    tx: mpsc::UnboundedSender<Quote>,
    task: JoinHandle<()>,
}

impl BinanceExecutor {
    /// Start the order task. `position` supplies the inventory.
    pub fn spawn(rest: Arc<BinanceRest>, config: ExecutorConfig, position: PositionTracker) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_orders(rest, config, rx));
        Self { position, tx, task }
    }

    /// Finish the queued work and stop the order task.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            error!(error = %e, "order task panicked");
        }
    }
}

impl ExecutionPort for BinanceExecutor {
    fn inventory(&self) -> i64 {
        self.position.lots()
    }

    fn apply(&self, quote: &Quote) {
        if self.tx.send(*quote).is_err() {
            warn!(time = quote.time, "order task gone, dropping quote");
        }
    }
}

async fn run_orders(
    rest: Arc<BinanceRest>,
    config: ExecutorConfig,
    mut rx: mpsc::UnboundedReceiver<Quote>,
) {
    while let Some(mut quote) = rx.recv().await {
        while let Ok(newer) = rx.try_recv() {
            debug!(skipped = quote.time, "superseded quote");
            quote = newer;
        }
        sync_quote(&rest, &config, &quote).await;
    }
    debug!("order task stopped");
}

/// Replace whatever rests on the exchange with `quote`.
async fn sync_quote(rest: &BinanceRest, config: &ExecutorConfig, quote: &Quote) {
    if let Err(e) = rest.cancel_all_orders(&config.symbol).await {
        // Without a confirmed cancel new orders could stack on stale ones.
        error!(error = %e, "cancel all failed, skipping placement");
        return;
    }
    if !quote.valid {
        info!(time = quote.time, "orders withdrawn");
        return;
    }

    let bid = quote
        .places_bid()
        .then(|| limit_order(config, Side::Buy, quote.bid_size, quote.bid_price))
        .flatten();
    let ask = quote
        .places_ask()
        .then(|| limit_order(config, Side::Sell, quote.ask_size, quote.ask_price))
        .flatten();

    tokio::join!(place(rest, bid), place(rest, ask));
}

async fn place(rest: &BinanceRest, order: Option<LimitOrder>) {
    let Some(order) = order else {
        return;
    };
    match rest.place_order(&order).await {
        Ok(()) => info!(
            side = order.side.as_str(),
            qty = %order.quantity,
            placement = ?order.placement,
            "ORDER"
        ),
        Err(MmError::Api { code, msg }) if RETRY_CODES.contains(&code) => {
            warn!(code, msg = %msg, side = order.side.as_str(), "post-only rejected, retrying at queue");
            tokio::time::sleep(RETRY_DELAY).await;
            let retry = LimitOrder {
                placement: Placement::QueueMatch,
                ..order
            };
            match rest.place_order(&retry).await {
                Ok(()) => info!(side = retry.side.as_str(), qty = %retry.quantity, "ORDER queue"),
                Err(e) => error!(error = %e, side = retry.side.as_str(), "order retry failed"),
            }
        }
        Err(e) => error!(error = %e, side = order.side.as_str(), "order failed"),
    }
}

/// Rounding direction for tick alignment.
enum RoundMode {
    Floor,
    Ceil,
}

/// Build a post-only order. Bids round down and asks round up to the price
/// precision so neither crosses further than the strategy asked for.
fn limit_order(config: &ExecutorConfig, side: Side, lots: i64, price: f64) -> Option<LimitOrder> {
    let mode = match side {
        Side::Buy => RoundMode::Floor,
        Side::Sell => RoundMode::Ceil,
    };
    let price = align_price(Decimal::from_f64(price)?, config.px_precision, mode);
    let quantity = order_quantity(lots, config.trade_sz, config.sz_precision)?;
    if price <= Decimal::ZERO || quantity <= Decimal::ZERO {
        return None;
    }
    Some(LimitOrder {
        symbol: config.symbol.clone(),
        side,
        quantity: quantity.to_string(),
        placement: Placement::PostOnly {
            price: price.to_string(),
        },
    })
}

fn align_price(price: Decimal, precision: u32, mode: RoundMode) -> Decimal {
    let tick = Decimal::new(1, precision);
    let ticks = price / tick;
    let aligned = match mode {
        RoundMode::Floor => ticks.floor(),
        RoundMode::Ceil => ticks.ceil(),
    };
    let mut p = aligned * tick;
    p.rescale(precision);
    p
}

fn order_quantity(lots: i64, trade_sz: f64, precision: u32) -> Option<Decimal> {
    let mut qty = Decimal::from(lots) * Decimal::from_f64(trade_sz)?;
    qty.rescale(precision);
    Some(qty)
}
