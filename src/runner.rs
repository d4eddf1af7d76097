//! Drives the strategy bar by bar, either over a finished history against
//! the paper engine or over a live channel of closed bars against an
//! [`ExecutionPort`].

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::execution::ExecutionPort;
use crate::indicators::TrendSignal;
use crate::paper::PaperEngine;
use crate::strategy::MarketMakingStrategy;
use crate::types::{Candle, Quote, Side};

/// Totals for one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestSummary {
    pub candles: usize,
    /// Bars where the strategy produced a quote.
    pub quoted: usize,
    pub trades: usize,
    pub buys: usize,
    pub sells: usize,
    pub final_inventory: i64,
    pub final_cash: f64,
    pub final_pnl: f64,
    /// Largest peak-to-trough drop of the mark-to-market P&L series.
    pub max_drawdown: f64,
}

/// Replay `candles` through the strategy and paper engine.
///
/// Fills for bar N are settled before the strategy sees bar N, so a quote
/// can only ever fill on a later bar. Every bar produces a result row; a
/// bar where the strategy withholds rests nothing.
pub fn run_backtest<T: TrendSignal>(
    strategy: &mut MarketMakingStrategy<T>,
    engine: &mut PaperEngine,
    candles: &[Candle],
) -> BacktestSummary {
    let mut quoted = 0;

    for candle in candles {
        let fills = engine.apply_fills(candle);
        for fill in &fills {
            debug!(
                side = fill.side.as_str(),
                price = fill.price,
                size = fill.size,
                time = fill.time,
                "FILL"
            );
        }

        let quote = match strategy.process(candle, engine.inventory()) {
            Some(q) => {
                quoted += 1;
                q
            }
            None => Quote::withheld(candle.time),
        };
        engine.finalize_candle(candle, &quote, &fills);
    }

    let trades = engine.trades();
    let buys = trades.iter().filter(|t| t.side == Side::Buy).count();

    BacktestSummary {
        candles: candles.len(),
        quoted,
        trades: trades.len(),
        buys,
        sells: trades.len() - buys,
        final_inventory: engine.inventory(),
        final_cash: engine.cash(),
        final_pnl: engine.final_pnl(),
        max_drawdown: max_drawdown(engine.pnl_history()),
    }
}

fn max_drawdown(pnl: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0f64;
    for &v in pnl {
        peak = peak.max(v);
        worst = worst.max(peak - v);
    }
    worst
}

/// Counters for one live session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveStats {
    pub processed: usize,
    pub quoted: usize,
    /// Bars discarded because their time did not advance.
    pub dropped: usize,
    pub last_time: Option<i64>,
}

/// Run the strategy on closed bars from `candles` until the channel closes
/// or `cancel` fires.
///
/// `last_time` is the time of the last bar the strategy already consumed
/// (for instance the end of a warm-up backtest); bars at or before it are
/// dropped. On exit the port is handed a withheld quote so nothing is left
/// resting.
pub async fn run_live<T, P>(
    strategy: &mut MarketMakingStrategy<T>,
    port: &P,
    candles: &mut mpsc::Receiver<Candle>,
    last_time: Option<i64>,
    cancel: CancellationToken,
) -> LiveStats
where
    T: TrendSignal,
    P: ExecutionPort + ?Sized,
{
    let mut stats = LiveStats {
        last_time,
        ..LiveStats::default()
    };

    loop {
        let candle = tokio::select! {
            c = candles.recv() => match c {
                Some(c) => c,
                None => {
                    info!("candle feed closed");
                    break;
                }
            },
            _ = cancel.cancelled() => {
                info!("shutdown requested");
                break;
            }
        };

        if let Some(last) = stats.last_time {
            if candle.time <= last {
                warn!(time = candle.time, last, "dropping out-of-order candle");
                stats.dropped += 1;
                continue;
            }
        }
        stats.last_time = Some(candle.time);
        stats.processed += 1;

        let inventory = port.inventory();
        let quote = match strategy.process(&candle, inventory) {
            Some(q) => {
                stats.quoted += 1;
                info!(
                    time = candle.time,
                    close = candle.close,
                    bid = q.bid_price,
                    ask = q.ask_price,
                    inventory,
                    "QUOTE"
                );
                q
            }
            None => {
                info!(time = candle.time, inventory, "warming up, holding no orders");
                Quote::withheld(candle.time)
            }
        };
        port.apply(&quote);
    }

    port.apply(&Quote::withheld(stats.last_time.unwrap_or_default()));
    info!(
        processed = stats.processed,
        quoted = stats.quoted,
        dropped = stats.dropped,
        "live session finished"
    );
    stats
}
