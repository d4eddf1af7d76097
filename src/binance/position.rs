//! Exchange position for the traded symbol.
//!
//! The signed base-asset amount lives in an `AtomicU64` holding `f64` bits,
//! so the runner reads it without locking while the user-data stream and
//! the periodic REST sync write it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::binance::rest::BinanceRest;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct PositionTracker {
    /// Signed base-asset position (f64 stored as u64 bits).
    amount: Arc<AtomicU64>,
    /// Base-asset quantity of one lot.
    trade_sz: f64,
}

impl PositionTracker {
    pub fn new(trade_sz: f64) -> Self {
        Self {
            amount: Arc::new(AtomicU64::new(0f64.to_bits())),
            trade_sz,
        }
    }

    pub fn amount(&self) -> f64 {
        f64::from_bits(self.amount.load(Ordering::Relaxed))
    }

    pub fn set_amount(&self, amount: f64) {
        self.amount.store(amount.to_bits(), Ordering::Relaxed);
    }

    /// Position in whole lots, rounded toward negative infinity. Exact
    /// multiples of the lot size count in full.
    pub fn lots(&self) -> i64 {
        lots(self.amount(), self.trade_sz)
    }

    /// Replace the local amount with the exchange's.
    pub async fn sync_once(&self, rest: &BinanceRest, symbol: &str) -> Result<()> {
        let server = rest.position_amount(symbol).await?;
        let local = self.amount();
        if (local - server).abs() > f64::EPSILON {
            if local != 0.0 {
                warn!(local, server, "position drift detected, correcting");
            }
            self.set_amount(server);
        }
        Ok(())
    }

    /// Spawn a background task re-reading the position every `every`.
    pub fn start_sync(
        &self,
        rest: Arc<BinanceRest>,
        symbol: String,
        every: Duration,
        cancel: CancellationToken,
    ) {
        let tracker = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(every);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = tracker.sync_once(&rest, &symbol).await {
                            error!(error = %e, "position sync failed");
                        }
                    }
                    _ = cancel.cancelled() => {
                        debug!("position sync stopped");
                        return;
                    }
                }
            }
        });
    }
}

/// Digits kept on the lot ratio before flooring; absorbs binary noise in
/// `amount` and `trade_sz`.
const LOT_RATIO_DP: u32 = 9;

fn lots(amount: f64, trade_sz: f64) -> i64 {
    let (Some(amount), Some(size)) = (Decimal::from_f64(amount), Decimal::from_f64(trade_sz)) else {
        return 0;
    };
    if size <= Decimal::ZERO {
        return 0;
    }
    amount
        .checked_div(size)
        .map(|ratio| ratio.round_dp(LOT_RATIO_DP).floor())
        .and_then(|lots| lots.to_i64())
        .unwrap_or(0)
}
