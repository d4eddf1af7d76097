//! User-data stream: keeps [`PositionTracker`] current from
//! `ACCOUNT_UPDATE` events.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::binance::position::PositionTracker;
use crate::binance::rest::BinanceRest;
use crate::binance::types::UserEvent;
use crate::binance::ws;

/// Listen keys expire after 60 minutes without a keep-alive.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(55 * 60);

pub struct UserStream {
    rest: Arc<BinanceRest>,
    ws_base: String,
    symbol: String,
    position: PositionTracker,
}

impl UserStream {
    pub fn new(rest: Arc<BinanceRest>, ws_base: &str, symbol: &str, position: PositionTracker) -> Self {
        Self {
            rest,
            ws_base: ws_base.trim_end_matches('/').to_string(),
            symbol: symbol.to_string(),
            position,
        }
    }

    /// Run until cancelled, taking a fresh listen key on every reconnect.
    pub async fn run(self, cancel: CancellationToken) {
        info!(symbol = %self.symbol, "user stream starting");
        loop {
            let key = match self.rest.new_listen_key().await {
                Ok(k) => k,
                Err(e) => {
                    error!(error = %e, "listen key request failed");
                    if !ws::wait_before_reconnect(&cancel).await {
                        return;
                    }
                    continue;
                }
            };

            let session = cancel.child_token();
            spawn_keepalive(Arc::clone(&self.rest), session.clone());

            let url = format!("{}/{}", self.ws_base, key);
            let mut on_text = |text: &str| {
                apply_event(text, &self.symbol, &self.position);
                ControlFlow::Continue(())
            };
            let result = ws::run_single_connection(&url, &cancel, &mut on_text).await;
            session.cancel();

            match result {
                Ok(()) => {
                    info!("user stream stopped");
                    return;
                }
                Err(e) => {
                    error!(error = %e, "user stream error");
                    if !ws::wait_before_reconnect(&cancel).await {
                        return;
                    }
                }
            }
        }
    }
}

fn spawn_keepalive(rest: Arc<BinanceRest>, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = time::interval(KEEPALIVE_INTERVAL);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match rest.keepalive_listen_key().await {
                        Ok(()) => debug!("listen key extended"),
                        Err(e) => error!(error = %e, "listen key keep-alive failed"),
                    }
                }
                _ = cancel.cancelled() => return,
            }
        }
    });
}

/// Update `position` if `text` is an account update for `symbol`.
fn apply_event(text: &str, symbol: &str, position: &PositionTracker) -> Option<f64> {
    let event: UserEvent = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            debug!(error = %e, "ignoring user stream message");
            return None;
        }
    };
    let amount = event.position_amount(symbol)?;
    position.set_amount(amount);
    info!(amount, lots = position.lots(), "POSITION");
    Some(amount)
}
