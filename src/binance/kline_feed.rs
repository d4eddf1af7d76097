//! Live kline stream. Forwards closed bars only.

use std::ops::ControlFlow;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::binance::types::KlineEvent;
use crate::binance::ws;
use crate::types::Candle;

pub struct KlineFeed {
    url: String,
}

impl KlineFeed {
    /// Feed for `symbol` (any case) at `interval`, e.g. `"1m"`.
    pub fn new(ws_base: &str, symbol: &str, interval: &str) -> Self {
        let url = format!(
            "{}/{}@kline_{}",
            ws_base.trim_end_matches('/'),
            symbol.to_lowercase(),
            interval
        );
        Self { url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stream closed bars into `tx` until cancelled or the receiver is
    /// dropped. Reconnects on any connection failure.
    pub async fn run(self, tx: mpsc::Sender<Candle>, cancel: CancellationToken) {
        info!(url = %self.url, "kline feed starting");
        ws::run_with_reconnect(&self.url, &cancel, |text| forward_closed(text, &tx)).await;
        info!("kline feed stopped");
    }

    /// Spawn [`KlineFeed::run`] and return the receiving end.
    pub fn spawn(self, capacity: usize, cancel: CancellationToken) -> mpsc::Receiver<Candle> {
        let (tx, rx) = mpsc::channel(capacity);
        tokio::spawn(self.run(tx, cancel));
        rx
    }
}

/// Handle one stream frame.
fn forward_closed(text: &str, tx: &mpsc::Sender<Candle>) -> ControlFlow<()> {
    let Some(candle) = closed_candle(text) else {
        return ControlFlow::Continue(());
    };
    match tx.try_send(candle) {
        Ok(()) => ControlFlow::Continue(()),
        Err(mpsc::error::TrySendError::Full(c)) => {
            warn!(time = c.time, "candle consumer lagging, dropping bar");
            ControlFlow::Continue(())
        }
        Err(mpsc::error::TrySendError::Closed(_)) => ControlFlow::Break(()),
    }
}

/// Parse a kline frame, keeping it only if the bar is final.
fn closed_candle(text: &str) -> Option<Candle> {
    let event: KlineEvent = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            debug!(error = %e, "ignoring non-kline message");
            return None;
        }
    };
    if !event.k.x {
        return None;
    }
    match event.k.to_candle() {
        Ok(c) => Some(c),
        Err(e) => {
            warn!(error = %e, "malformed kline");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(t: i64, close: &str, closed: bool) -> String {
        format!(
            r#"{{"e":"kline","E":{},"s":"BTCUSDT","k":{{"t":{t},"T":{},"s":"BTCUSDT","i":"1m","o":"100","c":"{close}","h":"101","l":"99","v":"5","x":{closed}}}}}"#,
            t + 60_000,
            t + 59_999
        )
    }

    #[test]
    fn test_url() {
        let feed = KlineFeed::new("wss://fstream.binance.com/ws/", "BTCUSDT", "1m");
        assert_eq!(feed.url(), "wss://fstream.binance.com/ws/btcusdt@kline_1m");
    }

    #[test]
    fn test_open_bars_are_skipped() {
        assert!(closed_candle(&frame(0, "100.5", false)).is_none());
        let c = closed_candle(&frame(60_000, "100.5", true)).unwrap();
        assert_eq!(c.time, 60_000);
        assert_eq!(c.close, 100.5);
    }

    #[test]
    fn test_garbage_is_skipped() {
        assert!(closed_candle("{\"result\":null,\"id\":1}").is_none());
        assert!(closed_candle(&frame(0, "abc", true)).is_none());
    }

    #[tokio::test]
    async fn test_forwarding_stops_when_receiver_dropped() {
        let (tx, mut rx) = mpsc::channel(4);
        assert!(forward_closed(&frame(0, "1", true), &tx).is_continue());
        assert!(forward_closed(&frame(1, "1", false), &tx).is_continue());
        assert_eq!(rx.recv().await.unwrap().time, 0);
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(forward_closed(&frame(2, "1", true), &tx).is_break());
    }
}
