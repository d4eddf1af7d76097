//! WebSocket session with heartbeat, stale detection and reconnects.
//!
//! Each text frame is handed to a caller-supplied handler. The handler
//! returns [`ControlFlow::Break`] to end the session for good.

use std::ops::ControlFlow;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{MmError, Result};

const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(10);
const STALE_THRESHOLD: Duration = Duration::from_secs(60);
const STALE_CHECK_INTERVAL: Duration = Duration::from_secs(10);
pub(crate) const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Keep a connection to `url` alive until cancelled or the handler breaks.
pub async fn run_with_reconnect<F>(url: &str, cancel: &CancellationToken, mut on_text: F)
where
    F: FnMut(&str) -> ControlFlow<()>,
{
    loop {
        match run_single_connection(url, cancel, &mut on_text).await {
            Ok(()) => {
                info!("websocket stopped gracefully");
                return;
            }
            Err(e) => {
                error!(error = %e, "connection error");
                if !wait_before_reconnect(cancel).await {
                    return;
                }
            }
        }
    }
}

/// Sleep out the reconnect delay. Returns `false` if shutdown came first.
pub(crate) async fn wait_before_reconnect(cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    info!(delay = ?RECONNECT_DELAY, "reconnecting");
    tokio::select! {
        _ = time::sleep(RECONNECT_DELAY) => true,
        _ = cancel.cancelled() => {
            info!("shutdown during reconnect wait");
            false
        }
    }
}

/// Single connection lifetime. `Ok` means a deliberate stop.
pub async fn run_single_connection<F>(
    url: &str,
    cancel: &CancellationToken,
    on_text: &mut F,
) -> Result<()>
where
    F: FnMut(&str) -> ControlFlow<()>,
{
    info!(url, "connecting");
    let (ws_stream, _response) = tokio::select! {
        r = tokio_tungstenite::connect_async(url) => r?,
        _ = cancel.cancelled() => return Ok(()),
    };
    let (mut sink, mut stream) = ws_stream.split();
    info!("connected");

    let mut last_message_time = Instant::now();
    let mut ping_interval = time::interval(PING_INTERVAL);
    ping_interval.tick().await;
    let mut stale_interval = time::interval(STALE_CHECK_INTERVAL);
    stale_interval.tick().await;

    let mut pong_deadline: Option<Instant> = None;

    loop {
        let pong_active = pong_deadline.is_some();
        let pong_timeout_fut =
            time::sleep_until(pong_deadline.unwrap_or_else(|| Instant::now() + STALE_THRESHOLD));

        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_message_time = Instant::now();
                        if on_text(&text).is_break() {
                            let _ = sink.send(Message::Close(None)).await;
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        debug!("received server ping");
                        last_message_time = Instant::now();
                        sink.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        debug!("received pong");
                        last_message_time = Instant::now();
                        pong_deadline = None;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("received close frame");
                        return Err(MmError::ConnectionClosed);
                    }
                    Some(Ok(_)) => {
                        last_message_time = Instant::now();
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(MmError::ConnectionClosed),
                }
            }

            _ = ping_interval.tick() => {
                debug!("sending ping");
                sink.send(Message::Ping(vec![])).await?;
                pong_deadline = Some(Instant::now() + PONG_TIMEOUT);
            }

            _ = stale_interval.tick() => {
                let elapsed = last_message_time.elapsed();
                if elapsed > STALE_THRESHOLD {
                    let ms = elapsed.as_millis() as u64;
                    warn!(elapsed_ms = ms, "connection stale");
                    return Err(MmError::StaleConnection(ms));
                }
            }

            _ = pong_timeout_fut, if pong_active => {
                warn!("pong timeout");
                return Err(MmError::PongTimeout);
            }

            _ = cancel.cancelled() => {
                info!("shutdown requested, sending close frame");
                let _ = sink.send(Message::Close(None)).await;
                return Ok(());
            }
        }
    }
}
