//! Binance USDⓈ-M futures adapters: market data in, orders out.

pub mod executor;
pub mod kline_feed;
pub mod position;
pub mod rest;
pub mod signer;
pub mod types;
pub mod user_stream;
pub mod ws;

pub use executor::{BinanceExecutor, ExecutorConfig};
pub use kline_feed::KlineFeed;
pub use position::PositionTracker;
pub use rest::BinanceRest;
pub use signer::HmacSigner;
pub use user_stream::UserStream;

pub const FAPI_BASE: &str = "https://fapi.binance.com";
pub const FSTREAM_WS: &str = "wss://fstream.binance.com/ws";

pub const API_KEY_ENV: &str = "BINANCE_API_KEY";
pub const SECRET_KEY_ENV: &str = "BINANCE_SECRET_KEY";

/// Signer from `BINANCE_API_KEY` / `BINANCE_SECRET_KEY`.
pub fn signer_from_env() -> crate::error::Result<HmacSigner> {
    let read = |name: &'static str| {
        std::env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(crate::error::MmError::MissingCredential(name))
    };
    Ok(HmacSigner::new(read(API_KEY_ENV)?, read(SECRET_KEY_ENV)?))
}
