use std::path::PathBuf;

use clap::{Parser, Subcommand};
use perp_mm::binance::{FAPI_BASE, FSTREAM_WS};

/// perp-mm: bar-driven market maker for Binance USDⓈ-M perpetuals.
#[derive(Parser, Debug)]
#[command(name = "perp-mm", version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay historical klines through the paper engine
    Backtest(BacktestArgs),

    /// Warm up on history, then quote live on closed bars
    Live(LiveArgs),

    /// Stream closed klines to stdout
    Feed(FeedArgs),
}

#[derive(Parser, Debug)]
pub struct BacktestArgs {
    /// Strategy parameters (JSON)
    #[arg(short, long, default_value = "params.json")]
    pub params: PathBuf,

    /// Log every simulated trade
    #[arg(long)]
    pub show_trades: bool,

    /// Write per-bar results to this file
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Write trades to this file
    #[arg(long)]
    pub trades_out: Option<PathBuf>,

    /// Export JSON lines instead of CSV
    #[arg(long)]
    pub json: bool,

    /// REST endpoint
    #[arg(long, default_value = FAPI_BASE)]
    pub rest_url: String,
}

#[derive(Parser, Debug)]
pub struct LiveArgs {
    /// Strategy parameters (JSON)
    #[arg(short, long, default_value = "params.json")]
    pub params: PathBuf,

    /// Seconds between position re-syncs over REST
    #[arg(long, default_value_t = 30)]
    pub position_sync_secs: u64,

    /// REST endpoint
    #[arg(long, default_value = FAPI_BASE)]
    pub rest_url: String,

    /// WebSocket endpoint
    #[arg(long, default_value = FSTREAM_WS)]
    pub ws_url: String,
}

#[derive(Parser, Debug)]
pub struct FeedArgs {
    /// Symbol (e.g. btcusdt)
    pub symbol: String,

    /// Kline interval
    #[arg(short, long, default_value = "1m")]
    pub interval: String,

    /// Output as JSON instead of CSV
    #[arg(long)]
    pub json: bool,

    /// WebSocket endpoint
    #[arg(long, default_value = FSTREAM_WS)]
    pub ws_url: String,
}
