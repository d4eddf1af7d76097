mod cli;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use cli::{BacktestArgs, Command, FeedArgs, LiveArgs};
use perp_mm::binance::{
    signer_from_env, BinanceExecutor, BinanceRest, ExecutorConfig, KlineFeed, PositionTracker,
    UserStream,
};
use perp_mm::config::Params;
use perp_mm::output::{self, Format};
use perp_mm::paper::PaperEngine;
use perp_mm::runner::{run_backtest, run_live, BacktestSummary};
use perp_mm::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Closed 1m bars arrive once a minute; this is plenty of slack.
const CANDLE_CHANNEL_CAPACITY: usize = 64;

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    let cli = cli::Cli::parse();

    // Initialize tracing
    let filter = cli
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cancel = setup_signal_handlers();

    let result = match cli.command {
        Command::Backtest(args) => backtest(args).await,
        Command::Live(args) => {
            let _ = dotenvy::dotenv(); // load .env if present
            live(args, cancel).await
        }
        Command::Feed(args) => feed(args, cancel).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "fatal error");
        std::process::exit(1);
    }
}

async fn backtest(args: BacktestArgs) -> Result<()> {
    let params = Params::load(&args.params)?;
    let rest = BinanceRest::new(&args.rest_url);
    let candles = rest
        .fetch_klines(
            &params.symbol,
            &params.interval,
            params.limit,
            params.end_time_ms()?,
        )
        .await?;
    info!(count = candles.len(), "history loaded");

    let mut strategy = params.build_strategy();
    let mut engine = PaperEngine::new();
    let summary = run_backtest(&mut strategy, &mut engine, &candles);
    log_summary(&summary);

    if args.show_trades {
        for t in engine.trades() {
            info!(
                time = t.time,
                side = t.side.as_str(),
                price = t.price,
                size = t.size,
                "TRADE"
            );
        }
    }

    let format = Format::from_json_flag(args.json);
    if let Some(path) = &args.out {
        output::write_results(engine.results(), format, &mut create(path)?)?;
        info!(path = %path.display(), "results written");
    }
    if let Some(path) = &args.trades_out {
        output::write_trades(engine.trades(), format, &mut create(path)?)?;
        info!(path = %path.display(), "trades written");
    }

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &summary)?;
    writeln!(stdout)?;
    Ok(())
}

async fn live(args: LiveArgs, cancel: CancellationToken) -> Result<()> {
    let params = Params::load(&args.params)?;
    params.validate_live()?;
    let trade_symbol = params.trade_symbol().to_string();

    let rest = Arc::new(BinanceRest::new(&args.rest_url).with_signer(signer_from_env()?));

    // Warm the indicators on history; the paper result is informational.
    let mut history = rest
        .fetch_klines(&params.symbol, &params.interval, params.limit, None)
        .await?;
    // The newest row is the bar still forming; the live feed delivers it closed.
    history.pop();
    let mut strategy = params.build_strategy();
    let warmup = run_backtest(&mut strategy, &mut PaperEngine::new(), &history);
    info!(candles = warmup.candles, pnl = warmup.final_pnl, "warm-up complete");
    let last_time = history.last().map(|c| c.time);

    let position = PositionTracker::new(params.trade_sz);
    position.sync_once(&rest, &trade_symbol).await?;
    info!(amount = position.amount(), lots = position.lots(), "POSITION");
    position.start_sync(
        Arc::clone(&rest),
        trade_symbol.clone(),
        Duration::from_secs(args.position_sync_secs.max(1)),
        cancel.clone(),
    );

    let user_stream = UserStream::new(Arc::clone(&rest), &args.ws_url, &trade_symbol, position.clone());
    tokio::spawn(user_stream.run(cancel.clone()));

    let mut candles = KlineFeed::new(&args.ws_url, &params.symbol, &params.interval)
        .spawn(CANDLE_CHANNEL_CAPACITY, cancel.clone());

    let executor = BinanceExecutor::spawn(
        Arc::clone(&rest),
        ExecutorConfig {
            symbol: trade_symbol,
            trade_sz: params.trade_sz,
            px_precision: params.px_precision,
            sz_precision: params.sz_precision,
        },
        position,
    );

    run_live(&mut strategy, &executor, &mut candles, last_time, cancel).await;
    executor.shutdown().await;
    info!("goodbye");
    Ok(())
}

async fn feed(args: FeedArgs, cancel: CancellationToken) -> Result<()> {
    info!(symbol = %args.symbol, interval = %args.interval, json = args.json, "feed starting");
    let format = Format::from_json_flag(args.json);
    let mut candles = KlineFeed::new(&args.ws_url, &args.symbol, &args.interval)
        .spawn(CANDLE_CHANNEL_CAPACITY, cancel);

    let mut writer = BufWriter::new(io::stdout().lock());
    if let Some(header) = output::candle_header(format) {
        writeln!(writer, "{header}")?;
        writer.flush()?;
    }
    let mut buf = String::with_capacity(256);
    while let Some(candle) = candles.recv().await {
        output::write_candle(&candle, format, &mut buf, &mut writer)?;
    }
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

fn log_summary(s: &BacktestSummary) {
    info!(
        candles = s.candles,
        quoted = s.quoted,
        trades = s.trades,
        buys = s.buys,
        sells = s.sells,
        inventory = s.final_inventory,
        cash = format!("{:.4}", s.final_cash),
        pnl = format!("{:.4}", s.final_pnl),
        max_drawdown = format!("{:.4}", s.max_drawdown),
        "SUMMARY"
    );
}

/// Register SIGINT and SIGTERM handlers that trigger the returned token.
fn setup_signal_handlers() -> CancellationToken {
    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received SIGINT, shutting down");
        cancel_clone.cancel();
    });

    #[cfg(unix)]
    {
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            let mut sig = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");
            sig.recv().await;
            info!("received SIGTERM, shutting down");
            cancel_clone.cancel();
        });
    }

    cancel
}
