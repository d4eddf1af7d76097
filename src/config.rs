//! Strategy and exchange parameters, loaded from a JSON file.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{MmError, Result};
use crate::indicators::{BollingerBands, EmaSlope, MarketEfficiency, TrendSignal};
use crate::strategy::{MarketMakingStrategy, QuoteParams};

/// Binance caps a single klines request at this many rows.
pub const MAX_KLINE_LIMIT: usize = 1500;

/// Largest decimal precision accepted for prices and sizes.
const MAX_PRECISION: u32 = 18;

/// Which indicator feeds the trend term of the strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendSource {
    #[default]
    Ema,
    Bollinger,
}

/// Trend indicator chosen at runtime.
pub type DynTrend = Box<dyn TrendSignal + Send>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Params {
    /// Kline symbol, e.g. `BTCUSDT`.
    pub symbol: String,
    /// Kline interval, e.g. `1m`.
    pub interval: String,
    /// RFC3339 end of the history window. Latest bars when absent.
    #[serde(default)]
    pub end_time: Option<String>,
    pub limit: usize,
    #[serde(alias = "mePeriod")]
    pub me_span: usize,
    pub ema_span: usize,
    #[serde(default)]
    pub trend_source: TrendSource,
    #[serde(default = "default_bollinger_multiplier")]
    pub bollinger_multiplier: f64,
    pub base_spread: f64,
    pub inventory_limit: i64,
    pub lot_size: i64,
    #[serde(default)]
    pub inventory_skew_k: f64,
    #[serde(default)]
    pub trend_skew_k: f64,
    #[serde(default)]
    pub trend_bias: f64,

    // Live trading only.
    /// Exchange symbol orders are sent to; falls back to `symbol`.
    #[serde(default)]
    pub trade_symbol: Option<String>,
    /// Base-asset quantity of one lot.
    #[serde(default)]
    pub trade_sz: f64,
    #[serde(default)]
    pub px_precision: u32,
    #[serde(default)]
    pub sz_precision: u32,
}

fn default_bollinger_multiplier() -> f64 {
    2.0
}

impl Params {
    /// Read, parse and validate a params file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| MmError::Config(format!("{}: {e}", path.display())))?;
        let params: Params = serde_json::from_str(&raw)?;
        params.validate()?;
        info!(
            symbol = %params.symbol,
            interval = %params.interval,
            limit = params.limit,
            me_span = params.me_span,
            ema_span = params.ema_span,
            trend_source = ?params.trend_source,
            base_spread = params.base_spread,
            inventory_limit = params.inventory_limit,
            lot_size = params.lot_size,
            "CONFIG"
        );
        Ok(params)
    }

    /// Check the fields the backtest needs.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(config("symbol must not be empty"));
        }
        if self.interval.trim().is_empty() {
            return Err(config("interval must not be empty"));
        }
        if self.limit == 0 || self.limit > MAX_KLINE_LIMIT {
            return Err(config(format!("limit must be in 1..={MAX_KLINE_LIMIT}")));
        }
        if self.me_span == 0 {
            return Err(config("meSpan must be positive"));
        }
        if self.ema_span == 0 {
            return Err(config("emaSpan must be positive"));
        }
        if !self.base_spread.is_finite() || self.base_spread < 0.0 {
            return Err(config("baseSpread must be a finite non-negative number"));
        }
        if self.inventory_limit < 0 {
            return Err(config("inventoryLimit must not be negative"));
        }
        if self.lot_size <= 0 {
            return Err(config("lotSize must be positive"));
        }
        for (name, v) in [
            ("inventorySkewK", self.inventory_skew_k),
            ("trendSkewK", self.trend_skew_k),
            ("trendBias", self.trend_bias),
            ("bollingerMultiplier", self.bollinger_multiplier),
        ] {
            if !v.is_finite() {
                return Err(config(format!("{name} must be finite")));
            }
        }
        if self.px_precision > MAX_PRECISION || self.sz_precision > MAX_PRECISION {
            return Err(config(format!("precisions must be at most {MAX_PRECISION}")));
        }
        self.end_time_ms()?;
        Ok(())
    }

    /// Additional checks before sending real orders.
    pub fn validate_live(&self) -> Result<()> {
        self.validate()?;
        if !self.trade_sz.is_finite() || self.trade_sz <= 0.0 {
            return Err(config("tradeSz must be positive for live trading"));
        }
        Ok(())
    }

    /// `endTime` as epoch milliseconds.
    pub fn end_time_ms(&self) -> Result<Option<i64>> {
        match self.end_time.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|t| Some(t.timestamp_millis()))
                .map_err(|e| config(format!("endTime {s:?}: {e}"))),
        }
    }

    pub fn trade_symbol(&self) -> &str {
        self.trade_symbol.as_deref().unwrap_or(&self.symbol)
    }

    pub fn quote_params(&self) -> QuoteParams {
        QuoteParams {
            base_spread: self.base_spread,
            inventory_limit: self.inventory_limit,
            lot_size: self.lot_size,
            inventory_skew_k: self.inventory_skew_k,
            trend_skew_k: self.trend_skew_k,
            trend_bias: self.trend_bias,
        }
    }

    /// Fresh strategy with cold indicators.
    pub fn build_strategy(&self) -> MarketMakingStrategy<DynTrend> {
        let trend: DynTrend = match self.trend_source {
            TrendSource::Ema => Box::new(EmaSlope::new(self.ema_span)),
            TrendSource::Bollinger => {
                Box::new(BollingerBands::new(self.ema_span, self.bollinger_multiplier))
            }
        };
        MarketMakingStrategy::new(MarketEfficiency::new(self.me_span), trend, self.quote_params())
    }
}

fn config(msg: impl Into<String>) -> MmError {
    MmError::Config(msg.into())
}
