//! Binance USDⓈ-M futures wire types.

use serde::Deserialize;

use crate::error::{MmError, Result};
use crate::types::Candle;

/// Kline stream event from `<symbol>@kline_<interval>`.
///
/// Field names match the Binance API:
///   e = event type
///   E = event time (ms)
///   s = symbol
///   k = kline payload
#[derive(Debug, Deserialize)]
pub struct KlineEvent {
    #[serde(default)]
    pub e: String,
    #[serde(default)]
    #[serde(rename = "E")]
    pub event_time: u64,
    #[serde(default)]
    pub s: String,
    pub k: KlinePayload,
}

/// Kline body. Prices and volume arrive as strings.
///
///   t = bar open time (ms)
///   T = bar close time (ms)
///   i = interval
///   o/h/l/c = prices
///   v = base volume
///   x = whether this bar is closed
#[derive(Debug, Deserialize)]
pub struct KlinePayload {
    pub t: i64,
    #[serde(default)]
    #[serde(rename = "T")]
    pub close_time: i64,
    #[serde(default)]
    pub i: String,
    pub o: String,
    pub h: String,
    pub l: String,
    pub c: String,
    pub v: String,
    pub x: bool,
}

impl KlinePayload {
    pub fn to_candle(&self) -> Result<Candle> {
        Ok(Candle {
            time: self.t,
            open: self.o.parse()?,
            high: self.h.parse()?,
            low: self.l.parse()?,
            close: self.c.parse()?,
            volume: self.v.parse()?,
        })
    }
}

/// Parse one REST kline row:
/// `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`.
pub fn parse_kline_row(row: &serde_json::Value) -> Result<Candle> {
    let fields = row
        .as_array()
        .ok_or_else(|| MmError::MalformedKline(format!("expected array, got {row}")))?;
    if fields.len() < 6 {
        return Err(MmError::MalformedKline(format!(
            "expected at least 6 fields, got {}",
            fields.len()
        )));
    }

    let time = fields[0]
        .as_i64()
        .ok_or_else(|| MmError::MalformedKline(format!("bad open time {}", fields[0])))?;
    let num = |i: usize| -> Result<f64> {
        match &fields[i] {
            serde_json::Value::String(s) => Ok(s.parse()?),
            serde_json::Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| MmError::MalformedKline(format!("bad number {n}"))),
            other => Err(MmError::MalformedKline(format!("bad field {i}: {other}"))),
        }
    };

    Ok(Candle {
        time,
        open: num(1)?,
        high: num(2)?,
        low: num(3)?,
        close: num(4)?,
        volume: num(5)?,
    })
}

/// Error body returned by Binance: `{"code": -2011, "msg": "..."}`.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

/// Entry of `GET /fapi/v3/positionRisk`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRisk {
    pub symbol: String,
    pub position_amt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenKeyResponse {
    pub listen_key: String,
}

/// User-data stream event envelope. Only `ACCOUNT_UPDATE` is inspected.
#[derive(Debug, Deserialize)]
pub struct UserEvent {
    #[serde(default)]
    pub e: String,
    #[serde(default)]
    pub a: Option<AccountUpdate>,
}

#[derive(Debug, Deserialize)]
pub struct AccountUpdate {
    #[serde(default)]
    #[serde(rename = "P")]
    pub positions: Vec<PositionUpdate>,
}

///   s  = symbol
///   pa = position amount (signed, string)
#[derive(Debug, Deserialize)]
pub struct PositionUpdate {
    pub s: String,
    pub pa: String,
}

impl UserEvent {
    /// Signed position amount for `symbol`, if this event carries one.
    pub fn position_amount(&self, symbol: &str) -> Option<f64> {
        if self.e != "ACCOUNT_UPDATE" {
            return None;
        }
        self.a
            .as_ref()?
            .positions
            .iter()
            .find(|p| p.s.eq_ignore_ascii_case(symbol))
            .and_then(|p| p.pa.parse().ok())
    }
}
