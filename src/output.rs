//! Line-oriented export of result rows, trades and candles.
//!
//! Lines are built by hand into a reusable buffer: floats through `ryu`,
//! NaN as an empty CSV cell or JSON `null`.

use std::io::Write;

use crate::error::Result;
use crate::types::{Candle, ResultRow, Trade};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Comma separated with a header line.
    Csv,
    /// One JSON object per line.
    Json,
}

impl Format {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Format::Json
        } else {
            Format::Csv
        }
    }
}

const RESULT_HEADER: &str =
    "time,close,bid,ask,inventory,signal,cash,cumulative_pnl,buy_fill_price,sell_fill_price";
const TRADE_HEADER: &str = "time,side,price,size";
const CANDLE_HEADER: &str = "time,open,high,low,close,volume";

/// Write one line per result row.
pub fn write_results<W: Write>(rows: &[ResultRow], format: Format, writer: &mut W) -> Result<()> {
    let mut buf = String::with_capacity(256);
    if format == Format::Csv {
        writeln!(writer, "{RESULT_HEADER}")?;
    }
    for row in rows {
        buf.clear();
        format_result(&mut buf, row, format);
        writer.write_all(buf.as_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Write one line per trade.
pub fn write_trades<W: Write>(trades: &[Trade], format: Format, writer: &mut W) -> Result<()> {
    let mut buf = String::with_capacity(128);
    if format == Format::Csv {
        writeln!(writer, "{TRADE_HEADER}")?;
    }
    for trade in trades {
        buf.clear();
        match format {
            Format::Csv => {
                push_i64(&mut buf, trade.time);
                buf.push(',');
                buf.push_str(trade.side.as_str());
                buf.push(',');
                push_f64(&mut buf, trade.price, "");
                buf.push(',');
                push_i64(&mut buf, trade.size);
            }
            Format::Json => {
                buf.push_str("{\"time\":");
                push_i64(&mut buf, trade.time);
                buf.push_str(",\"side\":\"");
                buf.push_str(trade.side.as_str());
                buf.push_str("\",\"price\":");
                push_f64(&mut buf, trade.price, "null");
                buf.push_str(",\"size\":");
                push_i64(&mut buf, trade.size);
                buf.push('}');
            }
        }
        buf.push('\n');
        writer.write_all(buf.as_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// CSV header for [`write_candle`] streams.
pub fn candle_header(format: Format) -> Option<&'static str> {
    match format {
        Format::Csv => Some(CANDLE_HEADER),
        Format::Json => None,
    }
}

/// Write a single candle line and flush, for streaming output.
pub fn write_candle<W: Write>(
    candle: &Candle,
    format: Format,
    buf: &mut String,
    writer: &mut W,
) -> Result<()> {
    buf.clear();
    let fields = [
        ("open", candle.open),
        ("high", candle.high),
        ("low", candle.low),
        ("close", candle.close),
        ("volume", candle.volume),
    ];
    match format {
        Format::Csv => {
            push_i64(buf, candle.time);
            for (_, v) in fields {
                buf.push(',');
                push_f64(buf, v, "");
            }
        }
        Format::Json => {
            buf.push_str("{\"time\":");
            push_i64(buf, candle.time);
            for (name, v) in fields {
                buf.push_str(",\"");
                buf.push_str(name);
                buf.push_str("\":");
                push_f64(buf, v, "null");
            }
            buf.push('}');
        }
    }
    buf.push('\n');
    writer.write_all(buf.as_bytes())?;
    writer.flush()?;
    Ok(())
}

fn format_result(buf: &mut String, row: &ResultRow, format: Format) {
    let floats = [
        ("close", row.close),
        ("bid", row.bid),
        ("ask", row.ask),
    ];
    let tail = [
        ("signal", row.signal),
        ("cash", row.cash),
        ("cumulative_pnl", row.cumulative_pnl),
        ("buy_fill_price", row.buy_fill_price.unwrap_or(f64::NAN)),
        ("sell_fill_price", row.sell_fill_price.unwrap_or(f64::NAN)),
    ];

    match format {
        Format::Csv => {
            push_i64(buf, row.time);
            for (_, v) in floats {
                buf.push(',');
                push_f64(buf, v, "");
            }
            buf.push(',');
            push_i64(buf, row.inventory);
            for (_, v) in tail {
                buf.push(',');
                push_f64(buf, v, "");
            }
        }
        Format::Json => {
            buf.push_str("{\"time\":");
            push_i64(buf, row.time);
            for (name, v) in floats {
                push_json_key(buf, name);
                push_f64(buf, v, "null");
            }
            push_json_key(buf, "inventory");
            push_i64(buf, row.inventory);
            for (name, v) in tail {
                push_json_key(buf, name);
                push_f64(buf, v, "null");
            }
            buf.push('}');
        }
    }
    buf.push('\n');
}

fn push_json_key(buf: &mut String, name: &str) {
    buf.push_str(",\"");
    buf.push_str(name);
    buf.push_str("\":");
}

/// Fast f64 formatting via `ryu`; non-finite values become `missing`.
fn push_f64(buf: &mut String, val: f64, missing: &str) {
    if !val.is_finite() {
        buf.push_str(missing);
        return;
    }
    let mut b = ryu::Buffer::new();
    buf.push_str(b.format_finite(val));
}

fn push_i64(buf: &mut String, val: i64) {
    use std::fmt::Write as _;
    let _ = write!(buf, "{val}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    fn row() -> ResultRow {
        ResultRow {
            time: 1_700_000_000_000,
            close: 100.5,
            bid: 100.25,
            ask: f64::NAN,
            inventory: -2,
            signal: -1.0,
            cash: 201.0,
            cumulative_pnl: 0.0,
            buy_fill_price: None,
            sell_fill_price: Some(100.5),
        }
    }

    #[test]
    fn test_results_csv() {
        let mut out = Vec::new();
        write_results(&[row()], Format::Csv, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(RESULT_HEADER));
        assert_eq!(
            lines.next(),
            Some("1700000000000,100.5,100.25,,-2,-1.0,201.0,0.0,,100.5")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_results_json_lines_parse_back() {
        let mut out = Vec::new();
        write_results(&[row(), row()], Format::Json, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);

        let v: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(v["time"], 1_700_000_000_000i64);
        assert_eq!(v["bid"], 100.25);
        assert!(v["ask"].is_null());
        assert_eq!(v["inventory"], -2);
        assert!(v["buy_fill_price"].is_null());
        assert_eq!(v["sell_fill_price"], 100.5);
    }

    #[test]
    fn test_trades_both_formats() {
        let trades = [Trade {
            side: Side::Buy,
            time: 60_000,
            price: 99.5,
            size: 3,
        }];

        let mut csv = Vec::new();
        write_trades(&trades, Format::Csv, &mut csv).unwrap();
        assert_eq!(
            String::from_utf8(csv).unwrap(),
            "time,side,price,size\n60000,buy,99.5,3\n"
        );

        let mut json = Vec::new();
        write_trades(&trades, Format::Json, &mut json).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(v["side"], "buy");
        assert_eq!(v["size"], 3);
    }

    #[test]
    fn test_candle_line() {
        let c = Candle {
            time: 5,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 10.0,
        };
        let mut buf = String::new();
        let mut out = Vec::new();
        write_candle(&c, Format::Csv, &mut buf, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "5,1.0,2.0,0.5,1.5,10.0\n");

        let mut out = Vec::new();
        write_candle(&c, Format::Json, &mut buf, &mut out).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(v["close"], 1.5);
        assert!(candle_header(Format::Json).is_none());
    }
}
