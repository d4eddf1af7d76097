//! Binance USDⓈ-M futures REST client.

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::binance::signer::HmacSigner;
use crate::binance::types::{parse_kline_row, ApiErrorBody, ListenKeyResponse, PositionRisk};
use crate::config::MAX_KLINE_LIMIT;
use crate::error::{MmError, Result};
use crate::types::{Candle, Side};

const API_KEY_HEADER: &str = "X-MBX-APIKEY";
const ORDER_RECV_WINDOW_MS: u32 = 250;
const ACCOUNT_RECV_WINDOW_MS: u32 = 500;

/// LIMIT order parameters, already formatted to exchange precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitOrder {
    pub symbol: String,
    pub side: Side,
    pub quantity: String,
    pub placement: Placement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Post-only at an explicit price (`timeInForce=GTX`).
    PostOnly { price: String },
    /// Join the own side of the book (`priceMatch=QUEUE`, `timeInForce=GTC`).
    QueueMatch,
}

impl LimitOrder {
    fn query(&self) -> String {
        let side = match self.side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };
        let mut q = format!(
            "type=LIMIT&symbol={}&side={side}&quantity={}",
            self.symbol, self.quantity
        );
        match &self.placement {
            Placement::PostOnly { price } => {
                q.push_str("&price=");
                q.push_str(price);
                q.push_str("&timeInForce=GTX");
            }
            Placement::QueueMatch => q.push_str("&priceMatch=QUEUE&timeInForce=GTC"),
        }
        q.push_str(&format!("&recvWindow={ORDER_RECV_WINDOW_MS}"));
        q
    }
}

#[derive(Debug, Clone)]
pub struct BinanceRest {
    client: Client,
    base_url: String,
    signer: Option<HmacSigner>,
}

impl BinanceRest {
    /// Unauthenticated client; enough for market data.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            signer: None,
        }
    }

    pub fn with_signer(mut self, signer: HmacSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Historical bars, oldest first.
    ///
    /// `limit` is capped at 1500. Only rows the exchange actually returned
    /// are included.
    pub async fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
        end_time_ms: Option<i64>,
    ) -> Result<Vec<Candle>> {
        let limit = limit.min(MAX_KLINE_LIMIT).to_string();
        let end = end_time_ms.map(|t| t.to_string());
        let mut query = vec![
            ("symbol", symbol),
            ("interval", interval),
            ("limit", limit.as_str()),
        ];
        if let Some(end) = end.as_deref() {
            query.push(("endTime", end));
        }

        let rows: serde_json::Value = self.get("/fapi/v1/klines", &query).await?;
        let rows = rows
            .as_array()
            .ok_or_else(|| MmError::MalformedKline("klines response is not an array".into()))?;
        let candles = rows.iter().map(parse_kline_row).collect::<Result<Vec<_>>>()?;
        debug!(symbol, interval, count = candles.len(), "fetched klines");
        Ok(candles)
    }

    /// Signed position amount for `symbol` (one-way mode), 0 when flat.
    pub async fn position_amount(&self, symbol: &str) -> Result<f64> {
        let query = format!("symbol={symbol}&recvWindow={ACCOUNT_RECV_WINDOW_MS}");
        let risks: Vec<PositionRisk> = self
            .send_signed(Method::GET, "/fapi/v3/positionRisk", &query)
            .await?;
        match risks.iter().find(|r| r.symbol.eq_ignore_ascii_case(symbol)) {
            Some(r) => Ok(r.position_amt.parse()?),
            None => Ok(0.0),
        }
    }

    pub async fn cancel_all_orders(&self, symbol: &str) -> Result<()> {
        let query = format!("symbol={symbol}&recvWindow={ACCOUNT_RECV_WINDOW_MS}");
        let _: serde_json::Value = self
            .send_signed(Method::DELETE, "/fapi/v1/allOpenOrders", &query)
            .await?;
        Ok(())
    }

    pub async fn place_order(&self, order: &LimitOrder) -> Result<()> {
        let _: serde_json::Value = self
            .send_signed(Method::POST, "/fapi/v1/order", &order.query())
            .await?;
        Ok(())
    }

    pub async fn new_listen_key(&self) -> Result<String> {
        let resp: ListenKeyResponse = self.send_keyed(Method::POST, "/fapi/v1/listenKey").await?;
        Ok(resp.listen_key)
    }

    pub async fn keepalive_listen_key(&self) -> Result<()> {
        let _: serde_json::Value = self.send_keyed(Method::PUT, "/fapi/v1/listenKey").await?;
        Ok(())
    }

    /// GET a public JSON resource.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.get(&url).query(query).send().await?;
        decode(resp).await
    }

    /// Request with only the API key header.
    async fn send_keyed<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T> {
        let signer = self.signer()?;
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .request(method, &url)
            .header(API_KEY_HEADER, signer.api_key())
            .send()
            .await?;
        decode(resp).await
    }

    /// Request with a timestamped, signed query string.
    async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &str,
    ) -> Result<T> {
        let signer = self.signer()?;
        let signed = signer.signed_query(query, chrono::Utc::now().timestamp_millis());
        let url = format!("{}{}?{}", self.base_url, path, signed);
        let resp = self
            .client
            .request(method, &url)
            .header(API_KEY_HEADER, signer.api_key())
            .send()
            .await?;
        decode(resp).await
    }

    fn signer(&self) -> Result<&HmacSigner> {
        self.signer
            .as_ref()
            .ok_or(MmError::MissingCredential("BINANCE_API_KEY"))
    }
}

/// Map non-2xx responses to `Api` when Binance sent an error body, `Http`
/// otherwise.
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(e) => MmError::Api {
                code: e.code,
                msg: e.msg,
            },
            Err(_) => MmError::Http {
                status,
                message: body,
            },
        });
    }
    resp.json::<T>().await.map_err(MmError::Request)
}
