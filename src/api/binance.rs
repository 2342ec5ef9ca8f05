use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::num::NonZeroU32;
use std::sync::Arc;
use uuid::Uuid;

use super::{Exchange, RetryPolicy};
use crate::config::{BotConfig, Credentials, MAX_CANDLE_LIMIT};
use crate::error::{BotError, Result};
use crate::models::{Candle, CandleSeries, OrderResult, OrderSide};

type HmacSha256 = Hmac<Sha256>;

// Type alias for the rate limiter to simplify signatures
type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Convert a display symbol (`BTC/USDT`) to the exchange form (`BTCUSDT`)
pub fn exchange_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| !matches!(c, '/' | '-' | '_' | ' '))
        .collect::<String>()
        .to_uppercase()
}

/// Transport-level failure, before it is attributed to a symbol
#[derive(Debug, thiserror::Error)]
enum RequestError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RequestError {
    /// Transport errors, 429 and 5xx are worth another attempt
    fn is_retryable(&self) -> bool {
        match self {
            RequestError::Transport(_) => true,
            RequestError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            RequestError::Malformed(_) => false,
        }
    }
}

/// Error payload Binance returns alongside non-2xx statuses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    symbol: String,
    order_id: u64,
    client_order_id: String,
    transact_time: i64,
    executed_qty: String,
    status: String,
}

/// Binance spot REST client
///
/// Cloneable; clones share the HTTP connection pool and the rate limiter.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    rate_limiter: Arc<BinanceRateLimiter>,
    retry: RetryPolicy,
    test_orders: bool,
    recv_window_ms: u64,
}

impl BinanceClient {
    pub fn new(config: &BotConfig, credentials: Option<Credentials>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| BotError::Config(format!("failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second)
            .ok_or_else(|| BotError::Config("requests per second must be positive".to_string()))?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            rate_limiter,
            retry: config.fetch_retry_policy(),
            test_orders: config.test_orders,
            recv_window_ms: config.recv_window_ms,
        })
    }

    /// Replace the candle-fetch retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Connectivity check against `/api/v3/ping`
    pub async fn ping(&self) -> Result<()> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/api/v3/ping", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BotError::data_fetch("ping", RequestError::from(e)))?;
        error_for_status(response)
            .await
            .map_err(|e| BotError::data_fetch("ping", e))?;

        Ok(())
    }

    /// Internal method to fetch klines once (without retry logic)
    async fn fetch_klines_once(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> std::result::Result<Vec<Candle>, RequestError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/api/v3/klines", self.base_url);
        if limit > MAX_CANDLE_LIMIT {
            tracing::warn!(
                symbol = %symbol,
                "Requested {} candles, exchange returns at most {}",
                limit,
                MAX_CANDLE_LIMIT
            );
        }
        let limit = limit.min(MAX_CANDLE_LIMIT);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", exchange_symbol(symbol)),
                ("interval", interval.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        // Body read errors (timeouts included) stay transport errors so they can be retried
        let bytes = error_for_status(response).await?.bytes().await?;
        let rows: Vec<Vec<Value>> =
            serde_json::from_slice(&bytes).map_err(|e| RequestError::Malformed(e.to_string()))?;

        rows.iter().map(|row| parse_kline(row)).collect()
    }
}

#[async_trait]
impl Exchange for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<CandleSeries> {
        let what = format!("{} {} klines", symbol, timeframe);
        let candles = self
            .retry
            .run(&what, RequestError::is_retryable, move || {
                self.fetch_klines_once(symbol, timeframe, limit)
            })
            .await
            .map_err(|e| BotError::data_fetch(symbol, e))?;

        CandleSeries::new(symbol, timeframe, candles)
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> Result<OrderResult> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| BotError::order_execution(symbol, "API credentials not configured"))?;

        let client_order_id = Uuid::new_v4().simple().to_string();
        let params = [
            ("symbol", exchange_symbol(symbol)),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", format_quantity(quantity)),
            ("newClientOrderId", client_order_id.clone()),
            ("recvWindow", self.recv_window_ms.to_string()),
            ("timestamp", Utc::now().timestamp_millis().to_string()),
        ];
        let query = build_query(&params);
        let signature =
            sign(&credentials.api_secret, &query).map_err(|e| BotError::order_execution(symbol, e))?;

        let path = if self.test_orders {
            "/api/v3/order/test"
        } else {
            "/api/v3/order"
        };
        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);

        // Orders are submitted exactly once; no retry
        self.rate_limiter.until_ready().await;
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &credentials.api_key)
            .send()
            .await
            .map_err(|e| BotError::order_execution(symbol, RequestError::from(e)))?;
        let response = error_for_status(response)
            .await
            .map_err(|e| BotError::order_execution(symbol, e))?;

        if self.test_orders {
            tracing::info!(symbol = %symbol, side = %side, "Test order accepted (not executed)");
            return Ok(OrderResult {
                symbol: symbol.to_string(),
                side,
                quantity,
                client_order_id,
                order_id: None,
                status: "TEST".to_string(),
                executed_qty: 0.0,
                transact_time: None,
            });
        }

        let body: OrderResponse = response
            .json()
            .await
            .map_err(|e| BotError::order_execution(symbol, RequestError::Malformed(e.to_string())))?;

        tracing::debug!(
            exchange_symbol = %body.symbol,
            order_id = body.order_id,
            status = %body.status,
            "Order acknowledged"
        );

        order_result(symbol, side, quantity, body).map_err(|e| BotError::order_execution(symbol, e))
    }

    fn name(&self) -> &str {
        "binance"
    }
}

fn order_result(
    symbol: &str,
    side: OrderSide,
    quantity: f64,
    body: OrderResponse,
) -> std::result::Result<OrderResult, RequestError> {
    let executed_qty = body.executed_qty.parse().map_err(|_| {
        RequestError::Malformed(format!(
            "order {} executedQty '{}' is not a number",
            body.order_id, body.executed_qty
        ))
    })?;

    Ok(OrderResult {
        symbol: symbol.to_string(),
        side,
        quantity,
        client_order_id: body.client_order_id,
        order_id: Some(body.order_id),
        status: body.status,
        executed_qty,
        transact_time: Utc.timestamp_millis_opt(body.transact_time).single(),
    })
}

async fn error_for_status(
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, RequestError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(err) => format!("[{}] {}", err.code, err.msg),
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        Err(_) => body,
    };

    Err(RequestError::Status { status, message })
}

/// Kline row: `[open_time, open, high, low, close, volume, close_time, ...]`
fn parse_kline(row: &[Value]) -> std::result::Result<Candle, RequestError> {
    if row.len() < 6 {
        return Err(RequestError::Malformed(format!(
            "kline has {} fields, expected at least 6",
            row.len()
        )));
    }

    let open_time = row[0]
        .as_i64()
        .ok_or_else(|| RequestError::Malformed("kline open time is not an integer".to_string()))?;
    let timestamp = Utc
        .timestamp_millis_opt(open_time)
        .single()
        .ok_or_else(|| RequestError::Malformed(format!("invalid kline open time {}", open_time)))?;

    let field = |i: usize, name: &str| {
        json_f64(&row[i])
            .ok_or_else(|| RequestError::Malformed(format!("kline {} is not a number", name)))
    };

    Ok(Candle {
        timestamp,
        open: field(1, "open")?,
        high: field(2, "high")?,
        low: field(3, "low")?,
        close: field(4, "close")?,
        volume: field(5, "volume")?,
    })
}

// Binance sends prices as strings
fn json_f64(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn build_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// HMAC-SHA256 of the query string, hex encoded
fn sign(secret: &str, query: &str) -> std::result::Result<String, String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| format!("HMAC error: {}", e))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Plain decimal with at most 8 places and no trailing zeros
fn format_quantity(quantity: f64) -> String {
    let s = format!("{:.8}", quantity);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}
