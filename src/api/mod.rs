pub mod binance;
pub mod retry;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CandleSeries, OrderResult, OrderSide};

pub use binance::{exchange_symbol, BinanceClient};
pub use retry::RetryPolicy;

/// Exchange capability the bot depends on
///
/// Implementations are shared read-only across all symbol workers of a
/// cycle, so every call takes `&self`.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Most recent `limit` candles for `symbol`, oldest first
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<CandleSeries>;

    /// Submit a market order; called at most once per symbol per cycle
    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> Result<OrderResult>;

    /// Exchange name for logs
    fn name(&self) -> &str {
        "exchange"
    }
}
