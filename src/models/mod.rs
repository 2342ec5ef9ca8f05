use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BotError, Result};

/// OHLCV candlestick for one time bucket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Candle history for one symbol/timeframe, oldest first
///
/// Construction validates ordering, so a `CandleSeries` always holds at least
/// two candles with strictly increasing timestamps. There is no mutable access;
/// a new fetch builds a new series.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CandleSeries {
    symbol: String,
    timeframe: String,
    candles: Vec<Candle>,
}

/// Fewest candles a fetch may return and still count as usable data
pub const MIN_SERIES_LEN: usize = 2;

impl CandleSeries {
    pub fn new(
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        candles: Vec<Candle>,
    ) -> Result<Self> {
        let symbol = symbol.into();

        if candles.len() < MIN_SERIES_LEN {
            return Err(BotError::data_fetch(
                &symbol,
                format!(
                    "expected at least {} candles, got {}",
                    MIN_SERIES_LEN,
                    candles.len()
                ),
            ));
        }

        if let Some(pair) = candles
            .windows(2)
            .find(|pair| pair[1].timestamp <= pair[0].timestamp)
        {
            return Err(BotError::data_fetch(
                &symbol,
                format!(
                    "non-monotonic timestamps: {} followed by {}",
                    pair[0].timestamp, pair[1].timestamp
                ),
            ));
        }

        Ok(Self {
            symbol,
            timeframe: timeframe.into(),
            candles,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> &str {
        &self.timeframe
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Close price column
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn latest(&self) -> &Candle {
        // Non-empty by construction
        &self.candles[self.candles.len() - 1]
    }
}

/// Trend classification for one symbol at one point in time
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TrendState {
    Bullish,
    Bearish,
    Sideways,
}

impl TrendState {
    /// Order side a reading asks for; sideways asks for nothing
    pub fn order_side(&self) -> Option<OrderSide> {
        match self {
            TrendState::Bullish => Some(OrderSide::Buy),
            TrendState::Bearish => Some(OrderSide::Sell),
            TrendState::Sideways => None,
        }
    }
}

impl fmt::Display for TrendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrendState::Bullish => "bullish",
            TrendState::Bearish => "bearish",
            TrendState::Sideways => "sideways",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Wire form used by the exchange
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgement of a submitted market order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderResult {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub client_order_id: String,
    pub order_id: Option<u64>, // None for validate-only submissions
    pub status: String,
    pub executed_qty: f64,
    pub transact_time: Option<DateTime<Utc>>,
}
