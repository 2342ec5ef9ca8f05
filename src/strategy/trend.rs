use crate::error::{BotError, Result};
use crate::indicators::{compute_indicators, IndicatorSnapshot, LONGEST_LOOKBACK};
use crate::models::{CandleSeries, TrendState};

use super::{Strategy, TrendReading};

/// Map the latest close and indicator values to a trend state
///
/// First match wins: close strictly above all three averages is bullish,
/// strictly below all three is bearish, anything else (ties included) is
/// sideways. Inputs are expected finite; the indicator engine guarantees it.
pub fn classify(snapshot: &IndicatorSnapshot) -> TrendState {
    let IndicatorSnapshot {
        close,
        smma14,
        ema13,
        ema21,
    } = *snapshot;

    if close > smma14 && close > ema13 && close > ema21 {
        TrendState::Bullish
    } else if close < smma14 && close < ema13 && close < ema21 {
        TrendState::Bearish
    } else {
        TrendState::Sideways
    }
}

/// Close vs SMMA14/EMA13/EMA21 trend strategy
#[derive(Debug, Clone)]
pub struct TrendStrategy {
    min_candles: usize,
}

impl Default for TrendStrategy {
    fn default() -> Self {
        Self {
            min_candles: LONGEST_LOOKBACK,
        }
    }
}

impl TrendStrategy {
    /// Override the warmup requirement (never below one candle)
    pub fn with_min_candles(mut self, min_candles: usize) -> Self {
        self.min_candles = min_candles.max(1);
        self
    }
}

impl Strategy for TrendStrategy {
    fn evaluate(&self, series: &CandleSeries) -> Result<TrendReading> {
        if series.len() < self.min_candles {
            return Err(BotError::InsufficientData {
                symbol: series.symbol().to_string(),
                needed: self.min_candles,
                got: series.len(),
            });
        }

        let indicators = compute_indicators(series)?;
        let snapshot = indicators.latest().ok_or_else(|| BotError::InsufficientData {
            symbol: series.symbol().to_string(),
            needed: self.min_candles,
            got: 0,
        })?;

        let trend = classify(&snapshot);

        tracing::debug!(
            symbol = %series.symbol(),
            close = snapshot.close,
            smma14 = snapshot.smma14,
            ema13 = snapshot.ema13,
            ema21 = snapshot.ema21,
            trend = %trend,
            "Classified trend"
        );

        Ok(TrendReading { trend, snapshot })
    }

    fn name(&self) -> &str {
        "SMMA/EMA Trend"
    }

    fn min_candles_required(&self) -> usize {
        self.min_candles
    }
}
