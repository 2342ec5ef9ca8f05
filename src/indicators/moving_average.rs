use serde::Serialize;

use crate::error::{BotError, Result};
use crate::models::CandleSeries;

pub const SMMA_PERIOD: usize = 14;
pub const EMA_FAST_PERIOD: usize = 13;
pub const EMA_SLOW_PERIOD: usize = 21;

/// Longest lookback of the indicator set
pub const LONGEST_LOOKBACK: usize = EMA_SLOW_PERIOD;

/// Smoothing coefficient of a smoothed moving average (1 / period)
pub fn smma_alpha(period: usize) -> f64 {
    1.0 / period as f64
}

/// Smoothing coefficient of a span-based EMA (2 / (span + 1))
pub fn ema_alpha(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// Exponentially weighted series seeded with the first value
///
/// `value[t] = alpha * x[t] + (1 - alpha) * value[t - 1]`, `value[0] = x[0]`.
/// No simple-average warmup, so the output has the same length as the input.
pub fn exponential_series(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut iter = values.iter();

    if let Some(&first) = iter.next() {
        let mut prev = first;
        out.push(prev);
        for &x in iter {
            prev = alpha * x + (1.0 - alpha) * prev;
            out.push(prev);
        }
    }

    out
}

/// Indicator columns aligned with the candle series they came from
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndicatorSeries {
    pub closes: Vec<f64>,
    pub smma14: Vec<f64>,
    pub ema13: Vec<f64>,
    pub ema21: Vec<f64>,
}

/// Latest close plus the three indicator values at the same index
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub smma14: f64,
    pub ema13: f64,
    pub ema21: f64,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Values at the last index; the only part consumed downstream
    pub fn latest(&self) -> Option<IndicatorSnapshot> {
        let i = self.closes.len().checked_sub(1)?;
        Some(IndicatorSnapshot {
            close: self.closes[i],
            smma14: self.smma14[i],
            ema13: self.ema13[i],
            ema21: self.ema21[i],
        })
    }
}

/// Compute SMMA14, EMA13 and EMA21 over a close-price column
///
/// Fails on empty input and on non-finite closes, so the classifier never
/// sees NaN.
pub fn compute_from_closes(symbol: &str, closes: &[f64]) -> Result<IndicatorSeries> {
    if closes.is_empty() {
        return Err(BotError::InsufficientData {
            symbol: symbol.to_string(),
            needed: 1,
            got: 0,
        });
    }

    if let Some(i) = closes.iter().position(|c| !c.is_finite()) {
        return Err(BotError::data_fetch(
            symbol,
            format!("non-finite close at index {}", i),
        ));
    }

    Ok(IndicatorSeries {
        closes: closes.to_vec(),
        smma14: exponential_series(closes, smma_alpha(SMMA_PERIOD)),
        ema13: exponential_series(closes, ema_alpha(EMA_FAST_PERIOD)),
        ema21: exponential_series(closes, ema_alpha(EMA_SLOW_PERIOD)),
    })
}

/// Indicator engine entry point
pub fn compute_indicators(series: &CandleSeries) -> Result<IndicatorSeries> {
    compute_from_closes(series.symbol(), &series.closes())
}
