// Trading strategy module
pub mod trend;

use crate::error::Result;
use crate::indicators::IndicatorSnapshot;
use crate::models::{CandleSeries, TrendState};

pub use trend::{classify, TrendStrategy};

/// What a strategy concluded from one candle series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendReading {
    pub trend: TrendState,
    pub snapshot: IndicatorSnapshot,
}

/// Base trait for all trading strategies
pub trait Strategy: Send + Sync {
    /// Derive a trend reading from market data
    fn evaluate(&self, series: &CandleSeries) -> Result<TrendReading>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum candles required for this strategy
    fn min_candles_required(&self) -> usize;
}
