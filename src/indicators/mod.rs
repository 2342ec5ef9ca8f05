// Technical indicators module
// SMMA/EMA trend set consumed by the trend classifier

pub mod moving_average;

pub use moving_average::{
    compute_indicators, ema_alpha, exponential_series, smma_alpha, IndicatorSeries,
    IndicatorSnapshot, EMA_FAST_PERIOD, EMA_SLOW_PERIOD, LONGEST_LOOKBACK, SMMA_PERIOD,
};
