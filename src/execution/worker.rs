use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::{timeout, Duration};

use super::dispatcher::{DispatchOutcome, TradeDispatcher};
use crate::api::Exchange;
use crate::error::{BotError, Result};
use crate::models::{OrderResult, TrendState};
use crate::strategy::Strategy;

/// What happened to one symbol in one cycle
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    /// Trend computed, no order sent
    Trend { trend: TrendState, reason: String },
    /// Trend computed and an order accepted
    Traded { trend: TrendState, order: OrderResult },
    /// Contained failure at any step
    Failed { error: BotError },
}

impl SymbolOutcome {
    pub fn trend(&self) -> Option<TrendState> {
        match self {
            SymbolOutcome::Trend { trend, .. } | SymbolOutcome::Traded { trend, .. } => {
                Some(*trend)
            }
            SymbolOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SymbolOutcome::Failed { .. })
    }
}

/// Fetch -> indicators -> classify -> dispatch for a single symbol
///
/// `run` never returns an error and never panics outward: every failure is
/// logged with the symbol and folded into `SymbolOutcome::Failed`.
pub struct SymbolWorker {
    exchange: Arc<dyn Exchange>,
    strategy: Arc<dyn Strategy>,
    dispatcher: TradeDispatcher,
    timeframe: String,
    candle_limit: usize,
    fetch_timeout: Option<Duration>,
}

impl SymbolWorker {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        strategy: Arc<dyn Strategy>,
        dispatcher: TradeDispatcher,
        timeframe: impl Into<String>,
        candle_limit: usize,
    ) -> Self {
        Self {
            exchange,
            strategy,
            dispatcher,
            timeframe: timeframe.into(),
            candle_limit,
            fetch_timeout: None,
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = Some(fetch_timeout);
        self
    }

    pub async fn run(&self, symbol: &str) -> SymbolOutcome {
        let result = AssertUnwindSafe(self.process(symbol)).catch_unwind().await;

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(error)) => SymbolOutcome::Failed { error },
            Err(panic) => SymbolOutcome::Failed {
                error: BotError::Unexpected {
                    symbol: symbol.to_string(),
                    reason: panic_message(panic.as_ref()),
                },
            },
        };

        if let SymbolOutcome::Failed { error } = &outcome {
            tracing::error!(symbol = %symbol, "Error processing {}: {}", symbol, error);
        }

        outcome
    }

    async fn process(&self, symbol: &str) -> Result<SymbolOutcome> {
        let fetch = self
            .exchange
            .fetch_candles(symbol, &self.timeframe, self.candle_limit);
        let series = match self.fetch_timeout {
            Some(limit) => timeout(limit, fetch).await.map_err(|_| BotError::Timeout {
                symbol: symbol.to_string(),
                operation: "candle fetch",
                secs: limit.as_secs(),
            })??,
            None => fetch.await?,
        };

        let reading = self.strategy.evaluate(&series)?;
        tracing::info!(
            symbol = %symbol,
            trend = %reading.trend,
            close = reading.snapshot.close,
            "{} trend: {}",
            symbol,
            reading.trend
        );

        let outcome = match self
            .dispatcher
            .dispatch(self.exchange.as_ref(), symbol, reading.trend)
            .await?
        {
            DispatchOutcome::Skipped { reason } => SymbolOutcome::Trend {
                trend: reading.trend,
                reason,
            },
            DispatchOutcome::Submitted(order) => SymbolOutcome::Traded {
                trend: reading.trend,
                order,
            },
        };

        Ok(outcome)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
