use std::sync::Arc;
use tokio::time::{timeout, Duration};

use super::policy::{EntryPolicy, RefireEveryCycle};
use crate::api::Exchange;
use crate::error::{BotError, Result};
use crate::models::{OrderResult, OrderSide, TrendState};

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchAction {
    Submit { side: OrderSide, quantity: f64 },
    Skip,
}

#[derive(Debug, Clone)]
pub struct DispatchDecision {
    pub action: DispatchAction,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Nothing was sent to the exchange
    Skipped { reason: String },
    Submitted(OrderResult),
}

/// Turns a trend reading into at most one market order
pub struct TradeDispatcher {
    quantity: f64,
    live: bool,
    policy: Arc<dyn EntryPolicy>,
    order_timeout: Option<Duration>,
}

impl TradeDispatcher {
    pub fn new(quantity: f64, live: bool) -> Self {
        Self {
            quantity,
            live,
            policy: Arc::new(RefireEveryCycle),
            order_timeout: None,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn EntryPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_order_timeout(mut self, order_timeout: Duration) -> Self {
        self.order_timeout = Some(order_timeout);
        self
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Decide what to do with a reading, without touching the exchange
    pub fn decide(&self, symbol: &str, trend: TrendState) -> DispatchDecision {
        if !self.live {
            return DispatchDecision {
                action: DispatchAction::Skip,
                reason: format!("Live trading disabled, observed {}", trend),
            };
        }

        if trend == TrendState::Sideways {
            return DispatchDecision {
                action: DispatchAction::Skip,
                reason: "Trend is sideways".to_string(),
            };
        }

        match self.policy.decide(symbol, trend) {
            Some(side) => DispatchDecision {
                action: DispatchAction::Submit {
                    side,
                    quantity: self.quantity,
                },
                reason: format!("{} trend", trend),
            },
            None => DispatchDecision {
                action: DispatchAction::Skip,
                reason: format!("{} policy holds on {} trend", self.policy.name(), trend),
            },
        }
    }

    /// Decide and, when warranted, submit exactly one order
    ///
    /// A failed submission comes back as `OrderExecution` (or `Timeout`) and
    /// is never retried.
    pub async fn dispatch(
        &self,
        exchange: &dyn Exchange,
        symbol: &str,
        trend: TrendState,
    ) -> Result<DispatchOutcome> {
        let decision = self.decide(symbol, trend);

        let (side, quantity) = match decision.action {
            DispatchAction::Skip => {
                tracing::info!(symbol = %symbol, "No trade: {}", decision.reason);
                return Ok(DispatchOutcome::Skipped {
                    reason: decision.reason,
                });
            }
            DispatchAction::Submit { side, quantity } => (side, quantity),
        };

        tracing::info!(
            symbol = %symbol,
            "Placing {} market order, quantity={}",
            side,
            quantity
        );

        let submission = exchange.submit_market_order(symbol, side, quantity);
        let order = match self.order_timeout {
            Some(limit) => timeout(limit, submission)
                .await
                .map_err(|_| BotError::Timeout {
                    symbol: symbol.to_string(),
                    operation: "order submission",
                    secs: limit.as_secs(),
                })??,
            None => submission.await?,
        };

        self.policy.record_fill(symbol, side);
        tracing::info!(
            symbol = %symbol,
            order_id = ?order.order_id,
            status = %order.status,
            "Order executed"
        );

        Ok(DispatchOutcome::Submitted(order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::policy::PositionTracking;

    #[test]
    fn test_observe_only_never_submits() {
        let dispatcher = TradeDispatcher::new(0.001, false);

        for trend in [TrendState::Bullish, TrendState::Bearish, TrendState::Sideways] {
            let decision = dispatcher.decide("BTCUSDT", trend);
            assert_eq!(decision.action, DispatchAction::Skip);
            assert!(decision.reason.contains("disabled"));
        }
    }

    #[test]
    fn test_bullish_buys_bearish_sells() {
        let dispatcher = TradeDispatcher::new(0.001, true);

        let decision = dispatcher.decide("BTCUSDT", TrendState::Bullish);
        assert_eq!(
            decision.action,
            DispatchAction::Submit {
                side: OrderSide::Buy,
                quantity: 0.001
            }
        );

        let decision = dispatcher.decide("BTCUSDT", TrendState::Bearish);
        assert_eq!(
            decision.action,
            DispatchAction::Submit {
                side: OrderSide::Sell,
                quantity: 0.001
            }
        );
    }

    #[test]
    fn test_sideways_skips() {
        let dispatcher = TradeDispatcher::new(0.001, true);
        let decision = dispatcher.decide("BTCUSDT", TrendState::Sideways);

        assert_eq!(decision.action, DispatchAction::Skip);
        assert!(decision.reason.contains("sideways"));
    }

    #[test]
    fn test_tracking_policy_holds() {
        let policy = Arc::new(PositionTracking::new());
        policy.record_fill("BTCUSDT", OrderSide::Buy);

        let dispatcher = TradeDispatcher::new(0.001, true).with_policy(policy);
        let decision = dispatcher.decide("BTCUSDT", TrendState::Bullish);

        assert_eq!(decision.action, DispatchAction::Skip);
        assert!(decision.reason.contains("track_position"));
    }
}
