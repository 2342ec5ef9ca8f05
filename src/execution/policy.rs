use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::EntryPolicyKind;
use crate::models::{OrderSide, TrendState};

/// Decides whether a directional reading turns into an order
///
/// Consulted by the dispatcher once per symbol per cycle. `record_fill` is
/// only called after the exchange accepted the order.
pub trait EntryPolicy: Send + Sync {
    fn decide(&self, symbol: &str, trend: TrendState) -> Option<OrderSide>;

    fn record_fill(&self, _symbol: &str, _side: OrderSide) {}

    fn name(&self) -> &str;
}

/// Submit on every bullish or bearish reading, every cycle
#[derive(Debug, Clone, Copy, Default)]
pub struct RefireEveryCycle;

impl EntryPolicy for RefireEveryCycle {
    fn decide(&self, _symbol: &str, trend: TrendState) -> Option<OrderSide> {
        trend.order_side()
    }

    fn name(&self) -> &str {
        "refire"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Long,
}

/// Flat/long state machine per symbol
///
/// Buys only when flat and bullish, sells only when long and bearish.
/// Every symbol starts flat; holdings that existed before the run are not
/// looked up.
#[derive(Debug, Default)]
pub struct PositionTracking {
    positions: Mutex<HashMap<String, PositionState>>,
}

impl PositionTracking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self, symbol: &str) -> PositionState {
        let positions = self.positions.lock().unwrap_or_else(|e| e.into_inner());
        positions.get(symbol).copied().unwrap_or_default()
    }
}

impl EntryPolicy for PositionTracking {
    fn decide(&self, symbol: &str, trend: TrendState) -> Option<OrderSide> {
        match (self.position(symbol), trend) {
            (PositionState::Flat, TrendState::Bullish) => Some(OrderSide::Buy),
            (PositionState::Long, TrendState::Bearish) => Some(OrderSide::Sell),
            _ => None,
        }
    }

    fn record_fill(&self, symbol: &str, side: OrderSide) {
        let next = match side {
            OrderSide::Buy => PositionState::Long,
            OrderSide::Sell => PositionState::Flat,
        };
        let mut positions = self.positions.lock().unwrap_or_else(|e| e.into_inner());
        positions.insert(symbol.to_string(), next);
    }

    fn name(&self) -> &str {
        "track_position"
    }
}

/// Build the policy selected in configuration
pub fn entry_policy_for(kind: EntryPolicyKind) -> Arc<dyn EntryPolicy> {
    match kind {
        EntryPolicyKind::Refire => Arc::new(RefireEveryCycle),
        EntryPolicyKind::TrackPosition => Arc::new(PositionTracking::new()),
    }
}
