use thiserror::Error;

/// Result type used across the library
pub type Result<T> = std::result::Result<T, BotError>;

/// Everything that can go wrong while evaluating or trading a symbol
///
/// Per-symbol variants (`DataFetch`, `InsufficientData`, `OrderExecution`,
/// `Timeout`, `Unexpected`) are contained by the symbol worker. Only `Config`
/// is fatal, and only at startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BotError {
    #[error("failed to fetch candles for {symbol}: {reason}")]
    DataFetch { symbol: String, reason: String },

    #[error("insufficient data for {symbol}: need at least {needed} candles, got {got}")]
    InsufficientData {
        symbol: String,
        needed: usize,
        got: usize,
    },

    #[error("order execution failed for {symbol}: {reason}")]
    OrderExecution { symbol: String, reason: String },

    #[error("{operation} for {symbol} timed out after {secs}s")]
    Timeout {
        symbol: String,
        operation: &'static str,
        secs: u64,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unexpected failure for {symbol}: {reason}")]
    Unexpected { symbol: String, reason: String },
}

impl BotError {
    pub fn data_fetch(symbol: &str, reason: impl ToString) -> Self {
        Self::DataFetch {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn order_execution(symbol: &str, reason: impl ToString) -> Self {
        Self::OrderExecution {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Symbol the failure belongs to, if any
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::DataFetch { symbol, .. }
            | Self::InsufficientData { symbol, .. }
            | Self::OrderExecution { symbol, .. }
            | Self::Timeout { symbol, .. }
            | Self::Unexpected { symbol, .. } => Some(symbol),
            Self::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_symbol_and_cause() {
        let err = BotError::data_fetch("BTCUSDT", "connection refused");
        assert_eq!(
            err.to_string(),
            "failed to fetch candles for BTCUSDT: connection refused"
        );
        assert_eq!(err.symbol(), Some("BTCUSDT"));

        let err = BotError::order_execution("ETHUSDT", "insufficient balance");
        assert!(err.to_string().contains("ETHUSDT"));
        assert!(err.to_string().contains("insufficient balance"));
    }

    #[test]
    fn test_config_error_has_no_symbol() {
        let err = BotError::Config("symbol list is empty".to_string());
        assert_eq!(err.symbol(), None);
        assert!(err.to_string().starts_with("invalid configuration"));
    }
}
