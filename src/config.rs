use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::api::{exchange_symbol, RetryPolicy};
use crate::error::{BotError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";
pub const TESTNET_BASE_URL: &str = "https://testnet.binance.vision";

/// Fewest candles a fetch may request: one more than the longest lookback (21)
pub const MIN_CANDLE_LIMIT: usize = 22;

/// Most candles a single klines request returns
pub const MAX_CANDLE_LIMIT: usize = 1000;

/// Kline intervals the exchange accepts
pub const VALID_TIMEFRAMES: &[&str] = &[
    "1s", "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w",
    "1M",
];

/// How the dispatcher decides whether a directional reading becomes an order
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryPolicyKind {
    /// Submit on every bullish/bearish reading
    #[default]
    Refire,
    /// Submit only when the reading flips the tracked flat/long state
    TrackPosition,
}

/// Run configuration, immutable once the bot starts
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    pub symbols: Vec<String>,
    pub timeframe: String,
    pub quantity: f64,
    pub poll_interval_secs: u64,
    pub live: bool,
    pub candle_limit: usize,
    pub entry_policy: EntryPolicyKind,
    pub request_timeout_secs: u64,
    pub fetch_retries: u32,
    pub base_url: String,
    pub test_orders: bool,
    pub requests_per_second: u32,
    pub recv_window_ms: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()],
            timeframe: "1h".to_string(),
            quantity: 0.001,
            poll_interval_secs: 3600,
            live: false,
            candle_limit: 100,
            entry_policy: EntryPolicyKind::Refire,
            request_timeout_secs: 30,
            fetch_retries: 3,
            base_url: DEFAULT_BASE_URL.to_string(),
            test_orders: false,
            requests_per_second: 10,
            recv_window_ms: 5000,
        }
    }
}

/// Exchange API credentials
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

// Keep the secret out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}

impl Credentials {
    /// Read `BINANCE_API_KEY` / `BINANCE_SECRET_KEY`; both must be set and non-empty
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("BINANCE_API_KEY").ok()?;
        let api_secret = std::env::var("BINANCE_SECRET_KEY").ok()?;
        Self::new(api_key, api_secret)
    }

    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Option<Self> {
        let api_key = api_key.into().trim().to_string();
        let api_secret = api_secret.into().trim().to_string();
        if api_key.is_empty() || api_secret.is_empty() {
            return None;
        }
        Some(Self {
            api_key,
            api_secret,
        })
    }
}

impl BotConfig {
    /// Layered load: defaults, optional TOML file, then `TRENDBOT_*` environment
    pub fn load(path: Option<&Path>) -> std::result::Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("TRENDBOT")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("symbols"),
            )
            .build()?;

        let mut config: BotConfig = settings.try_deserialize()?;
        config.symbols = normalize_symbols(&config.symbols);
        Ok(config)
    }

    /// Startup checks; any failure here is fatal for the run
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(BotError::Config("symbol list is empty".to_string()));
        }
        let mut markets: HashMap<String, &str> = HashMap::new();
        for symbol in &self.symbols {
            if let Some(first) = markets.insert(exchange_symbol(symbol), symbol.as_str()) {
                return Err(BotError::Config(format!(
                    "symbols '{}' and '{}' name the same market",
                    first, symbol
                )));
            }
        }
        if !(self.quantity.is_finite() && self.quantity > 0.0) {
            return Err(BotError::Config(format!(
                "trade quantity must be positive, got {}",
                self.quantity
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(BotError::Config(
                "polling interval must be at least 1 second".to_string(),
            ));
        }
        if !VALID_TIMEFRAMES.contains(&self.timeframe.as_str()) {
            return Err(BotError::Config(format!(
                "unknown timeframe '{}' (expected one of {})",
                self.timeframe,
                VALID_TIMEFRAMES.join(", ")
            )));
        }
        if !(MIN_CANDLE_LIMIT..=MAX_CANDLE_LIMIT).contains(&self.candle_limit) {
            return Err(BotError::Config(format!(
                "candle limit must be between {} and {}, got {}",
                MIN_CANDLE_LIMIT, MAX_CANDLE_LIMIT, self.candle_limit
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(BotError::Config(
                "request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.fetch_retries == 0 {
            return Err(BotError::Config(
                "fetch retries must allow at least one attempt".to_string(),
            ));
        }
        if self.requests_per_second == 0 {
            return Err(BotError::Config(
                "requests per second must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Live trading cannot start without credentials
    pub fn check_credentials(&self, credentials: Option<&Credentials>) -> Result<()> {
        if self.live && credentials.is_none() {
            return Err(BotError::Config(
                "live trading requires BINANCE_API_KEY and BINANCE_SECRET_KEY".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry schedule for candle fetches
    pub fn fetch_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_attempts(self.fetch_retries)
    }

    /// Time a whole fetch may take, every retry and backoff included
    pub fn fetch_budget(&self) -> Duration {
        self.fetch_retry_policy().budget(self.request_timeout())
    }
}

/// Trim, upper-case and de-duplicate symbols, keeping first-seen order
///
/// Spellings of the same market (`BTC/USDT`, `BTCUSDT`) count as duplicates.
pub fn normalize_symbols<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .flat_map(|s| s.as_ref().split(','))
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(exchange_symbol(s)))
        .collect()
}
