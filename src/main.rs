use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use trendbot::config::{normalize_symbols, TESTNET_BASE_URL};
use trendbot::{BinanceClient, BotConfig, Credentials, EntryPolicyKind, StopHandle, TrendBot};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Order on every bullish/bearish reading
    Refire,
    /// Order only when the reading flips flat/long
    TrackPosition,
}

impl From<PolicyArg> for EntryPolicyKind {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Refire => EntryPolicyKind::Refire,
            PolicyArg::TrackPosition => EntryPolicyKind::TrackPosition,
        }
    }
}

/// Trend-based trading bot for Binance
#[derive(Debug, Parser)]
#[command(name = "trendbot", version, about)]
struct Cli {
    /// TOML config file (TRENDBOT_* environment variables override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated list of symbols to trade, e.g. BTC/USDT,ETH/USDT
    #[arg(long, value_delimiter = ',')]
    symbols: Option<Vec<String>>,

    /// Candle timeframe
    #[arg(long)]
    timeframe: Option<String>,

    /// Order quantity per trade
    #[arg(long)]
    amount: Option<f64>,

    /// Polling interval in seconds
    #[arg(long)]
    interval: Option<u64>,

    /// Candles fetched per symbol each cycle
    #[arg(long)]
    limit: Option<usize>,

    /// Enable live trading (orders are only logged otherwise)
    #[arg(long)]
    live: bool,

    /// Send orders to the validate-only endpoint
    #[arg(long)]
    test_orders: bool,

    /// Use the Binance spot testnet
    #[arg(long)]
    testnet: bool,

    #[arg(long, value_enum)]
    entry_policy: Option<PolicyArg>,

    /// Binance API key (falls back to BINANCE_API_KEY)
    #[arg(long)]
    apikey: Option<String>,

    /// Binance API secret (falls back to BINANCE_SECRET_KEY)
    #[arg(long)]
    secret: Option<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();

    let config = build_config(&cli)?;
    let credentials = resolve_credentials(&cli);
    config.validate()?;
    config.check_credentials(credentials.as_ref())?;

    tracing::info!("🚀 TrendBot starting");
    tracing::info!("  Symbols: {}", config.symbols.join(", "));
    tracing::info!("  Timeframe: {}", config.timeframe);
    tracing::info!("  Quantity: {}", config.quantity);
    tracing::info!("  Interval: {}s", config.poll_interval_secs);
    tracing::info!(
        "  Mode: {}",
        if !config.live {
            "observe only"
        } else if config.test_orders {
            "live (test orders)"
        } else {
            "LIVE"
        }
    );

    let client = BinanceClient::new(&config, credentials).context("Failed to create Binance client")?;
    match client.ping().await {
        Ok(()) => tracing::info!("Connected to {}", client.base_url()),
        Err(e) => tracing::warn!("Connectivity check failed ({}), continuing anyway", e),
    }

    let bot = TrendBot::new(config, Arc::new(client))?;

    if cli.once {
        let report = bot.run_cycle(1).await;
        for (symbol, outcome) in &report.outcomes {
            tracing::info!("  {}: {:?}", symbol, outcome);
        }
        return Ok(());
    }

    let stop = bot.stop_handle();
    tokio::spawn(async move {
        shutdown_signal(stop).await;
    });

    let summary = bot.start().await;
    tracing::info!(
        "👋 TrendBot stopped ({} cycles, {} trades, {} failures)",
        summary.cycles,
        summary.trades,
        summary.failures
    );

    Ok(())
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trendbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_config(cli: &Cli) -> anyhow::Result<BotConfig> {
    let mut config =
        BotConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(symbols) = &cli.symbols {
        config.symbols = normalize_symbols(symbols);
    }
    if let Some(timeframe) = &cli.timeframe {
        config.timeframe = timeframe.clone();
    }
    if let Some(amount) = cli.amount {
        config.quantity = amount;
    }
    if let Some(interval) = cli.interval {
        config.poll_interval_secs = interval;
    }
    if let Some(limit) = cli.limit {
        config.candle_limit = limit;
    }
    if let Some(policy) = cli.entry_policy {
        config.entry_policy = policy.into();
    }
    if cli.live {
        config.live = true;
    }
    if cli.test_orders {
        config.test_orders = true;
    }
    if cli.testnet {
        config.base_url = TESTNET_BASE_URL.to_string();
    }

    Ok(config)
}

fn resolve_credentials(cli: &Cli) -> Option<Credentials> {
    match (&cli.apikey, &cli.secret) {
        (Some(key), Some(secret)) => Credentials::new(key.as_str(), secret.as_str()),
        _ => Credentials::from_env(),
    }
}

/// Wait for Ctrl+C or SIGTERM, then ask the bot to stop
async fn shutdown_signal(stop: StopHandle) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("⚠️  Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("⚠️  Received SIGTERM, shutting down..."),
    }

    stop.stop();
}
