use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, Duration, Instant};

use crate::api::Exchange;
use crate::config::BotConfig;
use crate::error::Result;
use crate::execution::{entry_policy_for, EntryPolicy, SymbolOutcome, SymbolWorker, TradeDispatcher};
use crate::strategy::{Strategy, TrendStrategy};

/// Orchestrator lifecycle; `Stopping` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    Running,
    Stopping,
}

/// Cloneable handle that asks the bot to stop
///
/// The request is observed at the next cycle boundary; a cycle in flight
/// always finishes every symbol first.
#[derive(Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Set the stopping flag; calling it again is a no-op
    pub fn stop(&self) {
        let changed = self.tx.send_if_modified(|stopping| {
            if *stopping {
                false
            } else {
                *stopping = true;
                true
            }
        });
        if changed {
            tracing::info!("Stop requested, finishing current cycle");
        }
    }

    pub fn is_stopping(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Result of one fan-out/fan-in pass over every symbol
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    /// One entry per configured symbol, in configured order
    pub outcomes: Vec<(String, SymbolOutcome)>,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn outcome(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, outcome)| outcome)
    }

    pub fn trades(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, SymbolOutcome::Traded { .. }))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failure()).count()
    }

    pub fn successes(&self) -> usize {
        self.outcomes.len() - self.failures()
    }
}

/// Totals across a whole run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub cycles: u64,
    pub evaluations: u64,
    pub trades: u64,
    pub failures: u64,
}

impl RunSummary {
    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.evaluations += report.successes() as u64;
        self.trades += report.trades() as u64;
        self.failures += report.failures() as u64;
    }
}

/// Multi-symbol trend bot
///
/// Each cycle evaluates every symbol concurrently on the current task, waits
/// for all of them, then sleeps for the polling interval.
pub struct TrendBot {
    config: BotConfig,
    worker: SymbolWorker,
    exchange_name: String,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
}

impl TrendBot {
    /// Validates the configuration; an unusable config is the only fatal error
    pub fn new(config: BotConfig, exchange: Arc<dyn Exchange>) -> Result<Self> {
        let policy = entry_policy_for(config.entry_policy);
        Self::with_components(config, exchange, Arc::new(TrendStrategy::default()), policy)
    }

    pub fn with_components(
        config: BotConfig,
        exchange: Arc<dyn Exchange>,
        strategy: Arc<dyn Strategy>,
        policy: Arc<dyn EntryPolicy>,
    ) -> Result<Self> {
        config.validate()?;

        let dispatcher = TradeDispatcher::new(config.quantity, config.live)
            .with_policy(policy)
            .with_order_timeout(config.request_timeout());
        let exchange_name = exchange.name().to_string();
        let worker = SymbolWorker::new(
            exchange,
            strategy,
            dispatcher,
            config.timeframe.clone(),
            config.candle_limit,
        )
        .with_fetch_timeout(config.fetch_budget());

        let (stop_tx, stop_rx) = watch::channel(false);

        Ok(Self {
            config,
            worker,
            exchange_name,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
        })
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: self.stop_tx.clone(),
        }
    }

    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    pub fn state(&self) -> BotState {
        if *self.stop_rx.borrow() {
            BotState::Stopping
        } else {
            BotState::Running
        }
    }

    /// Evaluate every symbol once, concurrently, and wait for all of them
    pub async fn run_cycle(&self, cycle: u64) -> CycleReport {
        let started = Instant::now();

        let tasks = self
            .config
            .symbols
            .iter()
            .map(|symbol| self.worker.run(symbol));
        let results = join_all(tasks).await;

        let outcomes: Vec<(String, SymbolOutcome)> = self
            .config
            .symbols
            .iter()
            .cloned()
            .zip(results)
            .collect();

        let report = CycleReport {
            cycle,
            outcomes,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            "Cycle {} complete: {} evaluated, {} traded, {} failed in {:?}",
            report.cycle,
            report.successes(),
            report.trades(),
            report.failures(),
            report.elapsed
        );

        report
    }

    /// Poll loop; returns once a stop request is observed at a cycle boundary
    pub async fn start(&self) -> RunSummary {
        let mut stop_rx = self.stop_rx.clone();
        let mut summary = RunSummary::default();
        let interval = self.config.poll_interval();

        tracing::info!(
            "TrendBot starting on {} for symbols: {:?} (timeframe={}, live={}, policy={:?})",
            self.exchange_name,
            self.config.symbols,
            self.config.timeframe,
            self.config.live,
            self.config.entry_policy
        );

        let mut cycle = 0u64;
        while self.state() == BotState::Running {
            cycle += 1;
            let report = self.run_cycle(cycle).await;
            summary.record(&report);

            if self.state() == BotState::Stopping {
                break;
            }

            tracing::debug!("Sleeping for {}s...", interval.as_secs());
            tokio::select! {
                _ = sleep(interval) => {}
                _ = stop_rx.wait_for(|stopping| *stopping) => {}
            }
        }

        tracing::info!(
            "TrendBot stopped after {} cycles ({} trades, {} failures)",
            summary.cycles,
            summary.trades,
            summary.failures
        );

        summary
    }
}
