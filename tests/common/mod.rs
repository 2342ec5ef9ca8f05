// Shared test fixtures: an in-memory exchange with scriptable behavior
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::{sleep, Duration};
use trendbot::{BotConfig, BotError, Candle, CandleSeries, Exchange, OrderResult, OrderSide, Result};

pub fn rising_closes() -> Vec<f64> {
    (100..=121).map(|c| c as f64).collect()
}

pub fn falling_closes() -> Vec<f64> {
    (100..=121).rev().map(|c| c as f64).collect()
}

pub fn flat_closes() -> Vec<f64> {
    vec![100.0; 22]
}

pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            timestamp: base + ChronoDuration::hours(i as i64),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 1_000.0,
        })
        .collect()
}

pub fn test_config(symbols: &[&str]) -> BotConfig {
    BotConfig {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        quantity: 0.001,
        poll_interval_secs: 60,
        request_timeout_secs: 30,
        ..Default::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
}

/// Scriptable `Exchange` that records what the bot asked of it
#[derive(Default)]
pub struct MockExchange {
    closes: HashMap<String, Vec<f64>>,
    fetch_failures: HashSet<String>,
    order_failures: HashSet<String>,
    panics: HashSet<String>,
    fetch_delays: HashMap<String, Duration>,
    orders: Mutex<Vec<PlacedOrder>>,
    events: Mutex<Vec<String>>,
    fetches_started: AtomicUsize,
    fetches_finished: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_closes(mut self, symbol: &str, closes: Vec<f64>) -> Self {
        self.closes.insert(symbol.to_string(), closes);
        self
    }

    pub fn failing_fetch(mut self, symbol: &str) -> Self {
        self.fetch_failures.insert(symbol.to_string());
        self
    }

    pub fn failing_order(mut self, symbol: &str) -> Self {
        self.order_failures.insert(symbol.to_string());
        self
    }

    pub fn panicking(mut self, symbol: &str) -> Self {
        self.panics.insert(symbol.to_string());
        self
    }

    pub fn with_fetch_delay(mut self, symbol: &str, delay: Duration) -> Self {
        self.fetch_delays.insert(symbol.to_string(), delay);
        self
    }

    pub fn orders(&self) -> Vec<PlacedOrder> {
        self.orders.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn fetches_started(&self) -> usize {
        self.fetches_started.load(Ordering::SeqCst)
    }

    pub fn fetches_finished(&self) -> usize {
        self.fetches_finished.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn log(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        _limit: usize,
    ) -> Result<CandleSeries> {
        self.fetches_started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.log(format!("start:{}", symbol));

        if let Some(delay) = self.fetch_delays.get(symbol) {
            sleep(*delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.fetches_finished.fetch_add(1, Ordering::SeqCst);
        self.log(format!("end:{}", symbol));

        if self.panics.contains(symbol) {
            panic!("exchange exploded for {}", symbol);
        }
        if self.fetch_failures.contains(symbol) {
            return Err(BotError::data_fetch(symbol, "connection refused"));
        }

        let closes = self
            .closes
            .get(symbol)
            .cloned()
            .unwrap_or_else(flat_closes);
        CandleSeries::new(symbol, timeframe, candles_from_closes(&closes))
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> Result<OrderResult> {
        if self.order_failures.contains(symbol) {
            return Err(BotError::order_execution(symbol, "insufficient balance"));
        }

        self.orders.lock().unwrap().push(PlacedOrder {
            symbol: symbol.to_string(),
            side,
            quantity,
        });

        let n = self.orders.lock().unwrap().len() as u64;
        Ok(OrderResult {
            symbol: symbol.to_string(),
            side,
            quantity,
            client_order_id: format!("mock-{}", n),
            order_id: Some(n),
            status: "FILLED".to_string(),
            executed_qty: quantity,
            transact_time: Some(Utc::now()),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
