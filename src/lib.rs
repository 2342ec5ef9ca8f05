// Core modules
pub mod api;
pub mod bot;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod strategy;

// Re-export commonly used types
pub use api::{BinanceClient, Exchange};
pub use bot::{BotState, CycleReport, RunSummary, StopHandle, TrendBot};
pub use config::{BotConfig, Credentials, EntryPolicyKind};
pub use error::{BotError, Result};
pub use models::*;
pub use strategy::Strategy;
