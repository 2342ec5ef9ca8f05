// Order dispatch and per-symbol processing
pub mod dispatcher;
pub mod policy;
pub mod worker;

pub use dispatcher::{DispatchAction, DispatchDecision, DispatchOutcome, TradeDispatcher};
pub use policy::{entry_policy_for, EntryPolicy, PositionState, PositionTracking, RefireEveryCycle};
pub use worker::{SymbolOutcome, SymbolWorker};
