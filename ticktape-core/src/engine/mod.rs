//! Backtest loop: feeds ticks to a strategy, matches its orders and keeps
//! the ledger and equity curve.
//!
//! Per tick: validate, observe, signal, execute, mark. See [`loop_runner`].

pub mod error;
pub mod loop_runner;
pub mod state;

pub use error::BacktestError;
pub use loop_runner::{run_backtest, BacktestLoop};
pub use state::{EngineConfig, LoopState, RunOutput, StrategyFault};
