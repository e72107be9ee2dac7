//! Engine configuration, loop state and run output types.

use crate::domain::{EquitySnapshot, Order, Position, TradeRecord};
use crate::engine::error::BacktestError;
use crate::execution::MatchingConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Symbols that must be present on every tick and are marked for equity.
    pub symbols: Vec<String>,
    /// Shares per order.
    pub order_size: u64,
    pub initial_cash: f64,
    pub matching: MatchingConfig,
    /// Seed for the matching engine's cancellation draws.
    pub seed: u64,
    /// Skip a signal equal to the last one that produced a fill.
    pub suppress_repeated_signals: bool,
}

impl EngineConfig {
    pub fn new(symbols: Vec<String>, order_size: u64, initial_cash: f64) -> Self {
        Self {
            symbols,
            order_size,
            initial_cash,
            matching: MatchingConfig::frictionless(),
            seed: 0,
            suppress_repeated_signals: false,
        }
    }

    pub fn with_matching(mut self, matching: MatchingConfig) -> Self {
        self.matching = matching;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.symbols.is_empty() {
            return Err(BacktestError::NoSymbols);
        }
        if self.order_size == 0 || i64::try_from(self.order_size).is_err() {
            return Err(BacktestError::InvalidOrderSize);
        }
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(BacktestError::InvalidInitialCash(self.initial_cash));
        }
        self.matching.validate()?;
        Ok(())
    }
}

/// Loop state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Running,
    Done,
}

/// A strategy failure caught by the loop and treated as "no signal".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyFault {
    pub timestamp: DateTime<Utc>,
    pub strategy: String,
    pub symbol: String,
    pub message: String,
}

/// Everything a run produced, up to the last processed tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    /// One snapshot per processed tick.
    pub equity_curve: Vec<EquitySnapshot>,
    /// One record per applied fill.
    pub trades: Vec<TradeRecord>,
    /// Every order submitted, with its final status.
    pub orders: Vec<Order>,
    pub strategy_faults: Vec<StrategyFault>,
    pub initial_cash: f64,
    pub final_cash: f64,
    pub realized_pnl: f64,
    pub total_commission: f64,
    /// Positions for every symbol that traded, flat ones included.
    pub positions: Vec<Position>,
}

impl RunOutput {
    pub fn final_equity(&self) -> Option<f64> {
        self.equity_curve.last().map(|s| s.equity)
    }

    pub fn tick_count(&self) -> usize {
        self.equity_curve.len()
    }
}
