//! Backtest runner: wires together config, strategy, loop and metrics.
//!
//! Two entry points:
//! - `run_backtest()`: runs on a loaded feed and records its provenance. Used by CLI.
//! - `run_ticks()`: runs on any tick iterator, no provenance. Used by sweeps and tests.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use ticktape_core::domain::{EquitySnapshot, Order, Position, Tick, TradeRecord};
use ticktape_core::engine::{BacktestError, BacktestLoop, RunOutput, StrategyFault};

use crate::config::{ConfigError, RunConfig, RunId};
use crate::data_loader::LoadedFeed;
use crate::metrics::{BarInterval, PerformanceMetrics};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("backtest setup failed: {0}")]
    Setup(#[from] BacktestError),
    /// The feed was rejected mid-run. `partial` holds everything up to the
    /// last good tick.
    #[error("backtest halted: {error}")]
    Halted {
        error: BacktestError,
        partial: Box<BacktestResult>,
    },
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: RunConfig,
    /// False when the run halted on a bad tick.
    pub completed: bool,
    pub dataset_hash: Option<String>,
    pub synthetic: bool,
    pub metrics: PerformanceMetrics,
    pub equity_curve: Vec<EquitySnapshot>,
    pub trades: Vec<TradeRecord>,
    pub orders: Vec<Order>,
    pub strategy_faults: Vec<StrategyFault>,
    pub initial_cash: f64,
    pub final_cash: f64,
    pub positions: Vec<Position>,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    fn from_output(
        config: &RunConfig,
        interval: BarInterval,
        output: RunOutput,
        completed: bool,
    ) -> Self {
        let metrics = PerformanceMetrics::compute(
            &output.equity_curve,
            &output.trades,
            interval,
            output.realized_pnl,
            output.total_commission,
        );
        Self {
            schema_version: SCHEMA_VERSION,
            run_id: config.run_id(),
            config: config.clone(),
            completed,
            dataset_hash: None,
            synthetic: false,
            metrics,
            equity_curve: output.equity_curve,
            trades: output.trades,
            orders: output.orders,
            strategy_faults: output.strategy_faults,
            initial_cash: output.initial_cash,
            final_cash: output.final_cash,
            positions: output.positions,
        }
    }

    pub fn final_equity(&self) -> Option<f64> {
        self.equity_curve.last().map(|s| s.equity)
    }

    /// Symbols with a non-flat position at the end of the run.
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| !p.is_flat())
    }
}

/// Run a backtest on a loaded feed.
pub fn run_backtest(config: &RunConfig, feed: &LoadedFeed) -> Result<BacktestResult, RunError> {
    let tag = |mut result: BacktestResult| {
        result.dataset_hash = Some(feed.dataset_hash.clone());
        result.synthetic = feed.synthetic;
        result
    };
    match run_ticks(config, feed.ticks.iter().cloned()) {
        Ok(result) => Ok(tag(result)),
        Err(RunError::Halted { error, partial }) => Err(RunError::Halted {
            error,
            partial: Box::new(tag(*partial)),
        }),
        Err(e) => Err(e),
    }
}

/// Run a backtest on any tick iterator, without I/O.
pub fn run_ticks<F>(config: &RunConfig, ticks: F) -> Result<BacktestResult, RunError>
where
    F: IntoIterator<Item = Tick>,
{
    config.validate()?;
    let interval = config.interval().map_err(ConfigError::from)?;
    let strategy = config
        .strategy
        .build(config.trade_symbol(), config.window_capacity)
        .map_err(ConfigError::from)?;

    info!(
        run_id = %config.run_id(),
        strategy = config.strategy.name(),
        symbol = config.trade_symbol(),
        seed = config.seed,
        "starting backtest"
    );

    let mut bt = BacktestLoop::new(config.engine_config(), ticks, strategy)?;
    match bt.run_to_end() {
        Ok(()) => Ok(BacktestResult::from_output(config, interval, bt.into_output(), true)),
        Err(error) => {
            let partial = BacktestResult::from_output(config, interval, bt.into_output(), false);
            Err(RunError::Halted {
                error,
                partial: Box::new(partial),
            })
        }
    }
}
