use crate::execution::ConfigError;
use crate::ledger::LedgerError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Fatal errors for a backtest run.
///
/// Strategy failures are not listed here: they are recorded as faults and the
/// run continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("missing bar for '{symbol}' at {timestamp}")]
    MissingBar {
        timestamp: DateTime<Utc>,
        symbol: String,
    },
    #[error("invalid bar for '{symbol}' at {timestamp}: close={close}, volume={volume}")]
    InvalidBar {
        timestamp: DateTime<Utc>,
        symbol: String,
        close: f64,
        volume: f64,
    },
    #[error("tick at {current} does not follow previous tick at {previous}")]
    NonMonotonicTimestamp {
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
    #[error("no symbols to track")]
    NoSymbols,
    #[error("strategy symbol '{0}' is not tracked by this run")]
    UntrackedSymbol(String),
    #[error("order_size must be positive and at most i64::MAX")]
    InvalidOrderSize,
    #[error("initial_cash must be finite and positive, got {0}")]
    InvalidInitialCash(f64),
    #[error("matching config: {0}")]
    Matching(#[from] ConfigError),
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
}
