//! Ticktape Runner: run configuration, metrics, feeds, artifacts, sweeps.
//!
//! This crate builds on `ticktape-core` to provide:
//! - TOML run configuration with validation and content-addressed run ids
//! - Performance metrics over equity curves and trade tapes
//! - CSV and synthetic tick feeds
//! - Single-run orchestration producing a serializable `BacktestResult`
//! - JSON/CSV/Markdown artifact export
//! - Parallel seed sweeps

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod sweep;

pub use config::{ConfigError, RunConfig, RunId};
pub use data_loader::{load_csv, parse_csv, synthetic_ticks, LoadError, LoadedFeed};
pub use metrics::{BarInterval, PerformanceMetrics};
pub use runner::{run_backtest, run_ticks, BacktestResult, RunError, SCHEMA_VERSION};
pub use sweep::{Distribution, SeedSweep, SweepResults};
