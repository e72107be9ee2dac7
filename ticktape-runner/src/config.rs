//! Serializable run configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! symbols = ["AAPL", "MSFT"]
//! trade_symbol = "MSFT"
//! order_size = 50
//! bar_interval = "60m"
//!
//! [strategy]
//! type = "mean_reversion"
//! window = 20
//! z_threshold = 1.5
//! ```

use crate::metrics::{BarInterval, IntervalError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use ticktape_core::engine::EngineConfig;
use ticktape_core::execution::{self, MatchingConfig};
use ticktape_core::strategy::{StrategyConfig, StrategyError};
use ticktape_core::window::DEFAULT_CAPACITY;

/// Content-addressable identifier of a configuration (hex BLAKE3 digest).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("at least one symbol is required")]
    NoSymbols,
    #[error("duplicate symbol '{0}'")]
    DuplicateSymbol(String),
    #[error("trade symbol '{0}' is not in symbols")]
    UnknownTradeSymbol(String),
    #[error("order_size must be positive and at most i64::MAX")]
    OrderSize,
    #[error("initial_cash must be finite and positive, got {0}")]
    InitialCash(f64),
    #[error("window_capacity must be positive")]
    WindowCapacity,
    #[error(transparent)]
    Interval(#[from] IntervalError),
    #[error(transparent)]
    Matching(#[from] execution::ConfigError),
    #[error(transparent)]
    Strategy(#[from] StrategyError),
}

/// Everything needed to reproduce a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Symbols every tick must carry; all are marked for equity.
    pub symbols: Vec<String>,
    /// Symbol the strategy trades. Defaults to the first of `symbols`.
    pub trade_symbol: Option<String>,
    pub strategy: StrategyConfig,

    // ── Matching ──
    pub fill_rate: f64,
    pub cancel_probability: f64,
    pub slippage_bps: f64,
    pub commission_per_share: f64,

    // ── Sizing and accounting ──
    pub order_size: u64,
    pub initial_cash: f64,

    pub bar_interval: String,
    pub seed: u64,
    pub window_capacity: usize,
    pub suppress_repeated_signals: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["AAPL".to_string()],
            trade_symbol: None,
            strategy: StrategyConfig::default(),
            fill_rate: 1.0,
            cancel_probability: 0.0,
            slippage_bps: 0.0,
            commission_per_share: 0.0,
            order_size: 100,
            initial_cash: 100_000.0,
            bar_interval: "1d".to_string(),
            seed: 42,
            window_capacity: DEFAULT_CAPACITY,
            suppress_repeated_signals: false,
        }
    }
}

impl RunConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        let mut seen = BTreeSet::new();
        for symbol in &self.symbols {
            if !seen.insert(symbol.as_str()) {
                return Err(ConfigError::DuplicateSymbol(symbol.clone()));
            }
        }
        if let Some(trade) = &self.trade_symbol {
            if !seen.contains(trade.as_str()) {
                return Err(ConfigError::UnknownTradeSymbol(trade.clone()));
            }
        }
        if self.order_size == 0 || i64::try_from(self.order_size).is_err() {
            return Err(ConfigError::OrderSize);
        }
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(ConfigError::InitialCash(self.initial_cash));
        }
        if self.window_capacity == 0 {
            return Err(ConfigError::WindowCapacity);
        }
        self.interval()?;
        self.matching_config().validate()?;
        self.strategy.build(self.trade_symbol(), self.window_capacity)?;
        Ok(())
    }

    /// Symbol the strategy trades.
    pub fn trade_symbol(&self) -> &str {
        self.trade_symbol
            .as_deref()
            .or_else(|| self.symbols.first().map(String::as_str))
            .unwrap_or_default()
    }

    pub fn interval(&self) -> Result<BarInterval, IntervalError> {
        self.bar_interval.parse()
    }

    pub fn matching_config(&self) -> MatchingConfig {
        MatchingConfig {
            fill_rate: self.fill_rate,
            cancel_probability: self.cancel_probability,
            slippage_bps: self.slippage_bps,
            commission_per_share: self.commission_per_share,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            symbols: self.symbols.clone(),
            order_size: self.order_size,
            initial_cash: self.initial_cash,
            matching: self.matching_config(),
            seed: self.seed,
            suppress_repeated_signals: self.suppress_repeated_signals,
        }
    }

    /// Deterministic hash of the configuration.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> RunId {
        let bytes = serde_json::to_vec(self).unwrap_or_else(|_| format!("{self:?}").into_bytes());
        blake3::hash(&bytes).to_hex().to_string()
    }
}
