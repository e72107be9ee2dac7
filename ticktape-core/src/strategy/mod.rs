//! Strategies: turn a rolling price window into BUY/SELL/no-signal.
//!
//! A strategy is bound to one symbol and owns its own [`PriceWindow`]. The
//! backtest loop pushes each bar into the window with [`Strategy::update`]
//! before asking for a signal, so `compute_signal` only ever sees data up to
//! and including the current bar.

pub mod autoregressive;
pub mod breakout;
pub mod cycle;
pub mod mean_reversion;

pub use autoregressive::Autoregressive;
pub use breakout::Breakout;
pub use cycle::Cycle;
pub use mean_reversion::MeanReversion;

use crate::domain::OrderSide;
use crate::window::PriceWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Directional output of a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
}

impl Signal {
    pub fn side(self) -> OrderSide {
        match self {
            Signal::Buy => OrderSide::Buy,
            Signal::Sell => OrderSide::Sell,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
        }
    }
}

/// Failure inside a strategy's signal computation.
///
/// The loop logs these and treats them as "no signal" for the tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("non-finite value in price window for '{symbol}'")]
    NonFinite { symbol: String },
    #[error("numerical failure: {0}")]
    Numerical(String),
    #[error("invalid strategy parameter: {0}")]
    InvalidParameter(String),
}

/// Trait for signal-producing strategies.
///
/// Implementations must not read anything but their own window; portfolio
/// state is never visible to a strategy.
pub trait Strategy: Send + Sync {
    /// Human-readable name (e.g., "mean_reversion").
    fn name(&self) -> &str;

    fn window(&self) -> &PriceWindow;

    fn window_mut(&mut self) -> &mut PriceWindow;

    /// Symbol this strategy trades.
    fn symbol(&self) -> &str {
        self.window().symbol()
    }

    /// Record the current bar's close and volume.
    fn update(&mut self, timestamp: DateTime<Utc>, price: f64, volume: f64) {
        self.window_mut().push(timestamp, price, volume);
    }

    /// Signal for the most recent observation, if any.
    fn compute_signal(&mut self) -> Result<Option<Signal>, StrategyError>;
}

/// Serializable strategy selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Z-score of the last price against the window mean.
    MeanReversion { window: usize, z_threshold: f64 },
    /// AR(1) one-step forecast compared with the last price.
    Autoregressive { window: usize, threshold: f64 },
    /// Close beyond the prior window's high or low.
    Breakout { window: usize },
    /// BUY, SELL, none, repeating.
    Cycle,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::MeanReversion {
            window: 20,
            z_threshold: 1.0,
        }
    }
}

impl StrategyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::MeanReversion { .. } => "mean_reversion",
            StrategyConfig::Autoregressive { .. } => "autoregressive",
            StrategyConfig::Breakout { .. } => "breakout",
            StrategyConfig::Cycle => "cycle",
        }
    }

    /// Build a strategy for `symbol` whose window retains `capacity` observations.
    pub fn build(
        &self,
        symbol: &str,
        capacity: usize,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        let strategy: Box<dyn Strategy> = match *self {
            StrategyConfig::MeanReversion {
                window,
                z_threshold,
            } => Box::new(MeanReversion::new(symbol, window, z_threshold, capacity)?),
            StrategyConfig::Autoregressive { window, threshold } => {
                Box::new(Autoregressive::new(symbol, window, threshold, capacity)?)
            }
            StrategyConfig::Breakout { window } => {
                Box::new(Breakout::new(symbol, window, capacity)?)
            }
            StrategyConfig::Cycle => Box::new(Cycle::new(symbol, capacity)),
        };
        Ok(strategy)
    }
}

/// Shared lookback check: the window must be able to hold `needed` prices.
pub(crate) fn check_lookback(
    name: &str,
    lookback: usize,
    min: usize,
    needed: usize,
    capacity: usize,
) -> Result<(), StrategyError> {
    if lookback < min {
        return Err(StrategyError::InvalidParameter(format!(
            "{name} window must be >= {min}, got {lookback}"
        )));
    }
    if needed > capacity {
        return Err(StrategyError::InvalidParameter(format!(
            "{name} needs {needed} observations but window capacity is {capacity}"
        )));
    }
    Ok(())
}

/// Most recent `n` prices, rejecting non-finite values.
pub(crate) fn finite_prices(
    window: &PriceWindow,
    n: usize,
) -> Result<Option<Vec<f64>>, StrategyError> {
    match window.prices(n) {
        None => Ok(None),
        Some(prices) if prices.iter().all(|p| p.is_finite()) => Ok(Some(prices)),
        Some(_) => Err(StrategyError::NonFinite {
            symbol: window.symbol().to_string(),
        }),
    }
}
