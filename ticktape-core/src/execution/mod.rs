//! Matching engine: turns a market order into a probabilistic fill outcome.
//!
//! Per call, in order:
//! 1. **Cancellation**: a uniform draw below `cancel_probability` cancels the order
//! 2. **Liquidity**: at most `floor(bar_volume * fill_rate)` shares are available
//! 3. **Slippage**: the execution price moves against the order by `slippage_bps`
//! 4. **Commission**: flat per-share charge on the filled quantity
//!
//! The engine holds no state between orders other than its configuration and
//! the injected random source.

pub mod liquidity;
pub mod slippage;

pub use liquidity::LiquidityConstraint;
pub use slippage::FixedSlippage;

use crate::domain::{Fill, Order, OrderStatus};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Invalid matching parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("fill_rate must be in (0, 1], got {0}")]
    FillRate(f64),
    #[error("cancel_probability must be in [0, 1], got {0}")]
    CancelProbability(f64),
    #[error("slippage_bps must be finite and in [0, 10000), got {0}")]
    Slippage(f64),
    #[error("commission_per_share must be finite and >= 0, got {0}")]
    Commission(f64),
}

/// Matching parameters fixed for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Fraction of bar volume available to one participant.
    pub fill_rate: f64,
    /// Probability that an order is rejected before it reaches the market.
    pub cancel_probability: f64,
    pub slippage_bps: f64,
    pub commission_per_share: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fill_rate: 1.0,
            cancel_probability: 0.0,
            slippage_bps: 0.0,
            commission_per_share: 0.0,
        }
    }
}

impl MatchingConfig {
    /// Frictionless: every order fills in full at the bar price, no costs.
    pub fn frictionless() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fill_rate > 0.0 && self.fill_rate <= 1.0) {
            return Err(ConfigError::FillRate(self.fill_rate));
        }
        if !(0.0..=1.0).contains(&self.cancel_probability) {
            return Err(ConfigError::CancelProbability(self.cancel_probability));
        }
        if !(self.slippage_bps.is_finite() && (0.0..10_000.0).contains(&self.slippage_bps)) {
            return Err(ConfigError::Slippage(self.slippage_bps));
        }
        if !(self.commission_per_share.is_finite() && self.commission_per_share >= 0.0) {
            return Err(ConfigError::Commission(self.commission_per_share));
        }
        Ok(())
    }
}

/// Stateless matcher over an injected random source.
#[derive(Debug, Clone)]
pub struct MatchingEngine<R = StdRng> {
    config: MatchingConfig,
    liquidity: LiquidityConstraint,
    slippage: FixedSlippage,
    rng: R,
}

impl MatchingEngine<StdRng> {
    /// Engine with a reproducible `StdRng` seeded from `seed`.
    pub fn seeded(config: MatchingConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::new(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> MatchingEngine<R> {
    pub fn new(config: MatchingConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            liquidity: LiquidityConstraint::new(config.fill_rate),
            slippage: FixedSlippage::new(config.slippage_bps),
            rng,
        })
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Match `order` against the current bar.
    ///
    /// Updates `order.status` in place and returns the fill, if any. Expects
    /// `order.quantity > 0`, `bar_price > 0` and `bar_volume >= 0`; the loop
    /// validates bars before they get here.
    pub fn execute(
        &mut self,
        order: &mut Order,
        bar_price: f64,
        bar_volume: f64,
        timestamp: DateTime<Utc>,
    ) -> Option<Fill> {
        debug_assert!(order.quantity > 0, "order quantity must be positive");
        debug_assert!(bar_price > 0.0, "bar price must be positive");

        // Draw unconditionally so the random stream does not depend on outcomes.
        let draw: f64 = self.rng.gen();
        if draw < self.config.cancel_probability {
            order.status = OrderStatus::Cancelled;
            debug!(order = %order.id, symbol = %order.symbol, "order cancelled");
            return None;
        }

        let filled = self.liquidity.limit_fill_qty(order.quantity, bar_volume);
        if filled == 0 {
            order.status = OrderStatus::Open;
            debug!(order = %order.id, symbol = %order.symbol, bar_volume, "no liquidity");
            return None;
        }

        let price = self.slippage.execution_price(order.side, bar_price);
        let partial = filled < order.quantity;
        order.status = if partial {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::Filled
        };
        let commission = self.config.commission_per_share * filled as f64;

        debug!(
            order = %order.id,
            symbol = %order.symbol,
            side = %order.side,
            filled,
            requested = order.quantity,
            price,
            "order filled"
        );

        Some(Fill {
            order_id: order.id,
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: filled,
            price,
            timestamp,
            partial,
            commission,
        })
    }
}
