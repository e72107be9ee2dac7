//! Slippage: adverse price adjustment simulating market impact.
//!
//! Buys pay more, sells receive less. The adjustment is a fixed number of
//! basis points of the bar price.

use crate::domain::OrderSide;

/// Fixed slippage in basis points (e.g., 5 = 0.05%).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedSlippage {
    pub bps: f64,
}

impl FixedSlippage {
    pub fn new(bps: f64) -> Self {
        Self { bps }
    }

    /// Execution price for `side` given the bar price.
    ///
    /// `bar_price * (1 + sign * bps / 10_000)` with sign +1 for buys and -1
    /// for sells. Positive for any positive bar price while `bps < 10_000`.
    pub fn execution_price(&self, side: OrderSide, bar_price: f64) -> f64 {
        let sign = side.sign() as f64;
        bar_price * (1.0 + sign * self.bps / 10_000.0)
    }
}
