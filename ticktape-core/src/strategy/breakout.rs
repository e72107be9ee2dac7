//! Breakout: close beyond the range of the prior `window` bars.
//!
//! BUY when the last price exceeds the highest of the previous `window`
//! prices, SELL when it falls below the lowest.

use super::{check_lookback, finite_prices, Signal, Strategy, StrategyError};
use crate::window::PriceWindow;

#[derive(Debug, Clone)]
pub struct Breakout {
    window: PriceWindow,
    lookback: usize,
}

impl Breakout {
    pub fn new(symbol: &str, lookback: usize, capacity: usize) -> Result<Self, StrategyError> {
        // lookback prior bars plus the current one
        check_lookback("breakout", lookback, 1, lookback + 1, capacity)?;
        Ok(Self {
            window: PriceWindow::new(symbol, capacity),
            lookback,
        })
    }

    /// (lowest, highest) of the prior `lookback` prices, excluding the last.
    pub fn channel(&self) -> Result<Option<(f64, f64)>, StrategyError> {
        let Some(prices) = finite_prices(&self.window, self.lookback + 1)? else {
            return Ok(None);
        };
        let prior = &prices[..self.lookback];
        let low = prior.iter().copied().fold(f64::INFINITY, f64::min);
        let high = prior.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(Some((low, high)))
    }
}

impl Strategy for Breakout {
    fn name(&self) -> &str {
        "breakout"
    }

    fn window(&self) -> &PriceWindow {
        &self.window
    }

    fn window_mut(&mut self) -> &mut PriceWindow {
        &mut self.window
    }

    fn compute_signal(&mut self) -> Result<Option<Signal>, StrategyError> {
        let Some((low, high)) = self.channel()? else {
            return Ok(None);
        };
        let Some(last) = self.window.last_price() else {
            return Ok(None);
        };
        if last > high {
            Ok(Some(Signal::Buy))
        } else if last < low {
            Ok(Some(Signal::Sell))
        } else {
            Ok(None)
        }
    }
}
