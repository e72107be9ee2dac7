//! Mean reversion: z-score of the last price against the window.
//!
//! z = (last - mean) / std over the most recent `window` prices.
//! BUY when z < -threshold, SELL when z > threshold. A flat window (std = 0)
//! produces no signal.

use super::{check_lookback, finite_prices, Signal, Strategy, StrategyError};
use crate::window::{mean, population_std, PriceWindow};

#[derive(Debug, Clone)]
pub struct MeanReversion {
    window: PriceWindow,
    lookback: usize,
    z_threshold: f64,
}

impl MeanReversion {
    pub fn new(
        symbol: &str,
        lookback: usize,
        z_threshold: f64,
        capacity: usize,
    ) -> Result<Self, StrategyError> {
        check_lookback("mean_reversion", lookback, 2, lookback, capacity)?;
        if !(z_threshold.is_finite() && z_threshold >= 0.0) {
            return Err(StrategyError::InvalidParameter(format!(
                "z_threshold must be finite and >= 0, got {z_threshold}"
            )));
        }
        Ok(Self {
            window: PriceWindow::new(symbol, capacity),
            lookback,
            z_threshold,
        })
    }

    /// Current z-score, if enough history is available and the window is not flat.
    pub fn z_score(&self) -> Result<Option<f64>, StrategyError> {
        let Some(prices) = finite_prices(&self.window, self.lookback)? else {
            return Ok(None);
        };
        let std = population_std(&prices);
        if std == 0.0 {
            return Ok(None);
        }
        let last = prices[prices.len() - 1];
        Ok(Some((last - mean(&prices)) / std))
    }
}

impl Strategy for MeanReversion {
    fn name(&self) -> &str {
        "mean_reversion"
    }

    fn window(&self) -> &PriceWindow {
        &self.window
    }

    fn window_mut(&mut self) -> &mut PriceWindow {
        &mut self.window
    }

    fn compute_signal(&mut self) -> Result<Option<Signal>, StrategyError> {
        let Some(z) = self.z_score()? else {
            return Ok(None);
        };
        if z < -self.z_threshold {
            Ok(Some(Signal::Buy))
        } else if z > self.z_threshold {
            Ok(Some(Signal::Sell))
        } else {
            Ok(None)
        }
    }
}
