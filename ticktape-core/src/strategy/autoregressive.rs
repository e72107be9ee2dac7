//! Autoregressive: least-squares AR(1) fit over the window.
//!
//! Fits `p[t] = a + b * p[t-1]` on the most recent `window` prices and
//! forecasts the next price. BUY when the forecast is more than `threshold`
//! (relative) above the last price, SELL when it is more than `threshold`
//! below.

use super::{check_lookback, finite_prices, Signal, Strategy, StrategyError};
use crate::window::{mean, PriceWindow};

#[derive(Debug, Clone)]
pub struct Autoregressive {
    window: PriceWindow,
    lookback: usize,
    threshold: f64,
}

/// AR(1) coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ar1Fit {
    pub intercept: f64,
    pub slope: f64,
}

impl Ar1Fit {
    pub fn forecast(&self, last: f64) -> f64 {
        self.intercept + self.slope * last
    }
}

/// Ordinary least squares on lagged pairs. `None` if the regressor is constant.
pub fn fit_ar1(prices: &[f64]) -> Option<Ar1Fit> {
    if prices.len() < 3 {
        return None;
    }
    let xs = &prices[..prices.len() - 1];
    let ys = &prices[1..];
    let mx = mean(xs);
    let my = mean(ys);
    let sxx: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum();
    let slope = sxy / sxx;
    Some(Ar1Fit {
        intercept: my - slope * mx,
        slope,
    })
}

impl Autoregressive {
    pub fn new(
        symbol: &str,
        lookback: usize,
        threshold: f64,
        capacity: usize,
    ) -> Result<Self, StrategyError> {
        check_lookback("autoregressive", lookback, 3, lookback, capacity)?;
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(StrategyError::InvalidParameter(format!(
                "threshold must be finite and >= 0, got {threshold}"
            )));
        }
        Ok(Self {
            window: PriceWindow::new(symbol, capacity),
            lookback,
            threshold,
        })
    }

    /// Forecast relative move `(forecast - last) / last`.
    pub fn expected_move(&self) -> Result<Option<f64>, StrategyError> {
        let Some(prices) = finite_prices(&self.window, self.lookback)? else {
            return Ok(None);
        };
        let Some(fit) = fit_ar1(&prices) else {
            return Ok(None);
        };
        let last = prices[prices.len() - 1];
        let forecast = fit.forecast(last);
        if !forecast.is_finite() {
            return Err(StrategyError::Numerical(format!(
                "AR(1) forecast is not finite (a={}, b={})",
                fit.intercept, fit.slope
            )));
        }
        Ok(Some((forecast - last) / last))
    }
}

impl Strategy for Autoregressive {
    fn name(&self) -> &str {
        "autoregressive"
    }

    fn window(&self) -> &PriceWindow {
        &self.window
    }

    fn window_mut(&mut self) -> &mut PriceWindow {
        &mut self.window
    }

    fn compute_signal(&mut self) -> Result<Option<Signal>, StrategyError> {
        let Some(expected) = self.expected_move()? else {
            return Ok(None);
        };
        if expected > self.threshold {
            Ok(Some(Signal::Buy))
        } else if expected < -self.threshold {
            Ok(Some(Signal::Sell))
        } else {
            Ok(None)
        }
    }
}
