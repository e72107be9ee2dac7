//! Cycle: BUY, SELL, no signal, repeating. Ignores prices entirely.
//!
//! Useful as a deterministic driver for exercising the matching engine and
//! ledger.

use super::{Signal, Strategy, StrategyError};
use crate::window::PriceWindow;

const PATTERN: [Option<Signal>; 3] = [Some(Signal::Buy), Some(Signal::Sell), None];

#[derive(Debug, Clone)]
pub struct Cycle {
    window: PriceWindow,
    calls: usize,
}

impl Cycle {
    pub fn new(symbol: &str, capacity: usize) -> Self {
        Self {
            window: PriceWindow::new(symbol, capacity),
            calls: 0,
        }
    }
}

impl Strategy for Cycle {
    fn name(&self) -> &str {
        "cycle"
    }

    fn window(&self) -> &PriceWindow {
        &self.window
    }

    fn window_mut(&mut self) -> &mut PriceWindow {
        &mut self.window
    }

    fn compute_signal(&mut self) -> Result<Option<Signal>, StrategyError> {
        let signal = PATTERN[self.calls % PATTERN.len()];
        self.calls += 1;
        Ok(signal)
    }
}
