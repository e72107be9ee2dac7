//! Bars, ticks and equity snapshots: the market data units the loop consumes
//! and the equity points it produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Close price and traded volume for one symbol over one interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarQuote {
    pub close: f64,
    pub volume: f64,
}

impl BarQuote {
    pub fn new(close: f64, volume: f64) -> Self {
        Self { close, volume }
    }

    /// Close must be finite and strictly positive, volume finite and non-negative.
    pub fn is_sane(&self) -> bool {
        self.close.is_finite() && self.close > 0.0 && self.volume.is_finite() && self.volume >= 0.0
    }
}

/// One timestamp of the feed: a bar for every symbol it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub bars: BTreeMap<String, BarQuote>,
}

impl Tick {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            bars: BTreeMap::new(),
        }
    }

    /// Builder-style insert.
    pub fn with_bar(mut self, symbol: impl Into<String>, close: f64, volume: f64) -> Self {
        self.bars.insert(symbol.into(), BarQuote::new(close, volume));
        self
    }

    pub fn bar(&self, symbol: &str) -> Option<&BarQuote> {
        self.bars.get(symbol)
    }
}

/// Total equity at the close of one processed tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}
