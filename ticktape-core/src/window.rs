//! Rolling price window: a bounded buffer of recent observations.
//!
//! Each strategy owns its window; nothing is shared between runs. When the
//! buffer is full the oldest observation is evicted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of observations retained per symbol.
pub const DEFAULT_CAPACITY: usize = 1000;

/// One price/volume observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
}

/// Bounded FIFO of observations for one symbol.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    symbol: String,
    capacity: usize,
    observations: VecDeque<Observation>,
}

impl PriceWindow {
    pub fn new(symbol: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            symbol: symbol.into(),
            capacity,
            observations: VecDeque::with_capacity(capacity),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Append an observation, evicting the oldest one on overflow.
    pub fn push(&mut self, timestamp: DateTime<Utc>, price: f64, volume: f64) {
        if self.observations.len() == self.capacity {
            self.observations.pop_front();
        }
        self.observations.push_back(Observation {
            timestamp,
            price,
            volume,
        });
    }

    pub fn last(&self) -> Option<&Observation> {
        self.observations.back()
    }

    pub fn last_price(&self) -> Option<f64> {
        self.last().map(|o| o.price)
    }

    /// The most recent `n` prices, oldest first, or `None` if fewer are held.
    pub fn prices(&self, n: usize) -> Option<Vec<f64>> {
        if n == 0 || self.observations.len() < n {
            return None;
        }
        let skip = self.observations.len() - n;
        Some(self.observations.iter().skip(skip).map(|o| o.price).collect())
    }

}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
