use serde::{Deserialize, Serialize};

/// Position tracking
///
/// `avg_cost` is only meaningful while `quantity != 0` and is held at 0
/// whenever the position is flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    pub avg_cost: f64,
    pub realized_pnl: f64,
}

impl Position {
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            quantity: 0,
            avg_cost: 0.0,
            realized_pnl: 0.0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    pub fn market_value(&self, mark: f64) -> f64 {
        self.quantity as f64 * mark
    }

    pub fn unrealized_pnl(&self, mark: f64) -> f64 {
        self.quantity as f64 * (mark - self.avg_cost)
    }
}
