//! Order side, order status and the market order record.

use super::ids::OrderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> i64 {
        match self {
            OrderSide::Buy => 1,
            OrderSide::Sell => -1,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Order lifecycle states.
///
/// `Open` means the order met no liquidity on its bar. Orders never carry
/// across bars, so `Open` is terminal for the run's order log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created, not yet matched.
    New,
    /// Matched against a bar with no available liquidity.
    Open,
    PartiallyFilled,
    Filled,
    /// Rejected or expired before reaching the book.
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::New => "NEW",
            OrderStatus::Open => "OPEN",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// A market order for one symbol, valid for the bar it was created on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub submitted_at: DateTime<Utc>,
    pub status: OrderStatus,
}

impl Order {
    pub fn market(
        id: OrderId,
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: u64,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            side,
            quantity,
            submitted_at,
            status: OrderStatus::New,
        }
    }
}
