//! TradeRecord: one applied fill and the ledger state it left behind.

use super::ids::OrderId;
use super::order::OrderSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An applied fill with its realized PnL contribution.
///
/// Appended once per fill; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub partial: bool,

    // ── Accounting ──
    pub realized_pnl: f64,
    pub commission: f64,

    // ── Ledger state after the fill ──
    pub position_after: i64,
    pub avg_cost_after: f64,
    pub cash_after: f64,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.realized_pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.realized_pnl < 0.0
    }
}
