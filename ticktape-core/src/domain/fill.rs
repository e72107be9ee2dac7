use crate::domain::ids::OrderId;
use crate::domain::order::OrderSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fill record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    /// True when less than the requested quantity was filled.
    pub partial: bool,
    pub commission: f64,
}

impl Fill {
    /// Quantity with sign applied: buys positive, sells negative.
    pub fn signed_quantity(&self) -> i64 {
        self.side.sign() * self.quantity as i64
    }

    /// Traded notional before commission.
    pub fn notional(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_quantity_follows_side() {
        let mut fill = Fill {
            order_id: OrderId(1),
            symbol: "AAPL".into(),
            side: OrderSide::Buy,
            quantity: 25,
            price: 10.0,
            timestamp: Utc::now(),
            partial: false,
            commission: 0.0,
        };
        assert_eq!(fill.signed_quantity(), 25);
        assert_eq!(fill.notional(), 250.0);
        fill.side = OrderSide::Sell;
        assert_eq!(fill.signed_quantity(), -25);
    }
}
