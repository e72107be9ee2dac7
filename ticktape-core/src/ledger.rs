//! Portfolio ledger: applies fills to cash, positions and realized PnL.
//!
//! A fill first closes any opposite-sign position (realizing PnL on the closed
//! quantity only), then opens or extends a position with the remainder. The
//! average cost is blended when a position grows in the same direction,
//! replaced when a fill flips the sign, and reset to 0 when the position goes
//! flat.
//!
//! There is no cash-sufficiency check: a backtest may take cash negative.
//! Commission is debited from cash and accumulated separately; it is never
//! netted into realized PnL.

use crate::domain::{Fill, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("no mark price for open position in '{0}'")]
    MissingMark(String),
    #[error("fill of {quantity} '{symbol}' overflows the position")]
    QuantityOverflow { symbol: String, quantity: u64 },
}

/// Cash, per-symbol positions and PnL accumulators for one run.
///
/// The equity identity `equity == cash + sum(quantity * mark)` holds after
/// every fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioLedger {
    initial_cash: f64,
    cash: f64,
    positions: BTreeMap<String, Position>,
    realized_pnl: f64,
    total_commission: f64,
}

impl PortfolioLedger {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            positions: BTreeMap::new(),
            realized_pnl: 0.0,
            total_commission: 0.0,
        }
    }

    /// Apply a fill and return the PnL it realized.
    ///
    /// Returns 0 when the fill only opens or extends a position. A fill whose
    /// quantity or resulting position does not fit an `i64` is rejected and
    /// leaves the ledger unchanged.
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<f64, LedgerError> {
        let overflow = || LedgerError::QuantityOverflow {
            symbol: fill.symbol.clone(),
            quantity: fill.quantity,
        };
        let qty = i64::try_from(fill.quantity).map_err(|_| overflow())?;
        let sign = fill.side.sign();
        let price = fill.price;

        let before = self.quantity(&fill.symbol);
        // i64::MIN is excluded so |quantity| always fits
        before
            .checked_add(sign * qty)
            .filter(|&after| after != i64::MIN)
            .ok_or_else(overflow)?;

        let pos = self
            .positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::flat(fill.symbol.clone()));
        let opposes = before != 0 && before.signum() != sign;

        // Close against the existing opposite-sign position
        let closing = if opposes { qty.min(before.abs()) } else { 0 };
        let mut realized = 0.0;
        if closing > 0 {
            // Sell closing a long: (price - avg). Buy covering a short: (avg - price).
            realized = (price - pos.avg_cost) * closing as f64 * (-sign) as f64;
            pos.quantity += sign * closing;
            if pos.quantity == 0 {
                pos.avg_cost = 0.0;
            }
        }

        // Open or extend with whatever is left
        let opening = qty - closing;
        if opening > 0 {
            if opposes || pos.quantity == 0 {
                pos.avg_cost = price;
            } else {
                let held = pos.quantity.abs() as f64;
                let total = held + opening as f64;
                pos.avg_cost = (pos.avg_cost * held + price * opening as f64) / total;
            }
            pos.quantity += sign * opening;
        }

        pos.realized_pnl += realized;

        // Buys debit cash, sells credit it; commission always debits.
        self.cash -= sign as f64 * fill.notional();
        self.cash -= fill.commission;
        self.realized_pnl += realized;
        self.total_commission += fill.commission;

        Ok(realized)
    }

    /// Total equity = cash + sum of position market values.
    ///
    /// Every non-flat position needs a mark.
    pub fn equity<F>(&self, mark: F) -> Result<f64, LedgerError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let mut value = self.cash;
        for (symbol, pos) in self.positions.iter().filter(|(_, p)| !p.is_flat()) {
            let price = mark(symbol).ok_or_else(|| LedgerError::MissingMark(symbol.clone()))?;
            value += pos.market_value(price);
        }
        Ok(value)
    }

    /// Unrealized PnL across open positions at the given marks.
    pub fn unrealized_pnl<F>(&self, mark: F) -> Result<f64, LedgerError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let mut total = 0.0;
        for (symbol, pos) in self.positions.iter().filter(|(_, p)| !p.is_flat()) {
            let price = mark(symbol).ok_or_else(|| LedgerError::MissingMark(symbol.clone()))?;
            total += pos.unrealized_pnl(price);
        }
        Ok(total)
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn total_commission(&self) -> f64 {
        self.total_commission
    }

    /// Position for `symbol`, including flat positions that have traded.
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Signed quantity held in `symbol` (0 if never traded).
    pub fn quantity(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).map_or(0, |p| p.quantity)
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }
}
