//! Liquidity constraint: the share of bar volume one participant can take.
//!
//! Orders larger than the available share are partially filled; the unfilled
//! remainder is dropped, never carried to the next bar.

/// Participation limit expressed as a fraction of bar volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiquidityConstraint {
    /// Fraction of bar volume available to this participant, in (0, 1].
    pub fill_rate: f64,
}

impl LiquidityConstraint {
    pub fn new(fill_rate: f64) -> Self {
        debug_assert!(
            fill_rate > 0.0 && fill_rate <= 1.0,
            "fill_rate must be in (0, 1]"
        );
        Self { fill_rate }
    }

    /// `floor(bar_volume * fill_rate)`, clamped at zero.
    ///
    /// The float-to-int cast saturates, so negative or NaN products map to 0.
    pub fn fillable_qty(&self, bar_volume: f64) -> u64 {
        (bar_volume * self.fill_rate).floor() as u64
    }

    /// Limit a requested quantity to what the bar can absorb.
    pub fn limit_fill_qty(&self, requested_qty: u64, bar_volume: f64) -> u64 {
        requested_qty.min(self.fillable_qty(bar_volume))
    }
}
