//! Performance metrics: pure functions that compute run statistics.
//!
//! Every metric is a pure function: equity values and/or trade records in,
//! scalar out. Undefined statistics are NaN, never an error.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ticktape_core::domain::{EquitySnapshot, TradeRecord};

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Minutes in one regular trading session.
pub const SESSION_MINUTES: u32 = 390;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown bar interval '{0}'")]
pub struct IntervalError(pub String);

/// Sampling interval of the feed, as written in interval strings like "5m".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarInterval {
    Minutes(u32),
    Hours(u32),
    Days(u32),
    Weeks(u32),
    Months(u32),
}

impl BarInterval {
    /// Bars per trading day, floored at 1.
    pub fn bars_per_day(self) -> u32 {
        let bars = match self {
            BarInterval::Minutes(m) => SESSION_MINUTES / m,
            BarInterval::Hours(h) => (6.5 / h as f64).floor() as u32,
            BarInterval::Days(_) | BarInterval::Weeks(_) | BarInterval::Months(_) => 1,
        };
        bars.max(1)
    }

    /// Annualization factor: bars per day times trading days per year.
    pub fn annualization(self) -> f64 {
        self.bars_per_day() as f64 * TRADING_DAYS_PER_YEAR
    }

    /// Wall-clock spacing between bars. Months count as 30 days.
    pub fn nominal_step(self) -> Duration {
        match self {
            BarInterval::Minutes(n) => Duration::minutes(n as i64),
            BarInterval::Hours(n) => Duration::hours(n as i64),
            BarInterval::Days(n) => Duration::days(n as i64),
            BarInterval::Weeks(n) => Duration::weeks(n as i64),
            BarInterval::Months(n) => Duration::days(30 * n as i64),
        }
    }
}

impl FromStr for BarInterval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let interval = match s {
            "1m" => BarInterval::Minutes(1),
            "5m" => BarInterval::Minutes(5),
            "15m" => BarInterval::Minutes(15),
            "30m" => BarInterval::Minutes(30),
            "60m" => BarInterval::Minutes(60),
            "90m" => BarInterval::Minutes(90),
            "1h" => BarInterval::Hours(1),
            "4h" => BarInterval::Hours(4),
            "1d" => BarInterval::Days(1),
            "5d" => BarInterval::Days(5),
            "1wk" => BarInterval::Weeks(1),
            "1mo" => BarInterval::Months(1),
            "3mo" => BarInterval::Months(3),
            other => return Err(IntervalError(other.to_string())),
        };
        Ok(interval)
    }
}

impl fmt::Display for BarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarInterval::Minutes(n) => write!(f, "{n}m"),
            BarInterval::Hours(n) => write!(f, "{n}h"),
            BarInterval::Days(n) => write!(f, "{n}d"),
            BarInterval::Weeks(n) => write!(f, "{n}wk"),
            BarInterval::Months(n) => write!(f, "{n}mo"),
        }
    }
}

/// Aggregate performance metrics for a single backtest run.
///
/// Percent fields are in percent units (5.0 == 5%). NaN fields serialize as
/// JSON `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    #[serde(with = "nan_as_null")]
    pub total_return_pct: f64,
    #[serde(with = "nan_as_null")]
    pub sharpe: f64,
    pub max_drawdown_pct: f64,
    #[serde(with = "nan_as_null")]
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    #[serde(with = "nan_as_null")]
    pub win_loss_ratio: f64,
    pub realized_pnl: f64,
    pub total_commission: f64,
    pub trade_count: usize,
    pub bar_count: usize,
    #[serde(with = "nan_as_null")]
    pub final_equity: f64,
    pub annualization: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from a run's outputs.
    pub fn compute(
        equity_curve: &[EquitySnapshot],
        trades: &[TradeRecord],
        interval: BarInterval,
        realized_pnl: f64,
        total_commission: f64,
    ) -> Self {
        let equity: Vec<f64> = equity_curve.iter().map(|s| s.equity).collect();
        let annualization = interval.annualization();
        let avg_win = avg_win(trades);
        let avg_loss = avg_loss(trades);
        Self {
            total_return_pct: total_return_pct(&equity),
            sharpe: sharpe_ratio(&equity, annualization),
            max_drawdown_pct: max_drawdown_pct(&equity),
            win_rate: win_rate(trades),
            avg_win,
            avg_loss,
            win_loss_ratio: win_loss_ratio(trades),
            realized_pnl,
            total_commission,
            trade_count: trades.len(),
            bar_count: equity.len(),
            final_equity: equity.last().copied().unwrap_or(f64::NAN),
            annualization,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return in percent: 100 * (last - first) / first. NaN if empty.
pub fn total_return_pct(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&first), Some(&last)) => 100.0 * (last - first) / first,
        _ => f64::NAN,
    }
}

/// Annualized Sharpe ratio with zero risk-free rate.
///
/// Sharpe = sqrt(annualization) * mean(returns) / std(returns), sample std.
/// NaN if there are fewer than 2 returns or the returns have no variance.
pub fn sharpe_ratio(equity_curve: &[f64], annualization: f64) -> f64 {
    let returns = step_returns(equity_curve);
    if returns.len() < 2 {
        return f64::NAN;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return f64::NAN;
    }
    annualization.sqrt() * mean_f64(&returns) / std
}

/// Maximum drawdown in percent, as a non-positive number (-15.0 = 15% drawdown).
///
/// Returns 0.0 for empty or never-declining equity. A percentage is
/// undefined against a non-positive peak, so stretches where the running
/// peak is at or below zero add no drawdown. Equity that falls through zero
/// from a positive peak reports more than -100.
pub fn max_drawdown_pct(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = 100.0 * (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Fraction of trade records with positive realized PnL. NaN if no trades.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return f64::NAN;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Mean realized PnL of winning records, 0.0 if there are none.
pub fn avg_win(trades: &[TradeRecord]) -> f64 {
    mean_or_zero(trades.iter().filter(|t| t.is_winner()).map(|t| t.realized_pnl))
}

/// Mean realized PnL of losing records (negative), 0.0 if there are none.
pub fn avg_loss(trades: &[TradeRecord]) -> f64 {
    mean_or_zero(trades.iter().filter(|t| t.is_loser()).map(|t| t.realized_pnl))
}

/// |avg win / avg loss|. NaN unless there is at least one winner and one loser.
pub fn win_loss_ratio(trades: &[TradeRecord]) -> f64 {
    let has_win = trades.iter().any(|t| t.is_winner());
    let has_loss = trades.iter().any(|t| t.is_loser());
    if !(has_win && has_loss) {
        return f64::NAN;
    }
    (avg_win(trades) / avg_loss(trades)).abs()
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple per-step returns; the first point has none.
pub fn step_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn mean_or_zero(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// JSON has no NaN: write it as `null` and read `null` back as NaN.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}
