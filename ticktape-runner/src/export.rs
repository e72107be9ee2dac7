//! Reporting and export: JSON, CSV, and Markdown artifact generation.
//!
//! Provides three export formats for backtest results:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trade tape, order log and equity curve for external tools
//! - **Markdown**: human-readable single-run report
//!
//! All persisted artifacts include a `schema_version` field. Unknown versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ticktape_core::domain::{EquitySnapshot, Order, TradeRecord};

use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the trade tape, one row per fill.
///
/// Columns: order_id, timestamp, symbol, side, quantity, price, partial,
/// realized_pnl, commission, position_after, avg_cost_after, cash_after
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "order_id",
        "timestamp",
        "symbol",
        "side",
        "quantity",
        "price",
        "partial",
        "realized_pnl",
        "commission",
        "position_after",
        "avg_cost_after",
        "cash_after",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.order_id.0.to_string(),
            &t.timestamp.to_rfc3339(),
            &t.symbol,
            &t.side.to_string(),
            &t.quantity.to_string(),
            &format!("{:.6}", t.price),
            &t.partial.to_string(),
            &format!("{:.2}", t.realized_pnl),
            &format!("{:.2}", t.commission),
            &t.position_after.to_string(),
            &format!("{:.6}", t.avg_cost_after),
            &format!("{:.2}", t.cash_after),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the order log with final statuses.
pub fn export_orders_csv(orders: &[Order]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["order_id", "submitted_at", "symbol", "side", "quantity", "status"])?;
    for o in orders {
        wtr.write_record([
            &o.id.0.to_string(),
            &o.submitted_at.to_rfc3339(),
            &o.symbol,
            &o.side.to_string(),
            &o.quantity.to_string(),
            &o.status.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export an equity curve as CSV with timestamp and equity columns.
pub fn export_equity_csv(equity_curve: &[EquitySnapshot]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity"])?;
    for s in equity_curve {
        wtr.write_record([&s.timestamp.to_rfc3339(), &format!("{:.2}", s.equity)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates a directory named `{symbol}_{run_id prefix}/` under `output_dir`
/// containing:
/// - `manifest.json`: the full `BacktestResult`
/// - `trades.csv`: fill-level trade tape
/// - `orders.csv`: every submitted order and its status
/// - `equity.csv`: tick-by-tick equity curve
/// - `report.md`: Markdown summary
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let prefix: String = result.run_id.chars().take(12).collect();
    let dirname = format!("{}_{}", result.config.trade_symbol(), prefix);
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let files = [
        ("manifest.json", export_json(result)?),
        ("trades.csv", export_trades_csv(&result.trades)?),
        ("orders.csv", export_orders_csv(&result.orders)?),
        ("equity.csv", export_equity_csv(&result.equity_curve)?),
        ("report.md", generate_report(result)),
    ];
    for (name, contents) in files {
        let path = run_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
///
/// Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

fn num(v: f64, decimals: usize) -> String {
    if v.is_finite() {
        format!("{v:.decimals$}")
    } else {
        "n/a".to_string()
    }
}

/// Generate a Markdown report for a single backtest run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);
    let c = &result.config;

    md.push_str("# Backtest Report\n\n");

    // Metadata
    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run ID | {} |\n", result.run_id));
    md.push_str(&format!("| Symbols | {} |\n", c.symbols.join(", ")));
    md.push_str(&format!("| Traded | {} |\n", c.trade_symbol()));
    md.push_str(&format!("| Strategy | {} |\n", c.strategy.name()));
    md.push_str(&format!("| Interval | {} |\n", c.bar_interval));
    md.push_str(&format!("| Seed | {} |\n", c.seed));
    md.push_str(&format!("| Initial Cash | ${:.0} |\n", result.initial_cash));
    if let Some(hash) = &result.dataset_hash {
        md.push_str(&format!("| Dataset Hash | {hash} |\n"));
    }
    if result.synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    if !result.completed {
        md.push_str("| Status | **HALTED** (partial results) |\n");
    }
    md.push('\n');

    // Execution
    md.push_str("## Execution\n\n");
    md.push_str("| Parameter | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Fill Rate | {} |\n", c.fill_rate));
    md.push_str(&format!("| Cancel Probability | {} |\n", c.cancel_probability));
    md.push_str(&format!("| Slippage | {} bps |\n", c.slippage_bps));
    md.push_str(&format!("| Commission | ${}/share |\n", c.commission_per_share));
    md.push_str(&format!("| Order Size | {} |\n", c.order_size));
    md.push('\n');

    // Performance Summary
    let m = &result.metrics;
    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Total Return | {}% |\n", num(m.total_return_pct, 2)));
    md.push_str(&format!("| Sharpe | {} |\n", num(m.sharpe, 3)));
    md.push_str(&format!("| Max Drawdown | {}% |\n", num(m.max_drawdown_pct, 2)));
    md.push_str(&format!("| Win Rate | {}% |\n", num(m.win_rate * 100.0, 1)));
    md.push_str(&format!("| Avg Win | {} |\n", num(m.avg_win, 2)));
    md.push_str(&format!("| Avg Loss | {} |\n", num(m.avg_loss, 2)));
    md.push_str(&format!("| Win/Loss Ratio | {} |\n", num(m.win_loss_ratio, 2)));
    md.push_str(&format!("| Realized PnL | {} |\n", num(m.realized_pnl, 2)));
    md.push_str(&format!("| Commission | {} |\n", num(m.total_commission, 2)));
    md.push_str(&format!("| Final Equity | {} |\n", num(m.final_equity, 2)));
    md.push_str(&format!("| Fills | {} |\n", m.trade_count));
    md.push_str(&format!("| Orders | {} |\n", result.orders.len()));
    md.push_str(&format!("| Bars | {} |\n", m.bar_count));
    md.push('\n');

    // Open positions
    let open: Vec<_> = result.open_positions().collect();
    if !open.is_empty() {
        md.push_str("## Open Positions\n\n");
        md.push_str("| Symbol | Quantity | Avg Cost |\n");
        md.push_str("| --- | --- | --- |\n");
        for p in open {
            md.push_str(&format!("| {} | {} | {:.4} |\n", p.symbol, p.quantity, p.avg_cost));
        }
        md.push('\n');
    }

    // Strategy faults
    if !result.strategy_faults.is_empty() {
        md.push_str("## Strategy Faults\n\n");
        for f in &result.strategy_faults {
            md.push_str(&format!("- {} {}: {}\n", f.timestamp.to_rfc3339(), f.strategy, f.message));
        }
        md.push('\n');
    }

    md
}
