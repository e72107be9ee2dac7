//! Ticktape CLI: run, sweep and synth commands.
//!
//! Commands:
//! - `run`: execute one backtest from a TOML config over a CSV or synthetic feed
//! - `sweep`: repeat a backtest under many matching seeds and summarize
//! - `synth`: write a synthetic random-walk feed as CSV

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use ticktape_core::domain::Position;
use ticktape_core::strategy::StrategyConfig;
use ticktape_runner::data_loader::{parse_timestamp, write_csv};
use ticktape_runner::export::save_artifacts;
use ticktape_runner::{
    load_csv, run_backtest, synthetic_ticks, BacktestResult, BarInterval, Distribution,
    LoadedFeed, RunConfig, RunError, SeedSweep,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_START: &str = "2024-01-02";

#[derive(Parser)]
#[command(
    name = "ticktape",
    about = "Ticktape CLI: tick-by-tick backtest accounting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a single backtest.
    Run {
        #[command(flatten)]
        input: InputArgs,

        /// Override the matching seed from the config.
        #[arg(long)]
        seed: Option<u64>,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the summary only; write no artifacts.
        #[arg(long, default_value_t = false)]
        no_save: bool,
    },
    /// Run the same backtest under many derived matching seeds.
    Sweep {
        #[command(flatten)]
        input: InputArgs,

        /// Number of runs.
        #[arg(long, default_value_t = 32)]
        runs: usize,

        /// Master seed the per-run seeds are derived from.
        #[arg(long, default_value_t = 0)]
        master_seed: u64,

        /// Run on a single thread.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Print the distributions as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Write a synthetic random-walk feed as long-format CSV.
    Synth {
        /// Symbols to generate (e.g., SPY QQQ).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Number of bars per symbol.
        #[arg(long, default_value_t = 252)]
        bars: usize,

        /// Bar interval (1m, 5m, 1h, 1d, 1wk, ...).
        #[arg(long, default_value = "1d")]
        interval: String,

        /// First timestamp (RFC 3339 or YYYY-MM-DD).
        #[arg(long, default_value = DEFAULT_START)]
        start: String,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output CSV path.
        #[arg(long)]
        out: PathBuf,
    },
}

/// Feed and config selection shared by `run` and `sweep`.
#[derive(clap::Args)]
struct InputArgs {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Long-format CSV feed (timestamp,symbol,close,volume).
    #[arg(long, conflicts_with = "synthetic")]
    data: Option<PathBuf>,

    /// Generate a synthetic feed with this many bars instead of loading one.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Override the configured strategy with its default parameters.
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    MeanReversion,
    Autoregressive,
    Breakout,
    Cycle,
}

impl StrategyArg {
    fn to_config(self) -> StrategyConfig {
        match self {
            StrategyArg::MeanReversion => StrategyConfig::default(),
            StrategyArg::Autoregressive => StrategyConfig::Autoregressive {
                window: 20,
                threshold: 0.0,
            },
            StrategyArg::Breakout => StrategyConfig::Breakout { window: 20 },
            StrategyArg::Cycle => StrategyConfig::Cycle,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            seed,
            output_dir,
            no_save,
        } => run_single(input, seed, &output_dir, no_save),
        Commands::Sweep {
            input,
            runs,
            master_seed,
            sequential,
            json,
        } => run_sweep(input, runs, master_seed, sequential, json),
        Commands::Synth {
            symbols,
            bars,
            interval,
            start,
            seed,
            out,
        } => run_synth(symbols, bars, &interval, &start, seed, &out),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve the config and feed for `run` and `sweep`.
///
/// Without a config file, the tracked symbols are taken from the CSV feed.
fn prepare(input: InputArgs) -> Result<(RunConfig, LoadedFeed)> {
    let mut config = match &input.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(strategy) = input.strategy {
        config.strategy = strategy.to_config();
    }

    let feed = match (&input.data, input.synthetic) {
        (Some(path), _) => {
            let feed = load_csv(path).with_context(|| format!("loading feed {}", path.display()))?;
            if input.config.is_none() {
                config.symbols = feed.symbols.clone();
            }
            feed
        }
        (None, Some(bars)) => {
            let interval = config.interval()?;
            let start = parse_start(DEFAULT_START)?;
            synthetic_ticks(&config.symbols, start, interval.nominal_step(), bars, config.seed)?
        }
        (None, None) => bail!("either --data <CSV> or --synthetic <BARS> is required"),
    };

    config.validate()?;
    Ok((config, feed))
}

fn run_single(input: InputArgs, seed: Option<u64>, output_dir: &Path, no_save: bool) -> Result<()> {
    let (mut config, feed) = prepare(input)?;
    if let Some(seed) = seed {
        config.seed = seed;
    }

    match run_backtest(&config, &feed) {
        Ok(result) => {
            print_summary(&result);
            if !no_save {
                let dir = save_artifacts(&result, output_dir)?;
                println!("Artifacts saved to {}", dir.display());
            }
            Ok(())
        }
        Err(RunError::Halted { error, partial }) => {
            print_summary(&partial);
            if !no_save {
                let dir = save_artifacts(&partial, output_dir)?;
                warn!(dir = %dir.display(), "partial artifacts saved");
            }
            bail!("backtest halted: {error}")
        }
        Err(e) => Err(e.into()),
    }
}

fn run_sweep(
    input: InputArgs,
    runs: usize,
    master_seed: u64,
    sequential: bool,
    json: bool,
) -> Result<()> {
    if runs == 0 {
        bail!("--runs must be at least 1");
    }
    let (config, feed) = prepare(input)?;
    let results = SeedSweep::new(runs, master_seed)
        .with_parallelism(!sequential)
        .run(&config, &feed.ticks)?;
    info!(runs = results.len(), "sweep complete");

    let rows = [
        ("final_equity", results.final_equity()),
        ("total_return_pct", results.total_return_pct()),
        ("sharpe", results.sharpe()),
        ("max_drawdown_pct", results.max_drawdown_pct()),
    ];

    if json {
        let mut map = serde_json::Map::new();
        for (name, dist) in &rows {
            map.insert(name.to_string(), serde_json::to_value(dist)?);
        }
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    println!();
    println!("=== Seed Sweep ===");
    println!("Strategy:       {}", config.strategy.name());
    println!("Symbol:         {}", config.trade_symbol());
    println!("Runs:           {}", results.len());
    println!("Master Seed:    {master_seed}");
    println!();
    println!(
        "{:<18} {:>6} {:>12} {:>12} {:>12} {:>12}",
        "metric", "n", "mean", "std", "min", "max"
    );
    for (name, dist) in &rows {
        print_distribution(name, dist);
    }
    if let Some(best) = results.best() {
        println!();
        println!(
            "Best seed:      {} (final equity {:.2})",
            best.config.seed, best.metrics.final_equity
        );
    }
    if feed.synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
    Ok(())
}

fn run_synth(
    symbols: Vec<String>,
    bars: usize,
    interval: &str,
    start: &str,
    seed: u64,
    out: &Path,
) -> Result<()> {
    let interval: BarInterval = interval.parse()?;
    let start = parse_start(start)?;
    let feed = synthetic_ticks(&symbols, start, interval.nominal_step(), bars, seed)?;

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(out).with_context(|| format!("creating {}", out.display()))?;
    write_csv(&feed.ticks, file)?;
    println!(
        "Wrote {} bars x {} symbols to {} (dataset {})",
        bars,
        feed.symbols.len(),
        out.display(),
        &feed.dataset_hash[..12]
    );
    Ok(())
}

fn parse_start(s: &str) -> Result<DateTime<Utc>> {
    match parse_timestamp(s) {
        Some(ts) => Ok(ts),
        None => bail!("invalid start timestamp '{s}'"),
    }
}

fn fmt_metric(v: f64, precision: usize, suffix: &str) -> String {
    if v.is_finite() {
        format!("{v:.precision$}{suffix}")
    } else {
        "n/a".to_string()
    }
}

fn print_distribution(name: &str, dist: &Distribution) {
    println!(
        "{:<18} {:>6} {:>12} {:>12} {:>12} {:>12}",
        name,
        dist.count,
        fmt_metric(dist.mean, 3, ""),
        fmt_metric(dist.std, 3, ""),
        fmt_metric(dist.min, 3, ""),
        fmt_metric(dist.max, 3, ""),
    );
}

fn print_positions<'a>(positions: impl Iterator<Item = &'a Position>) {
    for p in positions {
        println!(
            "  {:<8} qty {:>8}  avg cost {:>10.4}  realized {:>10.2}",
            p.symbol, p.quantity, p.avg_cost, p.realized_pnl
        );
    }
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    let short_id: String = result.run_id.chars().take(12).collect();
    println!("Run ID:         {short_id}");
    println!("Strategy:       {}", result.config.strategy.name());
    println!("Symbol:         {}", result.config.trade_symbol());
    if let (Some(first), Some(last)) = (result.equity_curve.first(), result.equity_curve.last()) {
        println!("Period:         {} to {}", first.timestamp, last.timestamp);
    }
    println!("Bars:           {}", m.bar_count);
    println!("Orders:         {}", result.orders.len());
    println!("Trades:         {}", m.trade_count);
    println!("Faults:         {}", result.strategy_faults.len());
    println!();
    println!("--- Performance ---");
    println!("Final Equity:   {}", fmt_metric(m.final_equity, 2, ""));
    println!("Total Return:   {}", fmt_metric(m.total_return_pct, 2, "%"));
    println!("Sharpe:         {}", fmt_metric(m.sharpe, 3, ""));
    println!("Max Drawdown:   {:.2}%", m.max_drawdown_pct);
    println!("Win Rate:       {}", fmt_metric(m.win_rate * 100.0, 1, "%"));
    println!("Avg Win:        {:.2}", m.avg_win);
    println!("Avg Loss:       {:.2}", m.avg_loss);
    println!("Win/Loss:       {}", fmt_metric(m.win_loss_ratio, 2, ""));
    println!("Realized PnL:   {:.2}", m.realized_pnl);
    println!("Commission:     {:.2}", m.total_commission);
    println!("Cash:           {:.2} (from {:.2})", result.final_cash, result.initial_cash);

    let mut open = result.open_positions().peekable();
    if open.peek().is_some() {
        println!();
        println!("--- Open Positions ---");
        print_positions(open);
    }
    if result.synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    if !result.completed {
        println!();
        println!("WARNING: Run halted early; results cover {} bars", m.bar_count);
    }
    println!();
}
