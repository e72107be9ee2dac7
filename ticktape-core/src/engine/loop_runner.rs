//! Tick-by-tick backtest loop.
//!
//! Each step consumes one tick and runs five phases:
//! 1. Validate: timestamp ordering, a sane bar for every tracked symbol
//! 2. Observe: push the strategy symbol's bar into the strategy window
//! 3. Signal: ask the strategy for BUY/SELL/nothing (errors become faults)
//! 4. Execute: submit a market order and apply any fill to the ledger
//! 5. Mark: record equity at this tick's closes
//!
//! The loop is RUNNING until the feed is exhausted or a tick fails
//! validation, then DONE.

use crate::domain::{EquitySnapshot, IdGen, Order, Tick, TradeRecord};
use crate::execution::MatchingEngine;
use crate::ledger::PortfolioLedger;
use crate::strategy::{Signal, Strategy};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, warn};

use super::error::BacktestError;
use super::state::{EngineConfig, LoopState, RunOutput, StrategyFault};

/// Drives one strategy over a tick feed.
pub struct BacktestLoop<I, R = StdRng>
where
    I: Iterator<Item = Tick>,
{
    config: EngineConfig,
    feed: I,
    strategy: Box<dyn Strategy>,
    engine: MatchingEngine<R>,
    ledger: PortfolioLedger,
    ids: IdGen,
    state: LoopState,
    last_timestamp: Option<DateTime<Utc>>,
    last_filled_signal: Option<Signal>,

    equity_curve: Vec<EquitySnapshot>,
    trades: Vec<TradeRecord>,
    orders: Vec<Order>,
    faults: Vec<StrategyFault>,
}

impl<I> BacktestLoop<I, StdRng>
where
    I: Iterator<Item = Tick>,
{
    /// Loop with a matching engine seeded from `config.seed`.
    pub fn new(
        config: EngineConfig,
        feed: impl IntoIterator<Item = Tick, IntoIter = I>,
        strategy: Box<dyn Strategy>,
    ) -> Result<Self, BacktestError> {
        let engine = MatchingEngine::seeded(config.matching, config.seed)?;
        Self::with_engine(config, feed, strategy, engine)
    }
}

impl<I, R> BacktestLoop<I, R>
where
    I: Iterator<Item = Tick>,
    R: Rng,
{
    /// Loop with a caller-supplied matching engine. `config.matching` and
    /// `config.seed` are ignored in favor of the engine's own.
    pub fn with_engine(
        config: EngineConfig,
        feed: impl IntoIterator<Item = Tick, IntoIter = I>,
        strategy: Box<dyn Strategy>,
        engine: MatchingEngine<R>,
    ) -> Result<Self, BacktestError> {
        config.validate()?;
        if !config.symbols.iter().any(|s| s == strategy.symbol()) {
            return Err(BacktestError::UntrackedSymbol(strategy.symbol().to_string()));
        }

        info!(
            strategy = strategy.name(),
            symbol = strategy.symbol(),
            symbols = config.symbols.len(),
            order_size = config.order_size,
            initial_cash = config.initial_cash,
            "backtest initialized"
        );

        Ok(Self {
            ledger: PortfolioLedger::new(config.initial_cash),
            config,
            feed: feed.into_iter(),
            strategy,
            engine,
            ids: IdGen::new(),
            state: LoopState::Running,
            last_timestamp: None,
            last_filled_signal: None,
            equity_curve: Vec::new(),
            trades: Vec::new(),
            orders: Vec::new(),
            faults: Vec::new(),
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    pub fn equity_curve(&self) -> &[EquitySnapshot] {
        &self.equity_curve
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn strategy_faults(&self) -> &[StrategyFault] {
        &self.faults
    }

    /// Process one tick.
    ///
    /// Returns `Done` once the feed is exhausted; further calls are no-ops.
    /// Any error ends the run and moves the loop to `Done`. A tick rejected
    /// by validation leaves no trace in the outputs.
    pub fn step(&mut self) -> Result<LoopState, BacktestError> {
        if self.state == LoopState::Done {
            return Ok(LoopState::Done);
        }
        let Some(tick) = self.feed.next() else {
            self.state = LoopState::Done;
            return Ok(LoopState::Done);
        };

        match self.process_tick(&tick) {
            Ok(()) => Ok(LoopState::Running),
            Err(e) => {
                warn!(error = %e, timestamp = %tick.timestamp, "backtest halted");
                self.state = LoopState::Done;
                Err(e)
            }
        }
    }

    fn process_tick(&mut self, tick: &Tick) -> Result<(), BacktestError> {
        // ─── Phase 1: validate ───
        self.validate_tick(tick)?;
        let timestamp = tick.timestamp;
        self.last_timestamp = Some(timestamp);

        // ─── Phase 2: observe ───
        let symbol = self.strategy.symbol().to_string();
        let bar = *tick.bar(&symbol).ok_or_else(|| BacktestError::MissingBar {
            timestamp,
            symbol: symbol.clone(),
        })?;
        self.strategy.update(timestamp, bar.close, bar.volume);

        // ─── Phase 3: signal ───
        let signal = match self.strategy.compute_signal() {
            Ok(signal) => signal,
            Err(e) => {
                warn!(
                    strategy = self.strategy.name(),
                    symbol = %symbol,
                    %timestamp,
                    error = %e,
                    "strategy failed; treating as no signal"
                );
                self.faults.push(StrategyFault {
                    timestamp,
                    strategy: self.strategy.name().to_string(),
                    symbol: symbol.clone(),
                    message: e.to_string(),
                });
                None
            }
        };

        // ─── Phase 4: execute ───
        if let Some(signal) = signal {
            if self.config.suppress_repeated_signals && self.last_filled_signal == Some(signal) {
                debug!(%signal, %timestamp, "repeated signal suppressed");
            } else {
                self.submit(signal, &symbol, bar.close, bar.volume, timestamp)?;
            }
        }

        // ─── Phase 5: mark ───
        let equity = self.ledger.equity(|s| tick.bar(s).map(|b| b.close))?;
        self.equity_curve.push(EquitySnapshot { timestamp, equity });
        Ok(())
    }

    /// Step until the feed is exhausted.
    ///
    /// On error the outputs accumulated so far remain readable through the
    /// accessors and [`output`](Self::output).
    pub fn run_to_end(&mut self) -> Result<(), BacktestError> {
        while self.step()? == LoopState::Running {}
        info!(
            ticks = self.equity_curve.len(),
            orders = self.orders.len(),
            trades = self.trades.len(),
            faults = self.faults.len(),
            realized_pnl = self.ledger.realized_pnl(),
            "backtest finished"
        );
        Ok(())
    }

    /// Run to completion and return the outputs.
    pub fn run(mut self) -> Result<RunOutput, BacktestError> {
        self.run_to_end()?;
        Ok(self.into_output())
    }

    /// Snapshot of the outputs so far.
    pub fn output(&self) -> RunOutput {
        RunOutput {
            equity_curve: self.equity_curve.clone(),
            trades: self.trades.clone(),
            orders: self.orders.clone(),
            strategy_faults: self.faults.clone(),
            initial_cash: self.ledger.initial_cash(),
            final_cash: self.ledger.cash(),
            realized_pnl: self.ledger.realized_pnl(),
            total_commission: self.ledger.total_commission(),
            positions: self.ledger.positions().values().cloned().collect(),
        }
    }

    pub fn into_output(self) -> RunOutput {
        RunOutput {
            initial_cash: self.ledger.initial_cash(),
            final_cash: self.ledger.cash(),
            realized_pnl: self.ledger.realized_pnl(),
            total_commission: self.ledger.total_commission(),
            positions: self.ledger.positions().values().cloned().collect(),
            equity_curve: self.equity_curve,
            trades: self.trades,
            orders: self.orders,
            strategy_faults: self.faults,
        }
    }

    fn validate_tick(&self, tick: &Tick) -> Result<(), BacktestError> {
        if let Some(previous) = self.last_timestamp {
            if tick.timestamp <= previous {
                return Err(BacktestError::NonMonotonicTimestamp {
                    previous,
                    current: tick.timestamp,
                });
            }
        }
        for symbol in &self.config.symbols {
            let Some(bar) = tick.bar(symbol) else {
                return Err(BacktestError::MissingBar {
                    timestamp: tick.timestamp,
                    symbol: symbol.clone(),
                });
            };
            if !bar.is_sane() {
                return Err(BacktestError::InvalidBar {
                    timestamp: tick.timestamp,
                    symbol: symbol.clone(),
                    close: bar.close,
                    volume: bar.volume,
                });
            }
        }
        Ok(())
    }

    fn submit(
        &mut self,
        signal: Signal,
        symbol: &str,
        close: f64,
        volume: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), BacktestError> {
        let mut order = Order::market(
            self.ids.next_order_id(),
            symbol,
            signal.side(),
            self.config.order_size,
            timestamp,
        );
        let fill = self.engine.execute(&mut order, close, volume, timestamp);
        let Some(fill) = fill else {
            self.orders.push(order);
            return Ok(());
        };

        let realized = self.ledger.apply_fill(&fill)?;
        self.orders.push(order);
        let (position_after, avg_cost_after) = self
            .ledger
            .position(symbol)
            .map(|p| (p.quantity, p.avg_cost))
            .unwrap_or((0, 0.0));
        self.trades.push(TradeRecord {
            order_id: fill.order_id,
            symbol: fill.symbol,
            side: fill.side,
            quantity: fill.quantity,
            price: fill.price,
            timestamp,
            partial: fill.partial,
            realized_pnl: realized,
            commission: fill.commission,
            position_after,
            avg_cost_after,
            cash_after: self.ledger.cash(),
        });
        self.last_filled_signal = Some(signal);
        Ok(())
    }
}

/// Run `strategy` over `feed` with a seeded matching engine.
pub fn run_backtest<F>(
    config: EngineConfig,
    feed: F,
    strategy: Box<dyn Strategy>,
) -> Result<RunOutput, BacktestError>
where
    F: IntoIterator<Item = Tick>,
{
    BacktestLoop::new(config, feed, strategy)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderSide, OrderStatus};
    use crate::execution::MatchingConfig;
    use crate::ledger::LedgerError;
    use crate::strategy::{Cycle, StrategyError};
    use crate::window::PriceWindow;
    use chrono::TimeZone;

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + chrono::Duration::days(i)
    }

    fn ticks(prices: &[f64]) -> Vec<Tick> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Tick::new(ts(i as i64)).with_bar("AAPL", p, 1_000_000.0))
            .collect()
    }

    fn config() -> EngineConfig {
        EngineConfig::new(vec!["AAPL".into()], 10, 10_000.0)
    }

    /// Emits a fixed script of signals, one per call.
    struct Scripted {
        window: PriceWindow,
        script: Vec<Result<Option<Signal>, StrategyError>>,
        calls: usize,
    }

    impl Scripted {
        fn boxed(script: Vec<Result<Option<Signal>, StrategyError>>) -> Box<dyn Strategy> {
            Box::new(Self {
                window: PriceWindow::new("AAPL", 100),
                script,
                calls: 0,
            })
        }
    }

    impl Strategy for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }
        fn window(&self) -> &PriceWindow {
            &self.window
        }
        fn window_mut(&mut self) -> &mut PriceWindow {
            &mut self.window
        }
        fn compute_signal(&mut self) -> Result<Option<Signal>, StrategyError> {
            let out = self.script.get(self.calls).cloned().unwrap_or(Ok(None));
            self.calls += 1;
            out
        }
    }

    #[test]
    fn buy_then_sell_realizes_pnl() {
        let strategy =
            Scripted::boxed(vec![Ok(Some(Signal::Buy)), Ok(None), Ok(Some(Signal::Sell))]);
        let out = run_backtest(config(), ticks(&[100.0, 103.0, 106.0]), strategy).unwrap();

        assert_eq!(out.trades.len(), 2);
        assert!((out.realized_pnl - 60.0).abs() < 1e-9);
        assert!((out.final_cash - 10_060.0).abs() < 1e-9);
        let equities: Vec<f64> = out.equity_curve.iter().map(|s| s.equity).collect();
        assert_eq!(equities, vec![10_000.0, 10_030.0, 10_060.0]);
        assert_eq!(out.trades[0].position_after, 10);
        assert_eq!(out.trades[1].position_after, 0);
    }

    #[test]
    fn equity_point_per_tick_even_without_trades() {
        let strategy = Scripted::boxed(vec![]);
        let out = run_backtest(config(), ticks(&[1.0, 2.0, 3.0, 4.0]), strategy).unwrap();
        assert_eq!(out.equity_curve.len(), 4);
        assert!(out.equity_curve.iter().all(|s| s.equity == 10_000.0));
        assert!(out.orders.is_empty());
    }

    #[test]
    fn certain_cancellation_leaves_ledger_untouched() {
        let config = config().with_matching(MatchingConfig {
            cancel_probability: 1.0,
            ..MatchingConfig::default()
        });
        let strategy = Box::new(Cycle::new("AAPL", 10));
        let out = run_backtest(config, ticks(&[100.0; 6]), strategy).unwrap();

        assert_eq!(out.orders.len(), 4);
        assert!(out.orders.iter().all(|o| o.status == OrderStatus::Cancelled));
        assert!(out.trades.is_empty());
        assert_eq!(out.equity_curve.len(), 6);
        assert_eq!(out.final_cash, 10_000.0);
    }

    #[test]
    fn strategy_error_is_recorded_and_run_continues() {
        let strategy = Scripted::boxed(vec![
            Err(StrategyError::Numerical("boom".into())),
            Ok(Some(Signal::Buy)),
        ]);
        let out = run_backtest(config(), ticks(&[100.0, 101.0]), strategy).unwrap();

        assert_eq!(out.strategy_faults.len(), 1);
        assert_eq!(out.strategy_faults[0].timestamp, ts(0));
        assert!(out.strategy_faults[0].message.contains("boom"));
        assert_eq!(out.trades.len(), 1);
        assert_eq!(out.equity_curve.len(), 2);
    }

    #[test]
    fn missing_bar_halts_with_partial_output() {
        let mut feed = ticks(&[100.0, 101.0]);
        feed.push(Tick::new(ts(2)).with_bar("MSFT", 50.0, 10.0));
        feed.extend(ticks(&[1.0]).into_iter().map(|mut t| {
            t.timestamp = ts(3);
            t
        }));

        let mut bt = BacktestLoop::new(config(), feed, Scripted::boxed(vec![])).unwrap();
        let err = bt.run_to_end().unwrap_err();
        assert_eq!(
            err,
            BacktestError::MissingBar {
                timestamp: ts(2),
                symbol: "AAPL".into()
            }
        );
        assert_eq!(bt.state(), LoopState::Done);
        assert_eq!(bt.equity_curve().len(), 2);
        // Done is sticky
        assert_eq!(bt.step().unwrap(), LoopState::Done);
    }

    #[test]
    fn rejects_out_of_order_ticks() {
        let mut feed = ticks(&[100.0, 101.0]);
        feed.swap(0, 1);
        let err = run_backtest(config(), feed, Scripted::boxed(vec![])).unwrap_err();
        assert!(matches!(err, BacktestError::NonMonotonicTimestamp { .. }));
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let mut feed = ticks(&[100.0, 101.0]);
        feed[1].timestamp = feed[0].timestamp;
        let err = run_backtest(config(), feed, Scripted::boxed(vec![])).unwrap_err();
        assert!(matches!(err, BacktestError::NonMonotonicTimestamp { .. }));
    }

    #[test]
    fn rejects_nonpositive_close() {
        let err =
            run_backtest(config(), ticks(&[100.0, 0.0]), Scripted::boxed(vec![])).unwrap_err();
        assert!(matches!(err, BacktestError::InvalidBar { .. }));
    }

    #[test]
    fn strategy_symbol_must_be_tracked() {
        let config = EngineConfig::new(vec!["MSFT".into()], 10, 10_000.0);
        let err = BacktestLoop::new(config, ticks(&[1.0]), Scripted::boxed(vec![]))
            .err()
            .unwrap();
        assert_eq!(err, BacktestError::UntrackedSymbol("AAPL".into()));
    }

    #[test]
    fn suppression_skips_repeated_fills() {
        let mut config = config();
        config.suppress_repeated_signals = true;
        let strategy = Scripted::boxed(vec![
            Ok(Some(Signal::Buy)),
            Ok(Some(Signal::Buy)),
            Ok(Some(Signal::Sell)),
            Ok(Some(Signal::Sell)),
        ]);
        let out = run_backtest(config, ticks(&[100.0; 4]), strategy).unwrap();
        let sides: Vec<OrderSide> = out.trades.iter().map(|t| t.side).collect();
        assert_eq!(sides, vec![OrderSide::Buy, OrderSide::Sell]);
        assert_eq!(out.orders.len(), 2);
    }

    #[test]
    fn repeated_signals_stack_by_default() {
        let strategy = Scripted::boxed(vec![Ok(Some(Signal::Buy)), Ok(Some(Signal::Buy))]);
        let out = run_backtest(config(), ticks(&[100.0, 100.0]), strategy).unwrap();
        assert_eq!(out.positions[0].quantity, 20);
    }

    #[test]
    fn same_seed_same_output() {
        let config = config()
            .with_matching(MatchingConfig {
                cancel_probability: 0.5,
                fill_rate: 0.5,
                ..MatchingConfig::default()
            })
            .with_seed(11);
        let prices: Vec<f64> = (0..50).map(|i| 100.0 + (i % 7) as f64).collect();
        let cycle = || Box::new(Cycle::new("AAPL", 10));
        let a = run_backtest(config.clone(), ticks(&prices), cycle()).unwrap();
        let b = run_backtest(config, ticks(&prices), cycle()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn extra_symbols_in_tick_are_ignored() {
        let feed: Vec<Tick> = ticks(&[100.0, 101.0])
            .into_iter()
            .map(|t| t.with_bar("MSFT", 300.0, 5.0))
            .collect();
        let out = run_backtest(config(), feed, Scripted::boxed(vec![])).unwrap();
        assert_eq!(out.tick_count(), 2);
    }

    #[test]
    fn order_size_beyond_signed_range_is_rejected() {
        let config = EngineConfig::new(vec!["AAPL".into()], 1 << 63, 10_000.0);
        let err = BacktestLoop::new(config, ticks(&[1.0]), Scripted::boxed(vec![]))
            .err()
            .unwrap();
        assert_eq!(err, BacktestError::InvalidOrderSize);
    }

    #[test]
    fn position_overflow_halts_run() {
        let max = i64::MAX as u64;
        let config = EngineConfig::new(vec!["AAPL".into()], max, 10_000.0);
        let feed: Vec<Tick> = (0..3)
            .map(|i| Tick::new(ts(i)).with_bar("AAPL", 1.0, 1e19))
            .collect();
        let strategy = Scripted::boxed(vec![Ok(Some(Signal::Buy)), Ok(Some(Signal::Buy))]);
        let mut bt = BacktestLoop::new(config, feed, strategy).unwrap();

        assert_eq!(bt.step().unwrap(), LoopState::Running);
        assert_eq!(bt.ledger().quantity("AAPL"), i64::MAX);
        let cash = bt.ledger().cash();

        let err = bt.step().unwrap_err();
        assert_eq!(
            err,
            BacktestError::Ledger(LedgerError::QuantityOverflow {
                symbol: "AAPL".into(),
                quantity: max,
            })
        );
        assert_eq!(bt.state(), LoopState::Done);
        assert_eq!(bt.ledger().quantity("AAPL"), i64::MAX);
        assert_eq!(bt.ledger().cash(), cash);
        assert_eq!(bt.trades().len(), 1);
        assert_eq!(bt.orders().len(), 1);
        assert_eq!(bt.equity_curve().len(), 1);
        assert_eq!(bt.step().unwrap(), LoopState::Done);
    }

    #[test]
    fn trade_pnl_replays_to_realized_total() {
        let config = config().with_matching(MatchingConfig {
            fill_rate: 0.5,
            ..MatchingConfig::default()
        });
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + ((i * 7) % 11) as f64).collect();
        let feed: Vec<Tick> = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Tick::new(ts(i as i64)).with_bar("AAPL", p, 13.0))
            .collect();
        let out = run_backtest(config, feed, Box::new(Cycle::new("AAPL", 10))).unwrap();

        let from_trades: f64 = out.trades.iter().map(|t| t.realized_pnl).sum();
        let from_positions: f64 = out.positions.iter().map(|p| p.realized_pnl).sum();
        assert!(out.trades.iter().any(|t| t.realized_pnl != 0.0));
        assert!((from_trades - out.realized_pnl).abs() < 1e-9);
        assert!((from_positions - out.realized_pnl).abs() < 1e-9);
    }
}
