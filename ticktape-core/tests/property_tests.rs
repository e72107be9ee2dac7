//! Property tests for kernel invariants.
//!
//! Uses proptest to verify:
//! 1. Fill bounds: a fill never exceeds the order or the bar's fillable volume
//! 2. Quantity conservation: position == sum of signed fill quantities
//! 3. PnL decomposition: equity - initial + commission == realized + unrealized
//! 4. Average cost: zero when flat, inside the fill price range otherwise
//! 5. Loop shape: one equity point per tick, one trade per fill
//! 6. PnL replay: per-fill realized amounts sum to the ledger and run totals

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use ticktape_core::domain::{Fill, Order, OrderId, OrderSide, OrderStatus, Tick};
use ticktape_core::engine::{run_backtest, EngineConfig};
use ticktape_core::execution::{MatchingConfig, MatchingEngine};
use ticktape_core::ledger::PortfolioLedger;
use ticktape_core::strategy::StrategyConfig;

// ── Strategies (proptest) ────────────────────────────────────────────

fn ts(i: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + Duration::hours(i)
}

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_side() -> impl Strategy<Value = OrderSide> {
    prop_oneof![Just(OrderSide::Buy), Just(OrderSide::Sell)]
}

fn arb_fill() -> impl Strategy<Value = (OrderSide, u64, f64)> {
    (arb_side(), 1u64..500, arb_price())
}

fn arb_matching() -> impl Strategy<Value = MatchingConfig> {
    (0.01..=1.0_f64, 0.0..=1.0_f64, 0.0..100.0_f64, 0.0..0.05_f64).prop_map(
        |(fill_rate, cancel_probability, slippage_bps, commission_per_share)| MatchingConfig {
            fill_rate,
            cancel_probability,
            slippage_bps,
            commission_per_share,
        },
    )
}

fn to_fills(raw: &[(OrderSide, u64, f64)]) -> Vec<Fill> {
    raw.iter()
        .enumerate()
        .map(|(i, &(side, quantity, price))| Fill {
            order_id: OrderId(i as u64 + 1),
            symbol: "SPY".into(),
            side,
            quantity,
            price,
            timestamp: ts(i as i64),
            partial: false,
            commission: 0.01 * quantity as f64,
        })
        .collect()
}

// ── 1. Fill bounds ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn fill_never_exceeds_order_or_liquidity(
        config in arb_matching(),
        seed in any::<u64>(),
        qty in 1u64..10_000,
        price in arb_price(),
        volume in 0.0..20_000.0_f64,
        side in arb_side(),
    ) {
        let mut engine = MatchingEngine::seeded(config, seed).unwrap();
        let mut order = Order::market(OrderId(1), "SPY", side, qty, ts(0));
        match engine.execute(&mut order, price, volume, ts(0)) {
            Some(fill) => {
                prop_assert!(fill.quantity > 0);
                prop_assert!(fill.quantity <= qty);
                prop_assert!(fill.quantity as f64 <= (volume * config.fill_rate).floor());
                prop_assert_eq!(fill.partial, fill.quantity < qty);
                let expected_status = if fill.partial {
                    OrderStatus::PartiallyFilled
                } else {
                    OrderStatus::Filled
                };
                prop_assert_eq!(order.status, expected_status);
                // Slippage is always adverse
                match side {
                    OrderSide::Buy => prop_assert!(fill.price >= price),
                    OrderSide::Sell => prop_assert!(fill.price <= price),
                }
            }
            None => prop_assert!(matches!(
                order.status,
                OrderStatus::Cancelled | OrderStatus::Open
            )),
        }
    }
}

// ── 2-4. Ledger invariants ───────────────────────────────────────────

proptest! {
    #[test]
    fn position_equals_signed_fill_sum(raw in prop::collection::vec(arb_fill(), 1..40)) {
        let mut ledger = PortfolioLedger::new(100_000.0);
        let mut expected = 0i64;
        for fill in to_fills(&raw) {
            ledger.apply_fill(&fill).unwrap();
            expected += fill.signed_quantity();
            prop_assert_eq!(ledger.quantity("SPY"), expected);
        }
    }

    #[test]
    fn pnl_decomposes_equity(
        raw in prop::collection::vec(arb_fill(), 1..40),
        mark in arb_price(),
    ) {
        let mut ledger = PortfolioLedger::new(100_000.0);
        for fill in to_fills(&raw) {
            ledger.apply_fill(&fill).unwrap();
            let equity = ledger.equity(|_| Some(mark)).unwrap();
            let unrealized = ledger.unrealized_pnl(|_| Some(mark)).unwrap();
            let lhs = equity - ledger.initial_cash() + ledger.total_commission();
            let rhs = ledger.realized_pnl() + unrealized;
            let tol = 1e-6 * (1.0 + lhs.abs());
            prop_assert!((lhs - rhs).abs() < tol, "lhs={} rhs={}", lhs, rhs);
        }
    }

    #[test]
    fn avg_cost_bounded_by_fill_prices(raw in prop::collection::vec(arb_fill(), 1..40)) {
        let mut ledger = PortfolioLedger::new(100_000.0);
        let lo = raw.iter().map(|f| f.2).fold(f64::INFINITY, f64::min);
        let hi = raw.iter().map(|f| f.2).fold(f64::NEG_INFINITY, f64::max);
        for fill in to_fills(&raw) {
            ledger.apply_fill(&fill).unwrap();
            let pos = ledger.position("SPY").unwrap();
            if pos.is_flat() {
                prop_assert_eq!(pos.avg_cost, 0.0);
            } else {
                prop_assert!(pos.avg_cost >= lo - 1e-9 && pos.avg_cost <= hi + 1e-9);
            }
        }
    }
}

// ── 5. Loop shape ────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn loop_emits_one_equity_point_per_tick(
        prices in prop::collection::vec(arb_price(), 1..120),
        config in arb_matching(),
        seed in any::<u64>(),
    ) {
        let ticks: Vec<Tick> = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Tick::new(ts(i as i64)).with_bar("SPY", p, 250.0))
            .collect();
        let engine_config = EngineConfig::new(vec!["SPY".into()], 100, 50_000.0)
            .with_matching(config)
            .with_seed(seed);
        let strategy = StrategyConfig::MeanReversion { window: 5, z_threshold: 0.5 }
            .build("SPY", 50)
            .unwrap();
        let out = run_backtest(engine_config, ticks, strategy).unwrap();

        prop_assert_eq!(out.equity_curve.len(), prices.len());
        prop_assert!(out.trades.len() <= out.orders.len());
        let filled = out
            .orders
            .iter()
            .filter(|o| matches!(o.status, OrderStatus::Filled | OrderStatus::PartiallyFilled))
            .count();
        prop_assert_eq!(filled, out.trades.len());
        for pair in out.equity_curve.windows(2) {
            prop_assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }
}

// ── 6. PnL replay ────────────────────────────────────────────────────

fn arb_symbol() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("SPY"), Just("QQQ")]
}

proptest! {
    #[test]
    fn fill_returns_replay_to_realized_pnl(
        raw in prop::collection::vec((arb_symbol(), arb_fill()), 1..60),
    ) {
        let mut ledger = PortfolioLedger::new(100_000.0);
        let mut replayed = 0.0;
        for (i, (symbol, (side, quantity, price))) in raw.into_iter().enumerate() {
            let fill = Fill {
                order_id: OrderId(i as u64 + 1),
                symbol: symbol.into(),
                side,
                quantity,
                price,
                timestamp: ts(i as i64),
                partial: false,
                commission: 0.0,
            };
            replayed += ledger.apply_fill(&fill).unwrap();
        }
        let by_position: f64 = ledger.positions().values().map(|p| p.realized_pnl).sum();
        let tol = 1e-6 * (1.0 + replayed.abs());
        prop_assert!((replayed - ledger.realized_pnl()).abs() < tol);
        prop_assert!((by_position - ledger.realized_pnl()).abs() < tol);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn trade_records_replay_to_run_realized_pnl(
        prices in prop::collection::vec(arb_price(), 1..120),
        config in arb_matching(),
        seed in any::<u64>(),
    ) {
        let ticks: Vec<Tick> = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Tick::new(ts(i as i64)).with_bar("SPY", p, 250.0))
            .collect();
        let engine_config = EngineConfig::new(vec!["SPY".into()], 100, 50_000.0)
            .with_matching(config)
            .with_seed(seed);
        let strategy = StrategyConfig::Cycle.build("SPY", 50).unwrap();
        let out = run_backtest(engine_config, ticks, strategy).unwrap();

        let from_trades: f64 = out.trades.iter().map(|t| t.realized_pnl).sum();
        let from_positions: f64 = out.positions.iter().map(|p| p.realized_pnl).sum();
        let tol = 1e-6 * (1.0 + out.realized_pnl.abs());
        prop_assert!((from_trades - out.realized_pnl).abs() < tol);
        prop_assert!((from_positions - out.realized_pnl).abs() < tol);
    }
}
