//! Ticktape Core: matching, ledger, strategies and the backtest loop.
//!
//! This crate contains the accounting kernel:
//! - Domain types (ticks, orders, fills, positions, trade records)
//! - Matching engine with cancellation, liquidity and slippage
//! - Portfolio ledger with average-cost PnL
//! - Rolling price windows and signal strategies
//! - Tick-by-tick backtest loop

pub mod domain;
pub mod engine;
pub mod execution;
pub mod ledger;
pub mod rng;
pub mod strategy;
pub mod window;

pub use engine::{run_backtest, BacktestError, BacktestLoop, EngineConfig, RunOutput};
pub use execution::{MatchingConfig, MatchingEngine};
pub use ledger::PortfolioLedger;
pub use strategy::{Signal, Strategy, StrategyConfig};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared with worker threads are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Tick>();
        require_sync::<domain::Tick>();
        require_send::<domain::Order>();
        require_sync::<domain::Order>();
        require_send::<domain::Fill>();
        require_sync::<domain::Fill>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::TradeRecord>();
        require_sync::<domain::TradeRecord>();

        require_send::<PortfolioLedger>();
        require_sync::<PortfolioLedger>();
        require_send::<MatchingEngine>();
        require_sync::<MatchingEngine>();
        require_send::<Box<dyn Strategy>>();
        require_sync::<Box<dyn Strategy>>();
        require_send::<StrategyConfig>();
        require_sync::<StrategyConfig>();

        require_send::<EngineConfig>();
        require_sync::<EngineConfig>();
        require_send::<RunOutput>();
        require_sync::<RunOutput>();
        require_send::<BacktestLoop<std::vec::IntoIter<domain::Tick>>>();

        require_send::<rng::SeedTree>();
        require_sync::<rng::SeedTree>();
    }

    /// Strategies see only their own window: `compute_signal` takes no
    /// ledger or portfolio argument.
    #[test]
    fn strategy_trait_has_no_portfolio_parameter() {
        fn _check_trait_object(
            s: &mut dyn Strategy,
        ) -> Result<Option<Signal>, strategy::StrategyError> {
            s.compute_signal()
        }
    }
}
