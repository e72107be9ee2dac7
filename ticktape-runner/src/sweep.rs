//! Seed sweeps: the same configuration and feed under many matching seeds.
//!
//! Each run gets a seed derived from the master seed and its index, so the
//! set of runs is reproducible regardless of thread count or scheduling.

use rayon::prelude::*;
use serde::Serialize;
use ticktape_core::domain::Tick;
use ticktape_core::rng::SeedTree;
use tracing::info;

use crate::config::RunConfig;
use crate::metrics::{mean_f64, std_dev};
use crate::runner::{run_ticks, BacktestResult, RunError};

/// Seed sweep parameters.
#[derive(Debug, Clone)]
pub struct SeedSweep {
    runs: usize,
    master_seed: u64,
    parallel: bool,
}

impl SeedSweep {
    pub fn new(runs: usize, master_seed: u64) -> Self {
        Self {
            runs,
            master_seed,
            parallel: true,
        }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Seeds for each run, in run order.
    pub fn seeds(&self) -> Vec<u64> {
        let tree = SeedTree::new(self.master_seed);
        (0..self.runs as u64)
            .map(|i| tree.sub_seed("matching", i))
            .collect()
    }

    /// Run `base` once per seed over `ticks`.
    ///
    /// Fails on the first run that errors; results are in seed order.
    pub fn run(&self, base: &RunConfig, ticks: &[Tick]) -> Result<SweepResults, RunError> {
        base.validate()?;
        let configs: Vec<RunConfig> = self
            .seeds()
            .into_iter()
            .map(|seed| RunConfig {
                seed,
                ..base.clone()
            })
            .collect();

        info!(
            runs = configs.len(),
            master_seed = self.master_seed,
            parallel = self.parallel,
            "starting seed sweep"
        );

        let run_one = |config: &RunConfig| run_ticks(config, ticks.iter().cloned());
        let results: Vec<BacktestResult> = if self.parallel {
            configs
                .par_iter()
                .map(run_one)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            configs
                .iter()
                .map(run_one)
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(SweepResults { results })
    }
}

/// Distribution of one statistic across sweep runs, NaN runs excluded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Distribution {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl Distribution {
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return Self {
                count: 0,
                mean: f64::NAN,
                std: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
            };
        }
        Self {
            count: finite.len(),
            mean: mean_f64(&finite),
            std: std_dev(&finite),
            min: finite.iter().copied().fold(f64::INFINITY, f64::min),
            max: finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Results from a seed sweep.
#[derive(Debug)]
pub struct SweepResults {
    results: Vec<BacktestResult>,
}

impl SweepResults {
    /// Returns all results as a slice.
    pub fn all(&self) -> &[BacktestResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn final_equity(&self) -> Distribution {
        Distribution::from_values(self.results.iter().map(|r| r.metrics.final_equity))
    }

    pub fn total_return_pct(&self) -> Distribution {
        Distribution::from_values(self.results.iter().map(|r| r.metrics.total_return_pct))
    }

    pub fn sharpe(&self) -> Distribution {
        Distribution::from_values(self.results.iter().map(|r| r.metrics.sharpe))
    }

    pub fn max_drawdown_pct(&self) -> Distribution {
        Distribution::from_values(self.results.iter().map(|r| r.metrics.max_drawdown_pct))
    }

    /// Results sorted by final equity (descending); runs without equity last.
    pub fn sorted_by_final_equity(&self) -> Vec<&BacktestResult> {
        let mut sorted: Vec<_> = self.results.iter().collect();
        sorted.sort_by(|a, b| {
            let key = |r: &BacktestResult| {
                let e = r.metrics.final_equity;
                if e.is_finite() {
                    e
                } else {
                    f64::NEG_INFINITY
                }
            };
            key(b).total_cmp(&key(a))
        });
        sorted
    }

    pub fn best(&self) -> Option<&BacktestResult> {
        self.sorted_by_final_equity().into_iter().next()
    }
}
