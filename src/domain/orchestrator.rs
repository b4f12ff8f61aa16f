//! Backtest Orchestrator.
//!
//! Owns the `BacktestResult` for one run and drives its single
//! `running → completed | failed` transition. Configuration errors are
//! returned before a result exists; everything that goes wrong afterwards is
//! recorded on the result.

use rayon::prelude::*;
use tracing::{error, info};

use super::backtest::{BacktestConfig, BacktestResult, RunError, RunOutcome};
use super::clock::{CancelToken, Replay, replay};
use super::config_validation::validate_config;
use super::error::CandlescopeError;
use super::metrics::analyze;
use crate::ports::candle_port::CandlePort;
use crate::ports::pattern_port::PatternPort;
use crate::ports::result_store::ResultStore;

pub struct Orchestrator<'a> {
    candles: &'a dyn CandlePort,
    patterns: &'a dyn PatternPort,
    results: &'a dyn ResultStore,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        candles: &'a dyn CandlePort,
        patterns: &'a dyn PatternPort,
        results: &'a dyn ResultStore,
    ) -> Self {
        Self {
            candles,
            patterns,
            results,
        }
    }

    pub fn run(&self, config: &BacktestConfig) -> Result<BacktestResult, CandlescopeError> {
        self.run_with_cancel(config, &CancelToken::new())
    }

    /// Err is returned for configuration and persistence failures only.
    pub fn run_with_cancel(
        &self,
        config: &BacktestConfig,
        cancel: &CancelToken,
    ) -> Result<BacktestResult, CandlescopeError> {
        validate_config(config)?;

        let mut result = BacktestResult::running(config);
        info!(
            id = %result.id,
            symbol = %config.symbol,
            timeframe = %config.timeframe,
            "Backtest started"
        );
        self.results.save(&result)?;

        match self.simulate(config, cancel) {
            Ok(outcome) => {
                result.complete(outcome);
                if let Some(summary) = &result.summary {
                    info!(
                        id = %result.id,
                        trades = summary.total_trades,
                        total_return = summary.total_return,
                        final_equity = summary.final_equity,
                        "Backtest completed"
                    );
                }
            }
            Err(err) => {
                error!(id = %result.id, error = %err, "Backtest failed");
                result.fail(RunError::from_error(&err));
            }
        }

        self.results.save(&result)?;
        Ok(result)
    }

    /// Independent runs in parallel. Output order matches `configs`.
    pub fn run_all(
        &self,
        configs: &[BacktestConfig],
    ) -> Vec<Result<BacktestResult, CandlescopeError>> {
        configs.par_iter().map(|config| self.run(config)).collect()
    }

    fn simulate(
        &self,
        config: &BacktestConfig,
        cancel: &CancelToken,
    ) -> Result<RunOutcome, CandlescopeError> {
        let candles = self.candles.get_candles(
            &config.symbol,
            config.timeframe,
            config.start_date,
            config.end_date,
        )?;
        let patterns = self.patterns.get_pattern_signals(
            &config.symbol,
            config.timeframe,
            config.start_date,
            config.end_date,
        )?;

        let Replay { manager, equity } = replay(config, &candles, &patterns, cancel)?;
        let equity = equity.into_points();
        let (trades, skipped_signals) = manager.into_parts();
        let analysis = analyze(
            &trades,
            &equity,
            config.trading_params.initial_capital,
            config.timeframe,
        );

        Ok(RunOutcome {
            summary: analysis.summary,
            equity,
            trades,
            pattern_performance: analysis.pattern_performance,
            confidence_performance: analysis.confidence_performance,
            time_analysis: analysis.time_analysis,
            skipped_signals,
        })
    }
}
