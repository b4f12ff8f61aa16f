//! Backtest configuration and result entity.
//!
//! `BacktestConfig` is immutable for the lifetime of one run. `BacktestResult`
//! is owned by the orchestrator and moves `running → completed | failed`
//! exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::candle::Timeframe;
use super::metrics::{ConfidenceBracket, PatternPerformance, Summary, TimeAnalysis};
use super::pattern::PatternFilter;
use super::portfolio::{EquityPoint, SkippedSignal};
use super::position::Trade;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub patterns: Vec<PatternFilter>,
    pub trading_params: TradingParams,
    pub fees: Fees,
    /// Missing bars tolerated between consecutive candles.
    #[serde(default)]
    pub max_gap_bars: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingParams {
    pub initial_capital: f64,
    /// Fraction of current equity committed per position, in (0, 1].
    pub position_size: f64,
    /// Fractional distance below entry, e.g. 0.02 for 2%.
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub max_open_positions: usize,
    pub trailing_stop: TrailingStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrailingStop {
    pub enabled: bool,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fees {
    pub maker: f64,
    pub taker: f64,
    pub slippage: f64,
}

impl Default for Fees {
    fn default() -> Self {
        Fees {
            maker: 0.001,
            taker: 0.001,
            slippage: 0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BacktestStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub message: String,
    /// Error source chain, outermost first.
    pub trace: Vec<String>,
}

impl RunError {
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut trace = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push(cause.to_string());
            source = cause.source();
        }
        RunError {
            message: err.to_string(),
            trace,
        }
    }
}

/// Everything a finished simulation hands to the result.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub summary: Summary,
    pub equity: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub pattern_performance: Vec<PatternPerformance>,
    pub confidence_performance: Vec<ConfidenceBracket>,
    pub time_analysis: TimeAnalysis,
    pub skipped_signals: Vec<SkippedSignal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub id: Uuid,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub status: BacktestStatus,
    pub summary: Option<Summary>,
    pub equity: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub pattern_performance: Vec<PatternPerformance>,
    pub confidence_performance: Vec<ConfidenceBracket>,
    pub time_analysis: Option<TimeAnalysis>,
    pub skipped_signals: Vec<SkippedSignal>,
    pub error: Option<RunError>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BacktestResult {
    pub fn running(config: &BacktestConfig) -> Self {
        BacktestResult {
            id: Uuid::new_v4(),
            symbol: config.symbol.clone(),
            timeframe: config.timeframe,
            status: BacktestStatus::Running,
            summary: None,
            equity: Vec::new(),
            trades: Vec::new(),
            pattern_performance: Vec::new(),
            confidence_performance: Vec::new(),
            time_analysis: None,
            skipped_signals: Vec::new(),
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != BacktestStatus::Running
    }

    /// Returns false if the result already left `running`.
    pub fn complete(&mut self, outcome: RunOutcome) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.summary = Some(outcome.summary);
        self.equity = outcome.equity;
        self.trades = outcome.trades;
        self.pattern_performance = outcome.pattern_performance;
        self.confidence_performance = outcome.confidence_performance;
        self.time_analysis = Some(outcome.time_analysis);
        self.skipped_signals = outcome.skipped_signals;
        self.status = BacktestStatus::Completed;
        self.completed_at = Some(Utc::now());
        true
    }

    /// Failed runs keep no partial results.
    pub fn fail(&mut self, error: RunError) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.summary = None;
        self.equity.clear();
        self.trades.clear();
        self.pattern_performance.clear();
        self.confidence_performance.clear();
        self.time_analysis = None;
        self.status = BacktestStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
        true
    }
}
