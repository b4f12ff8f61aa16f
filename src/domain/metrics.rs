//! Performance metrics over a closed-trade log and an equity trace.
//!
//! All functions here are pure. Ratios whose denominator is zero are 0; the
//! one exception is a profit factor with wins and no losses, which is
//! `f64::INFINITY`.

use chrono::Datelike;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::warn;

use super::candle::Timeframe;
use super::pattern::PatternType;
use super::portfolio::EquityPoint;
use super::position::Trade;

/// Below this many trades the statistics are flagged as unreliable.
pub const MIN_RELIABLE_TRADES: usize = 30;

pub const CONFIDENCE_BRACKETS: [(f64, f64); 4] = [(0.6, 0.7), (0.7, 0.8), (0.8, 0.9), (0.9, 1.0)];

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    #[serde(with = "unbounded")]
    pub profit_factor: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub final_equity: f64,
    pub total_fees: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub average_holding_bars: f64,
    pub low_sample_size: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternPerformance {
    pub name: String,
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    pub trades: usize,
    pub win_rate: f64,
    pub average_return: f64,
    #[serde(with = "unbounded")]
    pub profit_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceBracket {
    pub bracket: String,
    pub trades: usize,
    pub win_rate: f64,
    pub average_return: f64,
    #[serde(with = "unbounded")]
    pub profit_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturn {
    pub month: String,
    #[serde(rename = "return")]
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeAnalysis {
    pub best_month: Option<MonthlyReturn>,
    pub worst_month: Option<MonthlyReturn>,
    pub monthly_returns: Vec<MonthlyReturn>,
}

/// Infinite ratios travel as JSON `null`.
mod unbounded {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            s.serialize_f64(*value)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
    }
}

/// Aggregate output of one metrics pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub summary: Summary,
    pub pattern_performance: Vec<PatternPerformance>,
    pub confidence_performance: Vec<ConfidenceBracket>,
    pub time_analysis: TimeAnalysis,
}

pub fn analyze(
    trades: &[Trade],
    equity: &[EquityPoint],
    initial_capital: f64,
    timeframe: Timeframe,
) -> Analysis {
    let summary = summarize(trades, equity, initial_capital, timeframe);
    if summary.low_sample_size {
        warn!(
            trades = summary.total_trades,
            minimum = MIN_RELIABLE_TRADES,
            "Insufficient trades for reliable statistics"
        );
    }
    Analysis {
        summary,
        pattern_performance: pattern_performance(trades),
        confidence_performance: confidence_performance(trades),
        time_analysis: time_analysis(equity, initial_capital),
    }
}

pub fn summarize(
    trades: &[Trade],
    equity: &[EquityPoint],
    initial_capital: f64,
    timeframe: Timeframe,
) -> Summary {
    let final_equity = equity.last().map(|p| p.value).unwrap_or(initial_capital);
    let total_return = if initial_capital > 0.0 {
        (final_equity - initial_capital) / initial_capital
    } else {
        0.0
    };
    let annualized_return = annualize(total_return, equity);
    let max_drawdown = equity
        .iter()
        .map(|p| p.drawdown)
        .fold(0.0_f64, f64::min);
    let (sharpe_ratio, sortino_ratio) = risk_adjusted(equity, timeframe.periods_per_year());
    let calmar_ratio = if max_drawdown < 0.0 {
        annualized_return / max_drawdown.abs()
    } else {
        0.0
    };

    let stats = TradeStats::from_trades(trades.iter());
    let total_trades = trades.len();
    let mut largest_win = 0.0_f64;
    let mut largest_loss = 0.0_f64;
    let mut total_fees = 0.0;
    let mut holding = 0usize;
    for trade in trades {
        if trade.is_win() {
            largest_win = largest_win.max(trade.pnl);
        } else if trade.is_loss() {
            largest_loss = largest_loss.max(trade.pnl.abs());
        }
        total_fees += trade.fees;
        holding += trade.holding_bars;
    }

    Summary {
        total_trades,
        winning_trades: stats.wins,
        losing_trades: stats.losses,
        win_rate: stats.win_rate(),
        profit_factor: stats.profit_factor(),
        total_return,
        annualized_return,
        max_drawdown,
        sharpe_ratio,
        sortino_ratio,
        calmar_ratio,
        final_equity,
        total_fees,
        average_win: ratio(stats.gross_profit, stats.wins as f64),
        average_loss: ratio(stats.gross_loss, stats.losses as f64),
        largest_win,
        largest_loss,
        average_holding_bars: ratio(holding as f64, total_trades as f64),
        low_sample_size: total_trades < MIN_RELIABLE_TRADES,
    }
}

/// Shared win/loss tally. Break-even trades count toward the total only.
#[derive(Debug, Default)]
struct TradeStats {
    count: usize,
    wins: usize,
    losses: usize,
    gross_profit: f64,
    gross_loss: f64,
    return_sum: f64,
}

impl TradeStats {
    fn from_trades<'a>(trades: impl Iterator<Item = &'a Trade>) -> Self {
        let mut stats = TradeStats::default();
        for trade in trades {
            stats.count += 1;
            stats.return_sum += trade.pnl_percentage;
            if trade.is_win() {
                stats.wins += 1;
                stats.gross_profit += trade.pnl;
            } else if trade.is_loss() {
                stats.losses += 1;
                stats.gross_loss += trade.pnl.abs();
            }
        }
        stats
    }

    fn win_rate(&self) -> f64 {
        ratio(self.wins as f64, self.count as f64)
    }

    fn average_return(&self) -> f64 {
        ratio(self.return_sum, self.count as f64)
    }

    fn profit_factor(&self) -> f64 {
        if self.gross_loss > 0.0 {
            self.gross_profit / self.gross_loss
        } else if self.gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator != 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// (1 + total_return)^(365 / days) - 1, days measured across the equity trace.
fn annualize(total_return: f64, equity: &[EquityPoint]) -> f64 {
    let (Some(first), Some(last)) = (equity.first(), equity.last()) else {
        return 0.0;
    };
    let days = (last.timestamp - first.timestamp).num_seconds() as f64 / SECONDS_PER_DAY;
    if days <= 0.0 || !total_return.is_finite() {
        return 0.0;
    }
    if total_return <= -1.0 {
        return -1.0;
    }
    (1.0 + total_return).powf(365.0 / days) - 1.0
}

fn period_returns(equity: &[EquityPoint]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| ratio(w[1].value - w[0].value, w[0].value))
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    ratio(values.iter().sum(), values.len() as f64)
}

fn stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Sharpe uses the stddev of all period returns; Sortino the stddev of the
/// negative returns only. Both are annualized by sqrt(periods per year).
fn risk_adjusted(equity: &[EquityPoint], periods_per_year: f64) -> (f64, f64) {
    let returns = period_returns(equity);
    if returns.is_empty() {
        return (0.0, 0.0);
    }
    let avg = mean(&returns);
    let scale = periods_per_year.sqrt();

    let sharpe = ratio(avg, stddev(&returns)) * scale;

    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    let sortino = ratio(avg, stddev(&downside)) * scale;

    (sharpe, sortino)
}

pub fn pattern_performance(trades: &[Trade]) -> Vec<PatternPerformance> {
    let mut groups: BTreeMap<(String, PatternType), Vec<&Trade>> = BTreeMap::new();
    for trade in trades {
        groups
            .entry((trade.pattern.name.clone(), trade.pattern.pattern_type))
            .or_default()
            .push(trade);
    }

    groups
        .into_iter()
        .map(|((name, pattern_type), group)| {
            let stats = TradeStats::from_trades(group.into_iter());
            PatternPerformance {
                name,
                pattern_type,
                trades: stats.count,
                win_rate: stats.win_rate(),
                average_return: stats.average_return(),
                profit_factor: stats.profit_factor(),
            }
        })
        .collect()
}

/// Upper bound is exclusive except for the last bracket, which includes 1.0.
pub fn confidence_performance(trades: &[Trade]) -> Vec<ConfidenceBracket> {
    let last = CONFIDENCE_BRACKETS.len() - 1;
    CONFIDENCE_BRACKETS
        .iter()
        .enumerate()
        .filter_map(|(i, &(low, high))| {
            let in_bracket = |t: &&Trade| {
                let c = t.pattern.confidence;
                c >= low && (c < high || (i == last && c <= high))
            };
            let stats = TradeStats::from_trades(trades.iter().filter(in_bracket));
            if stats.count == 0 {
                return None;
            }
            Some(ConfidenceBracket {
                bracket: format!("{low:.1}-{high:.1}"),
                trades: stats.count,
                win_rate: stats.win_rate(),
                average_return: stats.average_return(),
                profit_factor: stats.profit_factor(),
            })
        })
        .collect()
}

/// Monthly returns from month-end equity, chained from the initial capital.
pub fn time_analysis(equity: &[EquityPoint], initial_capital: f64) -> TimeAnalysis {
    let mut month_end: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for point in equity {
        let key = (point.timestamp.year(), point.timestamp.month());
        month_end.insert(key, point.value);
    }

    let mut base = initial_capital;
    let mut monthly_returns = Vec::with_capacity(month_end.len());
    for ((year, month), value) in month_end {
        monthly_returns.push(MonthlyReturn {
            month: format!("{year:04}-{month:02}"),
            value: ratio(value - base, base),
        });
        base = value;
    }

    let mut best_month: Option<&MonthlyReturn> = None;
    let mut worst_month: Option<&MonthlyReturn> = None;
    for m in &monthly_returns {
        if best_month.is_none_or(|b| m.value > b.value) {
            best_month = Some(m);
        }
        if worst_month.is_none_or(|w| m.value < w.value) {
            worst_month = Some(m);
        }
    }

    TimeAnalysis {
        best_month: best_month.cloned(),
        worst_month: worst_month.cloned(),
        monthly_returns,
    }
}
