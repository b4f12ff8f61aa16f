//! Plain-text performance report implementing ReportPort.

use std::fmt::Write;

use crate::domain::backtest::{BacktestConfig, BacktestResult, BacktestStatus};
use crate::domain::metrics::{MIN_RELIABLE_TRADES, Summary};
use crate::ports::report_port::ReportPort;

/// Patterns with fewer than `min_pattern_trades` trades are counted but not
/// listed.
pub struct TextReportAdapter {
    min_pattern_trades: usize,
}

impl TextReportAdapter {
    pub fn new() -> Self {
        Self {
            min_pattern_trades: MIN_RELIABLE_TRADES,
        }
    }

    pub fn with_min_pattern_trades(min_pattern_trades: usize) -> Self {
        Self { min_pattern_trades }
    }
}

impl Default for TextReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn factor(value: f64) -> String {
    if value.is_infinite() {
        "inf".to_string()
    } else {
        format!("{:.2}", value)
    }
}

fn write_summary(out: &mut String, s: &Summary) {
    let rows: [(&str, String); 18] = [
        ("Total trades", s.total_trades.to_string()),
        ("Winning trades", s.winning_trades.to_string()),
        ("Losing trades", s.losing_trades.to_string()),
        ("Win rate", pct(s.win_rate)),
        ("Profit factor", factor(s.profit_factor)),
        ("Total return", pct(s.total_return)),
        ("Annualized return", pct(s.annualized_return)),
        ("Max drawdown", pct(s.max_drawdown)),
        ("Sharpe ratio", format!("{:.2}", s.sharpe_ratio)),
        ("Sortino ratio", format!("{:.2}", s.sortino_ratio)),
        ("Calmar ratio", format!("{:.2}", s.calmar_ratio)),
        ("Final equity", format!("{:.2}", s.final_equity)),
        ("Total fees", format!("{:.2}", s.total_fees)),
        ("Average win", format!("{:.2}", s.average_win)),
        ("Average loss", format!("{:.2}", s.average_loss)),
        ("Largest win", format!("{:.2}", s.largest_win)),
        ("Largest loss", format!("{:.2}", s.largest_loss)),
        ("Avg holding bars", format!("{:.1}", s.average_holding_bars)),
    ];
    for (label, value) in rows {
        let _ = writeln!(out, "  {:<20}{:>14}", label, value);
    }
    if s.low_sample_size {
        let _ = writeln!(
            out,
            "  note: fewer than {} trades, statistics are not reliable",
            MIN_RELIABLE_TRADES
        );
    }
}

impl ReportPort for TextReportAdapter {
    fn render(&self, result: &BacktestResult, config: &BacktestConfig) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Backtest {}", result.id);
        let _ = writeln!(
            out,
            "{} {}  {} .. {}",
            result.symbol,
            result.timeframe,
            config.start_date.format("%Y-%m-%d"),
            config.end_date.format("%Y-%m-%d")
        );
        let filters: Vec<String> = config
            .patterns
            .iter()
            .map(|p| format!("{}:{}:{}", p.name, p.pattern_type, p.min_confidence))
            .collect();
        let _ = writeln!(out, "Patterns: {}", filters.join(", "));
        let _ = writeln!(out, "Status: {:?}", result.status);

        if result.status == BacktestStatus::Failed {
            if let Some(err) = &result.error {
                let _ = writeln!(out, "Error: {}", err.message);
            }
            return out;
        }

        if let Some(summary) = &result.summary {
            let _ = writeln!(out, "\nOverall");
            write_summary(&mut out, summary);
        }

        if !result.pattern_performance.is_empty() {
            let _ = writeln!(out, "\nBy pattern");
            let mut hidden = 0;
            for p in &result.pattern_performance {
                if p.trades < self.min_pattern_trades {
                    hidden += 1;
                    continue;
                }
                let _ = writeln!(
                    out,
                    "  {:<16}{:<9}{:>6} trades  win {:>8}  avg {:>8}  pf {:>6}",
                    p.name,
                    p.pattern_type.to_string(),
                    p.trades,
                    pct(p.win_rate),
                    pct(p.average_return),
                    factor(p.profit_factor)
                );
            }
            if hidden > 0 {
                let _ = writeln!(
                    out,
                    "  ({} pattern(s) with fewer than {} trades omitted)",
                    hidden, self.min_pattern_trades
                );
            }
        }

        if !result.confidence_performance.is_empty() {
            let _ = writeln!(out, "\nBy confidence");
            for b in &result.confidence_performance {
                let _ = writeln!(
                    out,
                    "  {:<10}{:>6} trades  win {:>8}  avg {:>8}  pf {:>6}",
                    b.bracket,
                    b.trades,
                    pct(b.win_rate),
                    pct(b.average_return),
                    factor(b.profit_factor)
                );
            }
        }

        if let Some(time) = &result.time_analysis {
            if let (Some(best), Some(worst)) = (&time.best_month, &time.worst_month) {
                let _ = writeln!(out, "\nMonths");
                let _ = writeln!(out, "  Best  {} {:>10}", best.month, pct(best.value));
                let _ = writeln!(out, "  Worst {} {:>10}", worst.month, pct(worst.value));
            }
        }

        if !result.skipped_signals.is_empty() {
            let _ = writeln!(out, "\nSkipped signals: {}", result.skipped_signals.len());
        }
        out
    }
}
