//! Fill simulation: slippage, taker fees, protective price levels, and the
//! per-candle exit check.
//!
//! All positions are long. Slippage always worsens the fill: entries fill
//! higher, exits fill lower.

use super::backtest::{Fees, TradingParams, TrailingStop};
use super::candle::Candle;
use super::position::{ExitType, Position};

/// Taker fee on a fill: taker * price * size.
pub fn taker_fee(price: f64, size: f64, fees: &Fees) -> f64 {
    fees.taker * price * size
}

/// Long entry (buy): price * (1 + slippage)
pub fn apply_slippage_entry(market_price: f64, slippage: f64) -> f64 {
    market_price * (1.0 + slippage)
}

/// Long exit (sell): price * (1 - slippage)
pub fn apply_slippage_exit(market_price: f64, slippage: f64) -> f64 {
    market_price * (1.0 - slippage)
}

/// Protective levels derived from the entry fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtectiveLevels {
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub trailing_stop: Option<f64>,
}

pub fn protective_levels(entry_price: f64, params: &TradingParams) -> ProtectiveLevels {
    let stop_loss = params
        .stop_loss
        .filter(|&pct| pct > 0.0)
        .map(|pct| entry_price * (1.0 - pct));
    let take_profit = params
        .take_profit
        .filter(|&pct| pct > 0.0)
        .map(|pct| entry_price * (1.0 + pct));
    let trailing_stop = trailing_level(entry_price, &params.trailing_stop);

    ProtectiveLevels {
        stop_loss,
        take_profit,
        trailing_stop,
    }
}

fn trailing_level(reference: f64, trailing: &TrailingStop) -> Option<f64> {
    if trailing.enabled && trailing.percentage > 0.0 {
        Some(reference * (1.0 - trailing.percentage))
    } else {
        None
    }
}

/// Move the trailing stop up to `high * (1 - pct)` if that is higher.
/// Never moves it down.
pub fn ratchet_trailing_stop(current: Option<f64>, high: f64, trailing: &TrailingStop) -> Option<f64> {
    let candidate = trailing_level(high, trailing)?;
    match current {
        Some(stop) if stop >= candidate => Some(stop),
        _ => Some(candidate),
    }
}

/// Exit triggered inside a candle, at the threshold price before slippage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitSignal {
    pub exit_type: ExitType,
    pub threshold: f64,
}

/// Priority: stop-loss (fixed or trailing) first, then take-profit.
/// Stops are tested against the bar low, targets against the bar high.
pub fn check_exit(position: &Position, candle: &Candle) -> Option<ExitSignal> {
    if let Some(threshold) = position.should_stop_loss(candle.low) {
        return Some(ExitSignal {
            exit_type: ExitType::Sl,
            threshold,
        });
    }
    if let Some(threshold) = position.should_take_profit(candle.high) {
        return Some(ExitSignal {
            exit_type: ExitType::Tp,
            threshold,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pattern::PatternType;
    use crate::domain::position::{PositionId, TradePattern};
    use chrono::{TimeZone, Utc};

    fn params() -> TradingParams {
        TradingParams {
            initial_capital: 10_000.0,
            position_size: 0.1,
            stop_loss: Some(0.02),
            take_profit: Some(0.04),
            max_open_positions: 1,
            trailing_stop: TrailingStop::default(),
        }
    }

    fn position(levels: ProtectiveLevels) -> Position {
        Position {
            id: PositionId(0),
            entry_price: 100.0,
            entry_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            entry_bar: 0,
            size: 10.0,
            entry_fee: 0.0,
            stop_loss_price: levels.stop_loss,
            take_profit_price: levels.take_profit,
            trailing_stop_price: levels.trailing_stop,
            pattern: TradePattern {
                name: "DOJI".into(),
                pattern_type: PatternType::Bullish,
                confidence: 0.7,
            },
        }
    }

    fn candle(high: f64, low: f64) -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
            open: 100.0,
            high,
            low,
            close: 100.0,
            volume: 1.0,
        }
    }

    #[test]
    fn taker_fee_basic() {
        let fees = Fees {
            maker: 0.0,
            taker: 0.001,
            slippage: 0.0,
        };
        assert!((taker_fee(100.0, 10.0, &fees) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn slippage_is_adverse() {
        assert!((apply_slippage_entry(100.0, 0.001) - 100.1).abs() < 1e-9);
        assert!((apply_slippage_exit(100.0, 0.001) - 99.9).abs() < 1e-9);
        assert!((apply_slippage_exit(100.0, 0.0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn protective_levels_from_fractions() {
        let levels = protective_levels(100.0, &params());
        assert!((levels.stop_loss.unwrap() - 98.0).abs() < 1e-9);
        assert!((levels.take_profit.unwrap() - 104.0).abs() < 1e-9);
        assert!(levels.trailing_stop.is_none());
    }

    #[test]
    fn zero_or_missing_levels_are_disabled() {
        let mut p = params();
        p.stop_loss = Some(0.0);
        p.take_profit = None;
        let levels = protective_levels(100.0, &p);
        assert!(levels.stop_loss.is_none());
        assert!(levels.take_profit.is_none());
    }

    #[test]
    fn trailing_stop_ratchets_up_only() {
        let trailing = TrailingStop {
            enabled: true,
            percentage: 0.05,
        };
        let start = ratchet_trailing_stop(None, 100.0, &trailing);
        assert!((start.unwrap() - 95.0).abs() < 1e-9);

        let raised = ratchet_trailing_stop(start, 110.0, &trailing);
        assert!((raised.unwrap() - 104.5).abs() < 1e-9);

        let held = ratchet_trailing_stop(raised, 101.0, &trailing);
        assert!((held.unwrap() - 104.5).abs() < 1e-9);
    }

    #[test]
    fn trailing_disabled_returns_none() {
        let trailing = TrailingStop {
            enabled: false,
            percentage: 0.05,
        };
        assert!(ratchet_trailing_stop(Some(90.0), 120.0, &trailing).is_none());
    }

    #[test]
    fn stop_loss_wins_when_both_hit() {
        let pos = position(protective_levels(100.0, &params()));
        let exit = check_exit(&pos, &candle(105.0, 97.0)).unwrap();
        assert_eq!(exit.exit_type, ExitType::Sl);
        assert!((exit.threshold - 98.0).abs() < 1e-9);
    }

    #[test]
    fn take_profit_on_high() {
        let pos = position(protective_levels(100.0, &params()));
        let exit = check_exit(&pos, &candle(104.5, 99.0)).unwrap();
        assert_eq!(exit.exit_type, ExitType::Tp);
        assert!((exit.threshold - 104.0).abs() < 1e-9);
    }

    #[test]
    fn no_exit_inside_range() {
        let pos = position(protective_levels(100.0, &params()));
        assert!(check_exit(&pos, &candle(103.0, 99.0)).is_none());
    }
}
