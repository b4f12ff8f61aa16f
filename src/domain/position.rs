//! Open positions and closed trades.
//!
//! A `Position` lives only inside the position manager, addressed by its
//! `PositionId`. Closing converts it into an immutable `Trade`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::pattern::{PatternSignal, PatternType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The pattern that opened a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePattern {
    pub name: String,
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    pub confidence: f64,
}

impl From<&PatternSignal> for TradePattern {
    fn from(signal: &PatternSignal) -> Self {
        TradePattern {
            name: signal.name.clone(),
            pattern_type: signal.pattern_type,
            confidence: signal.confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitType {
    Market,
    Limit,
    Sl,
    Tp,
}

/// Long-only open position.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: PositionId,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_bar: usize,
    pub size: f64,
    pub entry_fee: f64,
    pub stop_loss_price: Option<f64>,
    pub take_profit_price: Option<f64>,
    pub trailing_stop_price: Option<f64>,
    pub pattern: TradePattern,
}

impl Position {
    pub fn notional(&self) -> f64 {
        self.entry_price * self.size
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.size
    }

    /// The tighter of the fixed and trailing stops.
    pub fn effective_stop(&self) -> Option<f64> {
        match (self.stop_loss_price, self.trailing_stop_price) {
            (Some(fixed), Some(trailing)) => Some(fixed.max(trailing)),
            (fixed, trailing) => fixed.or(trailing),
        }
    }

    pub fn should_stop_loss(&self, low: f64) -> Option<f64> {
        self.effective_stop().filter(|&stop| low <= stop)
    }

    pub fn should_take_profit(&self, high: f64) -> Option<f64> {
        self.take_profit_price.filter(|&target| high >= target)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill<K> {
    pub price: f64,
    pub time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: K,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub pattern: TradePattern,
    pub entry: Fill<EntryType>,
    pub exit: Fill<ExitType>,
    pub size: f64,
    pub pnl: f64,
    pub pnl_percentage: f64,
    pub fees: f64,
    pub holding_bars: usize,
}

impl Trade {
    /// pnl = (exit - entry) * size - (entry_fee + exit_fee)
    pub fn close(
        position: Position,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        exit_type: ExitType,
        exit_fee: f64,
        exit_bar: usize,
    ) -> Self {
        let fees = position.entry_fee + exit_fee;
        let pnl = (exit_price - position.entry_price) * position.size - fees;
        let notional = position.notional();
        let pnl_percentage = if notional > 0.0 { pnl / notional } else { 0.0 };

        Trade {
            entry: Fill {
                price: position.entry_price,
                time: position.entry_time,
                kind: EntryType::Market,
            },
            exit: Fill {
                price: exit_price,
                time: exit_time,
                kind: exit_type,
            },
            size: position.size,
            pnl,
            pnl_percentage,
            fees,
            holding_bars: exit_bar.saturating_sub(position.entry_bar),
            pattern: position.pattern,
        }
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_position() -> Position {
        Position {
            id: PositionId(1),
            entry_price: 100.0,
            entry_time: Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap(),
            entry_bar: 6,
            size: 10.0,
            entry_fee: 1.0,
            stop_loss_price: Some(98.0),
            take_profit_price: Some(104.0),
            trailing_stop_price: None,
            pattern: TradePattern {
                name: "DOJI".into(),
                pattern_type: PatternType::Bullish,
                confidence: 0.7,
            },
        }
    }

    #[test]
    fn unrealized_pnl_long() {
        let pos = sample_position();
        assert!((pos.unrealized_pnl(105.0) - 50.0).abs() < f64::EPSILON);
        assert!((pos.unrealized_pnl(95.0) - (-50.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn stop_loss_uses_low() {
        let pos = sample_position();
        assert_eq!(pos.should_stop_loss(97.5), Some(98.0));
        assert_eq!(pos.should_stop_loss(98.0), Some(98.0));
        assert_eq!(pos.should_stop_loss(98.5), None);
    }

    #[test]
    fn take_profit_uses_high() {
        let pos = sample_position();
        assert_eq!(pos.should_take_profit(104.0), Some(104.0));
        assert_eq!(pos.should_take_profit(103.9), None);
    }

    #[test]
    fn effective_stop_prefers_tighter_trailing() {
        let mut pos = sample_position();
        pos.trailing_stop_price = Some(99.0);
        assert_eq!(pos.effective_stop(), Some(99.0));
        pos.stop_loss_price = None;
        assert_eq!(pos.effective_stop(), Some(99.0));
        pos.trailing_stop_price = None;
        assert_eq!(pos.effective_stop(), None);
        assert_eq!(pos.should_stop_loss(0.0), None);
    }

    #[test]
    fn trade_close_pnl_includes_both_fees() {
        let pos = sample_position();
        let exit_time = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let trade = Trade::close(pos, 104.0, exit_time, ExitType::Tp, 1.04, 8);

        let expected_pnl = (104.0 - 100.0) * 10.0 - (1.0 + 1.04);
        assert!((trade.pnl - expected_pnl).abs() < 1e-9);
        assert!((trade.pnl_percentage - expected_pnl / 1000.0).abs() < 1e-12);
        assert!((trade.fees - 2.04).abs() < 1e-12);
        assert_eq!(trade.exit.kind, ExitType::Tp);
        assert_eq!(trade.entry.kind, EntryType::Market);
        assert_eq!(trade.holding_bars, 2);
        assert!(trade.is_win());
        assert!(!trade.is_loss());
    }

    #[test]
    fn trade_serializes_exit_type() {
        let pos = sample_position();
        let exit_time = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let trade = Trade::close(pos, 98.0, exit_time, ExitType::Sl, 0.98, 7);
        let json = serde_json::to_value(&trade).unwrap();
        assert_eq!(json["exit"]["type"], "sl");
        assert_eq!(json["entry"]["type"], "market");
        assert_eq!(json["pattern"]["type"], "bullish");
        assert!(json["pnlPercentage"].is_number());
    }
}
