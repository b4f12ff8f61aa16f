//! Position manager and equity tracking.
//!
//! `PositionManager` owns cash and the open-position set for one run.
//! Equity is `cash + Σ unrealized pnl`: cash moves only by realized pnl and
//! fees, while the notional of open positions counts as committed capital.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::backtest::{BacktestConfig, Fees, TradingParams};
use super::candle::Candle;
use super::execution::{
    apply_slippage_entry, apply_slippage_exit, check_exit, protective_levels,
    ratchet_trailing_stop, taker_fee,
};
use super::pattern::{PatternFilter, PatternSignal};
use super::position::{ExitType, Position, PositionId, Trade, TradePattern};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    /// (value - peak) / peak, never positive.
    pub drawdown: f64,
}

/// Equity trace with a running peak.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EquityCurve {
    points: Vec<EquityPoint>,
    peak: Option<f64>,
}

impl EquityCurve {
    /// Peak starts at the first recorded point.
    pub fn new() -> Self {
        Self::default()
    }

    /// Peak starts at `initial`, usually the starting capital.
    pub fn with_peak(initial: f64) -> Self {
        EquityCurve {
            points: Vec::new(),
            peak: Some(initial),
        }
    }

    pub fn record(&mut self, timestamp: DateTime<Utc>, value: f64) {
        let peak = self.peak.map_or(value, |p| p.max(value));
        self.peak = Some(peak);
        let drawdown = if peak > 0.0 {
            ((value - peak) / peak).min(0.0)
        } else {
            0.0
        };
        self.points.push(EquityPoint {
            timestamp,
            value,
            drawdown,
        });
    }

    pub fn points(&self) -> &[EquityPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn into_points(self) -> Vec<EquityPoint> {
        self.points
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    PatternNotConfigured,
    BelowMinConfidence,
    MaxOpenPositions,
    InsufficientCapital,
    NoNextCandle,
}

/// A pattern signal that was observed but did not open a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSignal {
    pub time: DateTime<Utc>,
    pub pattern: TradePattern,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct PositionManager {
    params: TradingParams,
    fees: Fees,
    patterns: Vec<PatternFilter>,
    cash: f64,
    positions: BTreeMap<PositionId, Position>,
    pending: Vec<PatternSignal>,
    next_id: u64,
    bar_index: usize,
    last_close: Option<f64>,
    trades: Vec<Trade>,
    skipped: Vec<SkippedSignal>,
}

impl PositionManager {
    pub fn new(config: &BacktestConfig) -> Self {
        PositionManager {
            params: config.trading_params.clone(),
            fees: config.fees,
            patterns: config.patterns.clone(),
            cash: config.trading_params.initial_capital,
            positions: BTreeMap::new(),
            pending: Vec::new(),
            next_id: 0,
            bar_index: 0,
            last_close: None,
            trades: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn skipped(&self) -> &[SkippedSignal] {
        &self.skipped
    }

    /// Entry notional tied up in open positions.
    pub fn committed_capital(&self) -> f64 {
        self.positions.values().map(Position::notional).sum()
    }

    pub fn available_capital(&self) -> f64 {
        self.cash - self.committed_capital()
    }

    pub fn equity_at(&self, price: f64) -> f64 {
        self.cash
            + self
                .positions
                .values()
                .map(|p| p.unrealized_pnl(price))
                .sum::<f64>()
    }

    /// Mark-to-market equity at the last processed close.
    pub fn equity(&self) -> f64 {
        match self.last_close {
            Some(price) => self.equity_at(price),
            None => self.cash,
        }
    }

    /// Queue a signal for entry at the open of the first candle that starts
    /// after the pattern completed. Unconfigured or low-confidence signals are
    /// logged and dropped.
    pub fn on_pattern_signal(&mut self, signal: &PatternSignal) {
        if self.patterns.iter().any(|f| f.matches(signal)) {
            self.pending.push(signal.clone());
            return;
        }
        let reason = if self.patterns.iter().any(|f| f.same_pattern(signal)) {
            SkipReason::BelowMinConfidence
        } else {
            SkipReason::PatternNotConfigured
        };
        self.skip(signal, reason);
    }

    /// Process one candle: fill ready signals at the open, run exit checks in
    /// priority order, then ratchet trailing stops on the bar high.
    pub fn on_candle(&mut self, candle: &Candle) {
        self.fill_pending(candle);
        self.check_exits(candle);
        self.update_trailing_stops(candle);
        self.last_close = Some(candle.close);
        self.bar_index += 1;
    }

    /// Close every open position at `candle.close`. Used for the terminal
    /// bar of a run; `bar_index` has already advanced past it.
    pub fn close_all(&mut self, candle: &Candle, exit_type: ExitType) {
        let ids: Vec<PositionId> = self.positions.keys().copied().collect();
        let exit_bar = self.bar_index.saturating_sub(1);
        for id in ids {
            self.close_position(id, candle.close, candle.timestamp, exit_type, exit_bar);
        }
        self.last_close = Some(candle.close);
    }

    /// Drop signals that never saw a following candle.
    pub fn expire_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for signal in &pending {
            self.skip(signal, SkipReason::NoNextCandle);
        }
    }

    pub fn into_parts(self) -> (Vec<Trade>, Vec<SkippedSignal>) {
        (self.trades, self.skipped)
    }

    fn fill_pending(&mut self, candle: &Candle) {
        if self.pending.is_empty() {
            return;
        }
        let (ready, waiting): (Vec<PatternSignal>, Vec<PatternSignal>) = self
            .pending
            .drain(..)
            .partition(|s| s.end_time < candle.timestamp);
        self.pending = waiting;

        for signal in ready {
            self.open_position(&signal, candle);
        }
    }

    fn open_position(&mut self, signal: &PatternSignal, candle: &Candle) {
        if self.positions.len() >= self.params.max_open_positions {
            self.skip(signal, SkipReason::MaxOpenPositions);
            return;
        }

        let equity = self.equity_at(candle.open);
        let target = self.params.position_size * equity;
        if target <= 0.0 || self.available_capital() < target {
            self.skip(signal, SkipReason::InsufficientCapital);
            return;
        }

        let entry_price = apply_slippage_entry(candle.open, self.fees.slippage);
        let size = target / entry_price;
        let entry_fee = taker_fee(entry_price, size, &self.fees);
        let levels = protective_levels(entry_price, &self.params);

        let id = PositionId(self.next_id);
        self.next_id += 1;
        self.cash -= entry_fee;

        debug!(
            position = %id,
            pattern = %signal.name,
            entry_price,
            size,
            "Opened position"
        );

        self.positions.insert(
            id,
            Position {
                id,
                entry_price,
                entry_time: candle.timestamp,
                entry_bar: self.bar_index,
                size,
                entry_fee,
                stop_loss_price: levels.stop_loss,
                take_profit_price: levels.take_profit,
                trailing_stop_price: levels.trailing_stop,
                pattern: TradePattern::from(signal),
            },
        );
    }

    fn check_exits(&mut self, candle: &Candle) {
        let triggered: Vec<(PositionId, ExitType, f64)> = self
            .positions
            .values()
            .filter_map(|pos| check_exit(pos, candle).map(|e| (pos.id, e.exit_type, e.threshold)))
            .collect();

        for (id, exit_type, threshold) in triggered {
            self.close_position(id, threshold, candle.timestamp, exit_type, self.bar_index);
        }
    }

    fn update_trailing_stops(&mut self, candle: &Candle) {
        if !self.params.trailing_stop.enabled {
            return;
        }
        let trailing = self.params.trailing_stop;
        for pos in self.positions.values_mut() {
            pos.trailing_stop_price =
                ratchet_trailing_stop(pos.trailing_stop_price, candle.high, &trailing);
        }
    }

    fn close_position(
        &mut self,
        id: PositionId,
        market_price: f64,
        time: DateTime<Utc>,
        exit_type: ExitType,
        exit_bar: usize,
    ) {
        let Some(position) = self.positions.remove(&id) else {
            return;
        };
        let exit_price = apply_slippage_exit(market_price, self.fees.slippage);
        let exit_fee = taker_fee(exit_price, position.size, &self.fees);
        self.cash += position.unrealized_pnl(exit_price) - exit_fee;

        let trade = Trade::close(position, exit_price, time, exit_type, exit_fee, exit_bar);
        debug!(
            position = %id,
            exit_type = ?exit_type,
            exit_price,
            pnl = trade.pnl,
            "Closed position"
        );
        self.trades.push(trade);
    }

    fn skip(&mut self, signal: &PatternSignal, reason: SkipReason) {
        debug!(
            pattern = %signal.name,
            confidence = signal.confidence,
            reason = ?reason,
            "Skipped pattern signal"
        );
        self.skipped.push(SkippedSignal {
            time: signal.end_time,
            pattern: TradePattern::from(signal),
            reason,
        });
    }
}
