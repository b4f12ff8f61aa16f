//! Simulation clock: chronological replay of candles and pattern signals.
//!
//! Candle-close events and pattern events are merged into one stream. A
//! pattern event is placed immediately before the first candle whose close
//! time is at or after the pattern's `end_time`. One equity point is recorded
//! per candle; the last candle force-closes anything still open.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::backtest::BacktestConfig;
use super::candle::{Candle, validate_series};
use super::error::CandlescopeError;
use super::pattern::PatternSignal;
use super::portfolio::{EquityCurve, PositionManager};
use super::position::ExitType;

/// Shared flag that stops the clock before the next event.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    Pattern(&'a PatternSignal),
    Candle { index: usize, candle: &'a Candle },
}

/// Merge candles and patterns into replay order. Patterns outside the
/// configured date range are dropped. Patterns completing after the last
/// candle closes trail the stream so they can be reported as unfilled.
pub fn merge_events<'a>(
    config: &BacktestConfig,
    candles: &'a [Candle],
    patterns: &'a [PatternSignal],
) -> Vec<Event<'a>> {
    let mut scoped: Vec<&PatternSignal> = patterns
        .iter()
        .filter(|p| p.end_time >= config.start_date && p.end_time <= config.end_date)
        .collect();
    scoped.sort_by_key(|p| p.end_time);

    let mut events = Vec::with_capacity(candles.len() + scoped.len());
    let mut next = scoped.into_iter().peekable();

    for (index, candle) in candles.iter().enumerate() {
        let close_time = candle.close_time(config.timeframe);
        while let Some(pattern) = next.next_if(|p| close_time >= p.end_time) {
            events.push(Event::Pattern(pattern));
        }
        events.push(Event::Candle { index, candle });
    }
    events.extend(next.map(Event::Pattern));
    events
}

/// What the replay produced, before metrics.
#[derive(Debug)]
pub struct Replay {
    pub manager: PositionManager,
    pub equity: EquityCurve,
}

/// Replay one run. Fails before touching any state if the config range is
/// empty or the candle series is unusable.
pub fn replay(
    config: &BacktestConfig,
    candles: &[Candle],
    patterns: &[PatternSignal],
    cancel: &CancelToken,
) -> Result<Replay, CandlescopeError> {
    if config.start_date >= config.end_date {
        return Err(CandlescopeError::invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    validate_series(candles, config.timeframe, config.max_gap_bars)?;

    let mut manager = PositionManager::new(config);
    let mut equity = EquityCurve::with_peak(config.trading_params.initial_capital);
    let last_index = candles.len() - 1;

    for event in merge_events(config, candles, patterns) {
        if cancel.is_cancelled() {
            return Err(CandlescopeError::Cancelled {
                reason: format!("cancelled after {} candles", equity.len()),
            });
        }
        match event {
            Event::Pattern(signal) => manager.on_pattern_signal(signal),
            Event::Candle { index, candle } => {
                manager.on_candle(candle);
                if index == last_index {
                    manager.close_all(candle, ExitType::Market);
                }
                equity.record(candle.timestamp, manager.equity());
            }
        }
    }
    manager.expire_pending();

    Ok(Replay { manager, equity })
}
