//! Market snapshots handed to the alert evaluator.
//!
//! A snapshot is built per evaluation and never persisted. Crossing
//! conditions need the prior bar's reading, so every reading carries
//! `current` plus `previous` when one exists.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

use super::candle::{Candle, Timeframe};
use super::indicator::rsi::DEFAULT_PERIOD as RSI_PERIOD;
use super::indicator::{
    IndicatorSeries, IndicatorValue, calculate_macd_default, calculate_rsi, calculate_sma,
};
use super::pattern::PatternSignal;

/// Enough history for MACD(12,26,9) and a 200-bar SMA.
pub const DEFAULT_WINDOW: usize = 250;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub current: f64,
    pub previous: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdPoint {
    pub line: f64,
    pub signal: f64,
}

impl MacdPoint {
    pub fn spread(&self) -> f64 {
        self.line - self.signal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdReading {
    pub current: MacdPoint,
    pub previous: Option<MacdPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorReadings {
    pub rsi: Option<Reading>,
    pub macd: Option<MacdReading>,
    /// SMA readings keyed by period.
    pub moving_averages: BTreeMap<usize, Reading>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub pattern: Option<PatternSignal>,
    pub price: Option<Reading>,
    pub volume: Option<Reading>,
    pub indicators: IndicatorReadings,
}

impl MarketSnapshot {
    /// A snapshot carrying only a pattern signal.
    pub fn for_pattern(signal: PatternSignal) -> Self {
        MarketSnapshot {
            symbol: signal.symbol.clone(),
            timeframe: signal.timeframe,
            timestamp: signal.end_time,
            pattern: Some(signal),
            price: None,
            volume: None,
            indicators: IndicatorReadings::default(),
        }
    }
}

/// Rolling candle window for one symbol/timeframe.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    symbol: String,
    timeframe: Timeframe,
    capacity: usize,
    window: VecDeque<Candle>,
}

impl SnapshotBuilder {
    pub fn new(symbol: &str, timeframe: Timeframe) -> Self {
        Self::with_capacity(symbol, timeframe, DEFAULT_WINDOW)
    }

    pub fn with_capacity(symbol: &str, timeframe: Timeframe, capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            symbol: symbol.to_string(),
            timeframe,
            capacity,
            window: VecDeque::with_capacity(capacity),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Candles at or before the newest bar are ignored.
    pub fn push(&mut self, candle: Candle) -> bool {
        if self
            .window
            .back()
            .is_some_and(|last| candle.timestamp <= last.timestamp)
        {
            return false;
        }
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(candle);
        true
    }

    /// Readings for the newest candle. `ma_periods` selects which SMAs to
    /// compute; periods longer than the window yield no reading.
    pub fn snapshot(&self, ma_periods: &[usize]) -> Option<MarketSnapshot> {
        let last = self.window.back()?;
        let previous = self
            .window
            .len()
            .checked_sub(2)
            .and_then(|i| self.window.get(i));
        let candles: Vec<Candle> = self.window.iter().cloned().collect();

        let mut moving_averages = BTreeMap::new();
        for &period in ma_periods {
            if period == 0 || moving_averages.contains_key(&period) {
                continue;
            }
            if let Some(reading) = simple_reading(&calculate_sma(&candles, period)) {
                moving_averages.insert(period, reading);
            }
        }

        Some(MarketSnapshot {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
            timestamp: last.close_time(self.timeframe),
            pattern: None,
            price: Some(Reading {
                current: last.close,
                previous: previous.map(|c| c.close),
            }),
            volume: Some(Reading {
                current: last.volume,
                previous: previous.map(|c| c.volume),
            }),
            indicators: IndicatorReadings {
                rsi: simple_reading(&calculate_rsi(&candles, RSI_PERIOD)),
                macd: macd_reading(&calculate_macd_default(&candles)),
                moving_averages,
            },
        })
    }
}

fn simple_reading(series: &IndicatorSeries) -> Option<Reading> {
    let current = series.latest()?.as_simple()?;
    Some(Reading {
        current,
        previous: series.previous().and_then(|v| v.as_simple()),
    })
}

fn macd_point(value: IndicatorValue) -> Option<MacdPoint> {
    match value {
        IndicatorValue::Macd { line, signal, .. } => Some(MacdPoint { line, signal }),
        IndicatorValue::Simple(_) => None,
    }
}

fn macd_reading(series: &IndicatorSeries) -> Option<MacdReading> {
    Some(MacdReading {
        current: macd_point(series.latest()?)?,
        previous: series.previous().and_then(macd_point),
    })
}
