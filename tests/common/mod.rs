#![allow(dead_code)]

use candlescope::domain::alert::{AlertConditions, AlertRule, AlertStatus, Frequency, Notification};
use candlescope::domain::alert_trigger::TriggerEvent;
use candlescope::domain::backtest::{BacktestConfig, BacktestResult, Fees, TradingParams, TrailingStop};
use candlescope::domain::candle::{Candle, Timeframe};
use candlescope::domain::error::CandlescopeError;
use candlescope::domain::pattern::{PatternFilter, PatternSignal, PatternType};
use candlescope::ports::candle_port::CandlePort;
use candlescope::ports::notification_port::NotificationPort;
use candlescope::ports::pattern_port::PatternPort;
use candlescope::ports::result_store::ResultStore;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Mutex;
use uuid::Uuid;

/// Hourly bar `n` after 2024-01-01T00:00Z.
pub fn t(bar: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(bar)
}

pub fn make_bar(bar: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle {
        timestamp: t(bar),
        open,
        high,
        low,
        close,
        volume: 1_000.0,
    }
}

pub fn flat_bars(n: i64, price: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| make_bar(i, price, price + 1.0, price - 1.0, price))
        .collect()
}

pub fn signal(name: &str, bar: i64, confidence: f64) -> PatternSignal {
    PatternSignal {
        name: name.to_string(),
        pattern_type: PatternType::Bullish,
        confidence,
        start_time: t(bar - 2),
        end_time: t(bar),
        symbol: "BTCUSDT".to_string(),
        timeframe: Timeframe::H1,
    }
}

pub fn no_fees() -> Fees {
    Fees {
        maker: 0.0,
        taker: 0.0,
        slippage: 0.0,
    }
}

pub fn make_config() -> BacktestConfig {
    BacktestConfig {
        symbol: "BTCUSDT".to_string(),
        timeframe: Timeframe::H1,
        start_date: t(0),
        end_date: t(240),
        patterns: vec![PatternFilter::new("DOJI", PatternType::Bullish, 0.6)],
        trading_params: TradingParams {
            initial_capital: 10_000.0,
            position_size: 0.1,
            stop_loss: Some(0.02),
            take_profit: Some(0.04),
            max_open_positions: 1,
            trailing_stop: TrailingStop::default(),
        },
        fees: no_fees(),
        max_gap_bars: 0,
    }
}

pub struct MockFeed {
    pub candles: Vec<Candle>,
    pub patterns: Vec<PatternSignal>,
    pub error: Option<String>,
}

impl MockFeed {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles,
            patterns: Vec::new(),
            error: None,
        }
    }

    pub fn with_patterns(mut self, patterns: Vec<PatternSignal>) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl CandlePort for MockFeed {
    fn get_candles(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, CandlescopeError> {
        match &self.error {
            Some(reason) => Err(CandlescopeError::data(reason.clone())),
            None => Ok(self.candles.clone()),
        }
    }
}

impl PatternPort for MockFeed {
    fn get_pattern_signals(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<PatternSignal>, CandlescopeError> {
        Ok(self.patterns.clone())
    }
}

#[derive(Default)]
pub struct MockResultStore {
    pub saved: Mutex<Vec<BacktestResult>>,
}

impl ResultStore for MockResultStore {
    fn save(&self, result: &BacktestResult) -> Result<(), CandlescopeError> {
        self.saved.lock().unwrap().push(result.clone());
        Ok(())
    }

    fn load(&self, id: Uuid) -> Result<Option<BacktestResult>, CandlescopeError> {
        Ok(self
            .saved
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.id == id)
            .cloned())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<TriggerEvent>>,
}

impl NotificationPort for RecordingNotifier {
    fn notify(&self, event: &TriggerEvent) -> Result<(), CandlescopeError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub fn make_alert(conditions: AlertConditions, frequency: Frequency) -> AlertRule {
    AlertRule {
        id: Uuid::new_v4(),
        owner: "user-1".to_string(),
        symbol: "BTCUSDT".to_string(),
        timeframe: Timeframe::H1,
        conditions,
        notification: Notification {
            channels: Default::default(),
            message: "{symbol} {timeframe}: {condition}".to_string(),
            frequency,
        },
        status: AlertStatus::Active,
        trigger_count: 0,
        last_triggered: None,
        expires_at: None,
        version: 0,
    }
}
