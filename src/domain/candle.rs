//! OHLCV candle representation and series checks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::CandlescopeError;

/// One OHLCV bar. `timestamp` is the bar open time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Time at which the bar is complete.
    pub fn close_time(&self, timeframe: Timeframe) -> DateTime<Utc> {
        self.timestamp + timeframe.duration()
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub fn minutes(self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Bars per year on a 24/7 market.
    pub fn periods_per_year(self) -> f64 {
        365.0 * 1440.0 / self.minutes() as f64
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(format!("unknown timeframe '{other}'")),
        }
    }
}

/// Check that a series is non-empty, strictly increasing, and has no gap wider
/// than `max_gap_bars` missing bars.
pub fn validate_series(
    candles: &[Candle],
    timeframe: Timeframe,
    max_gap_bars: u32,
) -> Result<(), CandlescopeError> {
    if candles.is_empty() {
        return Err(CandlescopeError::data("empty candle series"));
    }

    // None when the tolerance is too wide to represent: no gap limit.
    let allowed = timeframe
        .minutes()
        .checked_mul(i64::from(max_gap_bars) + 1)
        .and_then(Duration::try_minutes);
    for pair in candles.windows(2) {
        let step = pair[1].timestamp - pair[0].timestamp;
        if step <= Duration::zero() {
            return Err(CandlescopeError::data(format!(
                "candles out of order or duplicated at {}",
                pair[1].timestamp
            )));
        }
        if allowed.is_some_and(|limit| step > limit) {
            return Err(CandlescopeError::data(format!(
                "gap of {} minutes between {} and {} exceeds timeframe {}",
                step.num_minutes(),
                pair[0].timestamp,
                pair[1].timestamp,
                timeframe
            )));
        }
    }
    Ok(())
}
