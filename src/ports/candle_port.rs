//! Candle series provider port.

use chrono::{DateTime, Utc};

use crate::domain::candle::{Candle, Timeframe};
use crate::domain::error::CandlescopeError;

pub trait CandlePort: Send + Sync {
    /// Candles with `start <= timestamp <= end`, ordered by timestamp.
    fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, CandlescopeError>;
}
