//! Historical pattern feed port.

use chrono::{DateTime, Utc};

use crate::domain::candle::Timeframe;
use crate::domain::error::CandlescopeError;
use crate::domain::pattern::PatternSignal;

pub trait PatternPort: Send + Sync {
    /// Signals whose `end_time` falls in `[start, end]`, ordered by `end_time`.
    fn get_pattern_signals(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PatternSignal>, CandlescopeError>;
}
