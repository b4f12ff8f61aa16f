//! Live alert monitoring over an ordered market-update stream.
//!
//! Candle updates extend the rolling window and evaluate price, volume and
//! indicator alerts; pattern updates evaluate pattern alerts. Each update is
//! evaluated at its own timestamp so expiry follows market time.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::alert::AlertRule;
use super::alert_trigger::{TriggerCoordinator, TriggerEvent};
use super::candle::Candle;
use super::error::CandlescopeError;
use super::pattern::PatternSignal;
use super::snapshot::{MarketSnapshot, SnapshotBuilder};

#[derive(Debug, Clone, PartialEq)]
pub enum MarketUpdate {
    Candle(Candle),
    Pattern(PatternSignal),
}

pub struct AlertMonitor<'a> {
    coordinator: TriggerCoordinator<'a>,
    builder: SnapshotBuilder,
}

impl<'a> AlertMonitor<'a> {
    pub fn new(coordinator: TriggerCoordinator<'a>, builder: SnapshotBuilder) -> Self {
        Self {
            coordinator,
            builder,
        }
    }

    pub fn on_update(&mut self, update: MarketUpdate) -> Result<Vec<TriggerEvent>, CandlescopeError> {
        let symbol = self.builder.symbol().to_string();
        match update {
            MarketUpdate::Candle(candle) => {
                let now = candle.close_time(self.builder.timeframe());
                if !self.builder.push(candle) {
                    debug!(%symbol, "Stale candle ignored");
                    return Ok(Vec::new());
                }
                let alerts = self.coordinator.store().find_active_alerts(&symbol, now)?;
                if alerts.is_empty() {
                    return Ok(Vec::new());
                }
                let periods = moving_average_periods(&alerts);
                match self.builder.snapshot(&periods) {
                    Some(snapshot) => Ok(self.coordinator.process(&alerts, &snapshot, now)),
                    None => Ok(Vec::new()),
                }
            }
            MarketUpdate::Pattern(signal) => {
                if !signal.symbol.eq_ignore_ascii_case(&symbol) {
                    return Ok(Vec::new());
                }
                let now = signal.end_time;
                self.coordinator
                    .on_snapshot(&MarketSnapshot::for_pattern(signal), now)
            }
        }
    }

    pub fn replay(
        &mut self,
        updates: impl IntoIterator<Item = MarketUpdate>,
    ) -> Result<Vec<TriggerEvent>, CandlescopeError> {
        let mut fired = Vec::new();
        for update in updates {
            fired.extend(self.on_update(update)?);
        }
        Ok(fired)
    }
}

fn moving_average_periods(alerts: &[AlertRule]) -> Vec<usize> {
    let mut periods: Vec<usize> = alerts
        .iter()
        .flat_map(|a| a.conditions.moving_average_periods())
        .collect();
    periods.sort_unstable();
    periods.dedup();
    periods
}

/// Interleave candles and patterns by the time each becomes known: a candle
/// at its close, a pattern at its `end_time`. Ties put the candle first.
pub fn merge_updates(
    candles: Vec<Candle>,
    patterns: Vec<PatternSignal>,
    timeframe: super::candle::Timeframe,
) -> Vec<MarketUpdate> {
    let mut keyed: Vec<(DateTime<Utc>, u8, MarketUpdate)> = candles
        .into_iter()
        .map(|c| (c.close_time(timeframe), 0, MarketUpdate::Candle(c)))
        .chain(
            patterns
                .into_iter()
                .map(|p| (p.end_time, 1, MarketUpdate::Pattern(p))),
        )
        .collect();
    keyed.sort_by_key(|(at, order, _)| (*at, *order));
    keyed.into_iter().map(|(_, _, update)| update).collect()
}
