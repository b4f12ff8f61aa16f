//! Alert Condition Evaluator.
//!
//! Pure: `(rule, snapshot, now) -> Option<MatchedCondition>`. Never fails;
//! a malformed rule is logged and treated as non-matching so it cannot block
//! other alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::alert::{
    AlertConditions, AlertRule, AlertType, IndicatorConditions, PriceConditions, VolumeConditions,
};
use super::pattern::PatternFilter;
use super::snapshot::{MarketSnapshot, Reading};

/// What fired, and the observed value that made it fire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedCondition {
    pub alert_type: AlertType,
    pub description: String,
    pub value: f64,
}

impl MatchedCondition {
    fn new(alert_type: AlertType, description: String, value: f64) -> Self {
        MatchedCondition {
            alert_type,
            description,
            value,
        }
    }
}

pub fn evaluate(
    rule: &AlertRule,
    snapshot: &MarketSnapshot,
    now: DateTime<Utc>,
) -> Option<MatchedCondition> {
    if !rule.is_live(now) {
        return None;
    }
    if !rule.symbol.eq_ignore_ascii_case(&snapshot.symbol) || rule.timeframe != snapshot.timeframe {
        return None;
    }
    if let Err(reason) = rule.conditions.validate() {
        debug!(alert_id = %rule.id, %reason, "Malformed alert rule treated as non-matching");
        return None;
    }

    match &rule.conditions {
        AlertConditions::Pattern { patterns } => check_pattern(patterns, snapshot),
        AlertConditions::Price { price } => check_price(price, snapshot.price?),
        AlertConditions::Indicator { indicators } => check_indicators(indicators, snapshot),
        AlertConditions::Volume { volume } => check_volume(volume, snapshot.volume?),
    }
}

fn check_pattern(filters: &[PatternFilter], snapshot: &MarketSnapshot) -> Option<MatchedCondition> {
    let signal = snapshot.pattern.as_ref()?;
    filters.iter().find(|f| f.matches(signal))?;
    Some(MatchedCondition::new(
        AlertType::Pattern,
        format!(
            "{} {} pattern (confidence {:.2})",
            signal.name, signal.pattern_type, signal.confidence
        ),
        signal.confidence,
    ))
}

/// `(current - previous) / previous` in percent.
fn percent_change(reading: Reading) -> Option<f64> {
    let previous = reading.previous.filter(|p| *p != 0.0)?;
    Some((reading.current - previous) / previous * 100.0)
}

fn crossed(previous: f64, current: f64, level: f64) -> bool {
    (previous < level && current >= level) || (previous > level && current <= level)
}

fn check_price(conditions: &PriceConditions, price: Reading) -> Option<MatchedCondition> {
    let current = price.current;
    let matched = |description: String| Some(MatchedCondition::new(AlertType::Price, description, current));

    if let Some(above) = conditions.above {
        if current > above {
            return matched(format!("price above {above}"));
        }
    }
    if let Some(below) = conditions.below {
        if current < below {
            return matched(format!("price below {below}"));
        }
    }
    if let (Some(level), Some(previous)) = (conditions.crossover, price.previous) {
        if crossed(previous, current, level) {
            let direction = if current >= level { "up" } else { "down" };
            return matched(format!("price crossed {direction} through {level}"));
        }
    }
    if let (Some(threshold), Some(change)) = (conditions.percentage_change, percent_change(price)) {
        let hit = if threshold >= 0.0 {
            change >= threshold
        } else {
            change <= threshold
        };
        if hit {
            return matched(format!("price changed {change:.2}% (threshold {threshold}%)"));
        }
    }
    None
}

fn check_indicators(
    conditions: &IndicatorConditions,
    snapshot: &MarketSnapshot,
) -> Option<MatchedCondition> {
    let readings = &snapshot.indicators;
    let matched = |description: String, value: f64| {
        Some(MatchedCondition::new(AlertType::Indicator, description, value))
    };

    if let (Some(rsi), Some(reading)) = (&conditions.rsi, readings.rsi) {
        if let Some(previous) = reading.previous {
            if let Some(above) = rsi.above {
                if previous < above && reading.current >= above {
                    return matched(format!("RSI crossed above {above}"), reading.current);
                }
            }
            if let Some(below) = rsi.below {
                if previous > below && reading.current <= below {
                    return matched(format!("RSI crossed below {below}"), reading.current);
                }
            }
        }
    }

    if let (Some(macd), Some(reading)) = (&conditions.macd, readings.macd) {
        if let Some(previous) = reading.previous {
            let (before, after) = (previous.spread(), reading.current.spread());
            if macd.crossover && before <= 0.0 && after > 0.0 {
                return matched("MACD crossed above signal".to_string(), reading.current.line);
            }
            if macd.crossunder && before >= 0.0 && after < 0.0 {
                return matched("MACD crossed below signal".to_string(), reading.current.line);
            }
        }
    }

    if let Some(cross) = conditions.moving_averages.as_ref().and_then(|ma| ma.crossover) {
        let fast = readings.moving_averages.get(&cross.fast)?;
        let slow = readings.moving_averages.get(&cross.slow)?;
        let (prev_fast, prev_slow) = (fast.previous?, slow.previous?);
        let description = if prev_fast <= prev_slow && fast.current > slow.current {
            Some("bullish")
        } else if prev_fast >= prev_slow && fast.current < slow.current {
            Some("bearish")
        } else {
            None
        };
        if let Some(direction) = description {
            return matched(
                format!("SMA({}) {direction} cross of SMA({})", cross.fast, cross.slow),
                fast.current,
            );
        }
    }
    None
}

fn check_volume(conditions: &VolumeConditions, volume: Reading) -> Option<MatchedCondition> {
    let current = volume.current;
    if let Some(threshold) = conditions.threshold {
        if current >= threshold {
            return Some(MatchedCondition::new(
                AlertType::Volume,
                format!("volume {current} at or above {threshold}"),
                current,
            ));
        }
    }
    if let (Some(pct), Some(change)) = (conditions.percentage_increase, percent_change(volume)) {
        if change >= pct {
            return Some(MatchedCondition::new(
                AlertType::Volume,
                format!("volume up {change:.2}% (threshold {pct}%)"),
                current,
            ));
        }
    }
    None
}

/// Substitute `{symbol}`, `{timeframe}`, `{condition}` and `{price}`.
pub fn render_message(
    rule: &AlertRule,
    matched: &MatchedCondition,
    snapshot: &MarketSnapshot,
) -> String {
    let price = snapshot
        .price
        .map(|p| p.current.to_string())
        .unwrap_or_else(|| "n/a".to_string());
    rule.notification
        .message
        .replace("{symbol}", &rule.symbol)
        .replace("{timeframe}", rule.timeframe.as_str())
        .replace("{condition}", &matched.description)
        .replace("{price}", &price)
}
