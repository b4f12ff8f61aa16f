//! Alert rules as persisted documents.
//!
//! Only the trigger coordinator mutates `status`, `trigger_count` and
//! `last_triggered`; every such write bumps `version`, which the store uses
//! for compare-and-swap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::candle::Timeframe;
use super::pattern::PatternFilter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub owner: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub conditions: AlertConditions,
    pub notification: Notification,
    #[serde(default)]
    pub status: AlertStatus,
    #[serde(default)]
    pub trigger_count: u32,
    #[serde(default)]
    pub last_triggered: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

impl AlertRule {
    /// Active and not expired at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == AlertStatus::Active && self.expires_at.is_none_or(|at| at > now)
    }

    /// The rule as it looks after firing at `now`.
    pub fn fired(&self, now: DateTime<Utc>) -> AlertRule {
        let mut next = self.clone();
        next.trigger_count += 1;
        next.last_triggered = Some(now);
        if self.notification.frequency == Frequency::Once {
            next.status = AlertStatus::Triggered;
        }
        next.version += 1;
        next
    }

    pub fn alert_type(&self) -> AlertType {
        self.conditions.alert_type()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Active,
    Triggered,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Pattern,
    Price,
    Indicator,
    Volume,
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertType::Pattern => "pattern",
            AlertType::Price => "price",
            AlertType::Indicator => "indicator",
            AlertType::Volume => "volume",
        };
        f.write_str(s)
    }
}

/// One variant per alert type. Within a variant, any configured
/// sub-condition matching is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "alertType", rename_all = "lowercase")]
pub enum AlertConditions {
    Pattern { patterns: Vec<PatternFilter> },
    Price { price: PriceConditions },
    Indicator { indicators: IndicatorConditions },
    Volume { volume: VolumeConditions },
}

impl AlertConditions {
    pub fn alert_type(&self) -> AlertType {
        match self {
            AlertConditions::Pattern { .. } => AlertType::Pattern,
            AlertConditions::Price { .. } => AlertType::Price,
            AlertConditions::Indicator { .. } => AlertType::Indicator,
            AlertConditions::Volume { .. } => AlertType::Volume,
        }
    }

    /// Reject rules that could never be evaluated meaningfully.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            AlertConditions::Pattern { patterns } => {
                if patterns.is_empty() {
                    return Err("no patterns configured".into());
                }
                for p in patterns {
                    if !(0.0..=1.0).contains(&p.min_confidence) {
                        return Err(format!(
                            "minConfidence {} for {} outside [0, 1]",
                            p.min_confidence, p.name
                        ));
                    }
                }
                Ok(())
            }
            AlertConditions::Price { price } => {
                let levels = [price.above, price.below, price.crossover];
                if levels.iter().flatten().any(|v| !v.is_finite() || *v <= 0.0) {
                    return Err("price levels must be positive numbers".into());
                }
                finite("percentageChange", price.percentage_change)?;
                if levels.iter().all(Option::is_none) && price.percentage_change.is_none() {
                    return Err("no price condition configured".into());
                }
                Ok(())
            }
            AlertConditions::Indicator { indicators } => indicators.validate(),
            AlertConditions::Volume { volume } => {
                let values = [volume.threshold, volume.percentage_increase];
                if values.iter().flatten().any(|v| !v.is_finite() || *v < 0.0) {
                    return Err("volume conditions must be non-negative numbers".into());
                }
                if values.iter().all(Option::is_none) {
                    return Err("no volume condition configured".into());
                }
                Ok(())
            }
        }
    }

    /// SMA periods the evaluator will ask the snapshot for.
    pub fn moving_average_periods(&self) -> Vec<usize> {
        match self {
            AlertConditions::Indicator { indicators } => indicators
                .moving_averages
                .as_ref()
                .and_then(|ma| ma.crossover)
                .map(|c| vec![c.fast, c.slow])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

fn finite(name: &str, value: Option<f64>) -> Result<(), String> {
    match value {
        Some(v) if !v.is_finite() => Err(format!("{name} must be a finite number")),
        _ => Ok(()),
    }
}

/// Percentages are in percent units: 5.0 means 5%.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceConditions {
    #[serde(default)]
    pub above: Option<f64>,
    #[serde(default)]
    pub below: Option<f64>,
    #[serde(default)]
    pub crossover: Option<f64>,
    #[serde(default)]
    pub percentage_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorConditions {
    #[serde(default)]
    pub rsi: Option<RsiConditions>,
    #[serde(default)]
    pub macd: Option<MacdConditions>,
    #[serde(default)]
    pub moving_averages: Option<MovingAverageConditions>,
}

impl IndicatorConditions {
    fn validate(&self) -> Result<(), String> {
        let mut configured = false;
        if let Some(rsi) = &self.rsi {
            for level in [rsi.above, rsi.below].into_iter().flatten() {
                if !(0.0..=100.0).contains(&level) {
                    return Err(format!("RSI level {level} outside [0, 100]"));
                }
                configured = true;
            }
        }
        if let Some(macd) = &self.macd {
            configured |= macd.crossover || macd.crossunder;
        }
        if let Some(cross) = self.moving_averages.as_ref().and_then(|ma| ma.crossover) {
            if cross.fast == 0 || cross.fast >= cross.slow {
                return Err(format!(
                    "moving average periods need 0 < fast < slow, got {}/{}",
                    cross.fast, cross.slow
                ));
            }
            configured = true;
        }
        if configured {
            Ok(())
        } else {
            Err("no indicator condition configured".into())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RsiConditions {
    #[serde(default)]
    pub above: Option<f64>,
    #[serde(default)]
    pub below: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MacdConditions {
    #[serde(default)]
    pub crossover: bool,
    #[serde(default)]
    pub crossunder: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MovingAverageConditions {
    #[serde(default)]
    pub crossover: Option<MaCrossover>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaCrossover {
    pub fast: usize,
    pub slow: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeConditions {
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub percentage_increase: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub channels: Channels,
    pub message: String,
    #[serde(default)]
    pub frequency: Frequency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channels {
    #[serde(default = "default_true")]
    pub email: bool,
    #[serde(default)]
    pub telegram: bool,
    #[serde(default)]
    pub whatsapp: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Channels {
    fn default() -> Self {
        Channels {
            email: true,
            telegram: false,
            whatsapp: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Once,
    Always,
}
