//! Pattern signals consumed from the external detector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::candle::Timeframe;

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    Bullish,
    Bearish,
    Neutral,
}

impl PatternType {
    pub fn as_str(self) -> &'static str {
        match self {
            PatternType::Bullish => "bullish",
            PatternType::Bearish => "bearish",
            PatternType::Neutral => "neutral",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bullish" => Ok(PatternType::Bullish),
            "bearish" => Ok(PatternType::Bearish),
            "neutral" => Ok(PatternType::Neutral),
            other => Err(format!("unknown pattern type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSignal {
    pub name: String,
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    pub confidence: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub symbol: String,
    pub timeframe: Timeframe,
}

/// A pattern selection entry: which patterns are tradeable or alertable, and
/// the confidence they need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternFilter {
    pub name: String,
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

fn default_min_confidence() -> f64 {
    DEFAULT_MIN_CONFIDENCE
}

impl PatternFilter {
    pub fn new(name: &str, pattern_type: PatternType, min_confidence: f64) -> Self {
        Self {
            name: name.to_string(),
            pattern_type,
            min_confidence,
        }
    }

    /// Name comparison is case-insensitive.
    pub fn matches(&self, signal: &PatternSignal) -> bool {
        self.pattern_type == signal.pattern_type
            && self.name.eq_ignore_ascii_case(&signal.name)
            && signal.confidence >= self.min_confidence
    }

    /// True when the name and type line up, regardless of confidence.
    pub fn same_pattern(&self, signal: &PatternSignal) -> bool {
        self.pattern_type == signal.pattern_type && self.name.eq_ignore_ascii_case(&signal.name)
    }
}

/// Parse `NAME:type[:min_confidence]` entries separated by commas.
pub fn parse_pattern_filters(input: &str) -> Result<Vec<PatternFilter>, String> {
    let mut filters = Vec::new();
    for entry in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
        let (name, kind, min) = match parts.as_slice() {
            [name, kind] => (*name, *kind, DEFAULT_MIN_CONFIDENCE),
            [name, kind, min] => {
                let min: f64 = min
                    .parse()
                    .map_err(|_| format!("invalid min_confidence in '{entry}'"))?;
                (*name, *kind, min)
            }
            _ => return Err(format!("expected NAME:type[:min_confidence], got '{entry}'")),
        };
        if name.is_empty() {
            return Err(format!("empty pattern name in '{entry}'"));
        }
        filters.push(PatternFilter::new(name, kind.parse()?, min));
    }
    Ok(filters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signal(name: &str, pattern_type: PatternType, confidence: f64) -> PatternSignal {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        PatternSignal {
            name: name.into(),
            pattern_type,
            confidence,
            start_time: t,
            end_time: t,
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::H1,
        }
    }

    #[test]
    fn filter_matches_name_type_and_confidence() {
        let f = PatternFilter::new("DOJI", PatternType::Bullish, 0.6);
        assert!(f.matches(&signal("doji", PatternType::Bullish, 0.7)));
        assert!(f.matches(&signal("DOJI", PatternType::Bullish, 0.6)));
        assert!(!f.matches(&signal("DOJI", PatternType::Bullish, 0.59)));
        assert!(!f.matches(&signal("DOJI", PatternType::Bearish, 0.9)));
        assert!(!f.matches(&signal("HAMMER", PatternType::Bullish, 0.9)));
    }

    #[test]
    fn parse_filters_with_and_without_confidence() {
        let filters = parse_pattern_filters("DOJI:bullish, ENGULFING:bearish:0.75").unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].name, "DOJI");
        assert!((filters[0].min_confidence - DEFAULT_MIN_CONFIDENCE).abs() < f64::EPSILON);
        assert_eq!(filters[1].pattern_type, PatternType::Bearish);
        assert!((filters[1].min_confidence - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_filters_rejects_garbage() {
        assert!(parse_pattern_filters("DOJI").is_err());
        assert!(parse_pattern_filters("DOJI:sideways").is_err());
        assert!(parse_pattern_filters("DOJI:bullish:high").is_err());
    }

    #[test]
    fn parse_filters_empty_input() {
        assert!(parse_pattern_filters("  ").unwrap().is_empty());
    }

    #[test]
    fn pattern_signal_serializes_type_field() {
        let json = serde_json::to_value(signal("DOJI", PatternType::Neutral, 0.5)).unwrap();
        assert_eq!(json["type"], "neutral");
        assert_eq!(json["timeframe"], "1h");
    }
}
