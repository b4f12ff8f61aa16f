//! Alert rule documents on disk: a JSON array of `AlertRule`.

use std::fs;
use std::path::Path;
use tracing::debug;

use crate::domain::alert::AlertRule;
use crate::domain::error::CandlescopeError;

pub fn load_alert_rules(path: &Path) -> Result<Vec<AlertRule>, CandlescopeError> {
    let content = fs::read_to_string(path).map_err(|e| CandlescopeError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let rules: Vec<AlertRule> =
        serde_json::from_str(&content).map_err(|e| CandlescopeError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;
    debug!(path = %path.display(), count = rules.len(), "Loaded alert rules");
    Ok(rules)
}

/// Persist rules, e.g. with updated trigger state after a replay.
pub fn save_alert_rules(path: &Path, rules: &[AlertRule]) -> Result<(), CandlescopeError> {
    fs::write(path, serde_json::to_string_pretty(rules)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::{AlertConditions, AlertStatus, Frequency};
    use tempfile::TempDir;

    const RULES: &str = r#"[
      {
        "owner": "user-1",
        "symbol": "BTCUSDT",
        "timeframe": "1h",
        "conditions": { "alertType": "price", "price": { "above": 50000 } },
        "notification": { "channels": { "telegram": true }, "message": "{symbol} {condition}" }
      },
      {
        "id": "5f0c1a52-5c4f-4d8e-9a53-0c6a1f4f1d11",
        "owner": "user-2",
        "symbol": "ETHUSDT",
        "timeframe": "4h",
        "conditions": {
          "alertType": "pattern",
          "patterns": [{ "name": "DOJI", "type": "bullish" }]
        },
        "notification": { "channels": {}, "message": "m", "frequency": "always" },
        "status": "disabled",
        "version": 4
      }
    ]"#;

    #[test]
    fn load_applies_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alerts.json");
        fs::write(&path, RULES).unwrap();

        let rules = load_alert_rules(&path).unwrap();
        assert_eq!(rules.len(), 2);

        let first = &rules[0];
        assert_eq!(first.status, AlertStatus::Active);
        assert_eq!(first.trigger_count, 0);
        assert_eq!(first.notification.frequency, Frequency::Once);
        assert!(first.notification.channels.email);
        assert!(first.notification.channels.telegram);
        assert!(matches!(first.conditions, AlertConditions::Price { .. }));

        let second = &rules[1];
        assert_eq!(second.status, AlertStatus::Disabled);
        assert_eq!(second.version, 4);
        match &second.conditions {
            AlertConditions::Pattern { patterns } => {
                assert!((patterns[0].min_confidence - 0.6).abs() < f64::EPSILON)
            }
            other => panic!("unexpected conditions {other:?}"),
        }
    }

    #[test]
    fn save_round_trips_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alerts.json");
        fs::write(&path, RULES).unwrap();
        let mut rules = load_alert_rules(&path).unwrap();
        rules[0] = rules[0].fired(chrono::Utc::now());

        save_alert_rules(&path, &rules).unwrap();
        let reloaded = load_alert_rules(&path).unwrap();
        assert_eq!(reloaded[0].status, AlertStatus::Triggered);
        assert_eq!(reloaded[0].id, rules[0].id);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alerts.json");
        fs::write(&path, r#"[{"owner": "x"}]"#).unwrap();
        let err = load_alert_rules(&path).unwrap_err();
        assert!(err.is_configuration());
    }
}
