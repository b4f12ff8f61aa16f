//! Configuration loading and validation.
//!
//! `load_backtest_config` turns the INI sections into a typed
//! `BacktestConfig`; `validate_config` checks the typed value and is run
//! again by the orchestrator before any simulation step.

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::backtest::{BacktestConfig, Fees, TradingParams, TrailingStop};
use crate::domain::candle::Timeframe;
use crate::domain::error::CandlescopeError;
use crate::domain::pattern::parse_pattern_filters;
use crate::ports::config_port::ConfigPort;

const DEFAULT_FEE: f64 = 0.001;

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, CandlescopeError> {
    let symbol = required(config, "backtest", "symbol")?;
    let timeframe: Timeframe = required(config, "backtest", "timeframe")?
        .parse()
        .map_err(|reason: String| CandlescopeError::invalid("backtest", "timeframe", reason))?;
    let start_date = parse_datetime(config.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end_date = parse_datetime(config.get_string("backtest", "end_date").as_deref(), "end_date")?;
    let patterns = parse_pattern_filters(&required(config, "backtest", "patterns")?)
        .map_err(|reason| CandlescopeError::invalid("backtest", "patterns", reason))?;

    let max_gap_bars = config.get_int("backtest", "max_gap_bars", 0);
    let max_gap_bars = u32::try_from(max_gap_bars).map_err(|_| {
        CandlescopeError::invalid("backtest", "max_gap_bars", "max_gap_bars must be non-negative")
    })?;

    let max_open_positions = config.get_int("trading", "max_open_positions", 1);
    let max_open_positions = usize::try_from(max_open_positions).unwrap_or(0);

    let trading_params = TradingParams {
        initial_capital: config.get_double("trading", "initial_capital", 0.0),
        position_size: config.get_double("trading", "position_size", 0.0),
        stop_loss: optional_fraction(config, "stop_loss")?,
        take_profit: optional_fraction(config, "take_profit")?,
        max_open_positions,
        trailing_stop: TrailingStop {
            enabled: config.get_bool("trading", "trailing_stop_enabled", false),
            percentage: config.get_double("trading", "trailing_stop_percentage", 0.0),
        },
    };

    let fees = Fees {
        maker: fee(config, "maker")?,
        taker: fee(config, "taker")?,
        slippage: fee(config, "slippage")?,
    };

    let backtest = BacktestConfig {
        symbol: symbol.trim().to_string(),
        timeframe,
        start_date,
        end_date,
        patterns,
        trading_params,
        fees,
        max_gap_bars,
    };
    validate_config(&backtest)?;
    Ok(backtest)
}

pub fn validate_config(config: &BacktestConfig) -> Result<(), CandlescopeError> {
    if config.symbol.trim().is_empty() {
        return Err(CandlescopeError::ConfigMissing {
            section: "backtest".to_string(),
            key: "symbol".to_string(),
        });
    }
    if config.start_date >= config.end_date {
        return Err(CandlescopeError::invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    validate_patterns(config)?;
    validate_trading(&config.trading_params)?;
    validate_fees(&config.fees)?;
    Ok(())
}

fn validate_patterns(config: &BacktestConfig) -> Result<(), CandlescopeError> {
    if config.patterns.is_empty() {
        return Err(CandlescopeError::invalid(
            "backtest",
            "patterns",
            "at least one pattern must be configured",
        ));
    }
    for filter in &config.patterns {
        if !(0.0..=1.0).contains(&filter.min_confidence) {
            return Err(CandlescopeError::invalid(
                "backtest",
                "patterns",
                format!("min_confidence for {} must be between 0 and 1", filter.name),
            ));
        }
    }
    Ok(())
}

fn validate_trading(params: &TradingParams) -> Result<(), CandlescopeError> {
    if !(params.initial_capital > 0.0) || !params.initial_capital.is_finite() {
        return Err(CandlescopeError::invalid(
            "trading",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    if !(params.position_size > 0.0 && params.position_size <= 1.0) {
        return Err(CandlescopeError::invalid(
            "trading",
            "position_size",
            "position_size must be in (0, 1]",
        ));
    }
    if params.stop_loss.is_some_and(|v| !(0.0..1.0).contains(&v)) {
        return Err(CandlescopeError::invalid(
            "trading",
            "stop_loss",
            "stop_loss must be in [0, 1)",
        ));
    }
    if params.take_profit.is_some_and(|v| !(v >= 0.0) || !v.is_finite()) {
        return Err(CandlescopeError::invalid(
            "trading",
            "take_profit",
            "take_profit must be non-negative",
        ));
    }
    if params.max_open_positions < 1 {
        return Err(CandlescopeError::invalid(
            "trading",
            "max_open_positions",
            "max_open_positions must be at least 1",
        ));
    }
    let trailing = params.trailing_stop;
    if trailing.enabled && !(trailing.percentage > 0.0 && trailing.percentage < 1.0) {
        return Err(CandlescopeError::invalid(
            "trading",
            "trailing_stop_percentage",
            "trailing_stop_percentage must be in (0, 1) when the trailing stop is enabled",
        ));
    }
    Ok(())
}

fn validate_fees(fees: &Fees) -> Result<(), CandlescopeError> {
    for (key, value) in [
        ("maker", fees.maker),
        ("taker", fees.taker),
        ("slippage", fees.slippage),
    ] {
        if !(value >= 0.0 && value < 1.0) {
            return Err(CandlescopeError::invalid(
                "fees",
                key,
                format!("{key} must be in [0, 1)"),
            ));
        }
    }
    Ok(())
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, CandlescopeError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(CandlescopeError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn optional_fraction(config: &dyn ConfigPort, key: &str) -> Result<Option<f64>, CandlescopeError> {
    config
        .get_optional_double("trading", key)
        .transpose()
        .map_err(|raw| CandlescopeError::invalid("trading", key, format!("'{raw}' is not a number")))
}

fn fee(config: &dyn ConfigPort, key: &str) -> Result<f64, CandlescopeError> {
    config
        .get_optional_double("fees", key)
        .unwrap_or(Ok(DEFAULT_FEE))
        .map_err(|raw| CandlescopeError::invalid("fees", key, format!("'{raw}' is not a number")))
}

/// `YYYY-MM-DD` (midnight UTC) or RFC 3339.
pub fn parse_datetime(value: Option<&str>, field: &str) -> Result<DateTime<Utc>, CandlescopeError> {
    let Some(raw) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return Err(CandlescopeError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        });
    };
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            CandlescopeError::invalid(
                "backtest",
                field,
                format!("invalid {field} format, expected YYYY-MM-DD or RFC 3339"),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::pattern::PatternType;
    use chrono::TimeZone;

    const VALID: &str = r#"
[backtest]
symbol = BTCUSDT
timeframe = 1h
start_date = 2024-01-01
end_date = 2024-03-01T12:00:00Z
patterns = DOJI:bullish, HAMMER:bullish:0.75

[trading]
initial_capital = 10000
position_size = 0.1
stop_loss = 0.02
take_profit = 0.04
max_open_positions = 2
trailing_stop_enabled = true
trailing_stop_percentage = 0.03

[fees]
taker = 0.0005
"#;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn with_line(section: &str, line: &str) -> String {
        VALID.replace(&format!("[{section}]\n"), &format!("[{section}]\n{line}\n"))
    }

    fn without(key: &str) -> String {
        VALID
            .lines()
            .filter(|l| !l.starts_with(&format!("{key} =")))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn valid_config_loads() {
        let cfg = load_backtest_config(&make_config(VALID)).unwrap();
        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.timeframe, Timeframe::H1);
        assert_eq!(cfg.start_date, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(cfg.end_date, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        assert_eq!(cfg.patterns.len(), 2);
        assert_eq!(cfg.patterns[1].pattern_type, PatternType::Bullish);
        assert_eq!(cfg.trading_params.stop_loss, Some(0.02));
        assert_eq!(cfg.trading_params.max_open_positions, 2);
        assert!(cfg.trading_params.trailing_stop.enabled);
        assert!((cfg.fees.taker - 0.0005).abs() < f64::EPSILON);
        assert!((cfg.fees.maker - 0.001).abs() < f64::EPSILON);
        assert!((cfg.fees.slippage - 0.001).abs() < f64::EPSILON);
        assert_eq!(cfg.max_gap_bars, 0);
    }

    #[test]
    fn missing_symbol_fails() {
        let err = load_backtest_config(&make_config(&without("symbol"))).unwrap_err();
        assert!(matches!(err, CandlescopeError::ConfigMissing { key, .. } if key == "symbol"));
    }

    #[test]
    fn unknown_timeframe_fails() {
        let content = VALID.replace("timeframe = 1h", "timeframe = 2h");
        let err = load_backtest_config(&make_config(&content)).unwrap_err();
        assert!(matches!(err, CandlescopeError::ConfigInvalid { key, .. } if key == "timeframe"));
    }

    #[test]
    fn start_after_end_fails() {
        let content = VALID.replace("start_date = 2024-01-01", "start_date = 2024-06-01");
        let err = load_backtest_config(&make_config(&content)).unwrap_err();
        assert!(matches!(err, CandlescopeError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn bad_date_format_fails() {
        let content = VALID.replace("start_date = 2024-01-01", "start_date = 2024/01/01");
        let err = load_backtest_config(&make_config(&content)).unwrap_err();
        assert!(matches!(err, CandlescopeError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn missing_end_date_fails() {
        let err = load_backtest_config(&make_config(&without("end_date"))).unwrap_err();
        assert!(matches!(err, CandlescopeError::ConfigMissing { key, .. } if key == "end_date"));
    }

    #[test]
    fn non_positive_capital_fails() {
        let content = VALID.replace("initial_capital = 10000", "initial_capital = 0");
        let err = load_backtest_config(&make_config(&content)).unwrap_err();
        assert!(
            matches!(err, CandlescopeError::ConfigInvalid { key, .. } if key == "initial_capital")
        );
    }

    #[test]
    fn position_size_outside_unit_interval_fails() {
        for bad in ["0", "1.5", "-0.1"] {
            let content = VALID.replace("position_size = 0.1", &format!("position_size = {bad}"));
            let err = load_backtest_config(&make_config(&content)).unwrap_err();
            assert!(
                matches!(err, CandlescopeError::ConfigInvalid { ref key, .. } if key == "position_size"),
                "position_size = {bad}"
            );
        }
    }

    #[test]
    fn position_size_of_one_is_allowed() {
        let content = VALID.replace("position_size = 0.1", "position_size = 1.0");
        assert!(load_backtest_config(&make_config(&content)).is_ok());
    }

    #[test]
    fn stop_loss_garbage_fails() {
        let content = VALID.replace("stop_loss = 0.02", "stop_loss = tight");
        let err = load_backtest_config(&make_config(&content)).unwrap_err();
        assert!(matches!(err, CandlescopeError::ConfigInvalid { key, .. } if key == "stop_loss"));
    }

    #[test]
    fn stop_loss_and_take_profit_optional() {
        let content = without("stop_loss");
        let content = content
            .lines()
            .filter(|l| !l.starts_with("take_profit"))
            .collect::<Vec<_>>()
            .join("\n");
        let cfg = load_backtest_config(&make_config(&content)).unwrap();
        assert!(cfg.trading_params.stop_loss.is_none());
        assert!(cfg.trading_params.take_profit.is_none());
    }

    #[test]
    fn max_open_positions_zero_fails() {
        let content = VALID.replace("max_open_positions = 2", "max_open_positions = 0");
        let err = load_backtest_config(&make_config(&content)).unwrap_err();
        assert!(
            matches!(err, CandlescopeError::ConfigInvalid { key, .. } if key == "max_open_positions")
        );
    }

    #[test]
    fn max_open_positions_defaults_to_one() {
        let cfg = load_backtest_config(&make_config(&without("max_open_positions"))).unwrap();
        assert_eq!(cfg.trading_params.max_open_positions, 1);
    }

    #[test]
    fn trailing_percentage_required_when_enabled() {
        let content = VALID.replace("trailing_stop_percentage = 0.03", "trailing_stop_percentage = 0");
        let err = load_backtest_config(&make_config(&content)).unwrap_err();
        assert!(
            matches!(err, CandlescopeError::ConfigInvalid { key, .. } if key == "trailing_stop_percentage")
        );
    }

    #[test]
    fn negative_fee_fails() {
        let content = with_line("fees", "slippage = -0.01");
        let err = load_backtest_config(&make_config(&content)).unwrap_err();
        assert!(matches!(err, CandlescopeError::ConfigInvalid { key, .. } if key == "slippage"));
    }

    #[test]
    fn non_numeric_fee_fails() {
        let content = VALID.replace("taker = 0.0005", "taker = abc");
        let err = load_backtest_config(&make_config(&content)).unwrap_err();
        assert!(matches!(err, CandlescopeError::ConfigInvalid { key, .. } if key == "taker"));
    }

    #[test]
    fn negative_gap_tolerance_fails() {
        let content = with_line("backtest", "max_gap_bars = -1");
        let err = load_backtest_config(&make_config(&content)).unwrap_err();
        assert!(
            matches!(err, CandlescopeError::ConfigInvalid { key, .. } if key == "max_gap_bars")
        );
    }

    #[test]
    fn empty_patterns_fail() {
        let err = load_backtest_config(&make_config(&without("patterns"))).unwrap_err();
        assert!(matches!(err, CandlescopeError::ConfigMissing { key, .. } if key == "patterns"));
    }

    #[test]
    fn malformed_patterns_fail() {
        let content = VALID.replace("HAMMER:bullish:0.75", "HAMMER");
        let err = load_backtest_config(&make_config(&content)).unwrap_err();
        assert!(matches!(err, CandlescopeError::ConfigInvalid { key, .. } if key == "patterns"));
    }

    #[test]
    fn min_confidence_above_one_fails() {
        let content = VALID.replace("HAMMER:bullish:0.75", "HAMMER:bullish:1.5");
        let err = load_backtest_config(&make_config(&content)).unwrap_err();
        assert!(matches!(err, CandlescopeError::ConfigInvalid { key, .. } if key == "patterns"));
    }
}
