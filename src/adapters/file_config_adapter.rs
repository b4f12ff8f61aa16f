//! INI file configuration adapter.

use crate::domain::error::CandlescopeError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CandlescopeError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| CandlescopeError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, CandlescopeError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| CandlescopeError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Some(true),
            "false" | "no" | "0" | "off" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_sections() {
        let content = r#"
[backtest]
symbol = BTCUSDT
timeframe = 1h

[trading]
initial_capital = 10000
max_open_positions = 3

[fees]
taker = 0.0005
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("backtest", "symbol"),
            Some("BTCUSDT".to_string())
        );
        assert_eq!(adapter.get_int("trading", "max_open_positions", 1), 3);
        assert_eq!(adapter.get_double("fees", "taker", 0.001), 0.0005);
    }

    #[test]
    fn missing_keys_fall_back() {
        let adapter = FileConfigAdapter::from_string("[trading]\n").unwrap();
        assert_eq!(adapter.get_string("trading", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
        assert_eq!(adapter.get_int("trading", "missing", 42), 42);
        assert_eq!(adapter.get_double("fees", "slippage", 0.001), 0.001);
    }

    #[test]
    fn non_numeric_values_fall_back() {
        let adapter = FileConfigAdapter::from_string(
            "[trading]\nmax_open_positions = abc\ninitial_capital = lots\n",
        )
        .unwrap();
        assert_eq!(adapter.get_int("trading", "max_open_positions", 1), 1);
        assert_eq!(adapter.get_double("trading", "initial_capital", 0.0), 0.0);
    }

    #[test]
    fn optional_double_distinguishes_absent_and_garbage() {
        let adapter = FileConfigAdapter::from_string(
            "[trading]\nstop_loss = 0.02\ntake_profit =\ntrailing_stop_percentage = wide\n",
        )
        .unwrap();
        assert_eq!(adapter.get_optional_double("trading", "stop_loss"), Some(Ok(0.02)));
        assert_eq!(adapter.get_optional_double("trading", "take_profit"), None);
        assert_eq!(adapter.get_optional_double("trading", "missing"), None);
        assert!(matches!(
            adapter.get_optional_double("trading", "trailing_stop_percentage"),
            Some(Err(_))
        ));
    }

    #[test]
    fn bool_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[trading]\na = true\nb = yes\nc = 1\nd = off\ne = no\nf = maybe\n",
        )
        .unwrap();
        assert!(adapter.get_bool("trading", "a", false));
        assert!(adapter.get_bool("trading", "b", false));
        assert!(adapter.get_bool("trading", "c", false));
        assert!(!adapter.get_bool("trading", "d", true));
        assert!(!adapter.get_bool("trading", "e", true));
        assert!(adapter.get_bool("trading", "f", true));
        assert!(!adapter.get_bool("trading", "missing", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[backtest]\nsymbol = ETHUSDT\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("backtest", "symbol"),
            Some("ETHUSDT".to_string())
        );
    }

    #[test]
    fn from_file_missing_is_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini").unwrap_err();
        assert!(
            matches!(err, CandlescopeError::ConfigParse { ref file, .. } if file.contains("config.ini"))
        );
    }
}
