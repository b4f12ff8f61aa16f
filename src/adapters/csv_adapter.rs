//! CSV file data adapter for candles and historical pattern signals.
//!
//! Candle files: `timestamp,open,high,low,close,volume`.
//! Pattern files: `name,type,confidence,start_time,end_time`.
//! Timestamps are RFC 3339 or `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, Utc};
use csv::StringRecord;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::candle::{Candle, Timeframe};
use crate::domain::error::CandlescopeError;
use crate::domain::pattern::{PatternSignal, PatternType};
use crate::ports::candle_port::CandlePort;
use crate::ports::pattern_port::PatternPort;

enum Source {
    /// `{SYMBOL}_{TIMEFRAME}.csv` and `{SYMBOL}_{TIMEFRAME}_patterns.csv`
    Directory(PathBuf),
    Files {
        candles: PathBuf,
        patterns: Option<PathBuf>,
    },
}

pub struct CsvAdapter {
    source: Source,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            source: Source::Directory(base_path),
        }
    }

    /// Explicit files. Without a pattern file the feed is empty.
    pub fn from_files(candles: PathBuf, patterns: Option<PathBuf>) -> Self {
        Self {
            source: Source::Files { candles, patterns },
        }
    }

    fn candle_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        match &self.source {
            Source::Directory(base) => base.join(format!("{}_{}.csv", symbol, timeframe)),
            Source::Files { candles, .. } => candles.clone(),
        }
    }

    fn pattern_path(&self, symbol: &str, timeframe: Timeframe) -> Option<PathBuf> {
        match &self.source {
            Source::Directory(base) => {
                Some(base.join(format!("{}_{}_patterns.csv", symbol, timeframe)))
            }
            Source::Files { patterns, .. } => patterns.clone(),
        }
    }
}

fn read(path: &Path) -> Result<String, CandlescopeError> {
    fs::read_to_string(path).map_err(|e| {
        CandlescopeError::data(format!("failed to read {}: {}", path.display(), e))
    })
}

fn field<'r>(
    record: &'r StringRecord,
    idx: usize,
    name: &str,
) -> Result<&'r str, CandlescopeError> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| CandlescopeError::data(format!("missing {name} column")))
}

fn number(record: &StringRecord, idx: usize, name: &str) -> Result<f64, CandlescopeError> {
    field(record, idx, name)?
        .parse()
        .map_err(|e| CandlescopeError::data(format!("invalid {name} value: {e}")))
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CandlescopeError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| CandlescopeError::data(format!("invalid timestamp '{raw}'")))
}

pub fn parse_candles(
    content: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Candle>, CandlescopeError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut candles = Vec::new();

    for result in rdr.records() {
        let record =
            result.map_err(|e| CandlescopeError::data(format!("CSV parse error: {}", e)))?;
        let timestamp = parse_timestamp(field(&record, 0, "timestamp")?)?;
        if timestamp < start || timestamp > end {
            continue;
        }
        candles.push(Candle {
            timestamp,
            open: number(&record, 1, "open")?,
            high: number(&record, 2, "high")?,
            low: number(&record, 3, "low")?,
            close: number(&record, 4, "close")?,
            volume: number(&record, 5, "volume")?,
        });
    }

    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

pub fn parse_patterns(
    content: &str,
    symbol: &str,
    timeframe: Timeframe,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<PatternSignal>, CandlescopeError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut signals = Vec::new();

    for result in rdr.records() {
        let record =
            result.map_err(|e| CandlescopeError::data(format!("CSV parse error: {}", e)))?;
        let end_time = parse_timestamp(field(&record, 4, "end_time")?)?;
        if end_time < start || end_time > end {
            continue;
        }
        let pattern_type: PatternType = field(&record, 1, "type")?
            .parse()
            .map_err(CandlescopeError::data)?;
        signals.push(PatternSignal {
            name: field(&record, 0, "name")?.to_string(),
            pattern_type,
            confidence: number(&record, 2, "confidence")?,
            start_time: parse_timestamp(field(&record, 3, "start_time")?)?,
            end_time,
            symbol: symbol.to_string(),
            timeframe,
        });
    }

    signals.sort_by_key(|s| s.end_time);
    Ok(signals)
}

impl CandlePort for CsvAdapter {
    fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, CandlescopeError> {
        let path = self.candle_path(symbol, timeframe);
        let candles = parse_candles(&read(&path)?, start, end)?;
        debug!(path = %path.display(), count = candles.len(), "Loaded candles");
        Ok(candles)
    }
}

impl PatternPort for CsvAdapter {
    fn get_pattern_signals(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PatternSignal>, CandlescopeError> {
        let Some(path) = self.pattern_path(symbol, timeframe) else {
            return Ok(Vec::new());
        };
        let signals = parse_patterns(&read(&path)?, symbol, timeframe, start, end)?;
        debug!(path = %path.display(), count = signals.len(), "Loaded pattern signals");
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::TempDir;

    fn range() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
        )
    }

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    const CANDLES: &str = "timestamp,open,high,low,close,volume
2024-01-01T01:00:00Z,101,103,100,102,900.5
2024-01-01T00:00:00Z,100,102,99,101,1000
2023-12-31T23:00:00Z,99,100,98,100,800
";

    #[test]
    fn candles_sorted_and_range_filtered() {
        let (start, end) = range();
        let candles = parse_candles(CANDLES, start, end).unwrap();
        assert_eq!(candles.len(), 2);
        assert!(candles[0].timestamp < candles[1].timestamp);
        assert!((candles[1].volume - 900.5).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_number_is_data_error() {
        let (start, end) = range();
        let err = parse_candles(
            "timestamp,open,high,low,close,volume\n2024-01-02,abc,1,1,1,1\n",
            start,
            end,
        )
        .unwrap_err();
        assert!(matches!(err, CandlescopeError::Data { ref reason } if reason.contains("open")));
    }

    #[test]
    fn date_only_timestamps_accepted() {
        let ts = parse_timestamp("2024-01-05").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap());
        assert!(parse_timestamp("05/01/2024").is_err());
    }

    #[test]
    fn patterns_parse_with_request_symbol() {
        let (start, end) = range();
        let content = "name,type,confidence,start_time,end_time
DOJI,bullish,0.72,2024-01-02T00:00:00Z,2024-01-02T02:00:00Z
HAMMER,sideways,0.8,2024-01-02T00:00:00Z,2024-01-02T02:00:00Z
";
        let err = parse_patterns(content, "BTCUSDT", Timeframe::H1, start, end).unwrap_err();
        assert!(matches!(err, CandlescopeError::Data { .. }));

        let ok = content.lines().take(2).collect::<Vec<_>>().join("\n");
        let signals = parse_patterns(&ok, "BTCUSDT", Timeframe::H1, start, end).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].symbol, "BTCUSDT");
        assert_eq!(signals[0].pattern_type, PatternType::Bullish);
    }

    #[test]
    fn directory_layout_resolves_files() {
        let dir = TempDir::new().unwrap();
        write_csv(&dir, "BTCUSDT_1h.csv", CANDLES);
        write_csv(
            &dir,
            "BTCUSDT_1h_patterns.csv",
            "name,type,confidence,start_time,end_time\nDOJI,bullish,0.7,2024-01-01,2024-01-01\n",
        );
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let (start, end) = range();

        assert_eq!(
            adapter.get_candles("BTCUSDT", Timeframe::H1, start, end).unwrap().len(),
            2
        );
        assert_eq!(
            adapter
                .get_pattern_signals("BTCUSDT", Timeframe::H1, start, end)
                .unwrap()
                .len(),
            1
        );
        assert!(adapter.get_candles("ETHUSDT", Timeframe::H1, start, end).is_err());
    }

    #[test]
    fn explicit_files_without_patterns() {
        let dir = TempDir::new().unwrap();
        let candles = write_csv(&dir, "c.csv", CANDLES);
        let adapter = CsvAdapter::from_files(candles, None);
        let (start, end) = range();
        assert!(
            adapter
                .get_pattern_signals("BTCUSDT", Timeframe::H1, start, end)
                .unwrap()
                .is_empty()
        );
    }
}
