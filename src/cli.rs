//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_alert_file::{load_alert_rules, save_alert_rules};
use crate::adapters::json_result_store::{JsonResultFile, JsonResultStore};
use crate::adapters::log_notifier::LogNotifier;
use crate::adapters::memory_alert_store::MemoryAlertStore;
use crate::adapters::text_report::TextReportAdapter;
use crate::domain::alert_monitor::{AlertMonitor, merge_updates};
use crate::domain::alert_trigger::{TriggerCoordinator, TriggerEvent};
use crate::domain::backtest::{BacktestConfig, BacktestResult, BacktestStatus};
use crate::domain::candle::Timeframe;
use crate::domain::config_validation::load_backtest_config;
use crate::domain::error::CandlescopeError;
use crate::domain::orchestrator::Orchestrator;
use crate::domain::snapshot::SnapshotBuilder;
use crate::ports::candle_port::CandlePort;
use crate::ports::pattern_port::PatternPort;
use crate::ports::report_port::ReportPort;
use crate::ports::result_store::ResultStore;

/// Exit code for a run that finished with `status = failed`.
const EXIT_RUN_FAILED: u8 = 4;

#[derive(Parser, Debug)]
#[command(name = "candlescope", about = "Pattern backtester and market alert engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one backtest from explicit data files
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        candles: PathBuf,
        #[arg(long)]
        patterns: Option<PathBuf>,
        #[arg(short, long, default_value = "result.json")]
        output: PathBuf,
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Run several backtests in parallel
    Batch {
        #[arg(short, long = "config", required = true)]
        configs: Vec<PathBuf>,
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate a backtest configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Replay candles and patterns through the alert rules
    Alerts {
        #[arg(long)]
        alerts: PathBuf,
        #[arg(long)]
        candles: PathBuf,
        #[arg(long)]
        patterns: Option<PathBuf>,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "1h")]
        timeframe: Timeframe,
        /// Write the rules back with their updated trigger state
        #[arg(long)]
        save: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            candles,
            patterns,
            output,
            report,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(&config, candles, patterns, &output, report.as_deref())
            }
        }
        Command::Batch {
            configs,
            data_dir,
            output,
        } => run_batch(&configs, data_dir, &output),
        Command::Validate { config } => run_dry_run(&config),
        Command::Alerts {
            alerts,
            candles,
            patterns,
            symbol,
            timeframe,
            save,
        } => run_alerts(&alerts, candles, patterns, &symbol, timeframe, save),
    }
}

fn fail(err: &CandlescopeError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

/// Load and validate the INI file at `path`.
pub fn load_config(path: &Path) -> Result<BacktestConfig, CandlescopeError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    load_backtest_config(&adapter)
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    eprintln!("Validating config {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    eprintln!("  Symbol:     {}", config.symbol);
    eprintln!("  Timeframe:  {}", config.timeframe);
    eprintln!(
        "  Period:     {} .. {}",
        config.start_date.to_rfc3339(),
        config.end_date.to_rfc3339()
    );
    for p in &config.patterns {
        eprintln!(
            "  Pattern:    {} ({}) min confidence {}",
            p.name, p.pattern_type, p.min_confidence
        );
    }
    let t = &config.trading_params;
    eprintln!("  Capital:    {}", t.initial_capital);
    eprintln!("  Size:       {}", t.position_size);
    eprintln!("  Max open:   {}", t.max_open_positions);
    eprintln!("Config OK");
    ExitCode::SUCCESS
}

fn status_code(result: &BacktestResult) -> ExitCode {
    match result.status {
        BacktestStatus::Completed => ExitCode::SUCCESS,
        _ => ExitCode::from(EXIT_RUN_FAILED),
    }
}

fn run_backtest(
    config_path: &Path,
    candles: PathBuf,
    patterns: Option<PathBuf>,
    output: &Path,
    report: Option<&Path>,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let data = CsvAdapter::from_files(candles, patterns);
    let store = JsonResultFile::new(output);

    let result = match run_backtest_pipeline(&config, &data, &data, &store) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    let reporter = TextReportAdapter::new();
    println!("{}", reporter.render(&result, &config));
    if let Some(path) = report {
        if let Err(e) = reporter.write(&result, &config, path) {
            return fail(&e);
        }
        eprintln!("Report written to {}", path.display());
    }
    eprintln!("Result written to {}", output.display());
    status_code(&result)
}

pub fn run_backtest_pipeline(
    config: &BacktestConfig,
    candles: &dyn CandlePort,
    patterns: &dyn PatternPort,
    store: &dyn ResultStore,
) -> Result<BacktestResult, CandlescopeError> {
    Orchestrator::new(candles, patterns, store).run(config)
}

fn run_batch(config_paths: &[PathBuf], data_dir: PathBuf, output: &Path) -> ExitCode {
    let mut configs = Vec::with_capacity(config_paths.len());
    for path in config_paths {
        match load_config(path) {
            Ok(c) => configs.push(c),
            Err(e) => {
                eprintln!("{}:", path.display());
                return fail(&e);
            }
        }
    }

    let store = match JsonResultStore::new(output) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let data = CsvAdapter::new(data_dir);
    let orchestrator = Orchestrator::new(&data, &data, &store);

    let mut code = ExitCode::SUCCESS;
    for (path, outcome) in config_paths.iter().zip(orchestrator.run_all(&configs)) {
        match outcome {
            Ok(result) => {
                let detail = match (&result.summary, &result.error) {
                    (Some(s), _) => format!(
                        "{} trades, return {:.2}%",
                        s.total_trades,
                        s.total_return * 100.0
                    ),
                    (None, Some(err)) => err.message.clone(),
                    (None, None) => String::new(),
                };
                println!(
                    "{}  {}  {:?}  {}",
                    path.display(),
                    result.id,
                    result.status,
                    detail
                );
                if result.status != BacktestStatus::Completed {
                    code = ExitCode::from(EXIT_RUN_FAILED);
                }
            }
            Err(e) => {
                eprintln!("{}: error: {e}", path.display());
                code = (&e).into();
            }
        }
    }
    code
}

/// Replay the files as a live feed and return the fired events.
pub fn run_alert_replay(
    rules: &MemoryAlertStore,
    data: &CsvAdapter,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<Vec<TriggerEvent>, CandlescopeError> {
    let (start, end) = (DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC);
    let candles = data.get_candles(symbol, timeframe, start, end)?;
    let patterns = data.get_pattern_signals(symbol, timeframe, start, end)?;

    let notifier = LogNotifier;
    let mut monitor = AlertMonitor::new(
        TriggerCoordinator::new(rules, &notifier),
        SnapshotBuilder::new(symbol, timeframe),
    );
    monitor.replay(merge_updates(candles, patterns, timeframe))
}

fn run_alerts(
    alerts_path: &Path,
    candles: PathBuf,
    patterns: Option<PathBuf>,
    symbol: &str,
    timeframe: Timeframe,
    save: bool,
) -> ExitCode {
    let rules = match load_alert_rules(alerts_path) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    eprintln!("Loaded {} alert rule(s)", rules.len());
    let store = MemoryAlertStore::from_rules(rules);
    let data = CsvAdapter::from_files(candles, patterns);

    let events = match run_alert_replay(&store, &data, symbol, timeframe) {
        Ok(events) => events,
        Err(e) => return fail(&e),
    };
    for event in &events {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => return fail(&CandlescopeError::from(e)),
        }
    }
    eprintln!("{} alert(s) fired", events.len());

    if save {
        if let Err(e) = save_alert_rules(alerts_path, &store.snapshot()) {
            return fail(&e);
        }
    }
    ExitCode::SUCCESS
}
