//! Report generation port trait.

use std::path::Path;

use crate::domain::backtest::{BacktestConfig, BacktestResult};
use crate::domain::error::CandlescopeError;

/// Port for writing human-readable backtest reports.
pub trait ReportPort {
    fn render(&self, result: &BacktestResult, config: &BacktestConfig) -> String;

    /// Default implementation: renders and writes the text to `output_path`.
    fn write(
        &self,
        result: &BacktestResult,
        config: &BacktestConfig,
        output_path: &Path,
    ) -> Result<(), CandlescopeError> {
        std::fs::write(output_path, self.render(result, config))?;
        Ok(())
    }
}
