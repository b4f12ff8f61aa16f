//! Backtest result persistence port.

use uuid::Uuid;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::CandlescopeError;

pub trait ResultStore: Send + Sync {
    /// Insert or replace the result with the same id.
    fn save(&self, result: &BacktestResult) -> Result<(), CandlescopeError>;

    fn load(&self, id: Uuid) -> Result<Option<BacktestResult>, CandlescopeError>;
}
