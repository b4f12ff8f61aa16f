//! Persisted alert rule set.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::alert::AlertRule;
use crate::domain::error::CandlescopeError;

pub trait AlertStore: Send + Sync {
    /// Rules for `symbol` that are active and unexpired at `now`.
    fn find_active_alerts(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<AlertRule>, CandlescopeError>;

    fn get(&self, id: Uuid) -> Result<Option<AlertRule>, CandlescopeError>;

    /// Replace the stored rule only if its version still equals
    /// `expected_version`. Returns false on a lost race.
    fn compare_and_swap(
        &self,
        expected_version: u64,
        updated: &AlertRule,
    ) -> Result<bool, CandlescopeError>;

    fn insert(&self, rule: AlertRule) -> Result<(), CandlescopeError>;
}
