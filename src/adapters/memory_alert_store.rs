//! In-memory alert store backed by `DashMap`.
//!
//! `compare_and_swap` holds the entry's shard lock for the version check and
//! the write, so two writers can never both succeed against one version.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::alert::AlertRule;
use crate::domain::error::CandlescopeError;
use crate::ports::alert_store::AlertStore;

#[derive(Debug, Default)]
pub struct MemoryAlertStore {
    rules: DashMap<Uuid, AlertRule>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: impl IntoIterator<Item = AlertRule>) -> Self {
        let store = Self::new();
        for rule in rules {
            store.rules.insert(rule.id, rule);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All rules, ordered by id for stable output.
    pub fn snapshot(&self) -> Vec<AlertRule> {
        let mut rules: Vec<AlertRule> = self.rules.iter().map(|e| e.value().clone()).collect();
        rules.sort_by_key(|r| r.id);
        rules
    }
}

impl AlertStore for MemoryAlertStore {
    fn find_active_alerts(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<AlertRule>, CandlescopeError> {
        let mut active: Vec<AlertRule> = self
            .rules
            .iter()
            .filter(|e| e.symbol.eq_ignore_ascii_case(symbol) && e.is_live(now))
            .map(|e| e.value().clone())
            .collect();
        active.sort_by_key(|r| r.id);
        Ok(active)
    }

    fn get(&self, id: Uuid) -> Result<Option<AlertRule>, CandlescopeError> {
        Ok(self.rules.get(&id).map(|e| e.value().clone()))
    }

    fn compare_and_swap(
        &self,
        expected_version: u64,
        updated: &AlertRule,
    ) -> Result<bool, CandlescopeError> {
        let Some(mut entry) = self.rules.get_mut(&updated.id) else {
            return Err(CandlescopeError::Storage {
                reason: format!("alert {} not found", updated.id),
            });
        };
        if entry.version != expected_version {
            return Ok(false);
        }
        *entry = updated.clone();
        Ok(true)
    }

    fn insert(&self, rule: AlertRule) -> Result<(), CandlescopeError> {
        self.rules.insert(rule.id, rule);
        Ok(())
    }
}
