//! Alert Trigger Coordinator.
//!
//! Evaluations for different alerts run in parallel. The write for a single
//! alert is serialized through the store's compare-and-swap: re-read, re-check
//! the guard and conditions, then swap. A lost race retries; a rule that is no
//! longer live after the re-read is dropped. This keeps `trigger_count <= 1`
//! for `once` alerts under concurrent snapshots.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::alert::{AlertRule, Channels};
use super::alert_eval::{MatchedCondition, evaluate, render_message};
use super::error::CandlescopeError;
use super::snapshot::MarketSnapshot;
use crate::ports::alert_store::AlertStore;
use crate::ports::notification_port::NotificationPort;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    pub alert_id: Uuid,
    pub user_id: String,
    pub symbol: String,
    pub channels: Channels,
    pub message: String,
    pub matched: MatchedCondition,
    pub timestamp: DateTime<Utc>,
}

pub struct TriggerCoordinator<'a> {
    store: &'a dyn AlertStore,
    notifier: &'a dyn NotificationPort,
}

impl<'a> TriggerCoordinator<'a> {
    pub fn new(store: &'a dyn AlertStore, notifier: &'a dyn NotificationPort) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &'a dyn AlertStore {
        self.store
    }

    /// Evaluate every active alert for the snapshot's symbol.
    pub fn on_snapshot(
        &self,
        snapshot: &MarketSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Vec<TriggerEvent>, CandlescopeError> {
        let alerts = self.store.find_active_alerts(&snapshot.symbol, now)?;
        Ok(self.process(&alerts, snapshot, now))
    }

    /// Evaluate the given rules, commit the matches, and dispatch one event
    /// per committed trigger. Store failures skip the affected alert only.
    pub fn process(
        &self,
        alerts: &[AlertRule],
        snapshot: &MarketSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<TriggerEvent> {
        let events: Vec<TriggerEvent> = alerts
            .par_iter()
            .filter(|rule| evaluate(rule, snapshot, now).is_some())
            .filter_map(|rule| match self.commit(rule.id, snapshot, now) {
                Ok(event) => event,
                Err(err) => {
                    warn!(alert_id = %rule.id, error = %err, "Alert trigger not committed");
                    None
                }
            })
            .collect();

        for event in &events {
            self.dispatch(event);
        }
        events
    }

    /// CAS loop. Returns `None` if the alert no longer matches once re-read.
    fn commit(
        &self,
        id: Uuid,
        snapshot: &MarketSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Option<TriggerEvent>, CandlescopeError> {
        let mut attempt = 0u32;
        loop {
            let Some(current) = self.store.get(id)? else {
                return Ok(None);
            };
            let Some(matched) = evaluate(&current, snapshot, now) else {
                return Ok(None);
            };

            let updated = current.fired(now);
            if self.store.compare_and_swap(current.version, &updated)? {
                info!(
                    alert_id = %id,
                    symbol = %updated.symbol,
                    trigger_count = updated.trigger_count,
                    status = ?updated.status,
                    condition = %matched.description,
                    "Alert triggered"
                );
                return Ok(Some(TriggerEvent {
                    alert_id: id,
                    user_id: updated.owner.clone(),
                    symbol: updated.symbol.clone(),
                    channels: updated.notification.channels,
                    message: render_message(&updated, &matched, snapshot),
                    matched,
                    timestamp: now,
                }));
            }

            attempt += 1;
            debug!(alert_id = %id, attempt, "Alert changed concurrently, retrying");
        }
    }

    fn dispatch(&self, event: &TriggerEvent) {
        if let Err(err) = self.notifier.notify(event) {
            warn!(alert_id = %event.alert_id, error = %err, "Notification dispatch failed");
        }
    }
}
