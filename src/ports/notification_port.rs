//! Notification dispatcher port.

use crate::domain::alert_trigger::TriggerEvent;
use crate::domain::error::CandlescopeError;

pub trait NotificationPort: Send + Sync {
    fn notify(&self, event: &TriggerEvent) -> Result<(), CandlescopeError>;
}
