//! Notification dispatcher that writes trigger events to the log.

use tracing::info;

use crate::domain::alert_trigger::TriggerEvent;
use crate::domain::error::CandlescopeError;
use crate::ports::notification_port::NotificationPort;

#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotificationPort for LogNotifier {
    fn notify(&self, event: &TriggerEvent) -> Result<(), CandlescopeError> {
        let c = event.channels;
        info!(
            alert_id = %event.alert_id,
            user_id = %event.user_id,
            symbol = %event.symbol,
            email = c.email,
            telegram = c.telegram,
            whatsapp = c.whatsapp,
            "{}",
            event.message
        );
        Ok(())
    }
}
